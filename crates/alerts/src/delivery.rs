//! Chunked delivery of long HTML reports.

use crate::telegram::TelegramError;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Telegram rejects messages above 4096 characters; stay well under it.
pub const MAX_MESSAGE_LEN: usize = 4000;

const PRE_OPEN: &str = "<pre>";
const PRE_CLOSE: &str = "</pre>";

/// Rendering mode of an outgoing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextMode {
    Plain,
    Html,
}

/// Outbound side of the chat platform.
#[async_trait]
pub trait ChatSender: Send + Sync {
    async fn send(&self, chat_id: i64, text: &str, mode: TextMode) -> Result<(), TelegramError>;
}

/// Split `text` into messages of at most `max_len` characters.
///
/// Text containing `<pre>` blocks is cut at block boundaries only, so every
/// block travels in its own message; a segment that is still too long is
/// truncated. Other text is packed line by line, and a single line longer
/// than the limit is cut into fixed-size windows. Parts that would carry only
/// whitespace are dropped in both modes.
pub fn split_message(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);

    if text.contains(PRE_OPEN) {
        return split_pre_blocks(text)
            .into_iter()
            .filter(|segment| !segment.trim().is_empty())
            .map(|segment| truncate_chars(segment, max_len))
            .collect();
    }

    if char_len(text) <= max_len {
        return vec![text.to_string()];
    }

    split_lines(text, max_len)
}

/// Alternating outside / `<pre>…</pre>` segments, in order.
///
/// An unclosed `<pre>` runs to the end of the text.
fn split_pre_blocks(text: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut rest = text;

    while let Some(open) = rest.find(PRE_OPEN) {
        if open > 0 {
            segments.push(&rest[..open]);
        }

        let block = &rest[open..];
        match block.find(PRE_CLOSE) {
            Some(close) => {
                let end = close + PRE_CLOSE.len();
                segments.push(&block[..end]);
                rest = &block[end..];
            }
            None => {
                segments.push(block);
                rest = "";
                break;
            }
        }
    }

    if !rest.is_empty() {
        segments.push(rest);
    }
    segments
}

fn split_lines(text: &str, max_len: usize) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current: Option<String> = None;
    let mut current_len = 0usize;

    for line in text.split('\n') {
        let line_len = char_len(line);

        if let Some(part) = current.as_mut() {
            if current_len + 1 + line_len <= max_len {
                part.push('\n');
                part.push_str(line);
                current_len += 1 + line_len;
                continue;
            }
        }

        if let Some(part) = current.take() {
            parts.push(part);
        }

        if line_len > max_len {
            let chars: Vec<char> = line.chars().collect();
            parts.extend(chars.chunks(max_len).map(|w| w.iter().collect::<String>()));
            current_len = 0;
        } else {
            current = Some(line.to_string());
            current_len = line_len;
        }
    }

    if let Some(part) = current {
        parts.push(part);
    }
    parts.retain(|part| !part.trim().is_empty());
    parts
}

fn truncate_chars(text: &str, max_len: usize) -> String {
    match text.char_indices().nth(max_len) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Outcome of delivering one report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub sent: usize,
    pub failed: usize,
}

impl DeliveryReport {
    pub fn all_sent(&self) -> bool {
        self.failed == 0
    }
}

/// Sends reports through a [`ChatSender`], splitting them as needed.
#[derive(Clone)]
pub struct MessageDelivery {
    sender: Arc<dyn ChatSender>,
    max_len: usize,
}

impl MessageDelivery {
    pub fn new(sender: Arc<dyn ChatSender>) -> Self {
        Self {
            sender,
            max_len: MAX_MESSAGE_LEN,
        }
    }

    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len.max(1);
        self
    }

    /// Deliver `text` to `chat_id` as one or more HTML messages.
    ///
    /// A failed chunk is logged and the remaining chunks are still sent.
    pub async fn deliver(&self, chat_id: i64, text: &str) -> DeliveryReport {
        let parts = split_message(text, self.max_len);
        let total = parts.len();
        let mut report = DeliveryReport::default();

        for (i, part) in parts.iter().enumerate() {
            match self.sender.send(chat_id, part, TextMode::Html).await {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        chat_id = chat_id,
                        part = i + 1,
                        total = total,
                        error = %e,
                        "Failed to deliver message part"
                    );
                }
            }
        }

        debug!(chat_id = chat_id, sent = report.sent, failed = report.failed, "Delivery finished");
        report
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingSender;
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_short_text_is_one_message() {
        assert_eq!(split_message("hello", 10), vec!["hello".to_string()]);
        assert_eq!(split_message("", 10), vec![String::new()]);
    }

    #[test]
    fn test_pre_blocks_travel_separately() {
        let text = "\n<b>Binance</b>\n<pre>BTC 1\nETH 2\n</pre>\nfooter";
        let parts = split_message(text, 100);
        assert_eq!(
            parts,
            vec![
                "\n<b>Binance</b>\n".to_string(),
                "<pre>BTC 1\nETH 2\n</pre>".to_string(),
                "\nfooter".to_string(),
            ]
        );
    }

    #[test]
    fn test_whitespace_between_blocks_is_skipped() {
        let text = "<pre>a</pre>\n<pre>b</pre>";
        assert_eq!(
            split_message(text, 100),
            vec!["<pre>a</pre>".to_string(), "<pre>b</pre>".to_string()]
        );
    }

    #[test]
    fn test_unclosed_pre_keeps_leading_text() {
        let text = "head<pre>body";
        assert_eq!(
            split_message(text, 100),
            vec!["head".to_string(), "<pre>body".to_string()]
        );
    }

    #[test]
    fn test_oversized_pre_block_is_truncated_to_limit() {
        let body = "x".repeat(50);
        let text = format!("<pre>{}</pre>", body);
        let parts = split_message(&text, 20);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].chars().count(), 20);
        assert!(parts[0].starts_with("<pre>xxx"));
    }

    #[test]
    fn test_block_within_limit_is_never_split() {
        let block = format!("<pre>{}</pre>", "row\n".repeat(10));
        let text = format!("{}\n{}", "h".repeat(30), block);
        let parts = split_message(&text, block.chars().count());
        assert!(parts.contains(&block));
    }

    #[test]
    fn test_lines_are_packed_greedily() {
        let text = "aaaa\nbbbb\ncccc";
        assert_eq!(
            split_message(text, 9),
            vec!["aaaa\nbbbb".to_string(), "cccc".to_string()]
        );
    }

    #[test]
    fn test_long_line_is_cut_into_windows() {
        let text = format!("ab\n{}\ncd", "z".repeat(25));
        let parts = split_message(&text, 10);
        assert_eq!(
            parts,
            vec![
                "ab".to_string(),
                "z".repeat(10),
                "z".repeat(10),
                "z".repeat(5),
                "cd".to_string(),
            ]
        );
        assert!(parts.iter().all(|p| p.chars().count() <= 10));
    }

    #[test]
    fn test_empty_lines_survive_packing() {
        let text = format!("{}\n\n{}", "a".repeat(6), "b".repeat(6));
        let parts = split_message(&text, 8);
        assert_eq!(parts, vec![format!("{}\n", "a".repeat(6)), "b".repeat(6)]);
        assert_eq!(parts.join("\n"), text);
    }

    #[test]
    fn test_blank_line_runs_never_become_their_own_message() {
        let text = format!("aaa{}bbb", "\n".repeat(5));
        let parts = split_message(&text, 3);
        assert_eq!(parts, vec!["aaa".to_string(), "bbb".to_string()]);
    }

    #[test]
    fn test_lengths_count_characters_not_bytes() {
        let text = "⬆️".repeat(3);
        assert_eq!(split_message(&text, 6), vec![text.clone()]);

        let long = format!("<pre>{}</pre>", "é".repeat(10));
        let parts = split_message(&long, 8);
        assert_eq!(parts[0], format!("<pre>{}", "é".repeat(3)));
    }

    #[tokio::test]
    async fn test_deliver_sends_every_part_as_html() {
        let sender = Arc::new(RecordingSender::default());
        let delivery = MessageDelivery::new(sender.clone()).with_max_len(9);

        let report = delivery.deliver(11, "aaaa\nbbbb\ncccc").await;

        assert_eq!(report, DeliveryReport { sent: 2, failed: 0 });
        let sent = sender.sent.lock().await;
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|(id, _, mode)| *id == 11 && *mode == TextMode::Html));
    }

    #[tokio::test]
    async fn test_failed_part_does_not_stop_the_rest() {
        let sender = Arc::new(RecordingSender::failing_on("bad"));
        let delivery = MessageDelivery::new(sender.clone());

        let report = delivery.deliver(1, "<pre>good</pre><pre>bad</pre><pre>fine</pre>").await;

        assert_eq!(report, DeliveryReport { sent: 2, failed: 1 });
        assert!(!report.all_sent());
        assert_eq!(
            sender.texts_for(1).await,
            vec!["<pre>good</pre>".to_string(), "<pre>fine</pre>".to_string()]
        );
    }
}
