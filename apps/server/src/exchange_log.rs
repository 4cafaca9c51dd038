//! Append-only log file per exchange.

use chrono::Utc;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};

/// Lazily opened `<dir>/<exchange>.log` files.
pub struct ExchangeLogs {
    dir: PathBuf,
    files: RwLock<HashMap<String, Arc<Mutex<File>>>>,
}

impl ExchangeLogs {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            files: RwLock::new(HashMap::new()),
        }
    }

    /// File path used for `exchange`.
    pub fn path_for(&self, exchange: &str) -> PathBuf {
        self.dir.join(format!("{}.log", file_stem(exchange)))
    }

    /// Append one timestamped line to the exchange's log.
    pub async fn log(&self, exchange: &str, message: &str) -> std::io::Result<()> {
        let file = self.file_for(exchange).await?;
        let line = format!(
            "{} {}\n",
            Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            message
        );

        let mut file = file.lock().await;
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }

    async fn file_for(&self, exchange: &str) -> std::io::Result<Arc<Mutex<File>>> {
        if let Some(file) = self.files.read().await.get(exchange) {
            return Ok(file.clone());
        }

        let mut files = self.files.write().await;
        // Another task may have opened it while we waited for the write lock
        if let Some(file) = files.get(exchange) {
            return Ok(file.clone());
        }

        fs::create_dir_all(&self.dir).await?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(exchange))
            .await?;
        let file = Arc::new(Mutex::new(file));
        files.insert(exchange.to_string(), file.clone());
        Ok(file)
    }
}

fn file_stem(exchange: &str) -> String {
    let stem: String = exchange
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if stem.is_empty() {
        "unknown".to_string()
    } else {
        stem
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_file_names_are_sanitized() {
        let logs = ExchangeLogs::new("logs");
        assert_eq!(logs.path_for("Binance"), PathBuf::from("logs/Binance.log"));
        assert_eq!(logs.path_for("../etc"), PathBuf::from("logs/___etc.log"));
        assert_eq!(logs.path_for(""), PathBuf::from("logs/unknown.log"));
    }

    #[tokio::test]
    async fn test_lines_are_appended_per_exchange() {
        let dir = TempDir::new().unwrap();
        let logs = ExchangeLogs::new(dir.path().join("logs"));

        logs.log("Binance", "first").await.unwrap();
        logs.log("Bybit", "other").await.unwrap();
        logs.log("Binance", "second").await.unwrap();

        let binance = std::fs::read_to_string(logs.path_for("Binance")).unwrap();
        let lines: Vec<&str> = binance.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" first"));
        assert!(lines[1].ends_with(" second"));

        let bybit = std::fs::read_to_string(logs.path_for("Bybit")).unwrap();
        assert_eq!(bybit.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_existing_file_is_appended_not_truncated() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("HTX.log"), "old line\n").unwrap();

        let logs = ExchangeLogs::new(dir.path());
        logs.log("HTX", "new line").await.unwrap();

        let content = std::fs::read_to_string(logs.path_for("HTX")).unwrap();
        assert!(content.starts_with("old line\n"));
        assert!(content.trim_end().ends_with("new line"));
    }

    #[tokio::test]
    async fn test_concurrent_writers_share_one_handle() {
        let dir = TempDir::new().unwrap();
        let logs = Arc::new(ExchangeLogs::new(dir.path()));

        let mut handles = Vec::new();
        for i in 0..16 {
            let logs = logs.clone();
            handles.push(tokio::spawn(async move {
                logs.log("Binance", &format!("line {}", i)).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let content = std::fs::read_to_string(logs.path_for("Binance")).unwrap();
        assert_eq!(content.lines().count(), 16);
        assert_eq!(logs.files.read().await.len(), 1);
    }
}
