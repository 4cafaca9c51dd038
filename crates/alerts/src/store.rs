//! Subscriber set and per-chat thresholds, persisted to a JSON file.

use crate::threshold::ThresholdOrigin;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Settings file I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Settings serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// On-disk snapshot of the store.
///
/// Written whole on every mutation; keys of `thresholds` are chat ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default, deserialize_with = "null_as_default")]
    pub subscribers: Vec<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub thresholds: BTreeMap<i64, f64>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Default)]
struct StoreState {
    subscribers: BTreeSet<i64>,
    thresholds: BTreeMap<i64, f64>,
}

impl StoreState {
    fn snapshot(&self) -> Settings {
        Settings {
            subscribers: self.subscribers.iter().copied().collect(),
            thresholds: self.thresholds.clone(),
        }
    }

    fn from_settings(settings: Settings) -> Self {
        let mut thresholds = BTreeMap::new();
        for (chat_id, value) in settings.thresholds {
            if value.is_finite() && value > 0.0 {
                thresholds.insert(chat_id, value);
            } else {
                warn!(chat_id = chat_id, value = value, "Ignoring invalid stored threshold");
            }
        }

        Self {
            subscribers: settings.subscribers.into_iter().collect(),
            thresholds,
        }
    }
}

/// Owns every subscriber and threshold.
///
/// One lock covers both collections and is held across the file rewrite, so
/// each written file is a consistent pair and writes never interleave.
pub struct SubscriptionStore {
    path: PathBuf,
    default_threshold: f64,
    state: Mutex<StoreState>,
}

impl SubscriptionStore {
    pub fn new(path: impl Into<PathBuf>, default_threshold: f64) -> Self {
        Self {
            path: path.into(),
            default_threshold,
            state: Mutex::new(StoreState::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the in-memory state with the settings file.
    ///
    /// A missing or malformed file leaves the store as it was.
    pub async fn load(&self) {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No settings file, starting empty");
                return;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read settings file");
                return;
            }
        };

        let settings: Settings = match serde_json::from_slice(&bytes) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to decode settings file");
                return;
            }
        };

        let mut state = self.state.lock().await;
        *state = StoreState::from_settings(settings);
        info!(
            subscribers = state.subscribers.len(),
            thresholds = state.thresholds.len(),
            "Settings loaded"
        );
    }

    /// Write the current state to the settings file.
    pub async fn save(&self) -> Result<(), StoreError> {
        let state = self.state.lock().await;
        self.write(&state.snapshot()).await
    }

    /// Add `chat_id` and give it the default threshold if it has none.
    ///
    /// Returns true if the chat was not subscribed before.
    pub async fn subscribe(&self, chat_id: i64) -> bool {
        let mut state = self.state.lock().await;
        let added = state.subscribers.insert(chat_id);
        state
            .thresholds
            .entry(chat_id)
            .or_insert(self.default_threshold);
        self.persist(&state).await;
        added
    }

    /// Remove `chat_id`. Returns true if it was subscribed.
    pub async fn unsubscribe(&self, chat_id: i64) -> bool {
        let mut state = self.state.lock().await;
        let removed = state.subscribers.remove(&chat_id);
        self.persist(&state).await;
        removed
    }

    /// Threshold for `chat_id`, or the default when none is stored.
    pub async fn threshold(&self, chat_id: i64) -> (f64, ThresholdOrigin) {
        let state = self.state.lock().await;
        match state.thresholds.get(&chat_id) {
            Some(value) => (*value, ThresholdOrigin::UserSet),
            None => (self.default_threshold, ThresholdOrigin::Default),
        }
    }

    /// Store an already validated (positive) threshold for `chat_id`.
    pub async fn set_threshold(&self, chat_id: i64, value: f64) {
        let mut state = self.state.lock().await;
        state.thresholds.insert(chat_id, value);
        self.persist(&state).await;
    }

    /// Current subscribers, in ascending id order.
    pub async fn subscribers(&self) -> Vec<i64> {
        let state = self.state.lock().await;
        state.subscribers.iter().copied().collect()
    }

    pub async fn is_subscribed(&self, chat_id: i64) -> bool {
        self.state.lock().await.subscribers.contains(&chat_id)
    }

    /// Consistent copy of everything the store holds.
    pub async fn settings(&self) -> Settings {
        self.state.lock().await.snapshot()
    }

    async fn persist(&self, state: &StoreState) {
        match self.write(&state.snapshot()).await {
            Ok(()) => debug!(path = %self.path.display(), "Settings saved"),
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to save settings"),
        }
    }

    /// Write to a sibling temp file, then rename over the target.
    async fn write(&self, settings: &Settings) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(settings)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let temp_path = temp_path(&self.path);
        {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(&json).await?;
            file.sync_all().await?;
        }
        fs::rename(&temp_path, &self.path).await?;

        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "settings.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}
