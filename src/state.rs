// ABOUTME: Per-stream sync state - persists progress tokens between runs
// ABOUTME: Loaded once at run start, committed per stream, saved at run end

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::xmin::XminCursor;

/// Marker of how far a stream's incremental sync has progressed.
///
/// Xmin tokens carry the raw counter and the wraparound epoch; both must
/// survive serialization exactly. Standard tokens carry an opaque
/// caller-defined cursor value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressToken {
    Xmin(XminCursor),
    Cursor { value: serde_json::Value },
}

impl ProgressToken {
    pub fn as_xmin(&self) -> Option<&XminCursor> {
        match self {
            ProgressToken::Xmin(cursor) => Some(cursor),
            ProgressToken::Cursor { .. } => None,
        }
    }

    pub fn as_cursor_value(&self) -> Option<&serde_json::Value> {
        match self {
            ProgressToken::Cursor { value } => Some(value),
            ProgressToken::Xmin(_) => None,
        }
    }
}

/// Sync state for a single stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamState {
    /// Schema the stream lives in (e.g., "public")
    pub namespace: String,
    /// Stream name
    pub stream: String,
    /// Last committed progress token
    pub token: ProgressToken,
    /// Timestamp of the last successful sync
    pub last_synced_at: chrono::DateTime<chrono::Utc>,
    /// Records emitted by the last sync of this stream
    pub last_record_count: u64,
}

impl StreamState {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.namespace, self.stream)
    }
}

/// Sync state for a whole source, one entry per tracked stream.
///
/// The orchestrator owns this exclusively for the duration of a run: it is
/// read once at run start and the updated snapshot is written at run end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncState {
    /// Per-stream states, keyed by "namespace.stream"
    pub streams: HashMap<String, StreamState>,
    /// State format version for future migrations
    pub version: u32,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Default for SyncState {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncState {
    /// Create a new empty SyncState.
    pub fn new() -> Self {
        let now = chrono::Utc::now();
        Self {
            streams: HashMap::new(),
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    fn key(namespace: &str, stream: &str) -> String {
        format!("{}.{}", namespace, stream)
    }

    /// Get state for a stream if it exists.
    pub fn get_stream(&self, namespace: &str, stream: &str) -> Option<&StreamState> {
        self.streams.get(&Self::key(namespace, stream))
    }

    /// Last committed token for a stream, if any.
    pub fn token(&self, namespace: &str, stream: &str) -> Option<&ProgressToken> {
        self.get_stream(namespace, stream).map(|s| &s.token)
    }

    /// Commit a new token for a stream after a successful sync.
    pub fn commit(
        &mut self,
        namespace: &str,
        stream: &str,
        token: ProgressToken,
        record_count: u64,
    ) {
        let now = chrono::Utc::now();
        self.streams.insert(
            Self::key(namespace, stream),
            StreamState {
                namespace: namespace.to_string(),
                stream: stream.to_string(),
                token,
                last_synced_at: now,
                last_record_count: record_count,
            },
        );
        self.updated_at = now;
    }

    /// Remove state for a stream (e.g., deselected from the catalog).
    pub fn remove_stream(&mut self, namespace: &str, stream: &str) -> Option<StreamState> {
        let removed = self.streams.remove(&Self::key(namespace, stream));
        if removed.is_some() {
            self.updated_at = chrono::Utc::now();
        }
        removed
    }

    /// All stream keys currently tracked.
    pub fn tracked_streams(&self) -> Vec<&str> {
        self.streams.keys().map(|s| s.as_str()).collect()
    }

    /// Load state from a JSON file.
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read sync state from {:?}", path))?;
        let state: SyncState = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse sync state from {:?}", path))?;
        Ok(state)
    }

    /// Save state to a JSON file. Saving the same snapshot twice produces
    /// the same persisted representation.
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }

        let contents =
            serde_json::to_string_pretty(self).context("Failed to serialize sync state")?;
        fs::write(path, contents)
            .await
            .with_context(|| format!("Failed to write sync state to {:?}", path))?;
        Ok(())
    }

    /// Default state file path for the current directory.
    pub fn default_path() -> std::path::PathBuf {
        std::path::PathBuf::from(".pg-source-extractor/sync-state.json")
    }
}
