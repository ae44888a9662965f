// ABOUTME: Error taxonomy for the extraction core
// ABOUTME: Separates fatal configuration errors from per-stream failures

use thiserror::Error;

/// Errors surfaced by the extraction core.
///
/// `Configuration` aborts a run before any stream is processed. The other
/// variants are scoped to a single stream: the orchestrator records them and
/// continues with the remaining streams.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Bad or missing connector configuration. Fatal for the whole run.
    #[error("invalid connector configuration: {0}")]
    Configuration(String),

    /// The stream cannot be synced with the requested mode combination.
    #[error("stream {stream}: unsupported sync mode: {reason}")]
    UnsupportedSyncMode { stream: String, reason: String },

    /// The row-source collaborator failed mid-scan (I/O error or timeout).
    /// The stream's prior progress token is left untouched; the next run
    /// reprocesses the same window.
    #[error("stream {stream}: fetch failed")]
    TransientFetch {
        stream: String,
        #[source]
        source: anyhow::Error,
    },

    /// Sync state could not be loaded or persisted.
    #[error("sync state persistence failed")]
    State(#[source] anyhow::Error),
}

impl SyncError {
    /// Stream identity this error is scoped to, if any.
    pub fn stream(&self) -> Option<&str> {
        match self {
            SyncError::UnsupportedSyncMode { stream, .. }
            | SyncError::TransientFetch { stream, .. } => Some(stream),
            _ => None,
        }
    }
}
