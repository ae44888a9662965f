// ABOUTME: Row-source collaborator interface consumed by the orchestrator
// ABOUTME: The core never issues raw queries; it only requests bounded scans

pub mod postgres;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::policy::SyncWindow;

pub use postgres::{connect, PgRowSource};

/// Identity of a stream within a source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamId {
    pub namespace: String,
    pub name: String,
}

impl StreamId {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

/// One row fetched from a source, tagged with its write-counter position.
#[derive(Debug, Clone)]
pub struct SourceRow {
    /// Raw xmin counter of the writing transaction.
    pub position: u32,
    /// Row payload keyed by column name.
    pub data: serde_json::Value,
}

/// A record emitted by a sync run, tagged with its stream identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordMessage {
    pub namespace: String,
    pub stream: String,
    pub data: serde_json::Value,
    pub emitted_at: chrono::DateTime<chrono::Utc>,
}

/// Database collaborator the sync core reads from.
///
/// `read_high_water` is a single scalar read taken per stream at
/// window-open time, not a per-row operation. `fetch_rows` performs one
/// bounded scan; the bounds come from the resolved increment policy.
pub trait RowSource {
    fn read_high_water(
        &self,
        stream: &StreamId,
    ) -> impl std::future::Future<Output = Result<u32>> + Send;

    fn fetch_rows(
        &self,
        stream: &StreamId,
        window: &SyncWindow,
    ) -> impl std::future::Future<Output = Result<Vec<SourceRow>>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_id_display() {
        let id = StreamId::new("public", "starships");
        assert_eq!(id.to_string(), "public.starships");
        assert_eq!(id.qualified_name(), "public.starships");
    }
}
