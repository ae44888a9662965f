// ABOUTME: Sync orchestrator - one pass over the configured catalog
// ABOUTME: Opens windows, fetches bounded rows, emits records, commits tokens

use std::path::Path;
use std::time::Duration;

use crate::catalog::{ConfiguredCatalog, ConfiguredStream, SyncMode};
use crate::config::{ConnectorConfig, ReplicationMethod};
use crate::error::SyncError;
use crate::policy::{self, select_policy, SyncWindow, WindowKind};
use crate::source::{RecordMessage, RowSource, SourceRow, StreamId};
use crate::state::{ProgressToken, SyncState};
use crate::xmin::{WraparoundConfig, XminTracker};

/// Orchestrator tuning.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Per-stream bound on a single fetch. Expiry fails that stream only.
    pub fetch_timeout: Duration,
    pub wraparound: WraparoundConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(300),
            wraparound: WraparoundConfig::default(),
        }
    }
}

/// Statistics from one sync run.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    pub streams_synced: usize,
    pub records_emitted: u64,
    pub full_resyncs: usize,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

impl SyncStats {
    /// True if every stream completed without errors.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Result of one sync run: the emitted records, the updated state
/// snapshot, and run statistics. Streams that failed keep their prior
/// token in the returned state.
#[derive(Debug)]
pub struct SyncOutcome {
    pub records: Vec<RecordMessage>,
    pub state: SyncState,
    pub stats: SyncStats,
}

struct StreamSyncResult {
    records: Vec<RecordMessage>,
    token: Option<ProgressToken>,
    kind: Option<WindowKind>,
}

/// Drives one sync pass per configured stream.
///
/// Streams are processed in catalog order. A failing stream is recorded
/// and skipped; its siblings continue and their tokens are still
/// committed. The returned state is an explicit snapshot: the caller owns
/// persisting it through `SyncState::save`.
#[derive(Debug)]
pub struct SyncOrchestrator<S: RowSource> {
    source: S,
    method: ReplicationMethod,
    config: OrchestratorConfig,
}

impl<S: RowSource> SyncOrchestrator<S> {
    pub fn new(source: S, method: ReplicationMethod, config: OrchestratorConfig) -> Self {
        Self {
            source,
            method,
            config,
        }
    }

    /// Validate the connector configuration and build an orchestrator for
    /// its replication method. Fails before any stream runs.
    pub fn from_config(
        source: S,
        connector: &ConnectorConfig,
        config: OrchestratorConfig,
    ) -> Result<Self, SyncError> {
        connector.validate()?;
        Ok(Self::new(source, connector.replication_method, config))
    }

    /// The row-source collaborator this orchestrator reads from.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Load the prior sync state for a run. A missing file yields a fresh
    /// state; any other persistence failure surfaces as `SyncError::State`.
    pub async fn load_state(&self, path: &Path) -> Result<SyncState, SyncError> {
        match tokio::fs::try_exists(path).await {
            Ok(false) => Ok(SyncState::new()),
            Ok(true) => SyncState::load(path).await.map_err(SyncError::State),
            Err(e) => Err(SyncError::State(e.into())),
        }
    }

    /// Persist the state snapshot produced by a run.
    pub async fn save_state(&self, state: &SyncState, path: &Path) -> Result<(), SyncError> {
        state.save(path).await.map_err(SyncError::State)
    }

    /// Run one sync pass over the catalog.
    pub async fn run_sync(&self, catalog: &ConfiguredCatalog, prior: &SyncState) -> SyncOutcome {
        let start = std::time::Instant::now();
        let mut stats = SyncStats::default();
        let mut state = prior.clone();
        let mut records = Vec::new();

        for configured in &catalog.streams {
            let stream_id = StreamId::new(&configured.stream.namespace, &configured.stream.name);

            match self.sync_stream(configured, &stream_id, &state).await {
                Ok(result) => {
                    let emitted = result.records.len() as u64;
                    stats.streams_synced += 1;
                    stats.records_emitted += emitted;
                    if result.kind == Some(WindowKind::FullResync) {
                        stats.full_resyncs += 1;
                    }

                    if let Some(token) = result.token {
                        state.commit(&stream_id.namespace, &stream_id.name, token, emitted);
                    }
                    records.extend(result.records);

                    if emitted == 0 {
                        tracing::debug!("No changes in {}", stream_id);
                    } else {
                        tracing::info!("Synced {}: {} records", stream_id, emitted);
                    }
                }
                Err(e) => {
                    // Log with :? to show the full error chain.
                    tracing::error!("Failed to sync {}: {:?}", stream_id, e);
                    stats.errors.push(format!("Failed to sync {}: {}", stream_id, e));
                }
            }
        }

        stats.duration_ms = start.elapsed().as_millis() as u64;
        SyncOutcome {
            records,
            state,
            stats,
        }
    }

    async fn sync_stream(
        &self,
        configured: &ConfiguredStream,
        stream_id: &StreamId,
        state: &SyncState,
    ) -> Result<StreamSyncResult, SyncError> {
        if configured.sync_mode == SyncMode::FullRefresh {
            let rows = self
                .fetch_with_timeout(stream_id, &SyncWindow::unbounded())
                .await?;
            return Ok(StreamSyncResult {
                records: emit(stream_id, rows),
                token: None,
                kind: None,
            });
        }

        let last = state.token(&stream_id.namespace, &stream_id.name);

        // The high-water read is taken per stream, before any row is
        // scanned; it becomes the committed token for xmin streams.
        let high_water = match self.method {
            ReplicationMethod::Xmin => self.read_high_water_with_timeout(stream_id).await?,
            ReplicationMethod::Standard => 0,
        };

        let policy = select_policy(
            self.method,
            configured.cursor_field.clone(),
            XminTracker::new(self.config.wraparound),
            high_water,
        );

        let plan = policy.compute_window(last);
        let mut rows = self.fetch_with_timeout(stream_id, plan.window()).await?;
        rows.retain(|row| plan.includes_position(row.position));

        let records = emit(stream_id, rows);

        let observed_max = configured.cursor_field.as_ref().and_then(|field| {
            let data: Vec<serde_json::Value> =
                records.iter().map(|r| r.data.clone()).collect();
            policy::max_cursor_value(&data, field)
                .map(|value| ProgressToken::Cursor { value })
        });

        let token = policy.advance(&plan, observed_max);

        Ok(StreamSyncResult {
            records,
            token,
            kind: Some(plan.kind()),
        })
    }

    async fn read_high_water_with_timeout(&self, stream_id: &StreamId) -> Result<u32, SyncError> {
        tokio::time::timeout(
            self.config.fetch_timeout,
            self.source.read_high_water(stream_id),
        )
        .await
        .map_err(|_| SyncError::TransientFetch {
            stream: stream_id.qualified_name(),
            source: anyhow::anyhow!("high-water read timed out"),
        })?
        .map_err(|e| SyncError::TransientFetch {
            stream: stream_id.qualified_name(),
            source: e,
        })
    }

    async fn fetch_with_timeout(
        &self,
        stream_id: &StreamId,
        window: &SyncWindow,
    ) -> Result<Vec<SourceRow>, SyncError> {
        tokio::time::timeout(
            self.config.fetch_timeout,
            self.source.fetch_rows(stream_id, window),
        )
        .await
        .map_err(|_| SyncError::TransientFetch {
            stream: stream_id.qualified_name(),
            source: anyhow::anyhow!("row fetch timed out after {:?}", self.config.fetch_timeout),
        })?
        .map_err(|e| SyncError::TransientFetch {
            stream: stream_id.qualified_name(),
            source: e,
        })
    }
}

fn emit(stream_id: &StreamId, rows: Vec<SourceRow>) -> Vec<RecordMessage> {
    let now = chrono::Utc::now();
    rows.into_iter()
        .map(|row| RecordMessage {
            namespace: stream_id.namespace.clone(),
            stream: stream_id.name.clone(),
            data: row.data,
            emitted_at: now,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_success() {
        let stats = SyncStats {
            streams_synced: 2,
            records_emitted: 6,
            full_resyncs: 0,
            errors: vec![],
            duration_ms: 12,
        };
        assert!(stats.is_success());
    }

    #[test]
    fn test_stats_with_errors() {
        let stats = SyncStats {
            errors: vec!["Failed to sync public.users".to_string()],
            ..Default::default()
        };
        assert!(!stats.is_success());
    }

    #[test]
    fn test_default_config() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.fetch_timeout, Duration::from_secs(300));
    }
}
