// ABOUTME: Incremental PostgreSQL data-extraction core
// ABOUTME: xmin and cursor-based replication with per-stream progress tokens

pub mod catalog;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod policy;
pub mod source;
pub mod state;
pub mod xmin;

pub use catalog::{
    CatalogBuilder, ConfiguredCatalog, ConfiguredStream, DestinationWriteMode, Field, FieldType,
    StreamDescriptor, SyncMode,
};
pub use config::{ConnectorConfig, ReplicationMethod};
pub use error::SyncError;
pub use orchestrator::{OrchestratorConfig, SyncOrchestrator, SyncOutcome, SyncStats};
pub use policy::{IncrementPolicy, StandardPolicy, SyncWindow, WindowBound, WindowKind, XminPolicy};
pub use source::{PgRowSource, RecordMessage, RowSource, SourceRow, StreamId};
pub use state::{ProgressToken, StreamState, SyncState};
pub use xmin::{WraparoundCheck, WraparoundConfig, XminCursor, XminTracker};
