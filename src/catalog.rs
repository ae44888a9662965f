// ABOUTME: Catalog construction - declares per-stream sync capabilities
// ABOUTME: Validates caller-selected sync and destination write modes

use serde::{Deserialize, Serialize};

use crate::config::ReplicationMethod;
use crate::error::SyncError;

/// Semantic type of a stream field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Number,
    String,
    Boolean,
    Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

impl Field {
    pub fn new(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            field_type,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    FullRefresh,
    Incremental,
}

/// How the caller intends to write records at the destination. Deduplicated
/// writes require a primary key on the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationWriteMode {
    Append,
    Overwrite,
    AppendDedup,
}

/// User-visible description of a stream and its sync capabilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamDescriptor {
    pub name: String,
    pub namespace: String,
    pub fields: Vec<Field>,
    /// Primary key reported by the source; empty if none.
    pub source_defined_primary_key: Vec<Vec<String>>,
    /// When true, the progress marker is derived by the source itself and
    /// no caller-supplied cursor field is accepted or required.
    pub source_defined_cursor: bool,
    /// Suggested cursor field for Standard mode; empty under xmin.
    pub default_cursor_field: Vec<String>,
    pub supported_sync_modes: Vec<SyncMode>,
}

impl StreamDescriptor {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }

    pub fn supports(&self, mode: SyncMode) -> bool {
        self.supported_sync_modes.contains(&mode)
    }
}

/// A stream selected for a run, annotated with the caller's choices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfiguredStream {
    pub stream: StreamDescriptor,
    pub sync_mode: SyncMode,
    pub destination_write_mode: DestinationWriteMode,
    /// Caller-nominated cursor field; only legal under Standard replication.
    pub cursor_field: Option<Vec<String>>,
}

/// The set of streams selected for a run. Built once, immutable after.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfiguredCatalog {
    pub streams: Vec<ConfiguredStream>,
}

/// Builds stream descriptors and validates caller selections against the
/// active replication method.
#[derive(Debug, Clone)]
pub struct CatalogBuilder {
    method: ReplicationMethod,
}

impl CatalogBuilder {
    pub fn new(method: ReplicationMethod) -> Self {
        Self { method }
    }

    /// Produce a stream descriptor from a column list and any
    /// source-reported primary key.
    ///
    /// Under xmin replication the cursor is derived from the transaction
    /// counter, so the descriptor declares a source-defined cursor and no
    /// default cursor field.
    pub fn build_stream(
        &self,
        namespace: &str,
        name: &str,
        fields: Vec<Field>,
        primary_key: Vec<Vec<String>>,
    ) -> StreamDescriptor {
        let source_defined_cursor = matches!(self.method, ReplicationMethod::Xmin);
        StreamDescriptor {
            name: name.to_string(),
            namespace: namespace.to_string(),
            fields,
            source_defined_primary_key: primary_key,
            source_defined_cursor,
            default_cursor_field: Vec::new(),
            supported_sync_modes: vec![SyncMode::FullRefresh, SyncMode::Incremental],
        }
    }

    /// Validate the caller's mode selection for one stream.
    pub fn configure_stream(
        &self,
        stream: StreamDescriptor,
        sync_mode: SyncMode,
        destination_write_mode: DestinationWriteMode,
        cursor_field: Option<Vec<String>>,
    ) -> Result<ConfiguredStream, SyncError> {
        let qualified = stream.qualified_name();

        if !stream.supports(sync_mode) {
            return Err(SyncError::UnsupportedSyncMode {
                stream: qualified,
                reason: format!("{:?} is not a supported sync mode for this stream", sync_mode),
            });
        }

        if sync_mode == SyncMode::Incremental {
            match self.method {
                ReplicationMethod::Xmin => {
                    if cursor_field.as_ref().is_some_and(|f| !f.is_empty()) {
                        return Err(SyncError::UnsupportedSyncMode {
                            stream: qualified,
                            reason: "xmin replication uses a source-defined cursor; \
                                     a caller cursor field is not accepted"
                                .to_string(),
                        });
                    }
                }
                ReplicationMethod::Standard => {
                    if !cursor_field.as_ref().is_some_and(|f| !f.is_empty()) {
                        return Err(SyncError::UnsupportedSyncMode {
                            stream: qualified,
                            reason: "INCREMENTAL under Standard replication requires a \
                                     caller-nominated cursor field"
                                .to_string(),
                        });
                    }
                }
            }

            if destination_write_mode == DestinationWriteMode::AppendDedup
                && stream.source_defined_primary_key.is_empty()
            {
                return Err(SyncError::UnsupportedSyncMode {
                    stream: qualified,
                    reason: "INCREMENTAL with deduplicated writes requires a primary key"
                        .to_string(),
                });
            }
        }

        Ok(ConfiguredStream {
            stream,
            sync_mode,
            destination_write_mode,
            cursor_field,
        })
    }

    /// Assemble the configured catalog for a run.
    pub fn build_catalog(&self, streams: Vec<ConfiguredStream>) -> ConfiguredCatalog {
        ConfiguredCatalog { streams }
    }
}
