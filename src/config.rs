// ABOUTME: Connector configuration for a single PostgreSQL source
// ABOUTME: Carries connection details and the active replication method

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Replication strategy for a connection. One method governs every
/// incremental stream of a run.
///
/// Serialized as a tagged object (`{"method": "Xmin"}`) to match the
/// connector's config wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method")]
pub enum ReplicationMethod {
    /// Incremental windows bounded by a caller-nominated cursor column.
    Standard,
    /// Incremental windows derived from the xmin transaction counter.
    /// The cursor is source-defined; callers cannot nominate one.
    Xmin,
}

/// Connection-level configuration for the extraction core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    /// Schemas to include in discovery and sync.
    pub schemas: Vec<String>,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub ssl: bool,
    pub replication_method: ReplicationMethod,
}

impl ConnectorConfig {
    /// Validate the configuration before any stream runs.
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.host.is_empty() {
            return Err(SyncError::Configuration("host must not be empty".into()));
        }
        if self.port == 0 {
            return Err(SyncError::Configuration("port must be nonzero".into()));
        }
        if self.database.is_empty() {
            return Err(SyncError::Configuration(
                "database must not be empty".into(),
            ));
        }
        if self.schemas.is_empty() {
            return Err(SyncError::Configuration(
                "at least one schema must be configured".into(),
            ));
        }
        Ok(())
    }

    /// Build a PostgreSQL connection URL from the configured fields.
    pub fn connection_url(&self) -> String {
        format!(
            "postgresql://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database
        )
    }

    /// Connection URL with the password masked, safe for logging.
    pub fn sanitized_url(&self) -> String {
        sanitize_url(&self.connection_url())
    }
}

/// Sanitize a database URL by masking the password component.
pub fn sanitize_url(url: &str) -> String {
    if let Ok(mut parsed) = url::Url::parse(url) {
        if parsed.password().is_some() {
            let _ = parsed.set_password(Some("***"));
        }
        parsed.to_string()
    } else {
        url.to_string()
    }
}
