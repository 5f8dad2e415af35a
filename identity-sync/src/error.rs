//! Error types for identity synchronization

use thiserror::Error;

use crate::types::TransactionId;

/// Result type for synchronization operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors raised by the transport seam.
///
/// `Daemon` carries the daemon's own code and raw message so callers can
/// show it verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Daemon could not be reached
    #[error("Daemon unreachable: {0}")]
    Unreachable(String),

    /// Response could not be decoded
    #[error("Malformed daemon response: {0}")]
    MalformedResponse(String),

    /// Daemon reported a failure
    #[error("Daemon error {code}: {message}")]
    Daemon { code: i64, message: String },
}

/// Synchronization error types
#[derive(Debug, Error)]
pub enum SyncError {
    /// Empty or malformed local input; never reaches the transport
    #[error("Invalid edit: {0}")]
    InvalidEdit(String),

    /// Malformed opaque identifier
    #[error("Invalid key format for '{key}': {reason}")]
    InvalidKeyFormat { key: String, reason: String },

    /// Fetch or submit failed
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Post-submit re-fetch failed. The mutation itself went through.
    #[error("Refresh after transaction {txid} failed: {source}")]
    RefreshFailed {
        txid: TransactionId,
        #[source]
        source: TransportError,
    },
}

impl SyncError {
    pub(crate) fn invalid_key(key: &str, reason: impl Into<String>) -> Self {
        SyncError::InvalidKeyFormat {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether this error was raised before anything left the process
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidEdit(_) | SyncError::InvalidKeyFormat { .. }
        )
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::MalformedResponse(err.to_string())
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            TransportError::MalformedResponse(err.to_string())
        } else {
            TransportError::Unreachable(err.to_string())
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but is unusable
    #[error("Invalid config value: {0}")]
    Invalid(String),
}
