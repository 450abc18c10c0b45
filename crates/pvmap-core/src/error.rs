//! Error types for PV Map

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PvMapError {
    // Configuration errors
    #[error("Missing required configuration: {key}")]
    ConfigMissing { key: String },

    #[error("Invalid configuration value for {key}: {reason}")]
    ConfigInvalid { key: String, reason: String },

    #[error("Config file not found at {path}")]
    ConfigFileNotFound { path: PathBuf },

    // Viewport errors
    #[error("Invalid viewport: {reason}")]
    InvalidViewport { reason: String },

    // Filter errors
    #[error("Invalid filter value for {field}: {reason}")]
    InvalidFilter { field: String, reason: String },

    // Remote query errors
    #[error("Project search failed: {reason}")]
    QueryFailed { reason: String },

    #[error("Remote rejected credentials: {reason}")]
    Unauthorized { reason: String },

    #[error("Query coordinator has stopped")]
    CoordinatorStopped,

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PvMapError {
    /// Whether the error leaves the previously displayed state usable
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PvMapError::QueryFailed { .. }
                | PvMapError::Unauthorized { .. }
                | PvMapError::Serialization(_)
                | PvMapError::Io(_)
        )
    }
}

impl From<serde_json::Error> for PvMapError {
    fn from(err: serde_json::Error) -> Self {
        PvMapError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PvMapError>;
