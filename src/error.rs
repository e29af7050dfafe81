//! Error types for the cooking pipeline

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type for cooking operations
pub type CookResult<T> = Result<T, CookError>;

/// Cooking error types
#[derive(Error, Debug)]
pub enum CookError {
    /// The session environment is unusable (missing tool, wrong content directory)
    #[error("Environment error: {0}")]
    Environment(String),

    /// Another cooker held the exclusivity lock for too long
    #[error("Timed out after {0:?} waiting for the cooker lock")]
    LockTimeout(Duration),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Corrupt or version-mismatched persisted data
    #[error("Data error: {0}")]
    Data(String),

    /// A cook transform failed
    #[error("Failed cooking {path}: {message}")]
    Task { path: String, message: String },

    /// A task declared a dependency that does not exist after cooking
    #[error("Cooker bug: {0}")]
    Bug(String),

    /// Construction was cancelled
    #[error("Cooker construction was cancelled")]
    Cancelled,

    /// The cooker is not in a state that allows the operation
    #[error("Invalid cooker state: {0}")]
    InvalidState(String),

    /// A source control operation failed
    #[error("Source control error: {0}")]
    SourceControl(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A source path is not a valid content path
    #[error("Invalid content path: {}", .0.display())]
    InvalidPath(PathBuf),

    /// No registered task accepts the file
    #[error("No cook task can cook {0}")]
    NoTaskForFile(String),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CookError {
    /// Create an environment error
    pub fn environment<E: fmt::Display>(msg: E) -> Self {
        Self::Environment(msg.to_string())
    }

    /// Create a serialization error
    pub fn serialization<E: fmt::Display>(err: E) -> Self {
        Self::Serialization(err.to_string())
    }

    /// Create a data error
    pub fn data<E: fmt::Display>(msg: E) -> Self {
        Self::Data(msg.to_string())
    }

    /// Create a task error for the given file
    pub fn task<P: fmt::Display, E: fmt::Display>(path: P, msg: E) -> Self {
        Self::Task {
            path: path.to_string(),
            message: msg.to_string(),
        }
    }

    /// Create a cooker bug error
    pub fn bug<E: fmt::Display>(msg: E) -> Self {
        Self::Bug(msg.to_string())
    }

    /// Create an invalid state error
    pub fn invalid_state<E: fmt::Display>(msg: E) -> Self {
        Self::InvalidState(msg.to_string())
    }

    /// Create a source control error
    pub fn source_control<E: fmt::Display>(msg: E) -> Self {
        Self::SourceControl(msg.to_string())
    }

    /// Create a configuration error
    pub fn configuration<E: fmt::Display>(msg: E) -> Self {
        Self::Configuration(msg.to_string())
    }

    /// Check if this error is session-fatal before any cooking starts
    pub fn is_environment(&self) -> bool {
        matches!(
            self,
            Self::Environment(_) | Self::LockTimeout(_) | Self::Configuration(_)
        )
    }

    /// Check if this error points at a task implementation bug
    pub fn is_bug(&self) -> bool {
        matches!(self, Self::Bug(_))
    }
}

impl From<serde_json::Error> for CookError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for CookError {
    fn from(err: toml::de::Error) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl From<notify::Error> for CookError {
    fn from(err: notify::Error) -> Self {
        Self::Other(anyhow::anyhow!("File watcher error: {}", err))
    }
}
