use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// A3S Forge error types
#[derive(Error, Debug)]
pub enum ForgeError {
    /// Malformed user input or conflicting options
    #[error("{0}")]
    Validation(String),

    /// Build context or layer directory could not be packed
    #[error("Unable to pack {}: {message}", path.display())]
    Pack { path: PathBuf, message: String },

    /// Ignore file contains a pattern that cannot be compiled
    #[error("Invalid ignore pattern '{pattern}': {message}")]
    InvalidIgnorePattern { pattern: String, message: String },

    /// Compressed layer size exceeds the configured budget
    #[error("{}", budget_message(*limit, *actual, path.as_ref()))]
    BudgetExceeded {
        limit: u64,
        actual: u64,
        path: Option<PathBuf>,
    },

    /// I/O level network failure (connection reset, timeout, ...)
    #[error("Unable to connect build service: {0}")]
    Transport(String),

    /// Service answered with a status code designated as temporary
    #[error("Build service temporarily unavailable: [{status}] {body}")]
    ServiceUnavailable { status: u16, body: String },

    /// Unexpected status code or response shape
    #[error("{}", protocol_message(*status, message))]
    Protocol { status: Option<u16>, message: String },

    /// Retryable failure persisted across every allowed attempt
    #[error("Build service request failed after {attempts} attempts: {source}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        source: Box<ForgeError>,
    },

    /// Build did not reach a terminal state before the deadline
    #[error("Container request {request_id} did not complete within {}s", waited.as_secs())]
    Timeout { request_id: String, waited: Duration },

    /// Operation interrupted by a cancellation signal
    #[error("Operation cancelled")]
    Cancelled,

    /// Build reached the FAILED terminal state
    #[error("{}", failed_message(reason.as_deref(), details_uri.as_deref()))]
    BuildFailed {
        reason: Option<String>,
        details_uri: Option<String>,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ForgeError {
    /// Whether the failure is transient and worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ForgeError::Transport(_) | ForgeError::ServiceUnavailable { .. }
        )
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ForgeError::Validation(message.into())
    }

    pub fn pack(path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        ForgeError::Pack {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn protocol(status: Option<u16>, message: impl Into<String>) -> Self {
        ForgeError::Protocol {
            status,
            message: message.into(),
        }
    }
}

fn budget_message(limit: u64, actual: u64, path: Option<&PathBuf>) -> String {
    match path {
        Some(p) => format!(
            "Compressed layer size {} bytes exceeds the limit of {} bytes - offending path: {}",
            actual,
            limit,
            p.display()
        ),
        None => format!(
            "Compressed layer size {} bytes exceeds the limit of {} bytes",
            actual, limit
        ),
    }
}

fn protocol_message(status: Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("Build service invalid response: [{}] {}", code, message),
        None => format!("Build service invalid response: {}", message),
    }
}

fn failed_message(reason: Option<&str>, details_uri: Option<&str>) -> String {
    let mut message = String::from("Container provisioning did not complete successfully");
    if let Some(reason) = reason.filter(|r| !r.trim().is_empty()) {
        message.push_str("\n- Reason: ");
        message.push_str(reason);
    }
    if let Some(uri) = details_uri.filter(|u| !u.trim().is_empty()) {
        message.push_str("\n- Find out more here: ");
        message.push_str(uri);
    }
    message
}

impl From<serde_json::Error> for ForgeError {
    fn from(err: serde_json::Error) -> Self {
        ForgeError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for ForgeError {
    fn from(err: serde_yaml::Error) -> Self {
        ForgeError::Serialization(err.to_string())
    }
}

/// Result type alias for A3S Forge operations
pub type Result<T> = std::result::Result<T, ForgeError>;
