//! Error types for the Workstation backend

use thiserror::Error;

/// Main error type for the backend
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Agent-related errors
    #[error("Agent error: {0}")]
    Agent(String),

    /// Orchestration errors
    #[error("Orchestration error: {0}")]
    Orchestration(String),

    /// Workflow execution errors
    #[error("Workflow error: {0}")]
    Workflow(String),

    /// Condition expression errors
    #[error("Expression error: {0}")]
    Expression(String),

    /// Timeout errors
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Lookup failures visible to callers
    #[error("Not found: {0}")]
    NotFound(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// Unknown errors
    #[error("Unknown error: {0}")]
    Unknown(#[from] anyhow::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Timeout(_) | Error::Agent(_))
    }

    /// Get error severity for metrics
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Error::Config(_) => ErrorSeverity::Critical,
            Error::Agent(_) | Error::Orchestration(_) | Error::Workflow(_) => ErrorSeverity::High,
            Error::Timeout(_) => ErrorSeverity::Medium,
            Error::Validation(_) | Error::Expression(_) | Error::NotFound(_) => ErrorSeverity::Low,
            _ => ErrorSeverity::Medium,
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}
