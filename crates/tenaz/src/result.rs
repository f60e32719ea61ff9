//! Result and error types for Tenaz.

use thiserror::Error;

/// Result type for Tenaz operations
pub type TenazResult<T> = Result<T, TenazError>;

/// Errors that can occur in Tenaz
#[derive(Debug, Error)]
pub enum TenazError {
    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunchError {
        /// Error message
        message: String,
    },

    /// Document-level driver error
    #[error("Document error: {message}")]
    DocumentError {
        /// Error message
        message: String,
    },

    /// The referenced document is not open in the session
    #[error("Unknown document: {id}")]
    UnknownDocument {
        /// Document identifier
        id: String,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    NavigationError {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Operation timed out
    #[error("Operation timed out after {ms}ms")]
    Timeout {
        /// Timeout in milliseconds
        ms: u64,
    },

    /// Locator did not resolve to exactly one element
    #[error("Locator {selector} matched {count} elements")]
    LocatorMismatch {
        /// Selector description
        selector: String,
        /// Number of elements matched
        count: usize,
    },

    /// Input simulation error
    #[error("Input simulation failed: {message}")]
    InputError {
        /// Error message
        message: String,
    },

    /// Script evaluation error
    #[error("Script evaluation failed: {message}")]
    ScriptError {
        /// Error message
        message: String,
    },

    /// Locator string could not be parsed
    #[error("Invalid locator {input:?}: {message}")]
    InvalidLocator {
        /// Raw locator string
        input: String,
        /// Error message
        message: String,
    },

    /// Invalid state error (operation called in wrong state)
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Error message
        message: String,
    },

    /// Session still has secondary documents open
    #[error("Session not settled: {open} secondary document(s) open")]
    Unsettled {
        /// Number of open secondary documents
        open: usize,
    },

    /// Precondition of an intent did not hold
    #[error("Precondition failed: {message}")]
    PreconditionFailed {
        /// Error message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TenazError {
    /// Whether this error is a timeout
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

impl From<tokio::time::error::Elapsed> for TenazError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        // Elapsed carries no duration; callers that know the budget map it themselves
        Self::Timeout { ms: 0 }
    }
}
