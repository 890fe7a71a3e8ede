//! Result and error types for Esperar.
//!
//! A timeout is deliberately absent from the common path here: polling
//! primitives report it as [`crate::WaitResult::TimedOut`]. The
//! [`EsperarError::Timeout`] variant only exists for callers that escalate.

use thiserror::Error;

/// Result type for Esperar operations
pub type EsperarResult<T> = Result<T, EsperarError>;

/// Errors that can occur in Esperar
#[derive(Debug, Error)]
pub enum EsperarError {
    /// The browser session is gone (crashed, closed, or never started)
    #[error("Browser session unavailable: {message}")]
    SessionUnavailable {
        /// Error message
        message: String,
    },

    /// Generic driver/transport failure
    #[error("Driver error: {message}")]
    Driver {
        /// Error message
        message: String,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// The element was replaced by a re-render after it was looked up
    #[error("Stale element reference: {id}")]
    StaleElement {
        /// Element id that went stale
        id: String,
    },

    /// A required element never appeared
    #[error("Element not found: {locator}")]
    ElementNotFound {
        /// Locator description
        locator: String,
    },

    /// A page-blocking dialog is open and must be handled first
    #[error("Unexpected dialog open: {message}")]
    DialogOpen {
        /// Dialog text
        message: String,
    },

    /// Selector kind the driver cannot evaluate
    #[error("Unsupported selector: {selector}")]
    UnsupportedSelector {
        /// Selector description
        selector: String,
    },

    /// A wait was escalated into a hard failure
    #[error("Timed out after {ms}ms waiting for {waited_for}")]
    Timeout {
        /// What was waited for
        waited_for: String,
        /// Timeout in milliseconds
        ms: u64,
    },

    /// Assertion failed (expected vs observed)
    #[error("Assertion failed: {message}")]
    AssertionFailed {
        /// Error message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Backend API error
    #[error("API error: {message}")]
    Api {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl EsperarError {
    /// Create a driver error
    #[must_use]
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver {
            message: message.into(),
        }
    }

    /// Create a session-unavailable error
    #[must_use]
    pub fn session_unavailable(message: impl Into<String>) -> Self {
        Self::SessionUnavailable {
            message: message.into(),
        }
    }

    /// Create an assertion failure
    #[must_use]
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::AssertionFailed {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Errors a poll cycle may swallow and retry on the next tick.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::StaleElement { .. })
    }

    /// Errors that end the current test outright.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::SessionUnavailable { .. })
    }
}
