//! Core error types for the express-rs framework.
//!
//! [`ExpressError`] is the value carried by the `next(err)` continuation. Every
//! variant maps to an HTTP status code via [`ExpressError::status_code`], which
//! the default final handler uses when an error is still pending at the end of
//! the middleware stack.

use std::any::Any;

use thiserror::Error;

/// The primary error type for the express-rs framework.
///
/// Errors are `Clone` because the router memoizes the outcome of parameter
/// callbacks per request and replays a failure to later layers that capture
/// the same parameter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExpressError {
    // ── HTTP errors ──────────────────────────────────────────────────

    /// HTTP 400 Bad Request.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// HTTP 404 Not Found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// HTTP 405 Method Not Allowed.
    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    /// HTTP 500 Internal Server Error.
    #[error("Internal server error: {0}")]
    InternalServerError(String),

    /// An error carrying a handler-chosen status code.
    #[error("{message}")]
    Http {
        /// The HTTP status code to respond with.
        status: u16,
        /// The error message.
        message: String,
    },

    // ── Dispatch ─────────────────────────────────────────────────────

    /// A handler, error handler, or parameter callback panicked.
    ///
    /// Displays the panic message unchanged so error handlers further down the
    /// stack observe the original text.
    #[error("{0}")]
    Panic(String),

    /// A captured path segment contained a malformed percent-escape.
    #[error("Failed to decode param '{value}' for '{param}'")]
    ParamDecode {
        /// The parameter name.
        param: String,
        /// The raw captured value.
        value: String,
    },

    /// The path compiler rejected a route pattern.
    #[error("Invalid route pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The pattern as registered.
        pattern: String,
        /// Why compilation failed.
        reason: String,
    },

    // ── Configuration ────────────────────────────────────────────────

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The framework is improperly configured.
    #[error("Improperly configured: {0}")]
    ImproperlyConfigured(String),

    // ── Serialization ────────────────────────────────────────────────

    /// An error occurred during serialization or deserialization.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl ExpressError {
    /// Creates an error with an explicit HTTP status code.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// Converts a panic payload into an [`ExpressError::Panic`].
    ///
    /// `panic!("...")` payloads are either `&'static str` or `String`; anything
    /// else is reported generically.
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "handler panicked".to_string());
        Self::Panic(message)
    }

    /// Returns the HTTP status code associated with this error.
    ///
    /// - `BadRequest`, `ParamDecode` -> 400
    /// - `NotFound` -> 404
    /// - `MethodNotAllowed` -> 405
    /// - `Http` -> its own status (500 if outside 400..=599)
    /// - Everything else -> 500
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) | Self::ParamDecode { .. } => 400,
            Self::NotFound(_) => 404,
            Self::MethodNotAllowed(_) => 405,
            Self::Http { status, .. } => {
                if *status >= 400 && *status < 600 {
                    *status
                } else {
                    500
                }
            }
            Self::InternalServerError(_)
            | Self::Panic(_)
            | Self::InvalidPattern { .. }
            | Self::ConfigurationError(_)
            | Self::ImproperlyConfigured(_)
            | Self::SerializationError(_) => 500,
        }
    }
}

impl From<serde_json::Error> for ExpressError {
    fn from(e: serde_json::Error) -> Self {
        Self::SerializationError(e.to_string())
    }
}

/// A convenience type alias for `Result<T, ExpressError>`.
pub type ExpressResult<T> = Result<T, ExpressError>;
