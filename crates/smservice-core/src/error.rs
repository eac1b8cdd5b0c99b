//! Error types for the Service Manager client runtime.
//!
//! Transport failures are fatal for the loop that observes them. Decode
//! failures only cost the current message. Unknown actions and rejected
//! registrations are not errors at all; they are logged conditions.

use std::time::Duration;
use thiserror::Error;

/// Main error type for the runtime.
#[derive(Debug, Error)]
pub enum ServiceError {
    // Transport errors
    #[error("Transport error on {endpoint}: {message}")]
    Transport {
        endpoint: String,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    // Codec errors
    #[error("Decode error: {message}")]
    Decode {
        message: String,
        #[source]
        source: Option<rmp_serde::decode::Error>,
    },

    #[error("Encode error: {message}")]
    Encode {
        message: String,
        #[source]
        source: Option<rmp_serde::encode::Error>,
    },

    // Registration errors
    #[error("Registration not confirmed within {0:?}")]
    RegistrationTimeout(Duration),

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Raised by business handlers
    #[error("Action '{action}' failed: {message}")]
    Handler { action: String, message: String },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, ServiceError>;

impl From<rmp_serde::decode::Error> for ServiceError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        ServiceError::Decode {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rmp_serde::encode::Error> for ServiceError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        ServiceError::Encode {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl ServiceError {
    /// Create a transport error for an endpoint from an IO failure.
    pub fn transport(endpoint: impl Into<String>, err: std::io::Error) -> Self {
        ServiceError::Transport {
            endpoint: endpoint.into(),
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create a transport error without an underlying IO cause.
    pub fn transport_msg(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        ServiceError::Transport {
            endpoint: endpoint.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a decode error with a plain description.
    pub fn decode(message: impl Into<String>) -> Self {
        ServiceError::Decode {
            message: message.into(),
            source: None,
        }
    }

    /// Create a handler failure for the given action.
    pub fn handler(action: impl Into<String>, message: impl Into<String>) -> Self {
        ServiceError::Handler {
            action: action.into(),
            message: message.into(),
        }
    }

    /// Check whether this error must end the loop that observed it.
    ///
    /// Only decode failures are recoverable: the offending message is dropped
    /// and the receive loop moves on.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ServiceError::Decode { .. })
    }
}
