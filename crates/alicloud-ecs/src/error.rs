//! Errors returned by cloud client implementations

use thiserror::Error;

/// Failure of a single cloud API call
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EcsError {
    /// The service answered with an error code
    #[error("{code}: {message} (request {request_id})")]
    Api {
        /// Service error code (e.g. "InvalidInstanceId.NotFound", "Throttling")
        code: String,
        /// Message returned by the service
        message: String,
        /// Request ID for support tickets
        request_id: String,
    },

    /// The request never got a response
    #[error("transport error: {0}")]
    Transport(String),

    /// Credentials could not be loaded or were rejected
    #[error("credentials error: {0}")]
    Credentials(String),
}

impl EcsError {
    /// Create an API error without a request ID
    pub fn api(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            code: code.into(),
            message: message.into(),
            request_id: String::new(),
        }
    }

    /// Service error code, if the service answered
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Whether the error reports a missing resource
    pub fn is_not_found(&self) -> bool {
        self.code().is_some_and(|c| c.ends_with(".NotFound"))
    }
}
