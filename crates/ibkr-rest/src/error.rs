//! Error types for REST API operations

use ibkr_auth::{AuthError, TransportError};

/// Errors that can occur during REST API operations
#[derive(Debug, thiserror::Error)]
pub enum RestError {
    /// Authentication failed or no usable live session token
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Transport(#[from] TransportError),

    /// Endpoint needs an OAuth context but the client has none
    #[error("Authentication required for this endpoint")]
    AuthRequired,

    /// Server answered with an unexpected status
    #[error("Unexpected status {status} from {path}")]
    Status {
        /// Path relative to `/v1/api`
        path: String,
        /// HTTP status code
        status: u16,
        /// Response body, as text
        body: String,
    },

    /// Server answered OK but reported failure in the body
    #[error("API error: {0}")]
    Api(String),

    /// Failed to parse response
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid request parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl RestError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Auth(e) => e.is_retryable(),
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Check if a new live session token would help
    pub fn requires_reauth(&self) -> bool {
        match self {
            Self::Auth(e) => e.requires_reauth(),
            Self::Status { status, .. } => *status == 401,
            _ => false,
        }
    }
}

/// Result type for REST operations
pub type RestResult<T> = Result<T, RestError>;
