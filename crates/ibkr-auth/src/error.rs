//! Error types for authentication operations
//!
//! Messages carry the failing step but never key material, the decrypted
//! prepend, the DH exponent or the live session token itself.

use std::path::PathBuf;

use crate::transport::TransportError;

/// Errors that can occur while loading keys, negotiating or signing
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Key material could not be decoded
    #[error("Invalid {what}: {reason}")]
    KeyFormat {
        /// Which input was being decoded (e.g. "signing key", "DH parameters")
        what: &'static str,
        /// Decoder message
        reason: String,
    },

    /// Key file could not be read
    #[error("Failed to read key file {}: {source}", path.display())]
    KeyFile {
        /// Path that was being read
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// The CSPRNG failed to produce bytes
    #[error("Randomness source failed: {0}")]
    Randomness(String),

    /// Network-level failure talking to the remote endpoint
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The live session token endpoint answered with a non-OK status
    #[error("Live session token request rejected with status {status}")]
    NegotiationRejected {
        /// HTTP status code
        status: u16,
        /// Response body, as text
        body: String,
    },

    /// The live session token response could not be interpreted
    #[error("Invalid live session token response: {0}")]
    InvalidResponse(String),

    /// A cryptographic primitive failed
    #[error("Crypto failure during {step}: {reason}")]
    Crypto {
        /// Protocol step that failed
        step: &'static str,
        /// Library message
        reason: String,
    },

    /// Server counter-signature mismatch with strict verification enabled
    #[error("Live session token signature mismatch")]
    VerificationFailed,

    /// Signing was attempted before any live session token was established
    #[error("Live session token not present, negotiate first")]
    TokenMissing,

    /// Signing was attempted after the live session token expired
    #[error("Live session token expired at {expired_at} (now {now})")]
    TokenExpired {
        /// Expiry, unix seconds
        expired_at: i64,
        /// Clock reading at the time of the check, unix seconds
        now: i64,
    },

    /// Invalid OAuth credentials
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Environment variable not set
    #[error("Environment variable not set: {0}")]
    EnvVarNotSet(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AuthError {
    pub(crate) fn key_format(what: &'static str, reason: impl ToString) -> Self {
        Self::KeyFormat {
            what,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn crypto(step: &'static str, reason: impl ToString) -> Self {
        Self::Crypto {
            step,
            reason: reason.to_string(),
        }
    }

    /// Whether retrying the whole negotiation (with fresh randomness) may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::NegotiationRejected { .. }
        )
    }

    /// Whether the caller has to negotiate a new live session token
    pub fn requires_reauth(&self) -> bool {
        matches!(self, Self::TokenMissing | Self::TokenExpired { .. })
    }
}

/// Result type for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;
