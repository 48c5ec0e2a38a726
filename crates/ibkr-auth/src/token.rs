//! Live session token and its shared state
//!
//! A [`LiveSessionToken`] is never mutated. Each successful negotiation
//! builds a new one and swaps it into [`TokenState`], so readers see either
//! the old token or the new one.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use parking_lot::RwLock;
use secrecy::{ExposeSecret, SecretBox, SecretString};
use std::sync::Arc;

use crate::error::{AuthError, AuthResult};

/// Symmetric key derived from the DH exchange
pub struct LiveSessionToken {
    value: SecretBox<Vec<u8>>,
    encoded: SecretString,
    expires_at: i64,
}

impl LiveSessionToken {
    /// Wrap raw token bytes and their expiry (unix seconds)
    pub fn new(value: Vec<u8>, expires_at: i64) -> Self {
        let encoded = SecretString::from(BASE64.encode(&value));
        Self {
            value: SecretBox::new(Box::new(value)),
            encoded,
            expires_at,
        }
    }

    /// Decode a base64 token
    pub fn from_base64(encoded: &str, expires_at: i64) -> AuthResult<Self> {
        let value = BASE64
            .decode(encoded)
            .map_err(|e| AuthError::InvalidResponse(format!("live session token: {e}")))?;
        Ok(Self::new(value, expires_at))
    }

    /// Raw token bytes, the HMAC-SHA256 key for request signatures
    pub fn expose_bytes(&self) -> &[u8] {
        self.value.expose_secret()
    }

    /// Base64 form of the token
    pub fn expose_base64(&self) -> &str {
        self.encoded.expose_secret()
    }

    /// Expiry, unix seconds
    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    /// Whether the token is expired at `now` (expiry instant included)
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.expires_at
    }
}

impl std::fmt::Debug for LiveSessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveSessionToken")
            .field("value", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Current live session token, shared between the negotiator and signers
///
/// Many readers, one writer. Installing a new token replaces the old one
/// atomically.
#[derive(Debug, Default)]
pub struct TokenState {
    current: RwLock<Option<Arc<LiveSessionToken>>>,
}

impl TokenState {
    /// Empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// The token valid at `now`
    ///
    /// Fails with [`AuthError::TokenMissing`] before the first negotiation and
    /// with [`AuthError::TokenExpired`] once `now >= expires_at`.
    pub fn current(&self, now: i64) -> AuthResult<Arc<LiveSessionToken>> {
        let guard = self.current.read();
        let token = guard.as_ref().ok_or(AuthError::TokenMissing)?;
        if token.is_expired_at(now) {
            return Err(AuthError::TokenExpired {
                expired_at: token.expires_at(),
                now,
            });
        }
        Ok(Arc::clone(token))
    }

    /// Replace the current token
    pub fn install(&self, token: LiveSessionToken) {
        *self.current.write() = Some(Arc::new(token));
    }

    /// Drop the current token
    pub fn clear(&self) {
        *self.current.write() = None;
    }

    /// Whether a token is present and unexpired at `now`
    pub fn is_valid(&self, now: i64) -> bool {
        self.current(now).is_ok()
    }

    /// Expiry of the current token, expired or not
    pub fn expires_at(&self) -> Option<i64> {
        self.current.read().as_ref().map(|token| token.expires_at())
    }
}
