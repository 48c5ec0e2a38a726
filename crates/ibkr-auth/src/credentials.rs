//! OAuth consumer credentials
//!
//! # Security
//!
//! The access token secret arrives RSA-encrypted. Its ciphertext and the
//! decrypted prepend are both held in `secrecy` wrappers which:
//! - Zeroize memory on drop
//! - Keep the bytes out of `Debug` output
//! - Require an explicit `expose_secret()` call to read

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::rngs::OsRng;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey};
use secrecy::{ExposeSecret, SecretBox};

use crate::config::OAuthConfig;
use crate::error::{AuthError, AuthResult};

/// Consumer key, access token and encrypted access token secret
pub struct Credentials {
    consumer_key: String,
    access_token: String,
    /// Ciphertext, decoded from base64
    access_secret: SecretBox<Vec<u8>>,
}

impl Credentials {
    /// Create credentials
    ///
    /// `access_secret` is the base64 ciphertext issued by the self-service
    /// portal.
    pub fn new(
        consumer_key: impl Into<String>,
        access_token: impl Into<String>,
        access_secret: impl AsRef<str>,
    ) -> AuthResult<Self> {
        let consumer_key = consumer_key.into();
        let access_token = access_token.into();
        if consumer_key.is_empty() {
            return Err(AuthError::InvalidCredentials(
                "consumer key is empty".to_string(),
            ));
        }
        if access_token.is_empty() {
            return Err(AuthError::InvalidCredentials(
                "access token is empty".to_string(),
            ));
        }

        let decoded = BASE64.decode(access_secret.as_ref().trim()).map_err(|e| {
            AuthError::InvalidCredentials(format!("Invalid base64 access token secret: {}", e))
        })?;
        if decoded.is_empty() {
            return Err(AuthError::InvalidCredentials(
                "access token secret is empty".to_string(),
            ));
        }

        Ok(Self {
            consumer_key,
            access_token,
            access_secret: SecretBox::new(Box::new(decoded)),
        })
    }

    /// Build credentials from the OAuth configuration
    pub fn from_config(config: &OAuthConfig) -> AuthResult<Self> {
        Self::new(
            config.consumer_key.clone(),
            config.access_token.clone(),
            &config.access_secret,
        )
    }

    /// Consumer key
    pub fn consumer_key(&self) -> &str {
        &self.consumer_key
    }

    /// Access token
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Decrypt the access token secret into the prepend
    ///
    /// RSAES-PKCS1-v1_5 with blinding. Called once per negotiation.
    pub fn decrypt_prepend(&self, encryption_key: &RsaPrivateKey) -> AuthResult<SecretBox<Vec<u8>>> {
        let prepend = encryption_key
            .decrypt_blinded(
                &mut OsRng,
                Pkcs1v15Encrypt,
                self.access_secret.expose_secret(),
            )
            .map_err(|e| AuthError::crypto("access token secret decryption", e))?;
        Ok(SecretBox::new(Box::new(prepend)))
    }
}

impl Clone for Credentials {
    fn clone(&self) -> Self {
        Self {
            consumer_key: self.consumer_key.clone(),
            access_token: self.access_token.clone(),
            access_secret: SecretBox::new(Box::new(self.access_secret.expose_secret().clone())),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("consumer_key", &self.consumer_key)
            .field(
                "access_token",
                &format!("{}...", self.access_token.chars().take(6).collect::<String>()),
            )
            .field("access_secret", &"[REDACTED]")
            .finish()
    }
}
