//! OAuth configuration
//!
//! Loaded from `IBKR_*` environment variables, or from a YAML or JSON
//! credentials file. Files may spell the consumer key `customer_key`, as the
//! `credentials.yml` issued with the IBKR OAuth onboarding does.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{AuthError, AuthResult};

/// Byte encoding of the DH shared secret used as the HMAC key for the
/// live session token
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SharedSecretEncoding {
    /// Big-endian magnitude, no leading zero byte
    #[default]
    Magnitude,
    /// Minimal two's-complement, zero byte prepended on byte-aligned values
    Signed,
}

impl std::str::FromStr for SharedSecretEncoding {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "magnitude" => Ok(Self::Magnitude),
            "signed" => Ok(Self::Signed),
            other => Err(AuthError::Config(format!(
                "unknown shared secret encoding {other:?}"
            ))),
        }
    }
}

/// Everything needed to negotiate a live session token
#[derive(Clone, Default, Deserialize)]
pub struct OAuthConfig {
    /// Consumer key registered with IBKR
    #[serde(alias = "customer_key")]
    pub consumer_key: String,
    /// OAuth access token
    pub access_token: String,
    /// Base64 RSA-encrypted access token secret
    pub access_secret: String,
    /// PEM file with the RSA signing key
    pub signing_key_path: PathBuf,
    /// PEM file with the RSA encryption key
    pub encryption_key_path: PathBuf,
    /// PEM file with the Diffie-Hellman parameters
    pub dh_params_path: PathBuf,
    /// Fail negotiation when the server counter-signature does not match
    #[serde(default)]
    pub strict_verification: bool,
    /// Shared secret byte encoding
    #[serde(default)]
    pub shared_secret_encoding: SharedSecretEncoding,
}

impl OAuthConfig {
    /// Load configuration from environment variables
    ///
    /// Required: `IBKR_CONSUMER_KEY`, `IBKR_ACCESS_TOKEN`, `IBKR_ACCESS_SECRET`,
    /// `IBKR_SIGNING_KEY_PATH`, `IBKR_ENCRYPTION_KEY_PATH`, `IBKR_DH_PARAMS_PATH`.
    /// Optional: `IBKR_STRICT_VERIFICATION`, `IBKR_SHARED_SECRET_ENCODING`.
    pub fn from_env() -> AuthResult<Self> {
        let config = Self {
            consumer_key: required_var("IBKR_CONSUMER_KEY")?,
            access_token: required_var("IBKR_ACCESS_TOKEN")?,
            access_secret: required_var("IBKR_ACCESS_SECRET")?,
            signing_key_path: required_var("IBKR_SIGNING_KEY_PATH")?.into(),
            encryption_key_path: required_var("IBKR_ENCRYPTION_KEY_PATH")?.into(),
            dh_params_path: required_var("IBKR_DH_PARAMS_PATH")?.into(),
            strict_verification: match std::env::var("IBKR_STRICT_VERIFICATION") {
                Ok(value) => parse_bool(&value)?,
                Err(_) => false,
            },
            shared_secret_encoding: match std::env::var("IBKR_SHARED_SECRET_ENCODING") {
                Ok(value) => value.parse()?,
                Err(_) => SharedSecretEncoding::default(),
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file, picking the format by extension
    ///
    /// `.json` is parsed as JSON; anything else as YAML.
    pub fn from_file(path: impl AsRef<Path>) -> AuthResult<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::from_json_file(path),
            _ => Self::from_yaml_file(path),
        }
    }

    /// Load configuration from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> AuthResult<Self> {
        let path = path.as_ref();
        let contents = read_config(path)?;
        let config: Self = serde_json::from_str(&contents).map_err(|e| {
            AuthError::Config(format!("failed to parse {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file such as `credentials.yml`
    pub fn from_yaml_file(path: impl AsRef<Path>) -> AuthResult<Self> {
        let path = path.as_ref();
        let contents = read_config(path)?;
        let config: Self = serde_yaml::from_str(&contents).map_err(|e| {
            AuthError::Config(format!("failed to parse {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check that no required field is empty
    pub fn validate(&self) -> AuthResult<()> {
        let required = [
            ("consumer_key", self.consumer_key.is_empty()),
            ("access_token", self.access_token.is_empty()),
            ("access_secret", self.access_secret.is_empty()),
            ("signing_key_path", self.signing_key_path.as_os_str().is_empty()),
            ("encryption_key_path", self.encryption_key_path.as_os_str().is_empty()),
            ("dh_params_path", self.dh_params_path.as_os_str().is_empty()),
        ];
        match required.iter().find(|(_, empty)| *empty) {
            Some((field, _)) => Err(AuthError::Config(format!("{field} must not be empty"))),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("consumer_key", &self.consumer_key)
            .field(
                "access_token",
                &format!("{}...", self.access_token.chars().take(6).collect::<String>()),
            )
            .field("access_secret", &"[REDACTED]")
            .field("signing_key_path", &self.signing_key_path)
            .field("encryption_key_path", &self.encryption_key_path)
            .field("dh_params_path", &self.dh_params_path)
            .field("strict_verification", &self.strict_verification)
            .field("shared_secret_encoding", &self.shared_secret_encoding)
            .finish()
    }
}

fn read_config(path: &Path) -> AuthResult<String> {
    std::fs::read_to_string(path)
        .map_err(|e| AuthError::Config(format!("failed to read {}: {e}", path.display())))
}

fn required_var(name: &str) -> AuthResult<String> {
    std::env::var(name).map_err(|_| AuthError::EnvVarNotSet(name.to_string()))
}

fn parse_bool(value: &str) -> AuthResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(AuthError::Config(format!("invalid boolean {other:?}"))),
    }
}
