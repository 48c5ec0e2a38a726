//! Live session token negotiation
//!
//! One call to [`SessionNegotiator::negotiate`] performs one complete
//! exchange with `POST <base>/oauth/live_session_token`:
//!
//! 1. Draw a 256-bit DH exponent `r` and compute the challenge `g^r mod p`
//! 2. Decrypt the access token secret into the prepend
//! 3. Sign `hex(prepend) + "POST&" + enc(url) + fragment` with RSA-SHA256
//! 4. Read `diffie_hellman_response` and the expiry from the reply
//! 5. Derive `K = response^r mod p` and `LST = HMAC-SHA1(K, prepend)`
//! 6. Check the server counter-signature `HMAC-SHA1(LST, consumer_key)`
//!
//! Nothing is retried here. The exponent, prepend and shared secret are
//! zeroized when they go out of scope.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use rsa::BigUint;
use secrecy::ExposeSecret;
use serde::Deserialize;
use sha1::Sha1;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use zeroize::{Zeroize, Zeroizing};

use crate::clock::{Clock, SystemClock};
use crate::config::{OAuthConfig, SharedSecretEncoding};
use crate::credentials::Credentials;
use crate::entropy::{generate_nonce, random_biguint, EntropySource, OsEntropy};
use crate::error::{AuthError, AuthResult};
use crate::keys::{sign_rsa_sha256, to_magnitude_bytes, to_signed_bytes, DhParameters, KeyMaterial};
use crate::params::{
    authorization_header, negotiation_signature_fragment, percent_encode, OAuthParameterSet,
};
use crate::token::LiveSessionToken;
use crate::transport::{HttpRequest, Transport};

type HmacSha1 = Hmac<Sha1>;

/// Bit length of the local DH exponent
pub const DH_EXPONENT_BITS: usize = 256;

/// Signature method for the negotiation request
pub const RSA_SHA256: &str = "RSA-SHA256";

/// Path of the negotiation endpoint, relative to the API base URL
pub const LIVE_SESSION_TOKEN_PATH: &str = "/oauth/live_session_token";

/// Negotiation endpoint for an API base URL such as `https://api.ibkr.com/v1/api`
pub fn live_session_token_url(base_url: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), LIVE_SESSION_TOKEN_PATH)
}

/// Tunables for negotiation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NegotiationOptions {
    /// Treat a counter-signature mismatch as an error
    pub strict_verification: bool,
    /// How the shared secret is turned into the HMAC key
    pub shared_secret_encoding: SharedSecretEncoding,
}

impl NegotiationOptions {
    /// Options taken from the OAuth configuration
    pub fn from_config(config: &OAuthConfig) -> Self {
        Self {
            strict_verification: config.strict_verification,
            shared_secret_encoding: config.shared_secret_encoding,
        }
    }

    /// Set strict verification
    pub fn with_strict_verification(mut self, strict: bool) -> Self {
        self.strict_verification = strict;
        self
    }

    /// Set the shared secret encoding
    pub fn with_shared_secret_encoding(mut self, encoding: SharedSecretEncoding) -> Self {
        self.shared_secret_encoding = encoding;
        self
    }
}

/// Result of checking the server counter-signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// Counter-signature matched the derived token
    Verified,
    /// Counter-signature did not match; the token was accepted anyway
    Mismatch,
    /// The server sent no counter-signature
    Skipped,
}

/// Summary of a successful negotiation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiationOutcome {
    /// Token expiry, unix seconds
    pub expires_at: i64,
    /// Counter-signature check result
    pub verification: Verification,
}

/// Ephemeral Diffie-Hellman state for one negotiation attempt
pub struct DhExchange {
    exponent: BigUint,
    challenge: BigUint,
}

impl DhExchange {
    /// Draw a fresh exponent and compute the challenge
    pub fn generate(params: &DhParameters, entropy: &dyn EntropySource) -> AuthResult<Self> {
        let exponent = random_biguint(entropy, DH_EXPONENT_BITS)?;
        if exponent.bits() == 0 {
            return Err(AuthError::Randomness("DH exponent is zero".to_string()));
        }
        Ok(Self::from_exponent(params, exponent))
    }

    fn from_exponent(params: &DhParameters, exponent: BigUint) -> Self {
        let challenge = params.generator().modpow(&exponent, params.prime());
        Self {
            exponent,
            challenge,
        }
    }

    /// The public challenge `g^r mod p`
    pub fn challenge(&self) -> &BigUint {
        &self.challenge
    }

    /// Challenge as lower-case hex without leading zeros
    pub fn challenge_hex(&self) -> String {
        self.challenge.to_str_radix(16)
    }

    /// Shared secret `response^r mod p` as HMAC key bytes
    ///
    /// Rejects responses outside `2..=p-2`, so `0`, `1` and `p-1` never
    /// collapse the shared secret into a small subgroup.
    pub fn shared_secret(
        &self,
        response: &BigUint,
        params: &DhParameters,
        encoding: SharedSecretEncoding,
    ) -> AuthResult<Zeroizing<Vec<u8>>> {
        let one = BigUint::from(1u32);
        if response <= &one || response >= &(params.prime() - &one) {
            return Err(AuthError::InvalidResponse(
                "diffie_hellman_response out of range".to_string(),
            ));
        }

        let mut secret = response.modpow(&self.exponent, params.prime());
        let bytes = match encoding {
            SharedSecretEncoding::Magnitude => to_magnitude_bytes(&secret),
            SharedSecretEncoding::Signed => to_signed_bytes(&secret),
        };
        secret.zeroize();
        Ok(Zeroizing::new(bytes))
    }
}

impl Drop for DhExchange {
    fn drop(&mut self) {
        self.exponent.zeroize();
    }
}

impl std::fmt::Debug for DhExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DhExchange")
            .field("exponent", &"[REDACTED]")
            .field("challenge_bits", &self.challenge.bits())
            .finish()
    }
}

/// `LST = HMAC-SHA1(key = shared secret, message = prepend)`
pub fn derive_live_session_token(shared_secret: &[u8], prepend: &[u8]) -> AuthResult<Vec<u8>> {
    let mut mac = HmacSha1::new_from_slice(shared_secret)
        .map_err(|e| AuthError::crypto("live session token derivation", e))?;
    mac.update(prepend);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Compare `base64(HMAC-SHA1(key = LST, message = consumer_key))` with the
/// server counter-signature
pub fn verify_counter_signature(
    live_session_token: &[u8],
    consumer_key: &str,
    expected: Option<&str>,
) -> AuthResult<Verification> {
    let Some(expected) = expected.filter(|s| !s.is_empty()) else {
        return Ok(Verification::Skipped);
    };
    let Ok(expected) = BASE64.decode(expected) else {
        return Ok(Verification::Mismatch);
    };

    let mut mac = HmacSha1::new_from_slice(live_session_token)
        .map_err(|e| AuthError::crypto("counter-signature check", e))?;
    mac.update(consumer_key.as_bytes());
    Ok(match mac.verify_slice(&expected) {
        Ok(()) => Verification::Verified,
        Err(_) => Verification::Mismatch,
    })
}

/// Parse `diffie_hellman_response`, accepting only ASCII hex digits
fn parse_dh_response(hex: &str) -> AuthResult<BigUint> {
    if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(AuthError::InvalidResponse(
            "diffie_hellman_response is not hex".to_string(),
        ));
    }
    BigUint::parse_bytes(hex.as_bytes(), 16).ok_or_else(|| {
        AuthError::InvalidResponse("diffie_hellman_response is not hex".to_string())
    })
}

/// `hex(prepend) + "POST&" + enc(url) + negotiation fragment`
pub(crate) fn negotiation_base_string(
    prepend: &[u8],
    token_url: &str,
    params: &OAuthParameterSet,
) -> String {
    format!(
        "{}POST&{}{}",
        hex::encode(prepend),
        percent_encode(token_url),
        negotiation_signature_fragment(params)
    )
}

/// JSON body of the negotiation endpoint
#[derive(Debug, Deserialize)]
struct LiveSessionTokenResponse {
    diffie_hellman_response: String,
    #[serde(default)]
    live_session_token_signature: Option<String>,
    live_session_token_expiration: i64,
}

/// Performs the DH + RSA handshake that yields a live session token
pub struct SessionNegotiator {
    credentials: Credentials,
    keys: KeyMaterial,
    clock: Arc<dyn Clock>,
    entropy: Arc<dyn EntropySource>,
    options: NegotiationOptions,
}

impl SessionNegotiator {
    /// Create a negotiator using the system clock and OS randomness
    pub fn new(credentials: Credentials, keys: KeyMaterial) -> Self {
        Self {
            credentials,
            keys,
            clock: Arc::new(SystemClock),
            entropy: Arc::new(OsEntropy),
            options: NegotiationOptions::default(),
        }
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the randomness source
    pub fn with_entropy(mut self, entropy: Arc<dyn EntropySource>) -> Self {
        self.entropy = entropy;
        self
    }

    /// Replace the negotiation options
    pub fn with_options(mut self, options: NegotiationOptions) -> Self {
        self.options = options;
        self
    }

    /// Credentials in use
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Negotiate a new live session token against `base_url`
    #[instrument(skip(self, transport), fields(consumer_key = %self.credentials.consumer_key()))]
    pub async fn negotiate(
        &self,
        transport: &dyn Transport,
        base_url: &str,
    ) -> AuthResult<(LiveSessionToken, NegotiationOutcome)> {
        let dh_params = self.keys.dh_params();
        let exchange = DhExchange::generate(dh_params, self.entropy.as_ref())?;
        let prepend = self.credentials.decrypt_prepend(self.keys.encryption_key())?;

        let token_url = live_session_token_url(base_url);
        let mut params = OAuthParameterSet::new()
            .with("diffie_hellman_challenge", exchange.challenge_hex())
            .with("oauth_consumer_key", self.credentials.consumer_key())
            .with("oauth_nonce", generate_nonce(self.entropy.as_ref())?)
            .with("oauth_signature_method", RSA_SHA256)
            .with("oauth_timestamp", self.clock.now_unix_secs().to_string())
            .with("oauth_token", self.credentials.access_token());

        let base_string = negotiation_base_string(prepend.expose_secret(), &token_url, &params);
        let signature = sign_rsa_sha256(self.keys.signing_key(), base_string.as_bytes())?;
        params.insert("oauth_signature", percent_encode(&BASE64.encode(signature)));

        debug!(url = %token_url, "Requesting live session token");

        let request = HttpRequest::new("POST", &token_url)
            .with_header("Authorization", authorization_header(&params));
        let response = transport.execute(request).await?;

        debug!(status = response.status, "Live session token response");
        if response.status != 200 {
            error!(status = response.status, "Live session token request rejected");
            return Err(AuthError::NegotiationRejected {
                status: response.status,
                body: response.body_text(),
            });
        }

        let body: LiveSessionTokenResponse = serde_json::from_slice(&response.body)
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;

        let dh_response = parse_dh_response(&body.diffie_hellman_response)?;
        let shared_secret =
            exchange.shared_secret(&dh_response, dh_params, self.options.shared_secret_encoding)?;
        drop(exchange);

        let lst = derive_live_session_token(&shared_secret, prepend.expose_secret())?;

        let verification = verify_counter_signature(
            &lst,
            self.credentials.consumer_key(),
            body.live_session_token_signature.as_deref(),
        )?;
        match verification {
            Verification::Verified => debug!("Live session token signature verified"),
            Verification::Skipped => debug!("No live session token signature to verify"),
            Verification::Mismatch if self.options.strict_verification => {
                warn!("Live session token signature mismatch, rejecting token");
                return Err(AuthError::VerificationFailed);
            }
            Verification::Mismatch => {
                warn!("Live session token signature mismatch, accepting token")
            }
        }

        let expires_at = body.live_session_token_expiration;
        info!(expires_at, "Live session token established");

        Ok((
            LiveSessionToken::new(lst, expires_at),
            NegotiationOutcome {
                expires_at,
                verification,
            },
        ))
    }
}

impl std::fmt::Debug for SessionNegotiator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionNegotiator")
            .field("credentials", &self.credentials)
            .field("keys", &self.keys)
            .field("options", &self.options)
            .finish()
    }
}
