//! Per-request HMAC-SHA256 signatures

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;
use tracing::trace;

use crate::clock::{Clock, SystemClock};
use crate::credentials::Credentials;
use crate::entropy::{generate_nonce, EntropySource, OsEntropy};
use crate::error::{AuthError, AuthResult};
use crate::params::{
    authorization_header, percent_encode, request_signature_fragment, OAuthParameterSet,
};
use crate::token::TokenState;

type HmacSha256 = Hmac<Sha256>;

/// Signature method for ordinary API requests
pub const HMAC_SHA256: &str = "HMAC-SHA256";

/// Builds `Authorization` headers for API calls from the live session token
///
/// Every call draws a fresh nonce and timestamp. Nothing is cached between
/// calls.
pub struct RequestSigner {
    consumer_key: String,
    access_token: String,
    clock: Arc<dyn Clock>,
    entropy: Arc<dyn EntropySource>,
}

impl RequestSigner {
    /// Create a signer using the system clock and OS randomness
    pub fn new(credentials: &Credentials) -> Self {
        Self {
            consumer_key: credentials.consumer_key().to_string(),
            access_token: credentials.access_token().to_string(),
            clock: Arc::new(SystemClock),
            entropy: Arc::new(OsEntropy),
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

    /// Header value for `method url`
    ///
    /// `url` must be fully qualified with its query string attached. Fails
    /// with [`AuthError::TokenMissing`] or [`AuthError::TokenExpired`] when
    /// `tokens` holds no usable token.
    pub fn sign(&self, method: &str, url: &str, tokens: &TokenState) -> AuthResult<String> {
        let now = self.clock.now_unix_secs();
        let token = tokens.current(now)?;

        let mut params = OAuthParameterSet::new()
            .with("oauth_consumer_key", self.consumer_key.as_str())
            .with("oauth_nonce", generate_nonce(self.entropy.as_ref())?)
            .with("oauth_signature_method", HMAC_SHA256)
            .with("oauth_timestamp", now.to_string())
            .with("oauth_token", self.access_token.as_str());

        let base_string = request_base_string(method, url, &params);
        trace!(%base_string, "Signing request");

        let mut mac = HmacSha256::new_from_slice(token.expose_bytes())
            .map_err(|e| AuthError::crypto("request signing", e))?;
        mac.update(base_string.as_bytes());
        let signature = BASE64.encode(mac.finalize().into_bytes());

        params.insert("oauth_signature", percent_encode(&signature));
        Ok(authorization_header(&params))
    }
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("consumer_key", &self.consumer_key)
            .finish_non_exhaustive()
    }
}

/// `METHOD + "&" + enc(url) + request fragment`
pub(crate) fn request_base_string(method: &str, url: &str, params: &OAuthParameterSet) -> String {
    format!(
        "{}&{}{}",
        method.to_ascii_uppercase(),
        percent_encode(url),
        request_signature_fragment(params)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::entropy::FixedEntropy;
    use crate::token::LiveSessionToken;

    const URL: &str = "https://api.ibkr.com/v1/api/iserver/accounts?conid=265598&period=1d";

    fn signer(clock: Arc<ManualClock>) -> RequestSigner {
        let credentials = Credentials::new("TESTCONS", "abc123token", "c2VjcmV0").unwrap();
        RequestSigner::new(&credentials)
            .with_clock(clock)
            .with_entropy(Arc::new(FixedEntropy(0x42)))
    }

    fn tokens(expires_at: i64) -> TokenState {
        let state = TokenState::new();
        state.install(LiveSessionToken::from_base64("DBwr2KJM6JgEb1ciJR5geMZJReE=", expires_at).unwrap());
        state
    }

    #[test]
    fn test_request_base_string() {
        let params = OAuthParameterSet::new()
            .with("oauth_consumer_key", "TESTCONS")
            .with("oauth_nonce", "42424242424242424242424242424242")
            .with("oauth_signature_method", HMAC_SHA256)
            .with("oauth_timestamp", "1700000000")
            .with("oauth_token", "abc123token");

        assert_eq!(
            request_base_string("get", URL, &params),
            "GET&https%3A%2F%2Fapi.ibkr.com%2Fv1%2Fapi%2Fiserver%2Faccounts%3Fconid%3D265598%26period%3D1d&oauth_consumer_key%3DTESTCONS%26oauth_nonce%3D42424242424242424242424242424242%26oauth_signature_method%3DHMAC-SHA256%26oauth_timestamp%3D1700000000%26oauth_token%3Dabc123token"
        );
    }

    #[test]
    fn test_sign_known_vector() {
        let clock = Arc::new(ManualClock::new(1_700_000_000));
        let header = signer(clock).sign("GET", URL, &tokens(1_700_003_600)).unwrap();

        assert_eq!(
            header,
            r#"OAuth oauth_consumer_key="TESTCONS", oauth_nonce="42424242424242424242424242424242", oauth_signature="4Ew1QptMrB6cUNMx34WV1SAPw8eR54Xaj%2B6fxj30EZQ%3D", oauth_signature_method="HMAC-SHA256", oauth_timestamp="1700000000", oauth_token="abc123token", realm="limited_poa""#
        );
    }

    #[test]
    fn test_lowercase_method_signs_like_uppercase() {
        let clock = Arc::new(ManualClock::new(1_700_000_000));
        let signer = signer(clock);
        let state = tokens(1_700_003_600);
        assert_eq!(
            signer.sign("get", URL, &state).unwrap(),
            signer.sign("GET", URL, &state).unwrap()
        );
    }

    #[test]
    fn test_sign_without_token() {
        let clock = Arc::new(ManualClock::new(1_700_000_000));
        assert!(matches!(
            signer(clock).sign("GET", URL, &TokenState::new()),
            Err(AuthError::TokenMissing)
        ));
    }

    #[test]
    fn test_sign_expiry_boundary() {
        let clock = Arc::new(ManualClock::new(1_700_003_599));
        let signer = signer(Arc::clone(&clock));
        let state = tokens(1_700_003_600);

        assert!(signer.sign("GET", URL, &state).is_ok());

        clock.advance(1);
        assert!(matches!(
            signer.sign("GET", URL, &state),
            Err(AuthError::TokenExpired { .. })
        ));
    }

    #[test]
    fn test_fresh_nonce_per_call() {
        let credentials = Credentials::new("TESTCONS", "abc123token", "c2VjcmV0").unwrap();
        let signer = RequestSigner::new(&credentials)
            .with_clock(Arc::new(ManualClock::new(1_700_000_000)));
        let state = tokens(1_700_003_600);

        let first = signer.sign("GET", URL, &state).unwrap();
        let second = signer.sign("GET", URL, &state).unwrap();
        assert_ne!(first, second);
    }
}
