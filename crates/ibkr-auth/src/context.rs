//! OAuth capability consumed by API clients
//!
//! [`OAuthContext`] has exactly two operations: negotiate a live session
//! token, and sign a request with it. [`OAuthSession`] is the real
//! implementation; [`MockOAuthContext`] returns a canned header for tests of
//! code that only needs *some* authentication.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, instrument, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::OAuthConfig;
use crate::credentials::Credentials;
use crate::entropy::{EntropySource, OsEntropy};
use crate::error::AuthResult;
use crate::keys::KeyMaterial;
use crate::negotiator::{NegotiationOptions, NegotiationOutcome, SessionNegotiator};
use crate::signer::RequestSigner;
use crate::token::TokenState;
use crate::transport::Transport;

/// Negotiate + sign
#[async_trait]
pub trait OAuthContext: Send + Sync {
    /// Establish a new live session token
    async fn negotiate(
        &self,
        transport: &dyn Transport,
        base_url: &str,
    ) -> AuthResult<NegotiationOutcome>;

    /// `Authorization` header for `method url`
    fn authorization_header(&self, method: &str, url: &str) -> AuthResult<String>;
}

/// Lifecycle of the live session token
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NegotiationState {
    /// No negotiation attempted yet, or the token was invalidated
    #[default]
    Idle,
    /// A negotiation is in flight
    Negotiating,
    /// A token is installed
    Established {
        /// Token expiry, unix seconds
        expires_at: i64,
    },
    /// The last negotiation failed; a new call starts over
    Failed(String),
}

impl NegotiationState {
    /// Whether a token was installed by the last negotiation
    pub fn is_established(&self) -> bool {
        matches!(self, Self::Established { .. })
    }
}

/// Live session for one credential set
///
/// Negotiations are serialized: concurrent callers of
/// [`ensure_live_session`](Self::ensure_live_session) share one exchange.
pub struct OAuthSession {
    negotiator: SessionNegotiator,
    signer: RequestSigner,
    tokens: TokenState,
    clock: Arc<dyn Clock>,
    negotiation_lock: Mutex<()>,
    state: watch::Sender<NegotiationState>,
}

impl OAuthSession {
    /// Session with the system clock, OS randomness and default options
    pub fn new(credentials: Credentials, keys: KeyMaterial) -> Self {
        Self::builder(credentials, keys).build()
    }

    /// Start building a session
    pub fn builder(credentials: Credentials, keys: KeyMaterial) -> OAuthSessionBuilder {
        OAuthSessionBuilder {
            credentials,
            keys,
            clock: Arc::new(SystemClock),
            entropy: Arc::new(OsEntropy),
            options: NegotiationOptions::default(),
        }
    }

    /// Load credentials and key files named by `config`
    pub fn from_config(config: &OAuthConfig) -> AuthResult<Self> {
        let credentials = Credentials::from_config(config)?;
        let keys = KeyMaterial::from_config(config)?;
        Ok(Self::builder(credentials, keys)
            .options(NegotiationOptions::from_config(config))
            .build())
    }

    /// Load configuration from `IBKR_*` environment variables
    pub fn from_env() -> AuthResult<Self> {
        Self::from_config(&OAuthConfig::from_env()?)
    }

    /// Current negotiation state
    pub fn state(&self) -> NegotiationState {
        self.state.borrow().clone()
    }

    /// Subscribe to negotiation state changes
    pub fn subscribe_state(&self) -> watch::Receiver<NegotiationState> {
        self.state.subscribe()
    }

    /// Whether a usable token is installed right now
    pub fn has_valid_token(&self) -> bool {
        self.tokens.is_valid(self.clock.now_unix_secs())
    }

    /// Expiry of the installed token, if any
    pub fn token_expires_at(&self) -> Option<i64> {
        self.tokens.expires_at()
    }

    /// Drop the current token; the next request must negotiate again
    pub fn invalidate(&self) {
        self.tokens.clear();
        self.state.send_replace(NegotiationState::Idle);
        debug!("Live session token invalidated");
    }

    /// Negotiate only if no valid token is installed
    ///
    /// Returns `None` when an existing token was reused.
    pub async fn ensure_live_session(
        &self,
        transport: &dyn Transport,
        base_url: &str,
    ) -> AuthResult<Option<NegotiationOutcome>> {
        if self.has_valid_token() {
            return Ok(None);
        }

        let _guard = self.negotiation_lock.lock().await;
        // Another caller may have finished while we waited
        if self.has_valid_token() {
            return Ok(None);
        }
        self.negotiate_locked(transport, base_url).await.map(Some)
    }

    async fn negotiate_locked(
        &self,
        transport: &dyn Transport,
        base_url: &str,
    ) -> AuthResult<NegotiationOutcome> {
        self.state.send_replace(NegotiationState::Negotiating);

        match self.negotiator.negotiate(transport, base_url).await {
            Ok((token, outcome)) => {
                self.tokens.install(token);
                self.state.send_replace(NegotiationState::Established {
                    expires_at: outcome.expires_at,
                });
                Ok(outcome)
            }
            Err(e) => {
                warn!(error = %e, "Live session token negotiation failed");
                self.tokens.clear();
                self.state.send_replace(NegotiationState::Failed(e.to_string()));
                Err(e)
            }
        }
    }
}

#[async_trait]
impl OAuthContext for OAuthSession {
    #[instrument(skip(self, transport))]
    async fn negotiate(
        &self,
        transport: &dyn Transport,
        base_url: &str,
    ) -> AuthResult<NegotiationOutcome> {
        let _guard = self.negotiation_lock.lock().await;
        let outcome = self.negotiate_locked(transport, base_url).await?;
        info!(expires_at = outcome.expires_at, "OAuth session ready");
        Ok(outcome)
    }

    fn authorization_header(&self, method: &str, url: &str) -> AuthResult<String> {
        self.signer.sign(method, url, &self.tokens)
    }
}

impl std::fmt::Debug for OAuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthSession")
            .field("negotiator", &self.negotiator)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

/// Builder for [`OAuthSession`]
pub struct OAuthSessionBuilder {
    credentials: Credentials,
    keys: KeyMaterial,
    clock: Arc<dyn Clock>,
    entropy: Arc<dyn EntropySource>,
    options: NegotiationOptions,
}

impl OAuthSessionBuilder {
    /// Time source for timestamps and expiry checks
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Randomness for DH exponents and nonces
    pub fn entropy(mut self, entropy: Arc<dyn EntropySource>) -> Self {
        self.entropy = entropy;
        self
    }

    /// Negotiation options
    pub fn options(mut self, options: NegotiationOptions) -> Self {
        self.options = options;
        self
    }

    /// Build the session
    pub fn build(self) -> OAuthSession {
        let signer = RequestSigner::new(&self.credentials)
            .with_clock(Arc::clone(&self.clock))
            .with_entropy(Arc::clone(&self.entropy));
        let negotiator = SessionNegotiator::new(self.credentials, self.keys)
            .with_clock(Arc::clone(&self.clock))
            .with_entropy(self.entropy)
            .with_options(self.options);
        let (state, _) = watch::channel(NegotiationState::Idle);

        OAuthSession {
            negotiator,
            signer,
            tokens: TokenState::new(),
            clock: self.clock,
            negotiation_lock: Mutex::new(()),
            state,
        }
    }
}

/// Canned OAuth context for testing
///
/// Negotiation never touches the transport. Signing returns the configured
/// header, or [`AuthError::TokenMissing`](crate::AuthError::TokenMissing)
/// until the first negotiation when built with
/// [`requiring_negotiation`](Self::requiring_negotiation).
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug)]
pub struct MockOAuthContext {
    header: String,
    expires_at: i64,
    require_negotiation: bool,
    negotiated: std::sync::atomic::AtomicBool,
    negotiations: std::sync::atomic::AtomicUsize,
    signed: parking_lot::Mutex<Vec<(String, String)>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockOAuthContext {
    /// Context that signs immediately with `header`
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            expires_at: i64::MAX,
            require_negotiation: false,
            negotiated: std::sync::atomic::AtomicBool::new(false),
            negotiations: std::sync::atomic::AtomicUsize::new(0),
            signed: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Context that refuses to sign until negotiated
    pub fn requiring_negotiation(header: impl Into<String>) -> Self {
        Self {
            require_negotiation: true,
            ..Self::new(header)
        }
    }

    /// Forget the last negotiation
    pub fn expire(&self) {
        self.negotiated
            .store(false, std::sync::atomic::Ordering::SeqCst);
    }

    /// Number of negotiations so far
    pub fn negotiation_count(&self) -> usize {
        self.negotiations.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// `(method, url)` pairs signed so far
    pub fn signed_requests(&self) -> Vec<(String, String)> {
        self.signed.lock().clone()
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl OAuthContext for MockOAuthContext {
    async fn negotiate(
        &self,
        _transport: &dyn Transport,
        _base_url: &str,
    ) -> AuthResult<NegotiationOutcome> {
        self.negotiations
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.negotiated
            .store(true, std::sync::atomic::Ordering::SeqCst);
        Ok(NegotiationOutcome {
            expires_at: self.expires_at,
            verification: crate::negotiator::Verification::Skipped,
        })
    }

    fn authorization_header(&self, method: &str, url: &str) -> AuthResult<String> {
        if self.require_negotiation
            && !self.negotiated.load(std::sync::atomic::Ordering::SeqCst)
        {
            return Err(crate::AuthError::TokenMissing);
        }
        self.signed.lock().push((method.to_string(), url.to_string()));
        Ok(self.header.clone())
    }
}
