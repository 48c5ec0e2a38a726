//! Main REST client implementation

use ibkr_auth::{
    HttpRequest, HttpResponse, NegotiationOutcome, OAuthContext, ReqwestTransport, Transport,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::endpoints::SessionEndpoints;
use crate::error::{RestError, RestResult};
use crate::types::{AuthStatus, TickleResponse};

/// Production Web API host
pub const PROD_BASE_URL: &str = "https://api.ibkr.com";

/// Local client portal gateway
pub const GATEWAY_BASE_URL: &str = "https://localhost:5000";

/// Default `User-Agent` header
pub const DEFAULT_USER_AGENT: &str = "ibkr-rest/0.1.0";

/// Path prefix of every Web API endpoint
pub const API_PREFIX: &str = "/v1/api";

/// Default request timeout
const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// IBKR Web API client
///
/// Talks either to the production API with OAuth signing, or to a local
/// client portal gateway without it.
///
/// # Example
///
/// ```no_run
/// use ibkr_auth::OAuthSession;
/// use ibkr_rest::{WebClient, PROD_BASE_URL};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let session = Arc::new(OAuthSession::from_env()?);
///     let client = WebClient::new(PROD_BASE_URL, Some(session))?;
///
///     client.authenticate().await?;
///     let status = client.init_brokerage_session().await?;
///     println!("Authenticated: {}", status.authenticated);
///
///     Ok(())
/// }
/// ```
pub struct WebClient {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    oauth: Option<Arc<dyn OAuthContext>>,
    reauth_lock: Mutex<()>,
}

impl WebClient {
    /// Create a client for `base_url`
    ///
    /// Without an OAuth context the client targets a local gateway and
    /// accepts its self-signed certificate.
    pub fn new(
        base_url: impl Into<String>,
        oauth: Option<Arc<dyn OAuthContext>>,
    ) -> RestResult<Self> {
        let config = ClientConfig::new(base_url).with_accept_invalid_certs(oauth.is_none());
        Self::with_config(config, oauth)
    }

    /// Create a client with custom configuration
    pub fn with_config(
        config: ClientConfig,
        oauth: Option<Arc<dyn OAuthContext>>,
    ) -> RestResult<Self> {
        let transport = ReqwestTransport::with_options(
            Duration::from_secs(config.timeout_secs),
            &config.user_agent,
            config.accept_invalid_certs,
        )?;
        Ok(Self::with_transport(config, Arc::new(transport), oauth))
    }

    /// Create a client on top of an existing transport
    pub fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        oauth: Option<Arc<dyn OAuthContext>>,
    ) -> Self {
        info!(base_url = %config.base_url, oauth = oauth.is_some(), "Created IBKR REST client");
        Self {
            config,
            transport,
            oauth,
            reauth_lock: Mutex::new(()),
        }
    }

    /// Host the client talks to
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Check if the client signs requests
    pub fn has_oauth(&self) -> bool {
        self.oauth.is_some()
    }

    /// Fully qualified URL for an API path and query
    pub fn api_url(&self, path: &str, query: &[(&str, &str)]) -> RestResult<String> {
        let mut url = format!(
            "{}{}{}",
            self.api_base(),
            if path.starts_with('/') { "" } else { "/" },
            path
        );
        if !query.is_empty() {
            let encoded = serde_urlencoded::to_string(query)
                .map_err(|e| RestError::InvalidParameter(e.to_string()))?;
            url.push('?');
            url.push_str(&encoded);
        }
        Ok(url)
    }

    fn api_base(&self) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), API_PREFIX)
    }

    // ========================================================================
    // Authentication
    // ========================================================================

    /// Negotiate a new live session token
    #[instrument(skip(self))]
    pub async fn authenticate(&self) -> RestResult<NegotiationOutcome> {
        let oauth = self.oauth.as_ref().ok_or(RestError::AuthRequired)?;
        let _guard = self.reauth_lock.lock().await;
        Ok(oauth
            .negotiate(self.transport.as_ref(), &self.api_base())
            .await?)
    }

    /// Header for `method url`, renegotiating once if the token is gone
    async fn authorization_header(
        &self,
        oauth: &Arc<dyn OAuthContext>,
        method: &str,
        url: &str,
    ) -> RestResult<String> {
        match oauth.authorization_header(method, url) {
            Ok(header) => Ok(header),
            Err(e) if e.requires_reauth() && self.config.auto_reauthenticate => {
                let _guard = self.reauth_lock.lock().await;
                // A concurrent request may already have renegotiated
                if let Ok(header) = oauth.authorization_header(method, url) {
                    return Ok(header);
                }
                warn!(error = %e, "Live session token unusable, renegotiating");
                oauth
                    .negotiate(self.transport.as_ref(), &self.api_base())
                    .await?;
                Ok(oauth.authorization_header(method, url)?)
            }
            Err(e) => Err(e.into()),
        }
    }

    // ========================================================================
    // Requests
    // ========================================================================

    /// Send a request to `/v1/api{path}`
    ///
    /// Any status is returned as-is; endpoint wrappers decide what counts as
    /// success.
    #[instrument(skip(self, query, body))]
    pub async fn request<B: Serialize + ?Sized>(
        &self,
        method: &str,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> RestResult<HttpResponse> {
        let method = method.to_ascii_uppercase();
        let url = self.api_url(path, query)?;

        let mut request = HttpRequest::new(method.as_str(), url.as_str())
            .with_header("User-Agent", self.config.user_agent.as_str());

        if let Some(oauth) = &self.oauth {
            let header = self.authorization_header(oauth, &method, &url).await?;
            request = request.with_header("Authorization", header);
        }

        if let Some(body) = body {
            let json =
                serde_json::to_vec(body).map_err(|e| RestError::InvalidParameter(e.to_string()))?;
            request = request
                .with_header("Content-Type", "application/json")
                .with_body(json);
        }

        debug!(%method, %url, "Sending request");
        let response = self.transport.execute(request).await?;
        if response.is_success() {
            debug!(status = response.status, "Received response");
        } else {
            debug!(
                status = response.status,
                body = %response.body_text(),
                "Received error response"
            );
        }

        Ok(response)
    }

    /// GET request
    pub async fn get(&self, path: &str, query: &[(&str, &str)]) -> RestResult<HttpResponse> {
        self.request::<()>("GET", path, query, None).await
    }

    /// POST request without a body
    pub async fn post(&self, path: &str, query: &[(&str, &str)]) -> RestResult<HttpResponse> {
        self.request::<()>("POST", path, query, None).await
    }

    /// POST request with a JSON body
    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        body: &B,
    ) -> RestResult<HttpResponse> {
        self.request("POST", path, query, Some(body)).await
    }

    /// DELETE request
    pub async fn delete(&self, path: &str, query: &[(&str, &str)]) -> RestResult<HttpResponse> {
        self.request::<()>("DELETE", path, query, None).await
    }

    /// Decode a JSON response body
    pub fn parse_json<T: DeserializeOwned>(response: &HttpResponse) -> RestResult<T> {
        serde_json::from_slice(&response.body).map_err(|e| RestError::Parse(e.to_string()))
    }

    // ========================================================================
    // Session Endpoints
    // ========================================================================

    /// Get session endpoints
    pub fn session(&self) -> SessionEndpoints<'_> {
        SessionEndpoints::new(self)
    }

    /// Keep the session alive
    pub async fn tickle(&self) -> RestResult<TickleResponse> {
        self.session().tickle().await
    }

    /// Brokerage session status
    pub async fn auth_status(&self) -> RestResult<AuthStatus> {
        self.session().auth_status().await
    }

    /// Open the brokerage session
    pub async fn init_brokerage_session(&self) -> RestResult<AuthStatus> {
        self.session().init_brokerage_session().await
    }

    /// End the session
    pub async fn logout(&self) -> RestResult<()> {
        self.session().logout().await
    }
}

impl std::fmt::Debug for WebClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebClient")
            .field("config", &self.config)
            .field("has_oauth", &self.has_oauth())
            .finish()
    }
}

/// Client configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Host, without the `/v1/api` prefix
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// `User-Agent` header
    pub user_agent: String,
    /// Accept self-signed certificates
    pub accept_invalid_certs: bool,
    /// Renegotiate when the live session token is missing or expired
    pub auto_reauthenticate: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: PROD_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_invalid_certs: false,
            auto_reauthenticate: true,
        }
    }
}

impl ClientConfig {
    /// Create a configuration for `base_url`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Configuration for the local gateway
    pub fn gateway() -> Self {
        Self::new(GATEWAY_BASE_URL).with_accept_invalid_certs(true)
    }

    /// Set timeout
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Set user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Accept self-signed certificates
    pub fn with_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Enable or disable automatic renegotiation
    pub fn with_auto_reauthenticate(mut self, enabled: bool) -> Self {
        self.auto_reauthenticate = enabled;
        self
    }
}
