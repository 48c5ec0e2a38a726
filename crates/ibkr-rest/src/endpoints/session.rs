//! Session lifecycle endpoints
//!
//! Keep-alive, brokerage session status and logout.

use ibkr_auth::HttpResponse;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::client::WebClient;
use crate::error::{RestError, RestResult};
use crate::types::{AuthStatus, InitBrokerageSessionRequest, LogoutResponse, TickleResponse};

/// Session endpoints
pub struct SessionEndpoints<'a> {
    client: &'a WebClient,
}

impl<'a> SessionEndpoints<'a> {
    pub fn new(client: &'a WebClient) -> Self {
        Self { client }
    }

    /// Ping the server to keep the session open
    #[instrument(skip(self))]
    pub async fn tickle(&self) -> RestResult<TickleResponse> {
        let response = self.client.post("/tickle", &[]).await?;
        expect_ok("/tickle", response)
    }

    /// Current brokerage session status
    #[instrument(skip(self))]
    pub async fn auth_status(&self) -> RestResult<AuthStatus> {
        let response = self.client.post("/iserver/auth/status", &[]).await?;
        expect_ok("/iserver/auth/status", response)
    }

    /// Open a brokerage session, taking over any competing one
    #[instrument(skip(self))]
    pub async fn init_brokerage_session(&self) -> RestResult<AuthStatus> {
        let response = self
            .client
            .post_json(
                "/iserver/auth/ssodh/init",
                &[],
                &InitBrokerageSessionRequest::default(),
            )
            .await?;
        let status: AuthStatus = expect_ok("/iserver/auth/ssodh/init", response)?;
        debug!(
            authenticated = status.authenticated,
            competing = status.competing,
            "Brokerage session initialized"
        );
        Ok(status)
    }

    /// Terminate the session
    #[instrument(skip(self))]
    pub async fn logout(&self) -> RestResult<()> {
        let response = self.client.post("/logout", &[]).await?;
        let logout: LogoutResponse = expect_ok("/logout", response)?;
        if !logout.status {
            return Err(RestError::Api("logout was not confirmed".to_string()));
        }
        Ok(())
    }
}

fn expect_ok<T: DeserializeOwned>(path: &str, response: HttpResponse) -> RestResult<T> {
    if response.status != 200 {
        return Err(RestError::Status {
            path: path.to_string(),
            status: response.status,
            body: response.body_text(),
        });
    }
    WebClient::parse_json(&response)
}
