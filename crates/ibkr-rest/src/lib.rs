//! REST API client for the Interactive Brokers Web API
//!
//! Wraps the Web API transport and plugs in OAuth request signing from
//! [`ibkr_auth`]. Only the session lifecycle endpoints are provided here;
//! other endpoints can be reached with [`WebClient::request`].
//!
//! # Modes
//!
//! - **OAuth**: production host, every request signed with the live session
//!   token. Expired tokens are renegotiated on demand.
//! - **Gateway**: local client portal gateway, no signing, self-signed
//!   certificate accepted.
//!
//! # Example
//!
//! ```no_run
//! use ibkr_rest::{WebClient, GATEWAY_BASE_URL};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = WebClient::new(GATEWAY_BASE_URL, None)?;
//!     let tickle = client.tickle().await?;
//!     println!("Session: {}", tickle.session);
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod endpoints;
pub mod error;
pub mod types;

// Re-export main types
pub use client::{
    ClientConfig, WebClient, API_PREFIX, DEFAULT_USER_AGENT, GATEWAY_BASE_URL, PROD_BASE_URL,
};
pub use endpoints::SessionEndpoints;
pub use error::{RestError, RestResult};
pub use ibkr_auth::HttpResponse;
pub use types::{
    AuthStatus, HmdsDetails, IServerDetails, InitBrokerageSessionRequest, LogoutResponse,
    ServerInfo, TickleResponse,
};
