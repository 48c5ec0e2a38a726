//! OAuth authentication for the Interactive Brokers Web API
//!
//! Third-party OAuth consumers authenticate in two phases:
//!
//! 1. **Live session token negotiation.** A Diffie-Hellman exchange, signed
//!    with the consumer's RSA key, yields a short-lived symmetric key (the
//!    live session token).
//! 2. **Request signing.** Every API call carries an `Authorization` header
//!    whose signature is an HMAC-SHA256 keyed by the live session token.
//!
//! [`OAuthSession`] ties both together behind the [`OAuthContext`] trait.
//!
//! # Example
//!
//! ```no_run
//! use ibkr_auth::{OAuthContext, OAuthSession, ReqwestTransport};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // IBKR_CONSUMER_KEY, IBKR_ACCESS_TOKEN, IBKR_ACCESS_SECRET and key paths
//!     let session = OAuthSession::from_env()?;
//!     let transport = ReqwestTransport::new()?;
//!
//!     session.negotiate(&transport, "https://api.ibkr.com/v1/api").await?;
//!
//!     let header = session.authorization_header(
//!         "GET",
//!         "https://api.ibkr.com/v1/api/iserver/accounts",
//!     )?;
//!     println!("Authorization: {header}");
//!
//!     Ok(())
//! }
//! ```

pub mod clock;
mod config;
mod context;
mod credentials;
pub mod entropy;
mod error;
pub mod keys;
pub mod negotiator;
pub mod params;
mod signer;
mod token;
pub mod transport;

pub use clock::{Clock, SystemClock};
pub use config::{OAuthConfig, SharedSecretEncoding};
pub use context::{NegotiationState, OAuthContext, OAuthSession, OAuthSessionBuilder};
pub use credentials::Credentials;
pub use entropy::{EntropySource, OsEntropy};
pub use error::{AuthError, AuthResult};
pub use keys::{DhParameters, KeyMaterial};
pub use negotiator::{NegotiationOptions, NegotiationOutcome, SessionNegotiator, Verification};
pub use params::OAuthParameterSet;
pub use signer::RequestSigner;
pub use token::{LiveSessionToken, TokenState};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport, TransportError};

#[cfg(any(test, feature = "test-utils"))]
pub use clock::ManualClock;
#[cfg(any(test, feature = "test-utils"))]
pub use context::MockOAuthContext;
#[cfg(any(test, feature = "test-utils"))]
pub use entropy::FixedEntropy;
#[cfg(any(test, feature = "test-utils"))]
pub use transport::MockTransport;
