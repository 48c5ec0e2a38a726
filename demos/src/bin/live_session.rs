//! Live Session Demo
//!
//! Showcases: OAuth live session token negotiation, brokerage session init,
//! keep-alive
//!
//! Run against the local gateway:   cargo run --bin live_session
//! Run with OAuth against api.ibkr.com:
//!   IBKR_CONSUMER_KEY=... IBKR_ACCESS_TOKEN=... IBKR_ACCESS_SECRET=... \
//!   IBKR_SIGNING_KEY_PATH=... IBKR_ENCRYPTION_KEY_PATH=... IBKR_DH_PARAMS_PATH=... \
//!   cargo run --bin live_session -- --oauth
//!
//! `IBKR_OAUTH_CONFIG=path/to/credentials.yml` (or `.json`) may replace the
//! variables above.

use colored::*;
use ibkr_auth::{OAuthConfig, OAuthContext, OAuthSession, Verification};
use ibkr_rest::{WebClient, GATEWAY_BASE_URL, PROD_BASE_URL};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn load_config() -> Result<OAuthConfig, ibkr_auth::AuthError> {
    match std::env::var("IBKR_OAUTH_CONFIG") {
        Ok(path) => OAuthConfig::from_file(path),
        Err(_) => OAuthConfig::from_env(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let use_oauth = std::env::args().any(|arg| arg == "--oauth");

    println!("{}", "═".repeat(65).cyan());
    println!("{}", "  LIVE SESSION DEMO".cyan().bold());
    println!("{}", "  IBKR Web API - OAuth Session Lifecycle".cyan());
    println!("{}", "═".repeat(65).cyan());
    println!();

    let client = if use_oauth {
        let config = load_config()?;
        let session = Arc::new(OAuthSession::from_config(&config)?);
        let mut states = session.subscribe_state();
        tokio::spawn(async move {
            while states.changed().await.is_ok() {
                let state = states.borrow_and_update().clone();
                println!("  {} {:?}", "state:".dimmed(), state);
            }
        });

        let oauth: Arc<dyn OAuthContext> = session;
        WebClient::new(PROD_BASE_URL, Some(oauth))?
    } else {
        WebClient::new(GATEWAY_BASE_URL, None)?
    };

    println!("  Base URL:  {}", client.base_url().cyan());
    println!(
        "  Mode:      {}",
        if use_oauth { "OAuth".green() } else { "Gateway".yellow() }
    );
    println!();

    if use_oauth {
        println!("{}", "  LIVE SESSION TOKEN".white().bold());
        println!("  {}", "─".repeat(50));

        let outcome = client.authenticate().await?;
        let verification = match outcome.verification {
            Verification::Verified => "verified".green(),
            Verification::Mismatch => "mismatch (accepted)".yellow(),
            Verification::Skipped => "not provided".dimmed(),
        };
        println!("  Expires at:   {}", outcome.expires_at.to_string().cyan());
        println!("  Signature:    {}", verification);
        println!();

        let status = client.init_brokerage_session().await?;
        println!("{}", "  BROKERAGE SESSION".white().bold());
        println!("  {}", "─".repeat(50));
        println!("  Authenticated: {}", flag(status.authenticated));
        println!("  Connected:     {}", flag(status.connected));
        println!("  Competing:     {}", flag(status.competing));
        println!();
    }

    let tickle = client.tickle().await?;
    println!("{}", "  KEEP-ALIVE".white().bold());
    println!("  {}", "─".repeat(50));
    println!("  Session:       {}", tickle.session.cyan());
    println!("  SSO expires:   {} ms", tickle.sso_expires);
    if let Some(iserver) = &tickle.iserver {
        println!("  Authenticated: {}", flag(iserver.auth_status.authenticated));
    }
    println!();

    let status = client.auth_status().await?;
    if let Some(server) = &status.server_info {
        println!(
            "  Server:        {} ({})",
            server.server_name.cyan(),
            server.server_version
        );
    }

    if std::env::args().any(|arg| arg == "--logout") {
        client.logout().await?;
        println!("  {}", "Logged out".green());
    }

    Ok(())
}

fn flag(value: bool) -> ColoredString {
    if value {
        "yes".green()
    } else {
        "no".red()
    }
}
