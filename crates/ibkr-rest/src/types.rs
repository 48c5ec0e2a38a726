//! Request and response types for session endpoints

use serde::{Deserialize, Serialize};

// ============================================================================
// Authentication status
// ============================================================================

/// Brokerage session status, returned by `/iserver/auth/status` and
/// `/iserver/auth/ssodh/init`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthStatus {
    /// Brokerage session is authenticated
    #[serde(default)]
    pub authenticated: bool,
    /// Another session is competing for this user
    #[serde(default)]
    pub competing: bool,
    /// Connected to the backend
    #[serde(default)]
    pub connected: bool,
    /// Status message
    #[serde(default)]
    pub message: String,
    /// Gateway MAC address
    #[serde(default, rename = "MAC")]
    pub mac: String,
    /// Backend server details
    #[serde(default, rename = "serverInfo")]
    pub server_info: Option<ServerInfo>,
}

/// Backend server details
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    /// Server name
    #[serde(default)]
    pub server_name: String,
    /// Server version
    #[serde(default)]
    pub server_version: String,
}

// ============================================================================
// Brokerage session init
// ============================================================================

/// Body of `/iserver/auth/ssodh/init`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitBrokerageSessionRequest {
    /// Publish the session to market data farms
    pub publish: bool,
    /// Take over a competing session
    pub compete: bool,
}

impl Default for InitBrokerageSessionRequest {
    fn default() -> Self {
        Self {
            publish: true,
            compete: true,
        }
    }
}

// ============================================================================
// Tickle
// ============================================================================

/// Response of `/tickle`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickleResponse {
    /// Session identifier
    #[serde(default)]
    pub session: String,
    /// Milliseconds until the SSO session expires
    #[serde(default)]
    pub sso_expires: i64,
    /// Session collision flag (sic)
    #[serde(default)]
    pub collission: bool,
    /// User id
    #[serde(default)]
    pub user_id: i64,
    /// Historical market data service details
    #[serde(default)]
    pub hmds: Option<HmdsDetails>,
    /// Brokerage session details
    #[serde(default)]
    pub iserver: Option<IServerDetails>,
}

/// Historical market data service details
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HmdsDetails {
    /// Error message, empty when healthy
    #[serde(default)]
    pub error: String,
}

/// Brokerage session details embedded in `/tickle`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IServerDetails {
    /// Authentication status
    #[serde(default)]
    pub auth_status: AuthStatus,
}

// ============================================================================
// Logout
// ============================================================================

/// Response of `/logout`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoutResponse {
    /// Whether the session was terminated
    #[serde(default)]
    pub status: bool,
}
