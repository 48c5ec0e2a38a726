//! Common fixtures for integration tests
//!
//! Values below were computed independently for a fixed exponent and nonce
//! (every random byte = 0x42), timestamp 1700000000 and a server that
//! answers with `g^5 mod p`.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use ibkr_auth::{
    Credentials, FixedEntropy, KeyMaterial, ManualClock, OAuthConfig, OAuthSession,
    SharedSecretEncoding,
};

pub const SIGNING_KEY_PEM: &str = include_str!("../fixtures/private_signature.pem");
pub const ENCRYPTION_KEY_PEM: &str = include_str!("../fixtures/private_encryption.pem");
pub const DH_PARAMS_PEM: &str = include_str!("../fixtures/dhparam.pem");

pub const CONSUMER_KEY: &str = "TESTCONS";
pub const ACCESS_TOKEN: &str = "abc123token";

/// Prepend `a1b2c3d4e5f60718293a4b5c6d7e8f90`, encrypted to the encryption key
pub const ACCESS_SECRET: &str = "gPc/K3FyNw6s+ecSGHQrzgMh6V8dgYYhbciCwLgJSdDhnuDv9iI7RSKjf+W7XvagPj6aQG1Pih8TGhzRwvI+Uui23741ZHVBxejvm/1gbO4jep63DydXPWiWL3ssXfWvk1QnGTzBOtrEPTsMsxa0XnPy6cgKME0Gm9X6g4O9zOLcwFOyxZtGJGir4cdsunXxegZ/4ZbrO0yC8YRc0JtHeElo/xnBAtMnON31bCQJuvWCnG0WfQqa/6RABk5/YF7fPtbi+2DIBw7Bwh7IkD1mIEa6a/mzmLvKI70tQ9PT2x5TPiPiOcB/Hezoo5okOiU29yXYrq+ftSjYtvSJhnDnCQ==";

pub const BASE_URL: &str = "https://api.ibkr.com/v1/api";
pub const TIMESTAMP: i64 = 1_700_000_000;
pub const EXPIRES_AT: i64 = 1_700_003_600;
pub const NONCE: &str = "42424242424242424242424242424242";

pub const CHALLENGE_HEX: &str = "7e57cc3da623f0e531ba0c7a447421b989fbfe187c4321ba857a5cda9286ad15f512394dbf8580c7e5a22b3b798fba933a7158a9816f864a197b743f6962b104aad21af06acf8f68b11232c711bed2f3e793fb6d0e061a3bc72ced291b8cbca690520c16b5de764a2f5b3d8cd691d27dd09aec8f3f435f74227ce2fd47f1e58cb319b65009b8201b0a0572f379871586a74560ea5e1bc8499972dee7881fabf98702fbd0e0f2f47d9fb447cd9b526718687b70273b5be5247855729e6fcf42ac25a06c70472cfdfab6d9544dca2062f6c1a67410a55f479c91b74e4c28d8059e131f615663d56daab8617756b5fc54ddb8443f0e62fcb67797a531f1c9167ba";

/// RSA-SHA256 signature of the negotiation base string, percent-encoded
pub const NEGOTIATION_SIGNATURE: &str = "rRvZRy3FcZ0K4OMNIDhM5u19j1m16gEvZVX%2BFDSO%2BQ03Wj5oRs8TzA8Vl1PJi%2BA5gRMkNwnqS%2B%2Fr4kaBAxc%2F%2B4wcxES7sn%2FdR9MqnwGyPWDnZSQwEcYzEyjc%2BfbmgXcOxOcQ%2FiQMU%2BqPlAExKQeByynG5FzU7%2B8QfwW8cy0GnOtc6Z2vqdrOVXV0NQqSyom4IlEDpzbCd2kL3qrQotdOY0RkwuhLq6ra3uRba1M4ymkGNB5Czc9%2FDpeVhLPT8VIrgiyDhIcsfBeWrvZjKyibx9KB2MVctq%2FMgv4wfRUZvRz1h6sDshMNpTJgUpjTQ24URqU4%2BaQgCm0RL57QRnYt8g%3D%3D";

/// Shared secret as raw magnitude bytes
pub const LST_MAGNITUDE: &str = "DBwr2KJM6JgEb1ciJR5geMZJReE=";
pub const LST_MAGNITUDE_SIGNATURE: &str = "XhNMQcbc+lZWSqeayxfFms+L9Sg=";

/// Shared secret with the sign byte prepended
pub const LST_SIGNED: &str = "eVx94BvlRRWTRZ0RO2+ZDnlejOE=";
pub const LST_SIGNED_SIGNATURE: &str = "5Oec+Xkbl6ktO79e7FNmhzo7uec=";

pub const ACCOUNTS_URL: &str =
    "https://api.ibkr.com/v1/api/iserver/accounts?conid=265598&period=1d";

/// Header for `GET ACCOUNTS_URL` signed with `LST_MAGNITUDE`
pub const ACCOUNTS_HEADER: &str = r#"OAuth oauth_consumer_key="TESTCONS", oauth_nonce="42424242424242424242424242424242", oauth_signature="4Ew1QptMrB6cUNMx34WV1SAPw8eR54Xaj%2B6fxj30EZQ%3D", oauth_signature_method="HMAC-SHA256", oauth_timestamp="1700000000", oauth_token="abc123token", realm="limited_poa""#;

/// Negotiation reply from a server using exponent 5
pub fn lst_response(signature: &str) -> String {
    format!(
        r#"{{"diffie_hellman_response":"20","live_session_token_signature":"{signature}","live_session_token_expiration":{EXPIRES_AT}}}"#
    )
}

pub fn fixture_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

pub fn config() -> OAuthConfig {
    OAuthConfig {
        consumer_key: CONSUMER_KEY.to_string(),
        access_token: ACCESS_TOKEN.to_string(),
        access_secret: ACCESS_SECRET.to_string(),
        signing_key_path: fixture_dir().join("private_signature.pem"),
        encryption_key_path: fixture_dir().join("private_encryption.pem"),
        dh_params_path: fixture_dir().join("dhparam.pem"),
        strict_verification: false,
        shared_secret_encoding: SharedSecretEncoding::Magnitude,
    }
}

pub fn key_material() -> KeyMaterial {
    KeyMaterial::from_pem(
        SIGNING_KEY_PEM.as_bytes(),
        ENCRYPTION_KEY_PEM.as_bytes(),
        DH_PARAMS_PEM.as_bytes(),
    )
    .expect("fixture key material")
}

pub fn credentials() -> Credentials {
    Credentials::new(CONSUMER_KEY, ACCESS_TOKEN, ACCESS_SECRET).expect("fixture credentials")
}

/// Deterministic session plus the clock driving it
pub fn deterministic_session(config: &OAuthConfig) -> (OAuthSession, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(TIMESTAMP));
    let session = OAuthSession::builder(
        Credentials::from_config(config).expect("fixture credentials"),
        KeyMaterial::from_config(config).expect("fixture key files"),
    )
    .clock(clock.clone())
    .entropy(Arc::new(FixedEntropy(0x42)))
    .options(ibkr_auth::NegotiationOptions::from_config(config))
    .build();
    (session, clock)
}
