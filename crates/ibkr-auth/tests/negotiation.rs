//! End-to-end negotiation and signing against a mock endpoint

mod common;

use common::*;
use ibkr_auth::params::{authorization_header, negotiation_signature_fragment, OAuthParameterSet};
use ibkr_auth::{
    AuthError, MockTransport, NegotiationState, OAuthContext, OAuthSession, SessionNegotiator,
    SharedSecretEncoding, TransportError, Verification,
};

// =============================================================================
// Negotiation
// =============================================================================

#[tokio::test]
async fn test_negotiation_request_is_byte_exact() {
    let (session, _clock) = deterministic_session(&config());
    let transport = MockTransport::new();
    transport.push_response(200, lst_response(LST_MAGNITUDE_SIGNATURE));

    session.negotiate(&transport, BASE_URL).await.unwrap();

    let request = &transport.requests()[0];
    assert_eq!(request.method, "POST");
    assert_eq!(request.url, format!("{BASE_URL}/oauth/live_session_token"));

    let expected: OAuthParameterSet = [
        ("diffie_hellman_challenge", CHALLENGE_HEX),
        ("oauth_consumer_key", CONSUMER_KEY),
        ("oauth_nonce", NONCE),
        ("oauth_signature", NEGOTIATION_SIGNATURE),
        ("oauth_signature_method", "RSA-SHA256"),
        ("oauth_timestamp", "1700000000"),
        ("oauth_token", ACCESS_TOKEN),
    ]
    .into_iter()
    .collect();
    assert_eq!(
        request.header("Authorization"),
        Some(authorization_header(&expected).as_str())
    );
}

#[tokio::test]
async fn test_negotiated_token_signs_known_request() {
    let (session, _clock) = deterministic_session(&config());
    let transport = MockTransport::new();
    transport.push_response(200, lst_response(LST_MAGNITUDE_SIGNATURE));

    let outcome = session.negotiate(&transport, BASE_URL).await.unwrap();
    assert_eq!(outcome.expires_at, EXPIRES_AT);
    assert_eq!(outcome.verification, Verification::Verified);
    assert_eq!(
        session.state(),
        NegotiationState::Established {
            expires_at: EXPIRES_AT
        }
    );

    assert_eq!(
        session.authorization_header("GET", ACCOUNTS_URL).unwrap(),
        ACCOUNTS_HEADER
    );
}

#[tokio::test]
async fn test_signed_shared_secret_encoding() {
    let config = ibkr_auth::OAuthConfig {
        shared_secret_encoding: SharedSecretEncoding::Signed,
        strict_verification: true,
        ..config()
    };
    let transport = MockTransport::new();
    transport.push_response(200, lst_response(LST_SIGNED_SIGNATURE));

    let negotiator = SessionNegotiator::new(credentials(), key_material())
        .with_clock(std::sync::Arc::new(ibkr_auth::ManualClock::new(TIMESTAMP)))
        .with_entropy(std::sync::Arc::new(ibkr_auth::FixedEntropy(0x42)))
        .with_options(ibkr_auth::NegotiationOptions::from_config(&config));

    let (token, outcome) = negotiator.negotiate(&transport, BASE_URL).await.unwrap();
    assert_eq!(token.expose_base64(), LST_SIGNED);
    assert_eq!(outcome.verification, Verification::Verified);
}

#[tokio::test]
async fn test_strict_mode_rejects_other_encodings_signature() {
    let config = ibkr_auth::OAuthConfig {
        strict_verification: true,
        ..config()
    };
    let (session, _clock) = deterministic_session(&config);
    let transport = MockTransport::new();
    transport.push_response(200, lst_response(LST_SIGNED_SIGNATURE));

    let err = session.negotiate(&transport, BASE_URL).await.unwrap_err();
    assert!(matches!(err, AuthError::VerificationFailed));
    assert!(matches!(session.state(), NegotiationState::Failed(_)));
    assert!(matches!(
        session.authorization_header("GET", ACCOUNTS_URL),
        Err(AuthError::TokenMissing)
    ));
}

#[tokio::test]
async fn test_lenient_mode_accepts_mismatch() {
    let (session, _clock) = deterministic_session(&config());
    let transport = MockTransport::new();
    transport.push_response(200, lst_response(LST_SIGNED_SIGNATURE));

    let outcome = session.negotiate(&transport, BASE_URL).await.unwrap();
    assert_eq!(outcome.verification, Verification::Mismatch);
    assert!(session.has_valid_token());
}

#[tokio::test]
async fn test_rejection_and_transport_failure() {
    let (session, _clock) = deterministic_session(&config());
    let transport = MockTransport::new();
    transport.push_response(401, "invalid consumer");
    transport.push_error(TransportError::Request("connection refused".into()));

    let err = session.negotiate(&transport, BASE_URL).await.unwrap_err();
    match err {
        AuthError::NegotiationRejected { status, body } => {
            assert_eq!(status, 401);
            assert_eq!(body, "invalid consumer");
        }
        other => panic!("Expected NegotiationRejected, got {other:?}"),
    }

    let err = session.negotiate(&transport, BASE_URL).await.unwrap_err();
    assert!(matches!(err, AuthError::Transport(_)));
    assert!(err.is_retryable());
}

// =============================================================================
// Token lifetime
// =============================================================================

#[tokio::test]
async fn test_token_expires_lazily_at_sign_time() {
    let (session, clock) = deterministic_session(&config());
    let transport = MockTransport::new();
    transport.push_response(200, lst_response(LST_MAGNITUDE_SIGNATURE));
    session.negotiate(&transport, BASE_URL).await.unwrap();

    clock.set(EXPIRES_AT - 1);
    assert!(session.authorization_header("GET", ACCOUNTS_URL).is_ok());

    clock.set(EXPIRES_AT);
    let err = session.authorization_header("GET", ACCOUNTS_URL).unwrap_err();
    assert!(err.requires_reauth());
    assert!(matches!(
        err,
        AuthError::TokenExpired {
            expired_at: EXPIRES_AT,
            now: EXPIRES_AT
        }
    ));
}

#[tokio::test]
async fn test_from_config_loads_key_files() {
    let session = OAuthSession::from_config(&config()).unwrap();
    assert_eq!(session.state(), NegotiationState::Idle);
    assert!(matches!(
        session.authorization_header("GET", ACCOUNTS_URL),
        Err(AuthError::TokenMissing)
    ));

    let missing = ibkr_auth::OAuthConfig {
        signing_key_path: fixture_dir().join("absent.pem"),
        ..config()
    };
    assert!(matches!(
        OAuthSession::from_config(&missing),
        Err(AuthError::KeyFile { .. })
    ));
}

// =============================================================================
// Canonical encoding
// =============================================================================

#[test]
fn test_header_fixed_cases() {
    assert_eq!(authorization_header(&OAuthParameterSet::new()), "OAuth ");
    assert_eq!(
        authorization_header(&OAuthParameterSet::new().with("oauth_token", "abc")),
        r#"OAuth oauth_token="abc", realm="limited_poa""#
    );
}

#[test]
fn test_negotiation_fragment_double_encodes() {
    let params = OAuthParameterSet::new().with("oauth_signature", "a+b=");
    assert_eq!(
        negotiation_signature_fragment(&params),
        "&oauth_signature%3Da%252Bb%253D"
    );
}
