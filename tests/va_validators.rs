//! Validation-authority scenarios: input validation paths that don't
//! depend on live DNS, a local mock HTTP server for the `simpleHttp`
//! validator's full proof-of-control path, and the dispatcher's
//! "never blocks, calls the hook at most once" guarantees.

mod support;

use acme_core::config::VaConfig;
use acme_core::error::CaError;
use acme_core::types::{
    Authorization, Challenge, ChallengeStatus, ChallengeType, Identifier, Validation,
};
use acme_core::va::{http, tlssni, dns};
use rsa::RsaPublicKey;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, MutexGuard};

/// `test_mode` always targets `127.0.0.1:5001`; serializes the handful
/// of tests that bind or deliberately leave that port empty, since
/// `cargo test` otherwise runs them concurrently on the same process.
static PORT_5001: OnceLock<Mutex<()>> = OnceLock::new();

async fn lock_port_5001() -> MutexGuard<'static, ()> {
    PORT_5001.get_or_init(|| Mutex::new(())).lock().await
}

fn va_config(test_mode: bool) -> VaConfig {
    VaConfig {
        test_mode,
        dns_resolvers: vec!["127.0.0.1:53".to_string()],
        issuer_domain: "example.com".to_string(),
        user_agent: "acme-core-test".to_string(),
    }
}

fn pending_challenge(kind: ChallengeType, token: String, tls: Option<bool>, validation: Option<Validation>) -> Challenge {
    Challenge {
        kind,
        token,
        tls,
        validation,
        status: ChallengeStatus::Pending,
        error: None,
    }
}

/// Spawns a one-shot raw HTTP/1.1 server on `127.0.0.1:5001` that
/// answers every connection with `body` and the given status line,
/// then shuts down. `test_mode` in [`VaConfig`] substitutes exactly
/// this host.
async fn serve_once(status_line: &'static str, body: String) {
    let listener = TcpListener::bind("127.0.0.1:5001").await.expect("bind 127.0.0.1:5001");
    tokio::spawn(async move {
        if let Ok((mut stream, _)) = listener.accept().await {
            let mut buf = [0u8; 1024];
            let _ = stream.read(&mut buf).await;
            let response = format!(
                "{status_line}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
    });
    // Give the listener a moment to be ready to accept before the
    // client connects.
    tokio::time::sleep(Duration::from_millis(20)).await;
}

#[tokio::test]
async fn http_validator_accepts_a_matching_signed_payload() {
    let _guard = lock_port_5001().await;
    let account_key = support::rsa_key(2048);
    let public_key = RsaPublicKey::from(&account_key);
    let token = support::sample_token();
    let payload = format!(r#"{{"type":"simpleHttp","token":"{token}","tls":false}}"#);
    let jws = support::build_jws_compact(&account_key, &payload);

    serve_once("HTTP/1.1 200 OK", jws).await;

    let client = reqwest::Client::new();
    let resolver = test_resolver();
    let config = va_config(true);
    let identifier = Identifier::dns("not-example.com");
    let challenge = pending_challenge(ChallengeType::SimpleHttp, token, Some(false), None);

    let result = http::validate(&client, &resolver, &config, &identifier, &challenge, &public_key).await;
    assert!(result.is_ok(), "expected success, got {result:?}");
}

#[tokio::test]
async fn http_validator_rejects_non_200_status() {
    let _guard = lock_port_5001().await;
    serve_once("HTTP/1.1 404 Not Found", String::new()).await;

    let client = reqwest::Client::new();
    let resolver = test_resolver();
    let config = va_config(true);
    let identifier = Identifier::dns("not-example.com");
    let account_key = support::rsa_key(2048);
    let public_key = RsaPublicKey::from(&account_key);
    let challenge = pending_challenge(ChallengeType::SimpleHttp, support::sample_token(), Some(false), None);

    let err = http::validate(&client, &resolver, &config, &identifier, &challenge, &public_key).await.unwrap_err();
    assert!(matches!(err, CaError::Unauthorized(_)));
}

#[tokio::test]
async fn http_validator_rejects_payload_with_wrong_token() {
    let _guard = lock_port_5001().await;
    let account_key = support::rsa_key(2048);
    let public_key = RsaPublicKey::from(&account_key);
    let served_token = support::sample_token();
    let payload = format!(r#"{{"type":"simpleHttp","token":"{served_token}","tls":false}}"#);
    let jws = support::build_jws_compact(&account_key, &payload);

    serve_once("HTTP/1.1 200 OK", jws).await;

    let client = reqwest::Client::new();
    let resolver = test_resolver();
    let config = va_config(true);
    let identifier = Identifier::dns("not-example.com");
    // Challenge expects a *different* token than what the server signed.
    let challenge = pending_challenge(ChallengeType::SimpleHttp, support::sample_token(), Some(false), None);

    let err = http::validate(&client, &resolver, &config, &identifier, &challenge, &public_key).await.unwrap_err();
    assert!(matches!(err, CaError::Unauthorized(_)));
}

#[tokio::test]
async fn http_validator_rejects_token_with_invalid_base64_characters() {
    let client = reqwest::Client::new();
    let resolver = test_resolver();
    let config = va_config(true);
    let identifier = Identifier::dns("not-example.com");
    let account_key = support::rsa_key(2048);
    let public_key = RsaPublicKey::from(&account_key);
    let challenge = pending_challenge(ChallengeType::SimpleHttp, "not-base64url!!!".to_string(), Some(false), None);

    let err = http::validate(&client, &resolver, &config, &identifier, &challenge, &public_key).await.unwrap_err();
    assert!(matches!(err, CaError::MalformedRequest(_)));
}

#[tokio::test]
async fn http_validator_rejects_short_token() {
    let client = reqwest::Client::new();
    let resolver = test_resolver();
    let config = va_config(true);
    let identifier = Identifier::dns("not-example.com");
    let account_key = support::rsa_key(2048);
    let public_key = RsaPublicKey::from(&account_key);
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    let short_token = URL_SAFE_NO_PAD.encode([0x01u8; 8]); // only 8 bytes, below the 16-byte floor
    let challenge = pending_challenge(ChallengeType::SimpleHttp, short_token, Some(false), None);

    let err = http::validate(&client, &resolver, &config, &identifier, &challenge, &public_key).await.unwrap_err();
    assert!(matches!(err, CaError::MalformedRequest(ref msg) if msg.contains("entropy")));
}

#[tokio::test]
async fn http_validator_reports_connection_error_when_host_unreachable() {
    // No listener bound on 127.0.0.1:5001 for this test - test_mode
    // always points there.
    let _guard = lock_port_5001().await;
    let client = reqwest::Client::new();
    let resolver = test_resolver();
    let config = va_config(true);
    let identifier = Identifier::dns("not-example.com");
    let account_key = support::rsa_key(2048);
    let public_key = RsaPublicKey::from(&account_key);
    let challenge = pending_challenge(ChallengeType::SimpleHttp, support::sample_token(), Some(false), None);

    let err = http::validate(&client, &resolver, &config, &identifier, &challenge, &public_key).await.unwrap_err();
    assert!(matches!(err, CaError::Connection(_)));
}

#[tokio::test]
async fn tlssni_validator_requires_validation_object() {
    let resolver = test_resolver();
    let config = va_config(true);
    let identifier = Identifier::dns("not-example.com");
    let account_key = support::rsa_key(2048);
    let public_key = RsaPublicKey::from(&account_key);
    let challenge = pending_challenge(ChallengeType::Dvsni, support::sample_token(), None, None);

    let err = tlssni::validate(&resolver, &config, &identifier, &challenge, &public_key).await.unwrap_err();
    assert!(matches!(err, CaError::MalformedRequest(ref msg) if msg.contains("validation object")));
}

#[tokio::test]
async fn tlssni_validator_reports_connection_error_when_host_unreachable() {
    let _guard = lock_port_5001().await;
    let resolver = test_resolver();
    let config = va_config(true);
    let identifier = Identifier::dns("not-example.com");
    let account_key = support::rsa_key(2048);
    let public_key = RsaPublicKey::from(&account_key);
    let token = support::sample_token();
    let payload = format!(r#"{{"type":"dvsni","token":"{token}"}}"#);
    let jws = support::build_jws_compact(&account_key, &payload);
    let challenge = pending_challenge(
        ChallengeType::Dvsni,
        token,
        None,
        Some(Validation { compact: jws }),
    );

    // No TLS listener bound on 127.0.0.1:5001 here.
    let err = tlssni::validate(&resolver, &config, &identifier, &challenge, &public_key).await.unwrap_err();
    assert!(matches!(err, CaError::Connection(_)));
}

#[tokio::test]
async fn dns_validator_requires_validation_object() {
    let account_key = support::rsa_key(2048);
    let public_key = RsaPublicKey::from(&account_key);
    let identifier = Identifier::dns("not-example.com");
    let challenge = pending_challenge(ChallengeType::Dns, support::sample_token(), None, None);

    // No resolver needed: the missing-validation check runs first.
    let resolver = test_resolver();
    let err = dns::validate(&resolver, &identifier, &challenge, &public_key).await.unwrap_err();
    assert!(matches!(err, CaError::MalformedRequest(ref msg) if msg.contains("validation object")));
}

fn test_resolver() -> hickory_resolver::TokioAsyncResolver {
    use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
    let group = NameServerConfigGroup::from_ips_clear(&["127.0.0.1".parse().unwrap()], 53, true);
    let config = ResolverConfig::from_parts(None, vec![], group);
    hickory_resolver::TokioAsyncResolver::tokio(config, ResolverOpts::default())
}

#[tokio::test]
async fn dispatcher_does_not_notify_for_an_out_of_range_challenge_index() {
    use acme_core::collaborators::RecordingRegistrationAuthority;
    use acme_core::va::ValidationAuthority;

    let ra = Arc::new(RecordingRegistrationAuthority::new());
    let va = Arc::new(ValidationAuthority::new(va_config(true), ra.clone()).unwrap());

    let account_key = support::rsa_key(2048);
    let public_key = RsaPublicKey::from(&account_key);
    let authorization = Authorization {
        id: uuid::Uuid::nil(),
        identifier: Identifier::dns("not-example.com"),
        challenges: vec![pending_challenge(ChallengeType::SimpleHttp, support::sample_token(), Some(false), None)],
        registration_id: 1,
    };

    va.update_validations(authorization, 7, public_key); // index 7 does not exist

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(ra.last_authorization().is_none());
}

#[tokio::test]
async fn dispatcher_reports_malformed_token_without_touching_the_network() {
    use acme_core::collaborators::RecordingRegistrationAuthority;
    use acme_core::va::ValidationAuthority;

    let ra = Arc::new(RecordingRegistrationAuthority::new());
    let va = Arc::new(ValidationAuthority::new(va_config(true), ra.clone()).unwrap());

    let account_key = support::rsa_key(2048);
    let public_key = RsaPublicKey::from(&account_key);
    let authorization = Authorization {
        id: uuid::Uuid::nil(),
        identifier: Identifier::dns("not-example.com"),
        challenges: vec![pending_challenge(ChallengeType::SimpleHttp, "not-base64url!!!".to_string(), Some(false), None)],
        registration_id: 1,
    };

    va.update_validations(authorization, 0, public_key);

    let mut waited = Duration::ZERO;
    let step = Duration::from_millis(20);
    while ra.last_authorization().is_none() && waited < Duration::from_secs(2) {
        tokio::time::sleep(step).await;
        waited += step;
    }

    let recorded = ra.last_authorization().expect("hook should have been called");
    let challenge = &recorded.challenges[0];
    assert_eq!(challenge.status, ChallengeStatus::Invalid);
    assert_eq!(challenge.error.as_ref().unwrap().kind, "MalformedRequest");
}
