//! HTTP (`simpleHttp`) challenge validator. §4.F.

use crate::config::VaConfig;
use crate::error::{CaError, Result};
use crate::types::{Challenge, Identifier, IdentifierType};
use crate::va::jws::CompactJws;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hickory_resolver::TokioAsyncResolver;
use rsa::RsaPublicKey;
use serde::Deserialize;
use std::time::Duration;

const IO_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Deserialize)]
struct SimpleHttpPayload {
    #[serde(rename = "type")]
    kind: String,
    token: String,
    tls: Option<bool>,
}

/// Validates a `simpleHttp` challenge for `identifier`, fetching the
/// token payload over HTTP(S) and verifying it is a JWS signed by
/// `account_key` whose payload matches `challenge`.
pub async fn validate(
    client: &reqwest::Client,
    resolver: &TokioAsyncResolver,
    config: &VaConfig,
    identifier: &Identifier,
    challenge: &Challenge,
    account_key: &RsaPublicKey,
) -> Result<()> {
    if identifier.kind != IdentifierType::Dns {
        return Err(CaError::MalformedRequest("identifier type must be dns".to_string()));
    }

    let token_bytes = URL_SAFE_NO_PAD
        .decode(&challenge.token)
        .map_err(|_| CaError::MalformedRequest("token is not valid base64url".to_string()))?;
    if token_bytes.len() < 16 {
        return Err(CaError::MalformedRequest("token has insufficient entropy".to_string()));
    }

    let use_tls = challenge.tls.unwrap_or(false);
    let scheme = if use_tls { "https" } else { "http" };
    let host = if config.test_mode {
        "localhost:5001".to_string()
    } else {
        resolver
            .lookup_ip(identifier.value.as_str())
            .await
            .map_err(|e| CaError::UnknownHost(e.to_string()))?;
        identifier.value.clone()
    };
    let url = format!("{scheme}://{host}/.well-known/acme-challenge/{}", challenge.token);

    let response = tokio::time::timeout(IO_TIMEOUT, client.get(&url).send())
        .await
        .map_err(|_| CaError::Connection("timed out connecting to challenge host".to_string()))?
        .map_err(classify_reqwest_error)?;

    if response.status() != reqwest::StatusCode::OK {
        return Err(CaError::Unauthorized(format!(
            "challenge host returned HTTP {}",
            response.status()
        )));
    }

    let body = tokio::time::timeout(IO_TIMEOUT, response.text())
        .await
        .map_err(|_| CaError::Connection("timed out reading challenge response body".to_string()))?
        .map_err(classify_reqwest_error)?;
    if body.len() > MAX_BODY_BYTES {
        return Err(CaError::Unauthorized("challenge response body too large".to_string()));
    }

    let jws = CompactJws::parse(body.trim())?;
    jws.verify(account_key)?;

    let payload: SimpleHttpPayload = serde_json::from_slice(jws.payload())
        .map_err(|e| CaError::Unauthorized(format!("challenge payload is not valid JSON: {e}")))?;

    if payload.kind != "simpleHttp" || payload.token != challenge.token || payload.tls != challenge.tls {
        return Err(CaError::Unauthorized("challenge payload does not match expectations".to_string()));
    }

    Ok(())
}

fn classify_reqwest_error(e: reqwest::Error) -> CaError {
    if e.is_timeout() {
        CaError::Connection(e.to_string())
    } else if e.is_connect() {
        CaError::Connection(e.to_string())
    } else {
        CaError::Tls(e.to_string())
    }
}
