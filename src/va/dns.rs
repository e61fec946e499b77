//! DNS (`dns-01`-style TXT) challenge validator. §4.H.

use crate::error::{CaError, Result};
use crate::types::{Challenge, Identifier, IdentifierType};
use crate::va::jws::{self, CompactJws};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::TokioAsyncResolver;
use rsa::RsaPublicKey;
use sha2::{Digest, Sha256};

/// Validates a `dns` challenge: the expected value is
/// `base64url(sha256(validation signature))`, matching the digest this
/// crate also uses to derive the TLS-SNI `ZName`'s input, published as
/// a TXT record at `_acme-challenge.{identifier}`.
pub async fn validate(
    resolver: &TokioAsyncResolver,
    identifier: &Identifier,
    challenge: &Challenge,
    account_key: &RsaPublicKey,
) -> Result<()> {
    if identifier.kind != IdentifierType::Dns {
        return Err(CaError::MalformedRequest("identifier type must be dns".to_string()));
    }

    let validation = challenge
        .validation
        .as_ref()
        .ok_or_else(|| CaError::MalformedRequest("dns challenge has no validation object".to_string()))?;
    let jws = CompactJws::parse(&validation.compact)?;
    jws.verify(account_key)?;

    let expected = URL_SAFE_NO_PAD.encode(Sha256::digest(jws.signature_b64_text().as_bytes()));

    let name = format!("_acme-challenge.{}.", identifier.value);
    let lookup = match resolver.txt_lookup(&name).await {
        Ok(lookup) => lookup,
        Err(e) => {
            return Err(match e.kind() {
                ResolveErrorKind::NoRecordsFound { .. } => {
                    CaError::Unauthorized(format!("no TXT record at {name}"))
                }
                // No configured servers answered at all - an operator
                // problem, not the domain's.
                ResolveErrorKind::NoConnections
                | ResolveErrorKind::Timeout
                | ResolveErrorKind::Message(_)
                | ResolveErrorKind::Msg(_) => CaError::ServerInternal(e.to_string()),
                // Everything else (bogus/insecure answers, malformed
                // responses) indicates the answer couldn't be trusted.
                _ => CaError::Dnssec(e.to_string()),
            });
        }
    };

    let found = lookup.iter().any(|txt| {
        txt.txt_data()
            .iter()
            .any(|chunk| std::str::from_utf8(chunk).map(|s| s == expected).unwrap_or(false))
    });

    if found {
        Ok(())
    } else {
        Err(CaError::Unauthorized(format!("no TXT record at {name} matched expected value")))
    }
}
