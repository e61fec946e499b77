//! Compact-serialization JWS parsing and verification.
//!
//! Only what the validators need: decode the payload, verify the
//! signature under the applicant's account key, and expose the raw
//! signature bytes (needed to derive the TLS-SNI `ZName`).

use crate::error::{CaError, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::signature::Verifier;
use rsa::RsaPublicKey;
use sha2::Sha256;

/// A parsed compact JWS: `protected.payload.signature`.
pub struct CompactJws {
    protected_b64: String,
    payload_b64: String,
    signature: Vec<u8>,
    payload: Vec<u8>,
}

impl CompactJws {
    /// Splits and base64url-decodes `compact`. Does not verify the
    /// signature - call [`CompactJws::verify`] for that.
    pub fn parse(compact: &str) -> Result<Self> {
        let mut parts = compact.split('.');
        let (Some(protected_b64), Some(payload_b64), Some(signature_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(CaError::MalformedRequest("malformed JWS compact serialization".to_string()));
        };

        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|e| CaError::MalformedRequest(format!("invalid JWS payload encoding: {e}")))?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|e| CaError::MalformedRequest(format!("invalid JWS signature encoding: {e}")))?;

        Ok(Self {
            protected_b64: protected_b64.to_string(),
            payload_b64: payload_b64.to_string(),
            signature,
            payload,
        })
    }

    /// The decoded JSON payload.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// The raw, undecoded base64url signature text - the exact bytes
    /// the TLS-SNI `ZName` is hashed from.
    pub fn signature_b64_text(&self) -> String {
        URL_SAFE_NO_PAD.encode(&self.signature)
    }

    /// Verifies the signature over `protected.payload` under `account_key`
    /// using RS256 (PKCS#1 v1.5 with SHA-256), as every challenge in this
    /// protocol is signed.
    pub fn verify(&self, account_key: &RsaPublicKey) -> Result<()> {
        let signing_input = format!("{}.{}", self.protected_b64, self.payload_b64);
        let verifying_key = VerifyingKey::<Sha256>::new(account_key.clone());
        let signature = Signature::try_from(self.signature.as_slice())
            .map_err(|e| CaError::Unauthorized(format!("malformed JWS signature: {e}")))?;
        verifying_key
            .verify(signing_input.as_bytes(), &signature)
            .map_err(|_| CaError::Unauthorized("JWS signature does not verify under account key".to_string()))
    }
}

/// Derives the TLS-SNI synthetic name from a challenge's JWS:
/// `Z = hex(sha256(base64url(signature)))`, `ZName = Z[0:32].Z[32:64].acme.invalid`.
pub fn zname(jws: &CompactJws) -> String {
    use sha2::Digest;
    let encoded_sig = jws.signature_b64_text();
    let z = hex::encode(Sha256::digest(encoded_sig.as_bytes()));
    format!("{}.{}.acme.invalid", &z[0..32], &z[32..64])
}
