//! Shared fixture builders for integration tests.
//!
//! Hand-builds minimal PKCS#10 CSRs and self-signed X.509 certificates
//! using the crate's own DER primitives, avoiding a dependency on an
//! external CSR-building crate purely for test fixtures.

use acme_core::ca::der;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rsa::pkcs1v15::{Pkcs1v15Sign, SigningKey};
use rsa::pkcs8::EncodePublicKey;
use rsa::signature::{RandomizedSigner, SignatureEncoding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Installs this crate's default tracing formatter once per test
/// binary, so validator/issuer logs surface under `cargo test --
/// --nocapture` instead of being silently dropped.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| acme_core::init_tracing(true));
}

const OID_SHA256_WITH_RSA: &str = "1.2.840.113549.1.1.11";
const OID_COMMON_NAME: &str = "2.5.4.3";
const OID_EXTENSION_REQUEST: &str = "1.2.840.113549.1.9.14";
const OID_SUBJECT_ALT_NAME: &str = "2.5.29.17";
const OID_TLS_FEATURE: &str = "1.3.6.1.5.5.7.1.24";

/// Generates an RSA key pair of the given modulus size.
pub fn rsa_key(bits: usize) -> RsaPrivateKey {
    init_tracing();
    RsaPrivateKey::new(&mut rand::thread_rng(), bits).expect("RSA key generation")
}

fn subject_public_key_info_der(public_key: &RsaPublicKey) -> Vec<u8> {
    public_key
        .to_public_key_der()
        .expect("encode SubjectPublicKeyInfo")
        .as_bytes()
        .to_vec()
}

fn name_der(cn: &str) -> Vec<u8> {
    der::sequence(&der::set(&der::sequence(&der::concat(&[
        der::oid(OID_COMMON_NAME),
        der::utf8_string(cn),
    ]))))
}

fn sign_with(key: &RsaPrivateKey, data: &[u8]) -> Vec<u8> {
    let digest = Sha256::digest(data);
    key.sign(Pkcs1v15Sign::new::<Sha256>(), &digest).expect("RSA sign")
}

fn sha256_with_rsa_der() -> Vec<u8> {
    der::sequence(&der::concat(&[der::oid(OID_SHA256_WITH_RSA), vec![0x05, 0x00]]))
}

/// Builds a DER-encoded PKCS#10 CSR signed by `key`, with optional CN,
/// SAN DNS names, and an optional TLS-Feature (Must-Staple) extension
/// request.
pub fn build_csr(key: &RsaPrivateKey, cn: Option<&str>, sans: &[&str], must_staple: bool) -> Vec<u8> {
    let mut extra = Vec::new();
    if must_staple {
        extra.push((OID_TLS_FEATURE.to_string(), false, vec![0x30, 0x03, 0x02, 0x01, 0x05]));
    }
    build_csr_with(key, cn, sans, &extra, &sha256_with_rsa_der())
}

/// Builds a DER-encoded CSR whose outer `signatureAlgorithm` field is
/// `sig_alg_oid` rather than the usual sha256WithRSAEncryption, for
/// exercising the sanitizer's weak-algorithm rejection. The CRI itself
/// is still digested and signed with SHA-256 since the sanitizer never
/// verifies the CSR's signature bytes, only its algorithm identifier.
pub fn build_csr_with_signature_oid(key: &RsaPrivateKey, sig_alg_oid: &str, cn: Option<&str>, sans: &[&str]) -> Vec<u8> {
    let sig_alg_der = der::sequence(&der::concat(&[der::oid(sig_alg_oid), vec![0x05, 0x00]]));
    build_csr_with(key, cn, sans, &[], &sig_alg_der)
}

/// Builds a DER-encoded CSR with an arbitrary extra extension request
/// (oid, critical, value), for exercising the sanitizer's handling of
/// extensions outside the configured allow-list.
pub fn build_csr_with_extension(
    key: &RsaPrivateKey,
    cn: Option<&str>,
    sans: &[&str],
    extension_oid: &str,
    critical: bool,
    value: &[u8],
) -> Vec<u8> {
    let extra = vec![(extension_oid.to_string(), critical, value.to_vec())];
    build_csr_with(key, cn, sans, &extra, &sha256_with_rsa_der())
}

fn build_csr_with(
    key: &RsaPrivateKey,
    cn: Option<&str>,
    sans: &[&str],
    extra_extensions: &[(String, bool, Vec<u8>)],
    sig_alg_der: &[u8],
) -> Vec<u8> {
    let public_key = key.to_public_key();
    let spki = subject_public_key_info_der(&public_key);
    let subject = cn.map(name_der).unwrap_or_else(|| der::sequence(&[]));

    let mut extensions = Vec::new();
    if !sans.is_empty() {
        let names: Vec<u8> = sans.iter().flat_map(|n| der::general_name_ia5(2, n)).collect();
        extensions.push(der::extension(OID_SUBJECT_ALT_NAME, false, &der::sequence(&names)));
    }
    for (oid, critical, value) in extra_extensions {
        extensions.push(der::extension(oid, *critical, value));
    }
    let extension_request = der::tlv(
        0xA0,
        &der::set(&der::sequence(&der::concat(&[
            der::oid(OID_EXTENSION_REQUEST),
            der::set(&der::sequence(&extensions.concat())),
        ]))),
    );

    let cri = der::sequence(&der::concat(&[
        der::small_integer(0),
        subject,
        spki,
        extension_request,
    ]));

    let signature = sign_with(key, &cri);

    der::sequence(&der::concat(&[cri, sig_alg_der.to_vec(), der::bit_string(&signature)]))
}

/// Builds a minimal self-signed DER certificate usable as an issuer
/// fixture: just enough fields for `x509_parser` to extract subject,
/// public key, and validity.
pub fn build_self_signed_cert(key: &RsaPrivateKey, cn: &str, not_after: time::OffsetDateTime) -> Vec<u8> {
    let public_key = key.to_public_key();
    let spki = subject_public_key_info_der(&public_key);
    let name = name_der(cn);
    let not_before = time::OffsetDateTime::now_utc() - time::Duration::hours(1);

    let tbs = der::sequence(&der::concat(&[
        der::context_explicit(0, &der::small_integer(2)),
        der::small_integer(1),
        sha256_with_rsa_der(),
        name.clone(),
        der::sequence(&der::concat(&[der::generalized_time(not_before), der::generalized_time(not_after)])),
        name,
        spki,
    ]));

    let signature = sign_with(key, &tbs);

    der::sequence(&der::concat(&[tbs, sha256_with_rsa_der(), der::bit_string(&signature)]))
}

/// Builds an RS256 compact-serialization JWS over `payload_json`, signed
/// by `account_key` - the shape every challenge validator expects in its
/// `Validation.compact` / fetched body.
pub fn build_jws_compact(account_key: &RsaPrivateKey, payload_json: &str) -> String {
    let protected = URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256"}"#);
    let payload = URL_SAFE_NO_PAD.encode(payload_json);
    let signing_input = format!("{protected}.{payload}");

    let signing_key = SigningKey::<Sha256>::new(account_key.clone());
    let signature = signing_key.sign_with_rng(&mut rand::thread_rng(), signing_input.as_bytes());
    let signature_b64 = URL_SAFE_NO_PAD.encode(signature.to_bytes());

    format!("{protected}.{payload}.{signature_b64}")
}

/// A base64url token decoding to exactly 16 bytes, satisfying the
/// validators' minimum-entropy check.
pub fn sample_token() -> String {
    URL_SAFE_NO_PAD.encode([0x11u8; 16])
}
