//! Certificate issuer.
//!
//! Produces a signed DER certificate from a sanitized CSR. The actual
//! private-key operation is delegated to a [`SigningBackend`] - this
//! module only builds the to-be-signed structure and assembles the
//! final `Certificate` SEQUENCE around whatever signature comes back.

use crate::ca::der;
use crate::ca::fault::FaultTracker;
use crate::ca::profile::{SigningProfile, MUST_STAPLE_VALUE, OID_TLS_FEATURE};
use crate::error::{CaError, Result};
use crate::types::{IssuedCertificate, SanitizedCsr, Serial};
use async_trait::async_trait;
use rand::RngCore;
use sha1::{Digest, Sha1};
use x509_parser::prelude::FromDer;

const OID_EXT_KEY_USAGE: &str = "2.5.29.37";
const OID_BASIC_CONSTRAINTS: &str = "2.5.29.19";
const OID_SUBJECT_KEY_IDENTIFIER: &str = "2.5.29.14";
const OID_AUTHORITY_KEY_IDENTIFIER: &str = "2.5.29.35";
const OID_SUBJECT_ALT_NAME: &str = "2.5.29.17";
const OID_CRL_DISTRIBUTION_POINTS: &str = "2.5.29.31";
const OID_AUTHORITY_INFO_ACCESS: &str = "1.3.6.1.5.5.7.1.1";
const OID_CERTIFICATE_POLICIES: &str = "2.5.29.32";
const OID_SERVER_AUTH: &str = "1.3.6.1.5.5.7.3.1";
const OID_COMMON_NAME: &str = "2.5.4.3";
const OID_AIA_OCSP: &str = "1.3.6.1.5.5.7.48.1";
const OID_AIA_CA_ISSUERS: &str = "1.3.6.1.5.5.7.48.2";

/// Abstracts the hardware module holding the CA's signing key.
///
/// In production this forwards to real hardware (a PKCS#11 token, a
/// cloud HSM); the trait boundary exists so the issuer and OCSP signer
/// never touch key material directly, and so tests can inject faults
/// without a real device. Any `Err` returned from [`SigningBackend::sign`]
/// is always treated as an HSM fault - the message is forwarded
/// verbatim to the caller.
#[async_trait]
pub trait SigningBackend: Send + Sync {
    /// DER bytes of the issuer's own certificate - used to populate
    /// `AuthorityKeyIdentifier`, to check the `notAfter` precondition,
    /// and as the OCSP responder certificate.
    fn issuer_certificate_der(&self) -> &[u8];

    /// Signs `tbs` (a to-be-signed DER structure), returning the raw
    /// signature bytes.
    async fn sign(&self, tbs: &[u8]) -> std::result::Result<Vec<u8>, String>;

    /// The DER encoding of the `AlgorithmIdentifier` this backend signs
    /// with (e.g. `sha256WithRSAEncryption`).
    fn signature_algorithm_der(&self) -> Vec<u8>;
}

/// Produces a signed DER certificate for `sanitized`, guarded by
/// `fault`. Does not touch the storage authority or publisher - callers
/// that need §4.D's full persist-and-publish behavior should use
/// [`crate::ca::CertificateAuthority::issue_certificate`].
pub async fn issue(
    sanitized: &SanitizedCsr,
    registration_id: u64,
    profile: &SigningProfile,
    fault: &FaultTracker,
    backend: &dyn SigningBackend,
) -> Result<IssuedCertificate> {
    fault.check()?;

    let issuer_der = backend.issuer_certificate_der();
    let (_, issuer_cert) = x509_parser::certificate::X509Certificate::from_der(issuer_der)
        .map_err(|e| CaError::InternalServer(format!("could not parse issuer certificate: {e}")))?;

    let now = time::OffsetDateTime::now_utc();
    let not_before = now - profile.backdate;
    let not_after = not_before + profile.validity;

    let issuer_not_after = issuer_cert.validity().not_after.to_datetime();
    if not_after > issuer_not_after {
        return Err(CaError::InternalServer(
            "cannot issue a certificate that expires after the intermediate certificate".to_string(),
        ));
    }

    let serial = generate_serial(profile.serial_prefix);

    let tbs = build_tbs_certificate(
        sanitized,
        profile,
        issuer_cert.subject().as_raw(),
        issuer_cert.public_key().raw,
        serial,
        not_before,
        not_after,
        &backend.signature_algorithm_der(),
    );

    let signature = match backend.sign(&tbs).await {
        Ok(sig) => sig,
        Err(message) => {
            fault.record();
            return Err(CaError::HsmFault(message));
        }
    };

    let der_bytes = der::sequence(&der::concat(&[
        tbs,
        backend.signature_algorithm_der(),
        der::bit_string(&signature),
    ]));

    Ok(IssuedCertificate {
        der: der_bytes,
        serial,
        registration_id,
    })
}

/// Generates a serial with the configured prefix byte and 15
/// cryptographically random bytes.
pub fn generate_serial(prefix: u8) -> Serial {
    let mut bytes = [0u8; 16];
    bytes[0] = prefix;
    rand::thread_rng().fill_bytes(&mut bytes[1..]);
    Serial(bytes)
}

#[allow(clippy::too_many_arguments)]
fn build_tbs_certificate(
    sanitized: &SanitizedCsr,
    profile: &SigningProfile,
    issuer_name_raw: &[u8],
    issuer_public_key_der: &[u8],
    serial: Serial,
    not_before: time::OffsetDateTime,
    not_after: time::OffsetDateTime,
    signature_algorithm_der: &[u8],
) -> Vec<u8> {
    let version = der::context_explicit(0, &der::small_integer(2)); // v3
    let serial_der = der::integer(&serial.0);
    let validity = der::sequence(&der::concat(&[
        der::generalized_time(not_before),
        der::generalized_time(not_after),
    ]));
    let subject = der::sequence(&der::set(&der::sequence(&der::concat(&[
        der::oid(OID_COMMON_NAME),
        der::utf8_string(&sanitized.common_name),
    ]))));

    let extensions = build_extensions(sanitized, profile, issuer_public_key_der, &sanitized.public_key_der);
    let extensions_field = der::context_explicit(3, &der::sequence(&der::concat(&extensions)));

    der::sequence(&der::concat(&[
        version,
        serial_der,
        signature_algorithm_der.to_vec(),
        issuer_name_raw.to_vec(),
        validity,
        subject,
        sanitized.public_key_der.clone(),
        extensions_field,
    ]))
}

fn build_extensions(
    sanitized: &SanitizedCsr,
    profile: &SigningProfile,
    issuer_public_key_der: &[u8],
    subject_public_key_der: &[u8],
) -> Vec<Vec<u8>> {
    let mut extensions = Vec::new();

    // extKeyUsage = serverAuth
    extensions.push(der::extension(
        OID_EXT_KEY_USAGE,
        false,
        &der::sequence(&der::oid(OID_SERVER_AUTH)),
    ));

    // basicConstraints: CA=false (DEFAULT elided, empty SEQUENCE), critical.
    extensions.push(der::extension(OID_BASIC_CONSTRAINTS, true, &der::sequence(&[])));

    // subjectKeyIdentifier: SHA-1 over the subject's SubjectPublicKeyInfo.
    let ski = Sha1::digest(subject_public_key_der);
    extensions.push(der::extension(
        OID_SUBJECT_KEY_IDENTIFIER,
        false,
        &der::octet_string(&ski),
    ));

    // authorityKeyIdentifier: SHA-1 over the issuer's SubjectPublicKeyInfo,
    // carried as the [0] IMPLICIT keyIdentifier field.
    let aki_hash = Sha1::digest(issuer_public_key_der);
    let aki_key_id = der::tlv(0x80, &aki_hash); // [0] IMPLICIT OCTET STRING
    let aki_value = der::sequence(&aki_key_id);
    extensions.push(der::extension(OID_AUTHORITY_KEY_IDENTIFIER, false, &aki_value));

    // subjectAltName: one dNSName GeneralName per sanitized name.
    let san_names: Vec<u8> = sanitized
        .names
        .iter()
        .flat_map(|n| der::general_name_ia5(2, n))
        .collect();
    extensions.push(der::extension(OID_SUBJECT_ALT_NAME, false, &der::sequence(&san_names)));

    // cRLDistributionPoints: one DistributionPoint with a single URI fullName.
    let uri = der::general_name_ia5(6, &profile.crl_url);
    let full_name = der::context_implicit_constructed(0, &uri);
    let distribution_point_name = der::context_explicit(0, &full_name);
    let distribution_point = der::sequence(&distribution_point_name);
    extensions.push(der::extension(
        OID_CRL_DISTRIBUTION_POINTS,
        false,
        &der::sequence(&distribution_point),
    ));

    // authorityInfoAccess: OCSP responder + CA issuers URL.
    let ocsp_access = der::sequence(&der::concat(&[
        der::oid(OID_AIA_OCSP),
        der::general_name_ia5(6, &profile.ocsp_url),
    ]));
    let issuer_access = der::sequence(&der::concat(&[
        der::oid(OID_AIA_CA_ISSUERS),
        der::general_name_ia5(6, &profile.issuer_url),
    ]));
    extensions.push(der::extension(
        OID_AUTHORITY_INFO_ACCESS,
        false,
        &der::sequence(&der::concat(&[ocsp_access, issuer_access])),
    ));

    // certificatePolicies: one PolicyInformation per configured policy OID.
    let policies: Vec<u8> = profile
        .certificate_policies
        .iter()
        .flat_map(|p| der::sequence(&der::oid(p)))
        .collect();
    extensions.push(der::extension(OID_CERTIFICATE_POLICIES, false, &der::sequence(&policies)));

    // TLS-Feature / Must-Staple: emitted whenever the CSR requested the
    // extension at all, regardless of its content. Preserved from the
    // source behavior; see design notes on over-permissiveness.
    if sanitized.must_staple {
        extensions.push(der::extension(OID_TLS_FEATURE, false, &MUST_STAPLE_VALUE));
    }

    extensions
}
