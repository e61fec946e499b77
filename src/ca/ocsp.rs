//! OCSP signer.
//!
//! Produces a signed OCSP response for a previously issued certificate,
//! guarded by the same fault tracker as certificate issuance.

use crate::ca::der;
use crate::ca::fault::FaultTracker;
use crate::ca::issuer::SigningBackend;
use crate::ca::profile::SigningProfile;
use crate::error::{CaError, Result};
use crate::types::CertificateStatus;
use sha1::{Digest, Sha1};
use x509_parser::prelude::FromDer;

const OID_OCSP_BASIC: &str = "1.3.6.1.5.5.7.48.1.1";
const OID_SHA1: &str = "1.3.14.3.2.26";

/// Generates a signed DER-encoded OCSP response for `cert_der`, whose
/// status is `status`. `thisUpdate = now`; `nextUpdate = now +
/// profile.ocsp_lifespan`. Always signed with the same issuer key and
/// certificate as the certificate itself.
pub async fn generate_ocsp(
    cert_der: &[u8],
    status: CertificateStatus,
    profile: &SigningProfile,
    fault: &FaultTracker,
    backend: &dyn SigningBackend,
) -> Result<Vec<u8>> {
    fault.check()?;

    let (_, cert) = x509_parser::certificate::X509Certificate::from_der(cert_der)
        .map_err(|e| CaError::MalformedRequest(format!("could not parse certificate: {e}")))?;

    let issuer_der = backend.issuer_certificate_der();
    let (_, issuer_cert) = x509_parser::certificate::X509Certificate::from_der(issuer_der)
        .map_err(|e| CaError::InternalServer(format!("could not parse issuer certificate: {e}")))?;

    let issuer_name_hash = Sha1::digest(issuer_cert.subject().as_raw());
    let issuer_key_hash = Sha1::digest(issuer_cert.public_key().raw);

    let now = time::OffsetDateTime::now_utc();
    let next_update = now + profile.ocsp_lifespan;

    let cert_id = der::sequence(&der::concat(&[
        der::sequence(&der::oid(OID_SHA1)),
        der::octet_string(&issuer_name_hash),
        der::octet_string(&issuer_key_hash),
        der::integer(cert.raw_serial()),
    ]));

    let cert_status = match status {
        CertificateStatus::Good => der::tlv(0x80, &[]),   // good [0] IMPLICIT NULL
        CertificateStatus::Revoked => der::tlv(0x81, &[]), // simplified: no revocation reason/time
    };

    let single_response = der::sequence(&der::concat(&[
        cert_id,
        cert_status,
        der::generalized_time(now),
        der::context_explicit(0, &der::generalized_time(next_update)),
    ]));

    let responder_id = der::tlv(0xA2, &der::octet_string(&issuer_key_hash)); // byKey [2]

    let tbs_response_data = der::sequence(&der::concat(&[
        responder_id,
        der::generalized_time(now),
        der::sequence(&single_response),
    ]));

    let signature = match backend.sign(&tbs_response_data).await {
        Ok(sig) => sig,
        Err(message) => {
            fault.record();
            return Err(CaError::HsmFault(message));
        }
    };

    let basic_response = der::sequence(&der::concat(&[
        tbs_response_data,
        backend.signature_algorithm_der(),
        der::bit_string(&signature),
    ]));

    let response_bytes = der::sequence(&der::concat(&[
        der::oid(OID_OCSP_BASIC),
        der::octet_string(&basic_response),
    ]));

    Ok(der::sequence(&der::concat(&[
        der::tlv(0x0A, &[0]), // responseStatus ENUMERATED successful(0)
        der::context_explicit(0, &response_bytes),
    ])))
}
