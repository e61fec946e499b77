//! CSR sanitizer.
//!
//! Normalizes names, enforces policy, and rejects malformed or
//! over-permissive requests before a CSR is allowed anywhere near the
//! issuer.

use crate::ca::profile::{SigningProfile, OID_TLS_FEATURE};
use crate::collaborators::PolicyAuthority;
use crate::error::{CaError, Result};
use crate::types::SanitizedCsr;
use x509_parser::certification_request::{ParsedCriAttribute, X509CertificationRequest};
use x509_parser::extensions::{GeneralName, ParsedExtension};
use x509_parser::prelude::FromDer;
use x509_parser::public_key::PublicKey;

/// Signature algorithm OIDs this CA will accept on an incoming CSR.
/// SHA-1-based algorithms are deliberately excluded.
const ALLOWED_SIGNATURE_ALGORITHMS: &[&str] = &[
    "1.2.840.113549.1.1.11", // sha256WithRSAEncryption
    "1.2.840.113549.1.1.12", // sha384WithRSAEncryption
    "1.2.840.113549.1.1.13", // sha512WithRSAEncryption
    "1.2.840.10045.4.3.2",   // ecdsa-with-SHA256
    "1.2.840.10045.4.3.3",   // ecdsa-with-SHA384
];

/// OID of the SAN extension, for recognizing it among CSR extension
/// requests (it is handled separately from the generic allow-list).
const OID_SUBJECT_ALT_NAME: &str = "2.5.29.17";

/// Normalizes and validates a DER-encoded CSR against the active
/// signing profile and the policy authority, producing a
/// [`SanitizedCsr`] ready for the issuer.
pub async fn sanitize(
    csr_der: &[u8],
    profile: &SigningProfile,
    policy: &dyn PolicyAuthority,
) -> Result<SanitizedCsr> {
    let (_, csr) = X509CertificationRequest::from_der(csr_der)
        .map_err(|e| CaError::MalformedRequest(format!("could not parse CSR: {e}")))?;

    let sig_alg_oid = csr.signature_algorithm.algorithm.to_id_string();
    if !ALLOWED_SIGNATURE_ALGORITHMS.contains(&sig_alg_oid.as_str()) {
        return Err(CaError::MalformedRequest(format!(
            "weak signature algorithm: {sig_alg_oid}"
        )));
    }

    let public_key_der = csr.certification_request_info.subject_pki.raw.to_vec();

    match csr.certification_request_info.subject_pki.parsed() {
        Ok(PublicKey::RSA(rsa)) => {
            let bits = rsa_modulus_bits(rsa.modulus);
            if bits < crate::ca::profile::MIN_RSA_MODULUS_BITS {
                return Err(CaError::MalformedRequest(format!(
                    "key too short: {bits}-bit RSA key below policy floor"
                )));
            }
        }
        Ok(_) => {}
        Err(e) => {
            return Err(CaError::MalformedRequest(format!(
                "could not parse subject public key: {e:?}"
            )));
        }
    }

    let mut names: Vec<String> = Vec::new();
    let mut seen = std::collections::HashSet::new();

    let cn = csr
        .certification_request_info
        .subject
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(|s| s.to_ascii_lowercase());

    if let Some(ref cn) = cn {
        if !cn.is_empty() && seen.insert(cn.clone()) {
            names.push(cn.clone());
        }
    }

    let mut must_staple = false;

    for attr in csr.certification_request_info.attributes.iter() {
        let ParsedCriAttribute::ExtensionRequest(extensions) = attr.parsed_attribute() else {
            continue;
        };

        for ext in extensions.extensions.iter() {
            let oid = ext.oid.to_id_string();

            if oid == OID_SUBJECT_ALT_NAME {
                if let Ok(ParsedExtension::SubjectAlternativeName(san)) = ext.parsed_extension() {
                    for name in &san.general_names {
                        if let GeneralName::DNSName(dns) = name {
                            let lowered = dns.to_ascii_lowercase();
                            if seen.insert(lowered.clone()) {
                                names.push(lowered);
                            }
                        }
                    }
                }
                continue;
            }

            if oid == OID_TLS_FEATURE && profile.allows_extension(&oid) {
                must_staple = true;
                continue;
            }

            if !profile.allows_extension(&oid) {
                if ext.critical {
                    return Err(CaError::MalformedRequest(format!(
                        "unsupported extension: {oid}"
                    )));
                }
                // Unknown non-critical extension requests are silently
                // dropped.
            }
        }
    }

    if names.is_empty() {
        return Err(CaError::MalformedRequest("no names".to_string()));
    }
    if names.len() > profile.max_names {
        return Err(CaError::MalformedRequest("too many names".to_string()));
    }

    for name in &names {
        policy
            .willing_to_issue(name)
            .await
            .map_err(CaError::MalformedRequest)?;
    }

    let common_name = cn
        .filter(|cn| !cn.is_empty())
        .unwrap_or_else(|| names[0].clone());

    Ok(SanitizedCsr {
        names,
        common_name,
        public_key_der,
        must_staple,
        original_der: csr_der.to_vec(),
    })
}

fn rsa_modulus_bits(modulus: &[u8]) -> usize {
    let mut bytes = modulus;
    while bytes.first() == Some(&0) {
        bytes = &bytes[1..];
    }
    if bytes.is_empty() {
        return 0;
    }
    let leading = bytes[0].leading_zeros() as usize;
    bytes.len() * 8 - leading
}

#[cfg(test)]
mod tests {
    use super::rsa_modulus_bits;

    #[test]
    fn modulus_bit_length_rounds_to_significant_bits() {
        let mut modulus = vec![0u8; 256];
        modulus[0] = 0x80;
        assert_eq!(rsa_modulus_bits(&modulus), 2048);

        let short = vec![0xFF; 64];
        assert_eq!(rsa_modulus_bits(&short), 512);
    }
}
