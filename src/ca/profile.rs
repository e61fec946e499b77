//! Signing profile: immutable issuance policy.

use crate::config::{parse_duration, SigningProfileConfig};
use crate::error::{CaError, Result};
use std::time::Duration;

/// TLS-Feature (Must-Staple) extension OID.
pub const OID_TLS_FEATURE: &str = "1.3.6.1.5.5.7.1.24";

/// DER encoding of the Must-Staple TLS-Feature value: a SEQUENCE
/// containing the single INTEGER `5` (status_request).
pub const MUST_STAPLE_VALUE: [u8; 5] = [0x30, 0x03, 0x02, 0x01, 0x05];

/// Policy floor for RSA modulus size, in bits.
pub const MIN_RSA_MODULUS_BITS: usize = 2048;

/// Immutable issuance policy, built once at CA startup and shared
/// read-only across every issuance and OCSP call thereafter.
///
/// Dynamic profile mutation from the source system (poking fields on a
/// live object) is replaced here by a builder (`SigningProfile::build`)
/// that validates every field exactly once.
#[derive(Debug, Clone)]
pub struct SigningProfile {
    /// Profile name, e.g. `"ee"`.
    pub name: String,
    /// Prepended to every serial's high byte.
    pub serial_prefix: u8,
    /// Certificate validity window.
    pub validity: Duration,
    /// Backdate subtracted from `notBefore`.
    pub backdate: Duration,
    /// OCSP response validity window.
    pub ocsp_lifespan: Duration,
    /// Maximum DNS names per certificate.
    pub max_names: usize,
    /// Timeout after an HSM fault during which the signer is
    /// unavailable.
    pub hsm_fault_timeout: Duration,
    /// OIDs of CSR extension requests this profile will honor.
    pub allowed_extensions: Vec<String>,
    /// Certificate-policy OIDs asserted in issued certificates.
    pub certificate_policies: Vec<String>,
    /// AIA CA-issuers URL.
    pub issuer_url: String,
    /// OCSP responder URL.
    pub ocsp_url: String,
    /// CRL distribution point URL.
    pub crl_url: String,
}

impl SigningProfile {
    /// Validates and builds a profile from its on-disk configuration
    /// form. `serialPrefix == 0` is a startup failure, matching the
    /// configuration schema's enumerated constraint.
    pub fn build(config: &SigningProfileConfig) -> Result<Self> {
        if config.serial_prefix == 0 {
            return Err(CaError::ServerInternal(
                "signing profile serial prefix must not be zero".to_string(),
            ));
        }
        if config.max_names == 0 || config.max_names > 100 {
            return Err(CaError::ServerInternal(
                "signing profile max_names must be in [1, 100]".to_string(),
            ));
        }

        let validity = parse_duration(&config.expiry)?;
        let backdate = parse_duration(&config.backdate)?;
        let ocsp_lifespan = parse_duration(&config.ocsp_lifespan)?;
        let hsm_fault_timeout = parse_duration(&config.hsm_fault_timeout)?;

        Ok(Self {
            name: config.name.clone(),
            serial_prefix: config.serial_prefix,
            validity,
            backdate,
            ocsp_lifespan,
            max_names: config.max_names,
            hsm_fault_timeout,
            allowed_extensions: config.allowed_extensions.clone(),
            certificate_policies: config.certificate_policies.clone(),
            issuer_url: config.issuer_url.clone(),
            ocsp_url: config.ocsp_url.clone(),
            crl_url: config.crl_url.clone(),
        })
    }

    /// Whether the given dotted OID string is a permitted CSR extension
    /// request.
    pub fn allows_extension(&self, oid: &str) -> bool {
        self.allowed_extensions.iter().any(|o| o == oid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sample() -> SigningProfileConfig {
        SigningProfileConfig {
            name: "ee".to_string(),
            serial_prefix: 17,
            expiry: "8760h".to_string(),
            backdate: "1h".to_string(),
            ocsp_lifespan: "45m".to_string(),
            max_names: 2,
            hsm_fault_timeout: "60s".to_string(),
            allowed_extensions: vec![OID_TLS_FEATURE.to_string()],
            certificate_policies: vec!["2.23.140.1.2.1".to_string()],
            issuer_url: "http://cert.example.com/ca.crt".to_string(),
            ocsp_url: "http://ocsp.example.com".to_string(),
            crl_url: "http://crl.example.com/ca.crl".to_string(),
            issuer_cert_path: PathBuf::from("issuer.crt"),
            issuer_key_path: PathBuf::from("issuer.key"),
        }
    }

    #[test]
    fn zero_serial_prefix_fails() {
        let mut config = sample();
        config.serial_prefix = 0;
        assert!(SigningProfile::build(&config).is_err());
    }

    #[test]
    fn valid_profile_builds() {
        let profile = SigningProfile::build(&sample()).unwrap();
        assert_eq!(profile.serial_prefix, 17);
        assert!(profile.allows_extension(OID_TLS_FEATURE));
        assert!(!profile.allows_extension("1.2.3.4"));
    }
}
