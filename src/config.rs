//! Configuration
//!
//! Typed, validated configuration for the signing profile and the
//! validation authority, loaded from TOML.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration for an embedding process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Signing profile configuration.
    pub profile: SigningProfileConfig,
    /// Validation authority configuration.
    pub va: VaConfig,
}

/// On-disk form of [`crate::ca::profile::SigningProfile`]; durations are
/// serialized as human strings (`"8760h"`, `"45m"`) the way the original
/// issuance profile expressed them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningProfileConfig {
    /// CFSSL-style signing profile name, e.g. `"ee"`.
    pub name: String,
    /// One byte prepended to every issued serial. `0` is forbidden.
    pub serial_prefix: u8,
    /// Certificate validity duration, e.g. `"8760h"`.
    pub expiry: String,
    /// Backdate applied to `notBefore`, e.g. `"1h"`.
    pub backdate: String,
    /// OCSP response validity, e.g. `"45m"`.
    pub ocsp_lifespan: String,
    /// Maximum DNS names per certificate.
    pub max_names: usize,
    /// Timeout after a signing fault during which the signer is
    /// considered unavailable.
    pub hsm_fault_timeout: String,
    /// OIDs of CSR extension requests this profile will honor.
    pub allowed_extensions: Vec<String>,
    /// Certificate-policy OIDs to assert in issued certificates.
    pub certificate_policies: Vec<String>,
    /// AIA issuer (CA Issuers) URL.
    pub issuer_url: String,
    /// OCSP responder URL.
    pub ocsp_url: String,
    /// CRL distribution point URL.
    pub crl_url: String,
    /// Path to the issuer (intermediate) certificate, PEM.
    pub issuer_cert_path: PathBuf,
    /// Path to the issuer private key, PEM.
    pub issuer_key_path: PathBuf,
}

/// Validation authority configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaConfig {
    /// When true, challenge hosts are replaced with `localhost:5001` and
    /// only identifiers matching the test suffix are resolved.
    #[serde(default)]
    pub test_mode: bool,
    /// DNS resolver socket addresses, e.g. `["127.0.0.1:53"]`.
    pub dns_resolvers: Vec<String>,
    /// Domain name CAA `issue` records must match for this CA to be
    /// willing to issue.
    pub issuer_domain: String,
    /// `User-Agent` header sent on outbound HTTP challenge fetches.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_user_agent() -> String {
    format!("acme-core-va/{}", env!("CARGO_PKG_VERSION"))
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))?;
        Ok(())
    }

    /// Validates every enumerated constraint in the configuration schema.
    /// A malformed or missing required field is a startup failure.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.profile.validate()?;

        if self.va.dns_resolvers.is_empty() {
            return Err(ConfigError::Invalid(
                "va.dns_resolvers must list at least one resolver".to_string(),
            ));
        }
        if self.va.issuer_domain.is_empty() {
            return Err(ConfigError::Invalid(
                "va.issuer_domain must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Creates an example configuration file for operators to adapt.
    pub fn create_example(path: &Path) -> Result<(), ConfigError> {
        let example = Config {
            profile: SigningProfileConfig {
                name: "ee".to_string(),
                serial_prefix: 17,
                expiry: "8760h".to_string(),
                backdate: "1h".to_string(),
                ocsp_lifespan: "45m".to_string(),
                max_names: 100,
                hsm_fault_timeout: "60s".to_string(),
                allowed_extensions: vec!["1.3.6.1.5.5.7.1.24".to_string()],
                certificate_policies: vec!["2.23.140.1.2.1".to_string()],
                issuer_url: "http://cert.example.com/ca.crt".to_string(),
                ocsp_url: "http://ocsp.example.com".to_string(),
                crl_url: "http://crl.example.com/ca.crl".to_string(),
                issuer_cert_path: PathBuf::from("/etc/acme-core/issuer.crt"),
                issuer_key_path: PathBuf::from("/etc/acme-core/issuer.key"),
            },
            va: VaConfig {
                test_mode: false,
                dns_resolvers: vec!["127.0.0.1:53".to_string()],
                issuer_domain: "example.com".to_string(),
                user_agent: default_user_agent(),
            },
        };

        example.save(path)
    }
}

impl SigningProfileConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.serial_prefix == 0 {
            return Err(ConfigError::Invalid(
                "profile.serial_prefix must be in [1, 255]; 0 is forbidden".to_string(),
            ));
        }
        if self.max_names == 0 || self.max_names > 100 {
            return Err(ConfigError::Invalid(
                "profile.max_names must be in [1, 100]".to_string(),
            ));
        }
        parse_duration(&self.expiry)?;
        parse_duration(&self.backdate)?;
        parse_duration(&self.ocsp_lifespan)?;
        parse_duration(&self.hsm_fault_timeout)?;
        if self.issuer_cert_path.as_os_str().is_empty() || self.issuer_key_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "profile.issuer_cert_path and issuer_key_path are required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parses a Go-style duration string (`"8760h"`, `"45m"`, `"60s"`). Only
/// a single unit suffix is supported, matching the strings this
/// configuration schema actually uses.
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(ConfigError::Invalid("empty duration".to_string()));
    }
    let (digits, unit) = s.split_at(s.len() - 1);
    let value: u64 = digits
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("invalid duration: {s}")))?;
    match unit {
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 3600)),
        _ => Err(ConfigError::Invalid(format!("unsupported duration unit in: {s}"))),
    }
}
