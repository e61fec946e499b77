//! Error taxonomy for the certificate authority and validation authority.

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CaError>;

/// Error taxonomy surfaced to callers of the CA and VA.
///
/// Variants map one-to-one onto the error classes a caller must distinguish
/// on: retry (`Connection`, `ServerInternal`), client fault (`MalformedRequest`,
/// `Unauthorized`), or operator fault (`InternalServer`, `HSMFault`,
/// `HSMUnavailable`). Detail strings are part of the stable surface - HSM
/// fault messages in particular are forwarded verbatim from the signing
/// backend.
#[derive(Error, Debug)]
pub enum CaError {
    /// Client input violates policy (no names, too many names, weak key,
    /// weak signature algorithm, unsupported critical extension, bad
    /// identifier type, bad token).
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// Proof-of-control failed (wrong token, missing TXT, CAA forbids).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// DNS resolution empty or NXDOMAIN during validation.
    #[error("unknown host: {0}")]
    UnknownHost(String),

    /// TCP refused, reset, or timed out.
    #[error("connection error: {0}")]
    Connection(String),

    /// TLS handshake failed or presented certificate is wrong.
    #[error("TLS error: {0}")]
    Tls(String),

    /// DNS response failed DNSSEC validation.
    #[error("DNSSEC validation failed: {0}")]
    Dnssec(String),

    /// Local configuration or no resolvers configured.
    #[error("server internal error: {0}")]
    ServerInternal(String),

    /// CA-side invariant violation (e.g. would-issue-past-intermediate).
    #[error("internal server error: {0}")]
    InternalServer(String),

    /// Signing backend returned an error; message is forwarded verbatim.
    #[error("{0}")]
    HsmFault(String),

    /// Fault window still open.
    #[error("HSM is unavailable")]
    HsmUnavailable,

    /// Wraps an I/O failure not otherwise classified.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be loaded or failed validation.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

impl CaError {
    /// The stable error-class name, used for logging and for the
    /// `Challenge.Error.Type` field.
    pub fn class_name(&self) -> &'static str {
        match self {
            CaError::MalformedRequest(_) => "MalformedRequest",
            CaError::Unauthorized(_) => "Unauthorized",
            CaError::UnknownHost(_) => "UnknownHost",
            CaError::Connection(_) => "Connection",
            CaError::Tls(_) => "TLS",
            CaError::Dnssec(_) => "DNSSEC",
            CaError::ServerInternal(_) => "ServerInternal",
            CaError::InternalServer(_) => "InternalServer",
            CaError::HsmFault(_) => "HSMFault",
            CaError::HsmUnavailable => "HSMUnavailable",
            CaError::Io(_) => "ServerInternal",
            CaError::Configuration(_) => "ServerInternal",
        }
    }
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("I/O error: {0}")]
    Io(String),

    /// The configuration file could not be parsed as TOML.
    #[error("parse error: {0}")]
    Parse(String),

    /// The configuration could not be serialized.
    #[error("serialize error: {0}")]
    Serialize(String),

    /// A field failed validation.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
