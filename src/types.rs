//! Shared data model types for the CA and VA.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A certificate serial number: one prefix byte plus 15 random bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Serial(pub [u8; 16]);

impl Serial {
    /// Renders the serial the way the storage authority expects it as a
    /// primary key: lowercased hex, no leading zeros, prefixed with an
    /// extra `"0"` if the high bit of the first byte is set (to avoid
    /// sign ambiguity when the hex is reinterpreted as a signed integer).
    pub fn storage_key(&self) -> String {
        let mut s = hex::encode(self.0);
        if self.0[0] & 0x80 != 0 {
            s.insert(0, '0');
        }
        s
    }

    /// The configured prefix byte, i.e. the serial's high byte.
    pub fn prefix(&self) -> u8 {
        self.0[0]
    }
}

impl fmt::Display for Serial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.storage_key())
    }
}

/// Status of a persisted certificate, as tracked by the storage authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertificateStatus {
    /// Certificate is valid and unrevoked.
    Good,
    /// Certificate has been revoked.
    Revoked,
}

/// A sanitized, policy-approved certificate signing request, ready for
/// the issuer.
#[derive(Debug, Clone)]
pub struct SanitizedCsr {
    /// Lowercased, deduplicated DNS names, in first-seen order.
    pub names: Vec<String>,
    /// Output common name (one of `names`).
    pub common_name: String,
    /// The subject public key, as DER `SubjectPublicKeyInfo`.
    pub public_key_der: Vec<u8>,
    /// Whether the CSR requested the TLS-Feature (Must-Staple) extension.
    pub must_staple: bool,
    /// The original, unmodified DER-encoded CSR.
    pub original_der: Vec<u8>,
}

/// A certificate freshly produced by the issuer.
#[derive(Debug, Clone)]
pub struct IssuedCertificate {
    /// DER-encoded certificate.
    pub der: Vec<u8>,
    /// Assigned serial.
    pub serial: Serial,
    /// Registration ID the certificate was issued for.
    pub registration_id: u64,
}

/// Identifier type an authorization can name. Only `Dns` is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierType {
    /// A DNS name.
    Dns,
}

/// A (type, value) pair naming the resource being authorized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    /// The identifier's type.
    #[serde(rename = "type")]
    pub kind: IdentifierType,
    /// The identifier's value, lowercased if it is a DNS name.
    pub value: String,
}

impl Identifier {
    /// Builds a DNS identifier, lowercasing the name.
    pub fn dns(name: impl Into<String>) -> Self {
        Self {
            kind: IdentifierType::Dns,
            value: name.into().to_ascii_lowercase(),
        }
    }
}

/// The proof-of-control protocol a [`Challenge`] exercises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChallengeType {
    /// HTTP token retrieval at a well-known URL.
    SimpleHttp,
    /// TLS handshake requesting a synthetic SNI name.
    Dvsni,
    /// DNS TXT record at an `_acme-challenge` label.
    Dns,
}

/// Lifecycle status of a challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeStatus {
    /// Not yet attempted.
    Pending,
    /// Validation in progress.
    Processing,
    /// Validation succeeded.
    Valid,
    /// Validation failed; `Challenge::error` is populated.
    Invalid,
}

/// A validation failure attached to a challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeError {
    /// The stable error-class name (see [`crate::error::CaError::class_name`]).
    #[serde(rename = "type")]
    pub kind: String,
    /// A human-readable detail string.
    pub detail: String,
}

/// A JWS-style structure binding a challenge token to the applicant's
/// account key. Only the pieces the validators need are modeled; full JWS
/// parsing lives in [`crate::va::jws`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Validation {
    /// The compact-serialization JWS: `protected.payload.signature`.
    pub compact: String,
}

/// A specific proof-of-control protocol attached to an authorization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    /// Which protocol this challenge exercises.
    #[serde(rename = "type")]
    pub kind: ChallengeType,
    /// Base64url token, decoding to at least 16 bytes of entropy.
    pub token: String,
    /// For `simpleHttp`: whether the applicant's server should be probed
    /// over TLS.
    pub tls: Option<bool>,
    /// The signed binding of token to account key.
    pub validation: Option<Validation>,
    /// Current lifecycle status.
    pub status: ChallengeStatus,
    /// Populated iff `status == Invalid`.
    pub error: Option<ChallengeError>,
}

impl Challenge {
    /// Marks the challenge valid, clearing any prior error.
    pub fn mark_valid(&mut self) {
        self.status = ChallengeStatus::Valid;
        self.error = None;
    }

    /// Marks the challenge invalid with the given error class and detail.
    pub fn mark_invalid(&mut self, kind: &str, detail: impl Into<String>) {
        self.status = ChallengeStatus::Invalid;
        self.error = Some(ChallengeError {
            kind: kind.to_string(),
            detail: detail.into(),
        });
    }
}

/// An identifier plus its challenges, as handed to the validation
/// dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Authorization {
    /// Opaque identifier for this authorization, assigned by the
    /// registration authority.
    #[serde(default = "new_authorization_id")]
    pub id: uuid::Uuid,
    /// The identifier being authorized.
    pub identifier: Identifier,
    /// The challenges offered for this authorization.
    pub challenges: Vec<Challenge>,
    /// The registration this authorization belongs to.
    pub registration_id: u64,
}

fn new_authorization_id() -> uuid::Uuid {
    uuid::Uuid::new_v4()
}

/// Outcome of a CAA lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaaResult {
    /// Whether a CAA record set was found at any ancestor zone.
    pub present: bool,
    /// Whether issuance is permitted by the discovered record set.
    pub valid: bool,
}
