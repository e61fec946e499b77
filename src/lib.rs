//! # acme-core - issuance and validation core for an automated CA
//!
//! This crate implements the issuance and domain-control-validation
//! core of an automated, ACME-style certificate authority: a CSR
//! sanitizer and signer backed by a fault-tracked signing device, an
//! OCSP responder, and a validation authority that proves domain
//! control over HTTP, TLS-SNI, and DNS before an authorization is
//! accepted.
//!
//! ## Architecture
//!
//! - [`ca`] - the certificate authority: signing profile, fault
//!   tracker, CSR sanitizer, certificate issuer, OCSP signer, and the
//!   [`ca::CertificateAuthority`] orchestrator tying them together.
//! - [`va`] - the validation authority: HTTP/TLS-SNI/DNS challenge
//!   validators, CAA checking, JWS parsing, and the
//!   [`va::ValidationAuthority`] dispatcher.
//! - [`collaborators`] - trait boundaries to the storage authority,
//!   policy authority, publisher, and registration authority, each
//!   treated as an external system this crate does not implement.
//! - [`config`] - typed, validated TOML configuration.
//! - [`types`] - shared data model (serials, certificates, challenges,
//!   authorizations).
//! - [`error`] - the crate-wide error taxonomy.
//! - [`metrics`] - HSM fault counters.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod ca;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod metrics;
pub mod types;
pub mod va;

pub use error::{CaError, Result};

/// Installs a [`tracing_subscriber`] formatter writing to stdout, at
/// `DEBUG` when `verbose` else `INFO`. Safe to call more than once;
/// every call after the first is a no-op. Embedders that don't want
/// this crate's default formatter should install their own
/// `tracing` subscriber instead of calling this.
pub fn init_tracing(verbose: bool) {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let _ = tracing_subscriber::fmt().with_max_level(level).try_init();
}

/// Convenient re-exports for embedders.
pub mod prelude {
    pub use crate::ca::backend::{FaultInjectingBackend, RsaSigningBackend};
    pub use crate::ca::issuer::SigningBackend;
    pub use crate::ca::profile::SigningProfile;
    pub use crate::ca::CertificateAuthority;
    pub use crate::collaborators::{
        AllowAllPolicyAuthority, MemoryPublisher, MemoryStorageAuthority, PolicyAuthority, Publisher,
        RecordingRegistrationAuthority, RegistrationAuthority, StorageAuthority,
    };
    pub use crate::config::Config;
    pub use crate::error::{CaError, Result};
    pub use crate::types::*;
    pub use crate::va::ValidationAuthority;
}
