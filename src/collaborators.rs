//! External collaborator traits.
//!
//! The storage authority, policy authority, publisher, and registration
//! authority are explicitly out of scope for this crate - it only
//! depends on them through these trait objects. Simple in-memory
//! implementations are provided for tests and for composing a minimal
//! standalone binary; a production embedder is expected to supply its
//! own (a real database, a real RPC client, a real CT log submitter).

use crate::types::{Authorization, CertificateStatus, Serial};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Persists issued certificates and tracks their status.
///
/// Grounded on the `KeyStorage` trait's store/retrieve shape
/// (async, keyed lookups, `Result`-returning).
#[async_trait]
pub trait StorageAuthority: Send + Sync {
    /// Persists a freshly issued certificate, returning the serial it
    /// was filed under (the storage authority is the source of truth
    /// for the primary key, though in this system the CA always derives
    /// it from the certificate itself).
    async fn add_certificate(
        &self,
        der: &[u8],
        serial: Serial,
        registration_id: u64,
    ) -> Result<Serial, String>;

    /// Retrieves a previously stored certificate by serial.
    async fn get_certificate(&self, serial: &Serial) -> Result<Option<Vec<u8>>, String>;

    /// Retrieves the current status of a previously stored certificate.
    async fn get_certificate_status(&self, serial: &Serial) -> Result<Option<CertificateStatus>, String>;
}

/// Answers "is this DNS name eligible for issuance?" Policy concerns
/// (blocklists, high-risk TLDs, manual review flags) live entirely on
/// the other side of this trait.
#[async_trait]
pub trait PolicyAuthority: Send + Sync {
    /// Returns `Ok(())` if `name` may be issued for, or `Err(reason)`
    /// otherwise.
    async fn willing_to_issue(&self, name: &str) -> Result<(), String>;
}

/// Submits issued certificates to external certificate-transparency logs.
/// Fire-and-forget: failures here never fail an issuance call.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Submits a certificate for publication. Errors are logged by the
    /// caller, never propagated.
    async fn submit(&self, der: &[u8]) -> Result<(), String>;
}

/// Receives validation outcomes from the dispatcher.
#[async_trait]
pub trait RegistrationAuthority: Send + Sync {
    /// Called at most once per challenge index, after the validator for
    /// that challenge has returned or timed out.
    async fn on_validation_update(&self, authorization: Authorization);
}

/// An in-memory [`StorageAuthority`] suitable for tests and small
/// standalone deployments.
#[derive(Default)]
pub struct MemoryStorageAuthority {
    certs: Mutex<HashMap<String, (Vec<u8>, CertificateStatus)>>,
}

impl MemoryStorageAuthority {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageAuthority for MemoryStorageAuthority {
    async fn add_certificate(
        &self,
        der: &[u8],
        serial: Serial,
        _registration_id: u64,
    ) -> Result<Serial, String> {
        let mut certs = self.certs.lock().unwrap();
        certs.insert(serial.storage_key(), (der.to_vec(), CertificateStatus::Good));
        Ok(serial)
    }

    async fn get_certificate(&self, serial: &Serial) -> Result<Option<Vec<u8>>, String> {
        let certs = self.certs.lock().unwrap();
        Ok(certs.get(&serial.storage_key()).map(|(der, _)| der.clone()))
    }

    async fn get_certificate_status(&self, serial: &Serial) -> Result<Option<CertificateStatus>, String> {
        let certs = self.certs.lock().unwrap();
        Ok(certs.get(&serial.storage_key()).map(|(_, status)| *status))
    }
}

/// A [`PolicyAuthority`] that is willing to issue for every name; useful
/// as a default for tests that aren't exercising policy rejection.
#[derive(Default)]
pub struct AllowAllPolicyAuthority;

#[async_trait]
impl PolicyAuthority for AllowAllPolicyAuthority {
    async fn willing_to_issue(&self, _name: &str) -> Result<(), String> {
        Ok(())
    }
}

/// A [`Publisher`] that records submissions in memory instead of
/// contacting a real CT log.
#[derive(Default)]
pub struct MemoryPublisher {
    submitted: Mutex<Vec<Vec<u8>>>,
}

impl MemoryPublisher {
    /// Creates an empty publisher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns everything submitted so far.
    pub fn submissions(&self) -> Vec<Vec<u8>> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl Publisher for MemoryPublisher {
    async fn submit(&self, der: &[u8]) -> Result<(), String> {
        self.submitted.lock().unwrap().push(der.to_vec());
        Ok(())
    }
}

/// A [`RegistrationAuthority`] that records the last authorization it
/// was notified about, for use in dispatcher tests.
#[derive(Default)]
pub struct RecordingRegistrationAuthority {
    last: Mutex<Option<Authorization>>,
}

impl RecordingRegistrationAuthority {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the most recently recorded authorization, if any.
    pub fn last_authorization(&self) -> Option<Authorization> {
        self.last.lock().unwrap().clone()
    }
}

#[async_trait]
impl RegistrationAuthority for RecordingRegistrationAuthority {
    async fn on_validation_update(&self, authorization: Authorization) {
        *self.last.lock().unwrap() = Some(authorization);
    }
}
