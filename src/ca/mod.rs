//! Certificate Authority.
//!
//! Orchestrates the sanitizer, issuer, and OCSP signer behind a single
//! fault tracker, and talks to the storage authority, policy authority,
//! and publisher collaborators.

pub mod backend;
pub mod der;
pub mod fault;
pub mod issuer;
pub mod ocsp;
pub mod profile;
pub mod sanitizer;

use crate::collaborators::{PolicyAuthority, Publisher, StorageAuthority};
use crate::error::Result;
use crate::types::{CertificateStatus, IssuedCertificate};
use fault::FaultTracker;
use issuer::SigningBackend;
use profile::SigningProfile;
use std::sync::Arc;
use std::time::Duration;

/// The certificate authority: sanitizes incoming CSRs, signs them
/// through a [`SigningBackend`], persists the result via the storage
/// authority, and submits to the publisher. All calls share one
/// [`FaultTracker`].
pub struct CertificateAuthority {
    profile: Arc<SigningProfile>,
    fault: Arc<FaultTracker>,
    backend: Arc<dyn SigningBackend>,
    storage: Arc<dyn StorageAuthority>,
    policy: Arc<dyn PolicyAuthority>,
    publisher: Arc<dyn Publisher>,
}

impl CertificateAuthority {
    /// Builds a CA from its collaborators. `hsm_fault_timeout` comes
    /// from `profile` itself, so the fault tracker is constructed here
    /// rather than handed in separately.
    pub fn new(
        profile: SigningProfile,
        backend: Arc<dyn SigningBackend>,
        storage: Arc<dyn StorageAuthority>,
        policy: Arc<dyn PolicyAuthority>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        let fault = Arc::new(FaultTracker::new(profile.hsm_fault_timeout));
        Self {
            profile: Arc::new(profile),
            fault,
            backend,
            storage,
            policy,
            publisher,
        }
    }

    /// §4.C + §4.D: sanitizes `csr_der` and issues a certificate for
    /// `registration_id`. On success, persists through the storage
    /// authority and submits to the publisher; failures in either of
    /// those two steps are logged, not returned.
    pub async fn issue_certificate(&self, csr_der: &[u8], registration_id: u64) -> Result<IssuedCertificate> {
        let sanitized = sanitizer::sanitize(csr_der, &self.profile, self.policy.as_ref()).await?;

        let issued = issuer::issue(&sanitized, registration_id, &self.profile, &self.fault, self.backend.as_ref()).await?;

        if let Err(e) = self
            .storage
            .add_certificate(&issued.der, issued.serial, registration_id)
            .await
        {
            tracing::warn!(serial = %issued.serial, error = %e, "failed to persist issued certificate");
        }

        let der = issued.der.clone();
        let publisher = Arc::clone(&self.publisher);
        tokio::spawn(async move {
            if let Err(e) = publisher.submit(&der).await {
                tracing::warn!(error = %e, "failed to submit certificate to publisher");
            }
        });

        Ok(issued)
    }

    /// §4.E: signs an OCSP response for a previously issued certificate.
    pub async fn generate_ocsp(&self, cert_der: &[u8], status: CertificateStatus) -> Result<Vec<u8>> {
        ocsp::generate_ocsp(cert_der, status, &self.profile, &self.fault, self.backend.as_ref()).await
    }

    /// Exposes the fault tracker's metrics for callers that surface
    /// `hsmFault.observed`/`hsmFault.rejected`.
    pub fn fault_metrics(&self) -> &crate::metrics::FaultMetrics {
        self.fault.metrics()
    }

    /// The configured HSM fault timeout, for tests that need to
    /// advance past the window.
    pub fn hsm_fault_timeout(&self) -> Duration {
        self.profile.hsm_fault_timeout
    }
}
