//! Concrete [`SigningBackend`] implementations.
//!
//! `RsaSigningBackend` is a real, in-process RSA signer suitable for a
//! standalone binary or a test fixture - not a stand-in for an actual
//! HSM, but it exercises the exact bytes the issuer and OCSP signer
//! build. `FaultInjectingBackend` wraps any backend and replays a
//! programmed sequence of failures before falling through to it,
//! mirroring the scripted signer failures used to exercise the fault
//! window.

use crate::ca::issuer::SigningBackend;
use crate::error::{CaError, Result};
use async_trait::async_trait;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::Pkcs1v15Sign;
use rsa::pkcs8::DecodePrivateKey;
use rsa::RsaPrivateKey;
use rustls_pemfile::Item;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Mutex;
use zeroize::Zeroizing;

const OID_SHA256_WITH_RSA: &str = "1.2.840.113549.1.1.11";

/// Signs with an in-memory RSA private key using
/// `sha256WithRSAEncryption` (PKCS#1 v1.5).
pub struct RsaSigningBackend {
    issuer_cert_der: Vec<u8>,
    key: RsaPrivateKey,
}

impl RsaSigningBackend {
    /// Builds a backend from the issuer's certificate DER and matching
    /// private key.
    pub fn new(issuer_cert_der: Vec<u8>, key: RsaPrivateKey) -> Self {
        Self { issuer_cert_der, key }
    }

    /// Loads the issuer certificate and private key from the PEM files
    /// named in [`crate::config::SigningProfileConfig`]. The key bytes
    /// read off disk are zeroized as soon as they've been parsed into
    /// an `RsaPrivateKey`.
    pub fn from_pem_files(cert_path: &Path, key_path: &Path) -> Result<Self> {
        let cert_pem = std::fs::read(cert_path)?;
        let mut cert_reader = cert_pem.as_slice();
        let issuer_cert_der = rustls_pemfile::certs(&mut cert_reader)
            .next()
            .ok_or_else(|| CaError::ServerInternal(format!("{} contains no certificate", cert_path.display())))?
            .map_err(|e| CaError::ServerInternal(e.to_string()))?
            .to_vec();

        let key_pem = Zeroizing::new(std::fs::read(key_path)?);
        let mut key_reader = key_pem.as_slice();
        let item = rustls_pemfile::read_one(&mut key_reader)
            .map_err(|e| CaError::ServerInternal(e.to_string()))?
            .ok_or_else(|| CaError::ServerInternal(format!("{} contains no private key", key_path.display())))?;

        let key = match item {
            Item::Pkcs1Key(der) => RsaPrivateKey::from_pkcs1_der(der.secret_pkcs1_der())
                .map_err(|e| CaError::ServerInternal(e.to_string()))?,
            Item::Pkcs8Key(der) => RsaPrivateKey::from_pkcs8_der(der.secret_pkcs8_der())
                .map_err(|e| CaError::ServerInternal(e.to_string()))?,
            _ => {
                return Err(CaError::ServerInternal(format!(
                    "{} does not contain a supported RSA private key format",
                    key_path.display()
                )))
            }
        };

        Ok(Self::new(issuer_cert_der, key))
    }
}

#[async_trait]
impl SigningBackend for RsaSigningBackend {
    fn issuer_certificate_der(&self) -> &[u8] {
        &self.issuer_cert_der
    }

    async fn sign(&self, tbs: &[u8]) -> std::result::Result<Vec<u8>, String> {
        let digest = Sha256::digest(tbs);
        self.key
            .sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
            .map_err(|e| e.to_string())
    }

    fn signature_algorithm_der(&self) -> Vec<u8> {
        crate::ca::der::sequence(&crate::ca::der::concat(&[
            crate::ca::der::oid(OID_SHA256_WITH_RSA),
            vec![0x05, 0x00], // NULL parameters
        ]))
    }
}

/// Wraps a [`SigningBackend`], returning a programmed sequence of
/// errors before delegating. Once the queue is drained, every call
/// reaches the inner backend. Used to reproduce the HSM fault-window
/// scenario under test without a real faulty device.
pub struct FaultInjectingBackend<B: SigningBackend> {
    inner: B,
    scripted_errors: Mutex<Vec<String>>,
}

impl<B: SigningBackend> FaultInjectingBackend<B> {
    /// Wraps `inner`, failing with each message in `scripted_errors` in
    /// order before falling through to real signing.
    pub fn new(inner: B, scripted_errors: Vec<String>) -> Self {
        Self {
            inner,
            scripted_errors: Mutex::new(scripted_errors),
        }
    }
}

#[async_trait]
impl<B: SigningBackend + Send + Sync> SigningBackend for FaultInjectingBackend<B> {
    fn issuer_certificate_der(&self) -> &[u8] {
        self.inner.issuer_certificate_der()
    }

    async fn sign(&self, tbs: &[u8]) -> std::result::Result<Vec<u8>, String> {
        let next = {
            let mut queue = self.scripted_errors.lock().unwrap();
            if queue.is_empty() {
                None
            } else {
                Some(queue.remove(0))
            }
        };
        match next {
            Some(message) => Err(message),
            None => self.inner.sign(tbs).await,
        }
    }

    fn signature_algorithm_der(&self) -> Vec<u8> {
        self.inner.signature_algorithm_der()
    }
}
