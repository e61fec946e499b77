//! TLS-SNI (`dvsni`) challenge validator. §4.G.

use crate::config::VaConfig;
use crate::error::{CaError, Result};
use crate::types::{Challenge, Identifier, IdentifierType};
use crate::va::jws::{self, CompactJws};
use hickory_resolver::TokioAsyncResolver;
use rsa::RsaPublicKey;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, SignatureScheme};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use x509_parser::extensions::GeneralName;
use x509_parser::prelude::FromDer;

const IO_TIMEOUT: Duration = Duration::from_secs(5);

/// Accepts any server certificate chain. The TLS-SNI protocol proves
/// control by presenting a *specific* self-signed certificate for the
/// requested SNI name, not by chaining to a trusted root - the
/// validator checks the presented leaf's SAN itself after the
/// handshake completes.
#[derive(Debug)]
struct AcceptAnyCert;

impl ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ED25519,
        ]
    }
}

/// Validates a `dvsni` challenge: derives `ZName` from the challenge's
/// JWS signature bytes, opens a TLS connection requesting that SNI,
/// and accepts iff the presented leaf certificate's SAN contains it.
pub async fn validate(
    resolver: &TokioAsyncResolver,
    config: &VaConfig,
    identifier: &Identifier,
    challenge: &Challenge,
    account_key: &RsaPublicKey,
) -> Result<()> {
    if identifier.kind != IdentifierType::Dns {
        return Err(CaError::MalformedRequest("identifier type must be dns".to_string()));
    }

    let validation = challenge
        .validation
        .as_ref()
        .ok_or_else(|| CaError::MalformedRequest("dvsni challenge has no validation object".to_string()))?;
    let jws = CompactJws::parse(&validation.compact)?;
    jws.verify(account_key)?;
    let expected_zname = jws::zname(&jws);

    let addr: SocketAddr = if config.test_mode {
        "127.0.0.1:5001".parse().unwrap()
    } else {
        let ip = resolver
            .lookup_ip(identifier.value.as_str())
            .await
            .map_err(|e| CaError::UnknownHost(e.to_string()))?
            .iter()
            .next()
            .ok_or_else(|| CaError::UnknownHost(format!("no addresses found for {}", identifier.value)))?;
        SocketAddr::new(ip, 443)
    };

    let tcp = tokio::time::timeout(IO_TIMEOUT, TcpStream::connect(addr))
        .await
        .map_err(|_| CaError::Connection("timed out connecting to challenge host".to_string()))?
        .map_err(|e| CaError::Connection(e.to_string()))?;

    let client_config = rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCert))
        .with_no_client_auth();

    let connector = tokio_rustls::TlsConnector::from(Arc::new(client_config));
    let server_name = ServerName::try_from(expected_zname.clone())
        .map_err(|_| CaError::Tls("invalid SNI name".to_string()))?;

    let tls_stream = tokio::time::timeout(IO_TIMEOUT, connector.connect(server_name, tcp))
        .await
        .map_err(|_| CaError::Connection("timed out during TLS handshake".to_string()))?
        .map_err(|e| CaError::Tls(e.to_string()))?;

    let (_, session) = tls_stream.get_ref();
    let leaf = session
        .peer_certificates()
        .and_then(|certs| certs.first())
        .ok_or_else(|| CaError::Tls("server presented no certificate".to_string()))?;

    let (_, parsed) = x509_parser::certificate::X509Certificate::from_der(leaf.as_ref())
        .map_err(|e| CaError::Tls(format!("could not parse presented certificate: {e}")))?;

    let matches = parsed
        .subject_alternative_name()
        .ok()
        .flatten()
        .map(|ext| {
            ext.value
                .general_names
                .iter()
                .any(|name| matches!(name, GeneralName::DNSName(dns) if *dns == expected_zname))
        })
        .unwrap_or(false);

    if matches {
        Ok(())
    } else {
        Err(CaError::Unauthorized("presented certificate does not match expected ZName".to_string()))
    }
}
