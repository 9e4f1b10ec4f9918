use std::fs;
use std::path::Path;
use std::sync::Arc;

use lapin::tcp::{HandshakeResult, RustlsConnector, TcpStream};
use lapin::uri::{AMQPScheme, AMQPUri};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, ring};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use tracing::warn;

use crate::config::TlsSettings;
use crate::utils::error::SupervisorError;

const PEM_CERTIFICATE: &str = "-----BEGIN CERTIFICATE-----";

/// How a broker connection is secured.
#[derive(Clone)]
pub enum TlsMode {
    Plain,
    /// The server certificate must chain to this PEM bundle.
    Verified { ca_bundle: String },
    /// Any server certificate is accepted.
    Unverified { config: Arc<ClientConfig> },
}

impl std::fmt::Debug for TlsMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TlsMode::Plain => f.write_str("Plain"),
            TlsMode::Verified { .. } => f.write_str("Verified"),
            TlsMode::Unverified { .. } => f.write_str("Unverified"),
        }
    }
}

/// Reads a PEM bundle and checks it holds at least one certificate.
pub fn load_ca_bundle(path: &Path) -> Result<String, SupervisorError> {
    let pem = fs::read_to_string(path).map_err(|source| SupervisorError::ReadCaCert {
        path: path.to_path_buf(),
        source,
    })?;
    if !pem.contains(PEM_CERTIFICATE) {
        return Err(SupervisorError::InvalidCaCert {
            path: path.to_path_buf(),
        });
    }
    Ok(pem)
}

pub fn tls_mode(tls: &TlsSettings) -> Result<TlsMode, SupervisorError> {
    if !tls.enabled {
        return Ok(TlsMode::Plain);
    }

    if !tls.verify_cert {
        warn!("Broker certificates will not be verified");
        return Ok(TlsMode::Unverified {
            config: Arc::new(unverified_client_config()?),
        });
    }

    let path = tls
        .ca_cert_path
        .as_deref()
        .ok_or(SupervisorError::MissingCaCert)?;
    Ok(TlsMode::Verified {
        ca_bundle: load_ca_bundle(path)?,
    })
}

/// A rustls client configuration that accepts any server certificate.
/// Handshake signatures are still checked.
pub fn unverified_client_config() -> Result<ClientConfig, rustls::Error> {
    let provider = Arc::new(ring::default_provider());
    let verifier = Arc::new(AcceptAnyServerCert::new(provider.clone()));

    Ok(ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .dangerous()
        .with_custom_certificate_verifier(verifier)
        .with_no_client_auth())
}

/// Opens the TCP stream for `uri` and, for `amqps`, runs the TLS handshake
/// with `config`.
pub fn unverified_stream(uri: &AMQPUri, config: Arc<ClientConfig>) -> HandshakeResult {
    let address = format!("{}:{}", uri.authority.host, uri.authority.port);
    let stream = TcpStream::connect(address)?;
    match uri.scheme {
        AMQPScheme::AMQP => Ok(stream),
        AMQPScheme::AMQPS => {
            stream.into_rustls(&RustlsConnector::from(config), &uri.authority.host)
        }
    }
}

#[derive(Debug)]
pub(crate) struct AcceptAnyServerCert {
    provider: Arc<CryptoProvider>,
}

impl AcceptAnyServerCert {
    pub(crate) fn new(provider: Arc<CryptoProvider>) -> Self {
        Self { provider }
    }
}

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
