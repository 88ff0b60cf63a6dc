// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! TLS client setup for gateways with broker TLS enabled.
//!
//! Gateways present certificates issued by the vendor CA for a fixed
//! internal name, so the chain is validated against the bundled CA while
//! hostname verification is disabled.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use thiserror::Error;
use tokio_rustls::{
    TlsConnector,
    rustls::{
        CertificateError, ClientConfig, DigitallySignedStruct, Error as RustlsError,
        RootCertStore, SignatureScheme,
        client::{
            WebPkiServerVerifier,
            danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
        },
        crypto::{CryptoProvider, ring},
    },
};

use rustls_pki_types::{CertificateDer, ServerName, UnixTime};

/// Default location of the CA bundle shipped with the crate. Sessions
/// accept an explicit path when the bundle lives elsewhere.
pub fn bundled_ca_path() -> PathBuf {
    PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/certs/ca.crt"))
}

#[derive(Debug, Error)]
pub enum TlsSetupError {
    #[error("failed to read CA bundle {path}: {source}")]
    ReadCa {
        path: String,
        source: std::io::Error,
    },
    #[error("CA bundle {0} contains no usable certificates")]
    EmptyCa(String),
    #[error("TLS configuration rejected: {0}")]
    Config(#[from] RustlsError),
    #[error("verifier construction failed: {0}")]
    Verifier(String),
}

/// Chain-validating verifier that tolerates hostname mismatches only.
#[derive(Debug)]
struct IgnoreHostname {
    inner: Arc<WebPkiServerVerifier>,
}

impl ServerCertVerifier for IgnoreHostname {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, RustlsError> {
        match self.inner.verify_server_cert(
            end_entity,
            intermediates,
            server_name,
            ocsp_response,
            now,
        ) {
            Ok(verified) => Ok(verified),
            Err(RustlsError::InvalidCertificate(
                CertificateError::NotValidForName
                | CertificateError::NotValidForNameContext { .. },
            )) => Ok(ServerCertVerified::assertion()),
            Err(err) => Err(err),
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, RustlsError> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, RustlsError> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

fn provider() -> Arc<CryptoProvider> {
    Arc::new(ring::default_provider())
}

/// Builds a connector trusting exactly the given CA bundle.
///
/// Reads the bundle synchronously; call through
/// [`build_connector`] from async code.
pub fn build_connector_sync(ca_path: &Path) -> Result<TlsConnector, TlsSetupError> {
    let pem = std::fs::read(ca_path).map_err(|source| TlsSetupError::ReadCa {
        path: ca_path.display().to_string(),
        source,
    })?;

    let mut roots = RootCertStore::empty();
    let mut reader = std::io::Cursor::new(pem);
    for cert in rustls_pemfile::certs(&mut reader) {
        let cert = cert.map_err(|source| TlsSetupError::ReadCa {
            path: ca_path.display().to_string(),
            source,
        })?;
        roots
            .add(cert)
            .map_err(TlsSetupError::Config)?;
    }
    if roots.is_empty() {
        return Err(TlsSetupError::EmptyCa(ca_path.display().to_string()));
    }

    let inner = WebPkiServerVerifier::builder_with_provider(Arc::new(roots), provider())
        .build()
        .map_err(|e| TlsSetupError::Verifier(e.to_string()))?;

    let config = ClientConfig::builder_with_provider(provider())
        .with_safe_default_protocol_versions()?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(IgnoreHostname { inner }))
        .with_no_client_auth();

    Ok(TlsConnector::from(Arc::new(config)))
}

/// Async wrapper that keeps certificate file I/O off the runtime threads.
pub async fn build_connector(ca_path: &Path) -> Result<TlsConnector, TlsSetupError> {
    let path = ca_path.to_path_buf();
    tokio::task::spawn_blocking(move || build_connector_sync(&path))
        .await
        .map_err(|e| TlsSetupError::Verifier(format!("worker task failed: {e}")))?
}
