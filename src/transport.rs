// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Transport: connects the TCP socket and, for `wss://`,
//! wraps it in TLS via `tokio-rustls`. Certificate pinning is enforced
//! with a custom `ServerCertVerifier` rather than by trusting the
//! platform root store.

use std::sync::Arc;

use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

use crate::config::ClientConfig;
use crate::error::WebSocketError;
use crate::url::{Scheme, WsUrl};

/// The duplex byte stream a handshake and connection driver operate
/// over, erasing whether it's plaintext TCP or TLS-wrapped.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> Transport for T {}

/// Connect to `url`, returning a boxed duplex stream ready for the
/// opening handshake.
pub async fn connect(
  url: &WsUrl,
  config: &ClientConfig,
) -> Result<Box<dyn Transport>, WebSocketError> {
  let tcp = TcpStream::connect((url.host.as_str(), url.port)).await?;
  tcp.set_nodelay(true).ok();

  match url.scheme {
    Scheme::Ws => Ok(Box::new(tcp)),
    Scheme::Wss => {
      let connector = tls_connector(config)?;
      let server_name = ServerName::try_from(url.host.clone())
        .map_err(|_| WebSocketError::TlsFailure(format!("invalid DNS name: {}", url.host)))?;
      let tls = connector
        .connect(server_name, tcp)
        .await
        .map_err(|e| WebSocketError::TlsFailure(e.to_string()))?;
      Ok(Box::new(tls))
    }
  }
}

fn tls_connector(config: &ClientConfig) -> Result<TlsConnector, WebSocketError> {
  let tls_config = if !config.pinned_certificates.is_empty() {
    rustls::ClientConfig::builder()
      .dangerous()
      .with_custom_certificate_verifier(Arc::new(PinnedCertVerifier::new(
        config.pinned_certificates.clone(),
      )))
      .with_no_client_auth()
  } else if config.allows_untrusted_ssl {
    rustls::ClientConfig::builder()
      .dangerous()
      .with_custom_certificate_verifier(Arc::new(NoVerify))
      .with_no_client_auth()
  } else {
    let mut roots = rustls::RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    rustls::ClientConfig::builder()
      .with_root_certificates(roots)
      .with_no_client_auth()
  };

  Ok(TlsConnector::from(Arc::new(tls_config)))
}

/// Accepts a server certificate iff it's byte-for-byte one of the
/// caller-pinned DER blobs. No chain validation, no expiry check: the
/// pin *is* the trust decision.
#[derive(Debug)]
struct PinnedCertVerifier {
  pinned: Vec<Vec<u8>>,
}

impl PinnedCertVerifier {
  fn new(pinned: Vec<Vec<u8>>) -> Self {
    Self { pinned }
  }
}

impl rustls::client::danger::ServerCertVerifier for PinnedCertVerifier {
  fn verify_server_cert(
    &self,
    end_entity: &CertificateDer<'_>,
    _intermediates: &[CertificateDer<'_>],
    _server_name: &ServerName<'_>,
    _ocsp_response: &[u8],
    _now: UnixTime,
  ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
    if self.pinned.iter().any(|pin| pin.as_slice() == end_entity.as_ref()) {
      Ok(rustls::client::danger::ServerCertVerified::assertion())
    } else {
      Err(rustls::Error::General(
        "server certificate does not match any pinned certificate".into(),
      ))
    }
  }

  fn verify_tls12_signature(
    &self,
    message: &[u8],
    cert: &CertificateDer<'_>,
    dss: &rustls::DigitallySignedStruct,
  ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
    rustls::crypto::verify_tls12_signature(
      message,
      cert,
      dss,
      &rustls::crypto::ring::default_provider().signature_verification_algorithms,
    )
  }

  fn verify_tls13_signature(
    &self,
    message: &[u8],
    cert: &CertificateDer<'_>,
    dss: &rustls::DigitallySignedStruct,
  ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
    rustls::crypto::verify_tls13_signature(
      message,
      cert,
      dss,
      &rustls::crypto::ring::default_provider().signature_verification_algorithms,
    )
  }

  fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
    rustls::crypto::ring::default_provider()
      .signature_verification_algorithms
      .supported_schemes()
  }
}

/// Accepts any server certificate, for `allows_untrusted_ssl`. Never
/// the default: only reachable when the caller opted in explicitly.
#[derive(Debug)]
struct NoVerify;

impl rustls::client::danger::ServerCertVerifier for NoVerify {
  fn verify_server_cert(
    &self,
    _end_entity: &CertificateDer<'_>,
    _intermediates: &[CertificateDer<'_>],
    _server_name: &ServerName<'_>,
    _ocsp_response: &[u8],
    _now: UnixTime,
  ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
    Ok(rustls::client::danger::ServerCertVerified::assertion())
  }

  fn verify_tls12_signature(
    &self,
    message: &[u8],
    cert: &CertificateDer<'_>,
    dss: &rustls::DigitallySignedStruct,
  ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
    rustls::crypto::verify_tls12_signature(
      message,
      cert,
      dss,
      &rustls::crypto::ring::default_provider().signature_verification_algorithms,
    )
  }

  fn verify_tls13_signature(
    &self,
    message: &[u8],
    cert: &CertificateDer<'_>,
    dss: &rustls::DigitallySignedStruct,
  ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
    rustls::crypto::verify_tls13_signature(
      message,
      cert,
      dss,
      &rustls::crypto::ring::default_provider().signature_verification_algorithms,
    )
  }

  fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
    rustls::crypto::ring::default_provider()
      .signature_verification_algorithms
      .supported_schemes()
  }
}
