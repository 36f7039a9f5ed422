/*
 * net.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Lapis, a Gemini protocol client library.
 *
 * Lapis is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Lapis is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Lapis.  If not, see <http://www.gnu.org/licenses/>.
 */

//! TLS connection: TCP connect, then an immediate TLS handshake verified by TOFU,
//! optionally presenting a client certificate.
//!
//! Every step is bounded by a timeout. A fresh rustls config is built per connection
//! because the verifier and the client certificate are per request.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::client::TlsStream as TokioTlsStream;
use tokio_rustls::rustls::client::ClientConfig;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer, ServerName};
use tokio_rustls::TlsConnector;
use tracing::debug;

use crate::auth::ClientCertificate;
use crate::error::{RequestError, TimeoutStage, UriError};
use crate::tofu::verifier::TofuVerifier;

const READ_CHUNK: usize = 16 * 1024;

/// Timeouts for one connection.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub connect: Duration,
    /// Handshake, each write, each read.
    pub io: Duration,
}

/// TLS client config: TOFU verifier, optional client certificate.
fn client_config(
    verifier: &Arc<TofuVerifier>,
    client_cert: Option<&ClientCertificate>,
) -> Result<Arc<ClientConfig>, RequestError> {
    let builder = ClientConfig::builder_with_provider(verifier.provider())
        .with_safe_default_protocol_versions()
        .map_err(RequestError::Tls)?
        .dangerous()
        .with_custom_certificate_verifier(verifier.clone());
    let config = match client_cert {
        Some(cert) => builder
            .with_client_auth_cert(
                vec![CertificateDer::from(cert.certificate_der().to_vec())],
                PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(cert.private_key_der().to_vec())),
            )
            .map_err(RequestError::Tls)?,
        None => builder.with_no_client_auth(),
    };
    Ok(Arc::new(config))
}

/// Map a failed handshake: the verifier's recorded reason wins over the TLS error.
fn handshake_error(e: io::Error, verifier: &TofuVerifier) -> RequestError {
    if let Some(reason) = verifier.rejection() {
        return RequestError::RemoteCertificate(reason);
    }
    match e.get_ref().and_then(|inner| inner.downcast_ref::<rustls::Error>()) {
        Some(tls) => RequestError::Tls(tls.clone()),
        None => RequestError::Io(e),
    }
}

/// Async TLS stream (wraps tokio-rustls client TlsStream over TcpStream).
pub struct TlsStreamWrapper {
    inner: TokioTlsStream<TcpStream>,
    io_timeout: Duration,
}

impl TlsStreamWrapper {
    /// TCP connect then immediate TLS handshake.
    pub(crate) async fn connect(
        host: &str,
        port: u16,
        verifier: Arc<TofuVerifier>,
        client_cert: Option<&ClientCertificate>,
        timeouts: Timeouts,
    ) -> Result<Self, RequestError> {
        let bare_host = host.trim_start_matches('[').trim_end_matches(']');
        let server_name = ServerName::try_from(bare_host.to_owned())
            .map_err(|_| RequestError::InvalidUri(UriError::Parse(host.to_string())))?;
        let config = client_config(&verifier, client_cert)?;

        let tcp = timeout(timeouts.connect, TcpStream::connect((bare_host, port)))
            .await
            .map_err(|_| RequestError::Timeout(TimeoutStage::Connect))?
            .map_err(RequestError::Connect)?;
        debug!(host = %host, port, client_cert = client_cert.is_some(), "connected; starting TLS");

        let tls = timeout(timeouts.io, TlsConnector::from(config).connect(server_name, tcp))
            .await
            .map_err(|_| RequestError::Timeout(TimeoutStage::Handshake))?
            .map_err(|e| handshake_error(e, &verifier))?;
        Ok(Self {
            inner: tls,
            io_timeout: timeouts.io,
        })
    }

    /// Write all of `data` and flush.
    pub async fn send(&mut self, data: &[u8]) -> Result<(), RequestError> {
        let io_timeout = self.io_timeout;
        timeout(io_timeout, async {
            self.write_all(data).await?;
            self.flush().await
        })
        .await
        .map_err(|_| RequestError::Timeout(TimeoutStage::Write))??;
        Ok(())
    }

    /// Read until the server closes the stream. Each read is bounded by the I/O timeout
    /// and the total by `limit` bytes.
    /// A close without TLS close_notify counts as the end of the response.
    pub async fn read_to_close(&mut self, limit: usize) -> Result<Vec<u8>, RequestError> {
        let mut out = Vec::new();
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            let n = match timeout(self.io_timeout, self.read(&mut chunk)).await {
                Err(_) => return Err(RequestError::Timeout(TimeoutStage::Read)),
                Ok(Ok(n)) => n,
                Ok(Err(e)) if e.kind() == io::ErrorKind::UnexpectedEof => 0,
                Ok(Err(e)) => return Err(RequestError::Io(e)),
            };
            if n == 0 {
                break;
            }
            if out.len() + n > limit {
                return Err(RequestError::TooLarge(limit));
            }
            out.extend_from_slice(&chunk[..n]);
        }
        Ok(out)
    }

    /// Best-effort close_notify.
    pub async fn close(mut self) {
        let io_timeout = self.io_timeout;
        let _ = timeout(io_timeout, self.shutdown()).await;
    }
}

impl AsyncRead for TlsStreamWrapper {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for TlsStreamWrapper {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}
