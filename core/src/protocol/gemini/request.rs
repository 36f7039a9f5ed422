/*
 * request.rs
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

//! One request attempt: connect, send the request (or Titan intent and payload),
//! read until the server closes.

use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;
use url::Url;

use crate::auth::ClientCertificate;
use crate::error::{RequestError, UriError};
use crate::net::{Timeouts, TlsStreamWrapper};
use crate::tofu::verifier::TofuVerifier;
use crate::uri;

/// Content for a Titan upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadParameters {
    pub content: Bytes,
    pub mime_type: String,
    /// Sent percent-encoded as `;token=`.
    pub token: Option<String>,
}

impl UploadParameters {
    pub fn new(content: impl Into<Bytes>, mime_type: &str) -> Self {
        Self {
            content: content.into(),
            mime_type: mime_type.to_string(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }
}

/// Bytes sent after the handshake: `<uri>\r\n`, or the intent line and payload for uploads.
pub(crate) fn request_bytes(target: &Url, upload: Option<&UploadParameters>) -> Vec<u8> {
    match upload {
        None => format!("{}\r\n", target).into_bytes(),
        Some(up) => {
            let intent = uri::upload_intent(target, up.content.len(), &up.mime_type, up.token.as_deref());
            let mut out = Vec::with_capacity(intent.len() + 2 + up.content.len());
            out.extend_from_slice(intent.as_bytes());
            out.extend_from_slice(b"\r\n");
            out.extend_from_slice(&up.content);
            out
        }
    }
}

/// Run one attempt and return the raw response (header and body). Never empty.
pub(crate) async fn fetch(
    target: &Url,
    upload: Option<&UploadParameters>,
    verifier: Arc<TofuVerifier>,
    client_cert: Option<&ClientCertificate>,
    timeouts: Timeouts,
    max_size: usize,
) -> Result<Vec<u8>, RequestError> {
    let host = target.host_str().ok_or(RequestError::InvalidUri(UriError::MissingHost))?;
    let port = uri::port(target);
    let mut stream = TlsStreamWrapper::connect(host, port, verifier, client_cert, timeouts).await?;
    stream.send(&request_bytes(target, upload)).await?;
    let raw = stream.read_to_close(max_size).await?;
    stream.close().await;
    debug!(uri = %target, bytes = raw.len(), "response received");
    if raw.is_empty() {
        return Err(RequestError::EmptyResponse);
    }
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_request_line() {
        let u = Url::parse("gemini://localhost/a?b%20c").unwrap();
        assert_eq!(request_bytes(&u, None), b"gemini://localhost/a?b%20c\r\n".to_vec());
    }

    #[test]
    fn upload_framing() {
        let u = Url::parse("titan://localhost/f.txt").unwrap();
        let up = UploadParameters::new(Bytes::from_static(b"hello"), "text/plain").with_token("t k");
        assert_eq!(
            request_bytes(&u, Some(&up)),
            b"titan://localhost/f.txt;size=5;mime=text/plain;token=t%20k\r\nhello".to_vec()
        );
    }
}
