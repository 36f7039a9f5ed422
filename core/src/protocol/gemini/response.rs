/*
 * response.rs
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

//! Response model: one variant per outcome of a request.
//!
//! Responses are fully buffered; a `Success` owns its body and holds no connection.
//! Network and client-side failures are responses too, so request methods never
//! return `Err`.

use std::borrow::Cow;

use bytes::Bytes;
use url::Url;

use super::header::Header;
use super::status::{StatusCode, StatusFamily};
use crate::gemtext::GemtextParser;
use crate::tofu::InvalidCertificateReason;

/// Meta of a `20` response with nothing after the status.
pub const DEFAULT_MIME_TYPE: &str = "text/gemini; charset=utf-8";

/// What went wrong for `NetworkError` and `GeneralError` responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Connection refused or reset, DNS failure, other I/O.
    Network,
    Timeout,
    /// TLS handshake failed for a reason other than the server certificate.
    Tls,
    RemoteCertificate(InvalidCertificateReason),
    Cancelled,
    TooManyRedirects,
    EmptyResponse,
    /// More than `ClientOptions::max_response_size` bytes.
    ResponseTooLarge,
    InvalidUri,
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Input {
        uri: Url,
        sensitive: bool,
        prompt: String,
    },
    Success {
        uri: Url,
        /// Meta as sent, parameters included.
        mime_type: String,
        body: Bytes,
        /// `lang=` values of a text/gemini response.
        languages: Vec<String>,
        is_gemtext: bool,
    },
    Redirect {
        uri: Url,
        permanent: bool,
        /// As sent by the server, possibly relative.
        target: String,
    },
    Error {
        uri: Url,
        status: StatusCode,
        message: String,
    },
    /// Unparseable header or undefined status code.
    Invalid {
        uri: Url,
        status: Option<u8>,
        meta: String,
    },
    NetworkError {
        uri: Url,
        kind: FailureKind,
        message: String,
    },
    GeneralError {
        uri: Option<Url>,
        kind: FailureKind,
        message: String,
    },
}

/// Split a MIME meta into the lower-case essence and its `lang` values.
fn parse_mime(meta: &str) -> (String, Vec<String>) {
    let mut parts = meta.split(';');
    let essence = parts.next().unwrap_or_default().trim().to_ascii_lowercase();
    let mut languages = Vec::new();
    for param in parts {
        if let Some((key, value)) = param.split_once('=') {
            if key.trim().eq_ignore_ascii_case("lang") {
                languages.extend(
                    value
                        .trim()
                        .trim_matches('"')
                        .split(',')
                        .map(str::trim)
                        .filter(|l| !l.is_empty())
                        .map(str::to_string),
                );
            }
        }
    }
    (essence, languages)
}

impl Response {
    /// Classify a parsed header and the bytes after it.
    pub fn classify(uri: &Url, header: &Header, body: Bytes) -> Response {
        let uri = uri.clone();
        let Some(status) = StatusCode::from_code(header.status) else {
            return Response::Invalid {
                uri,
                status: Some(header.status),
                meta: header.meta.clone(),
            };
        };
        match status.family() {
            StatusFamily::Input => Response::Input {
                uri,
                sensitive: status == StatusCode::SensitiveInput,
                prompt: header.meta.clone(),
            },
            StatusFamily::Success => {
                let mime_type = if header.meta.trim().is_empty() {
                    DEFAULT_MIME_TYPE.to_string()
                } else {
                    header.meta.trim().to_string()
                };
                let (essence, languages) = parse_mime(&mime_type);
                let is_gemtext = essence.starts_with("text/gemini");
                Response::Success {
                    uri,
                    mime_type,
                    body,
                    languages: if is_gemtext { languages } else { Vec::new() },
                    is_gemtext,
                }
            }
            StatusFamily::Redirect => Response::Redirect {
                uri,
                permanent: status == StatusCode::PermanentRedirect,
                target: header.meta.trim().to_string(),
            },
            _ => Response::Error {
                uri,
                status,
                message: header.meta.clone(),
            },
        }
    }

    /// Classify a whole buffered response (header + body). The buffer must not be empty.
    pub fn from_raw(uri: &Url, raw: Bytes) -> Response {
        match Header::parse(&raw) {
            Ok((header, consumed)) => Self::classify(uri, &header, raw.slice(consumed..)),
            Err(_) => {
                let line_end = raw.iter().position(|&b| b == b'\n').unwrap_or(raw.len()).min(1024);
                Response::Invalid {
                    uri: uri.clone(),
                    status: None,
                    meta: String::from_utf8_lossy(&raw[..line_end]).trim_end().to_string(),
                }
            }
        }
    }

    pub(crate) fn network(uri: &Url, kind: FailureKind, message: impl Into<String>) -> Response {
        Response::NetworkError {
            uri: uri.clone(),
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn general(uri: Option<&Url>, kind: FailureKind, message: impl Into<String>) -> Response {
        Response::GeneralError {
            uri: uri.cloned(),
            kind,
            message: message.into(),
        }
    }

    /// URI of the request that produced this response (after redirects and input).
    pub fn uri(&self) -> Option<&Url> {
        match self {
            Response::Input { uri, .. }
            | Response::Success { uri, .. }
            | Response::Redirect { uri, .. }
            | Response::Error { uri, .. }
            | Response::Invalid { uri, .. }
            | Response::NetworkError { uri, .. } => Some(uri),
            Response::GeneralError { uri, .. } => uri.as_ref(),
        }
    }

    /// Status code sent by the server, if one was received and is defined.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Response::Input { sensitive: false, .. } => Some(StatusCode::Input),
            Response::Input { sensitive: true, .. } => Some(StatusCode::SensitiveInput),
            Response::Success { .. } => Some(StatusCode::Success),
            Response::Redirect { permanent: false, .. } => Some(StatusCode::TemporaryRedirect),
            Response::Redirect { permanent: true, .. } => Some(StatusCode::PermanentRedirect),
            Response::Error { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Failure kind of a network or general error.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Response::NetworkError { kind, .. } | Response::GeneralError { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Whether sending the same request again may succeed.
    pub fn can_retry(&self) -> bool {
        match self {
            Response::Error { status, .. } => status.is_retryable(),
            Response::NetworkError { kind, .. } => {
                matches!(kind, FailureKind::Network | FailureKind::Timeout | FailureKind::Cancelled)
            }
            _ => false,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Response::Success { .. })
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self, Response::Redirect { .. })
    }

    pub fn is_input_required(&self) -> bool {
        matches!(self, Response::Input { .. })
    }

    pub fn is_certificate_required(&self) -> bool {
        self.status().map(StatusCode::family) == Some(StatusFamily::ClientCertificate)
    }

    /// Body of a success.
    pub fn body(&self) -> Option<&Bytes> {
        match self {
            Response::Success { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Body of a success as text (lossy UTF-8).
    pub fn text(&self) -> Option<Cow<'_, str>> {
        self.body().map(|b| String::from_utf8_lossy(b))
    }

    /// Lines of a text/gemini success, links resolved against the response URI.
    pub fn document(&self) -> Option<GemtextParser<'_>> {
        match self {
            Response::Success {
                uri,
                body,
                is_gemtext: true,
                ..
            } => Some(GemtextParser::new(uri, body)),
            _ => None,
        }
    }
}

impl std::fmt::Display for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Response::Input { prompt, sensitive, .. } => {
                write!(f, "{} {}", if *sensitive { 11 } else { 10 }, prompt)
            }
            Response::Success { mime_type, body, .. } => {
                write!(f, "20 {} ({} bytes)", mime_type, body.len())
            }
            Response::Redirect { permanent, target, .. } => {
                write!(f, "{} {}", if *permanent { 31 } else { 30 }, target)
            }
            Response::Error { status, message, .. } => write!(f, "{} {}", status.code(), message),
            Response::Invalid { meta, .. } => write!(f, "invalid response: {}", meta),
            Response::NetworkError { message, .. } | Response::GeneralError { message, .. } => {
                f.write_str(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("gemini://localhost/").unwrap()
    }

    fn raw(s: &str) -> Response {
        Response::from_raw(&base(), Bytes::from(s.to_string()))
    }

    #[test]
    fn gemtext_success() {
        let r = raw("20 text/gemini; charset=utf-8; lang=en,fr\r\n# Hi\n");
        match &r {
            Response::Success {
                is_gemtext,
                languages,
                body,
                ..
            } => {
                assert!(*is_gemtext);
                assert_eq!(languages, &vec!["en".to_string(), "fr".to_string()]);
                assert_eq!(&body[..], b"# Hi\n");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(r.document().unwrap().count(), 1);
        assert_eq!(r.status(), Some(StatusCode::Success));
    }

    #[test]
    fn plain_success_and_default_mime() {
        let r = raw("20 TEXT/plain\r\nhello");
        assert!(matches!(&r, Response::Success { is_gemtext: false, .. }));
        assert!(r.document().is_none());
        assert_eq!(r.text().unwrap(), "hello");
        let d = raw("20\r\n=> /x\n");
        assert!(matches!(&d, Response::Success { is_gemtext: true, mime_type, .. } if mime_type == DEFAULT_MIME_TYPE));
        let upper = raw("20 Text/Gemini\r\n");
        assert!(matches!(upper, Response::Success { is_gemtext: true, .. }));
    }

    #[test]
    fn input_and_redirect() {
        assert!(matches!(raw("10 Enter query\r\n"), Response::Input { sensitive: false, prompt, .. } if prompt == "Enter query"));
        assert!(matches!(raw("11 Password\r\n"), Response::Input { sensitive: true, .. }));
        assert!(matches!(raw("30 /next\r\n"), Response::Redirect { permanent: false, target, .. } if target == "/next"));
        assert!(matches!(raw("31 gemini://x/\r\n"), Response::Redirect { permanent: true, .. }));
    }

    #[test]
    fn errors_and_retry() {
        let temp = raw("44 slow down\r\n");
        assert_eq!(temp.status(), Some(StatusCode::SlowDown));
        assert!(temp.can_retry());
        let perm = raw("51 Not found\r\n");
        assert!(!perm.can_retry());
        assert_eq!(perm.to_string(), "51 Not found");
        let cert = raw("60 Certificate required\r\n");
        assert!(cert.is_certificate_required());
        assert!(!cert.can_retry());
    }

    #[test]
    fn undefined_or_malformed_is_invalid() {
        assert!(matches!(raw("25 odd\r\n"), Response::Invalid { status: Some(25), .. }));
        assert!(matches!(raw("1 x\r\n"), Response::Invalid { status: Some(1), .. }));
        assert!(matches!(raw("HTTP/1.1 200 OK\r\n"), Response::Invalid { status: None, .. }));
        assert!(matches!(raw("20 text/gemini"), Response::Invalid { .. }));
    }

    #[test]
    fn failure_retry_rules() {
        let u = base();
        assert!(Response::network(&u, FailureKind::Timeout, "t").can_retry());
        assert!(!Response::network(&u, FailureKind::Tls, "t").can_retry());
        assert!(!Response::network(
            &u,
            FailureKind::RemoteCertificate(InvalidCertificateReason::Expired),
            "x"
        )
        .can_retry());
        assert!(!Response::general(None, FailureKind::TooManyRedirects, "x").can_retry());
    }
}
