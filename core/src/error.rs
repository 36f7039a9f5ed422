/*
 * error.rs
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

//! Error types. Request-level errors never reach callers of the client directly;
//! they are folded into `Response` values by the orchestrator.

use std::io;

use thiserror::Error;

use crate::tofu::InvalidCertificateReason;

/// Stage of a request that ran out of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutStage {
    Connect,
    Handshake,
    Write,
    Read,
}

impl std::fmt::Display for TimeoutStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TimeoutStage::Connect => "connect",
            TimeoutStage::Handshake => "TLS handshake",
            TimeoutStage::Write => "write",
            TimeoutStage::Read => "read",
        };
        f.write_str(s)
    }
}

/// Failure of one request attempt (connect, handshake, send, read).
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("invalid URI: {0}")]
    InvalidUri(#[from] UriError),

    #[error("connection failed: {0}")]
    Connect(#[source] io::Error),

    #[error("{0} timed out")]
    Timeout(TimeoutStage),

    #[error("TLS handshake failed: {0}")]
    Tls(#[source] rustls::Error),

    #[error("remote certificate rejected: {0}")]
    RemoteCertificate(InvalidCertificateReason),

    #[error("received an empty response")]
    EmptyResponse,

    #[error("response larger than {0} bytes")]
    TooLarge(usize),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// URI normalization / resolution errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UriError {
    #[error("cannot parse {0:?}")]
    Parse(String),

    #[error("unsupported scheme {0:?}")]
    UnsupportedScheme(String),

    #[error("URI has no host")]
    MissingHost,
}

/// Errors creating, encoding or persisting client certificates.
#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("certificate generation failed: {0}")]
    Generation(#[from] rcgen::Error),

    #[error("cannot parse X.509 certificate: {0}")]
    Parse(String),

    #[error("malformed PEM: {0}")]
    Pem(String),

    #[error("private key encryption failed: {0}")]
    Encryption(String),

    #[error("private key could not be decrypted (wrong password?)")]
    Decryption,

    #[error("certificate has no private key")]
    MissingKey,

    #[error("invalid validity period")]
    Validity,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("certificate index: {0}")]
    Index(#[from] serde_json::Error),
}

/// Why a client certificate lookup produced nothing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// Never seen (or its file disappeared).
    #[error("no certificate stored")]
    Missing,

    /// Stored encrypted and no password was supplied.
    #[error("certificate is encrypted and no password was supplied")]
    NoPassword,

    /// Stored encrypted and the password was wrong.
    #[error("certificate could not be decrypted")]
    DecryptionFailure,

    /// Disk or format corruption; the index entry has been dropped.
    #[error("certificate could not be loaded: {0}")]
    Error(String),
}
