/*
 * mod.rs
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

//! Trust-on-first-use for server certificates.
//!
//! Gemini servers are mostly self-signed, so there is no CA chain to check.
//! The first certificate seen for a host is pinned (SHA-256 of its DER); a later
//! different certificate is a `TrustedMismatch` that the user may approve.
//! The rustls verifier in `verifier` is the only caller during a handshake.

mod store;
pub(crate) mod verifier;

pub use store::TrustStore;

use sha2::{Digest, Sha256};

/// Why a server certificate was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvalidCertificateReason {
    /// No DNS name (SAN or CN) in the certificate.
    MissingInformation,
    NameMismatch,
    Expired,
    /// Validity starts in the future.
    NotYet,
    /// Host already pinned to a different certificate.
    TrustedMismatch,
    /// Unparseable certificate.
    Other,
}

impl std::fmt::Display for InvalidCertificateReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            InvalidCertificateReason::MissingInformation => "certificate has no host name",
            InvalidCertificateReason::NameMismatch => "certificate is for a different host",
            InvalidCertificateReason::Expired => "certificate has expired",
            InvalidCertificateReason::NotYet => "certificate is not valid yet",
            InvalidCertificateReason::TrustedMismatch => "certificate differs from the trusted one",
            InvalidCertificateReason::Other => "certificate could not be read",
        };
        f.write_str(s)
    }
}

/// Decides whether a server certificate is acceptable for a host.
pub trait CertificateTrust: Send + Sync {
    /// Validate the end-entity certificate (DER) presented by `host`.
    fn validate(&self, host: &str, der: &[u8]) -> Result<(), InvalidCertificateReason>;

    /// Forget the pinned certificate for `host` (user approved a replacement, or discarded trust).
    fn remove_trusted(&self, _host: &str) {}
}

/// Accepts every certificate without looking at it. Used when verification is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAllCertificates;

impl CertificateTrust for AcceptAllCertificates {
    fn validate(&self, _host: &str, _der: &[u8]) -> Result<(), InvalidCertificateReason> {
        Ok(())
    }
}

/// Upper-case hex.
pub(crate) fn hex_upper(bytes: &[u8]) -> String {
    const DIGITS: &[u8; 16] = b"0123456789ABCDEF";
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push(DIGITS[(b >> 4) as usize] as char);
        s.push(DIGITS[(b & 0x0f) as usize] as char);
    }
    s
}

/// Certificate hash used for pinning: SHA-256 over the DER, upper-case hex.
pub fn certificate_hash(der: &[u8]) -> String {
    hex_upper(&Sha256::digest(der))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_is_upper_case() {
        assert_eq!(hex_upper(&[0x00, 0xab, 0x7f]), "00AB7F");
    }

    #[test]
    fn hash_is_sha256() {
        let h = certificate_hash(b"");
        assert_eq!(h.len(), 64);
        assert!(h.starts_with("E3B0C442"));
    }

    #[test]
    fn accept_all_accepts_garbage() {
        assert!(AcceptAllCertificates.validate("any", b"not a cert").is_ok());
    }
}
