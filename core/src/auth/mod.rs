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

//! Client certificates (the user's own identities) and where they are kept.
//!
//! A certificate is filed under a locator: the host it is bound to, or its
//! fingerprint when it is not bound to a host. Lookups accept either.

mod certificate;
mod memory;
mod persistent;

pub use certificate::{pem_is_encrypted, ClientCertificate, PBKDF2_ITERATIONS};
pub use memory::InMemoryAuthenticationStore;
pub use persistent::PersistentAuthenticationStore;

use chrono::{DateTime, Utc};

use crate::error::{CertificateError, LookupError};

/// Passed to the password callback when an encrypted certificate is loaded.
#[derive(Debug, Clone, Copy)]
pub struct PasswordRequest<'a> {
    pub locator: &'a str,
    pub fingerprint: &'a str,
    pub name: &'a str,
    /// 1 for the first prompt.
    pub attempt: u32,
}

/// What `list` reports per stored certificate. Encrypted entries that have not been
/// unlocked yet have no expiration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateSummary {
    pub locator: String,
    pub name: String,
    pub fingerprint: String,
    pub encrypted: bool,
    pub expiration: Option<DateTime<Utc>>,
}

/// Store of client certificates, shared by concurrent requests.
pub trait AuthenticationStore: Send + Sync {
    /// Find by host or fingerprint. `password` is asked only for encrypted entries.
    fn find(
        &self,
        locator: &str,
        password: &dyn Fn(&PasswordRequest<'_>) -> Option<String>,
    ) -> Result<ClientCertificate, LookupError>;

    /// Add or replace (same locator). `password` encrypts the key at rest where supported.
    fn add(&self, certificate: ClientCertificate, password: Option<&str>) -> Result<(), CertificateError>;

    /// Remove by host or fingerprint. Returns whether anything was removed.
    fn remove(&self, locator: &str) -> bool;

    fn list(&self) -> Vec<CertificateSummary>;
}

/// Keys are compared in lower case; brackets around IPv6 hosts are dropped.
pub(crate) fn normalize_locator(locator: &str) -> String {
    locator.trim().trim_start_matches('[').trim_end_matches(']').to_ascii_lowercase()
}
