/*
 * store.rs
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

//! Pinned server certificates: host -> certificate hash, optionally backed by `known_hosts`.

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use x509_parser::extensions::GeneralName;
use x509_parser::parse_x509_certificate;

use super::{certificate_hash, CertificateTrust, InvalidCertificateReason};
use crate::config;

/// Names and validity window pulled out of a server certificate.
struct Inspected {
    names: Vec<String>,
    not_before: i64,
    not_after: i64,
}

fn inspect(der: &[u8]) -> Result<Inspected, InvalidCertificateReason> {
    let (_, cert) = parse_x509_certificate(der).map_err(|_| InvalidCertificateReason::Other)?;
    let mut names = Vec::new();
    if let Ok(Some(san)) = cert.subject_alternative_name() {
        for name in &san.value.general_names {
            match name {
                GeneralName::DNSName(dns) => names.push(dns.to_string()),
                GeneralName::IPAddress(bytes) => {
                    let ip = match bytes.len() {
                        4 => <[u8; 4]>::try_from(*bytes).ok().map(IpAddr::from),
                        16 => <[u8; 16]>::try_from(*bytes).ok().map(IpAddr::from),
                        _ => None,
                    };
                    if let Some(ip) = ip {
                        names.push(ip.to_string());
                    }
                }
                _ => {}
            }
        }
    }
    for cn in cert.subject().iter_common_name() {
        if let Ok(s) = cn.as_str() {
            names.push(s.to_string());
        }
    }
    let validity = cert.validity();
    Ok(Inspected {
        names,
        not_before: validity.not_before.timestamp(),
        not_after: validity.not_after.timestamp(),
    })
}

/// Case-insensitive; a leading `*.` matches exactly one label.
fn name_matches(pattern: &str, host: &str) -> bool {
    if pattern.eq_ignore_ascii_case(host) {
        return true;
    }
    match pattern.strip_prefix("*.") {
        Some(suffix) => match host.split_once('.') {
            Some((label, rest)) => !label.is_empty() && rest.eq_ignore_ascii_case(suffix),
            None => false,
        },
        None => false,
    }
}

/// `[::1]` -> `::1`, lower case.
fn host_key(host: &str) -> String {
    host.trim_start_matches('[').trim_end_matches(']').to_ascii_lowercase()
}

/// TOFU trust store. In-memory, or persisted to a tab-separated `known_hosts` file
/// rewritten in full whenever a pin changes.
pub struct TrustStore {
    hosts: Mutex<HashMap<String, String>>,
    path: Option<PathBuf>,
}

impl TrustStore {
    pub fn in_memory() -> Self {
        Self {
            hosts: Mutex::new(HashMap::new()),
            path: None,
        }
    }

    /// Load pins from `path`. An unreadable file is logged and treated as empty.
    pub fn persistent(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let hosts = match config::load_flat_file(&path) {
            Ok(entries) => entries
                .into_iter()
                .map(|(host, hash)| (host_key(&host), hash.to_ascii_uppercase()))
                .collect(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read known hosts; starting empty");
                HashMap::new()
            }
        };
        debug!(path = %path.display(), count = hosts.len(), "loaded known hosts");
        Self {
            hosts: Mutex::new(hosts),
            path: Some(path),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.hosts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn save(&self, hosts: &HashMap<String, String>) {
        let Some(path) = &self.path else {
            return;
        };
        let mut entries: Vec<(&str, &str)> = hosts.iter().map(|(h, v)| (h.as_str(), v.as_str())).collect();
        entries.sort();
        if let Err(e) = config::save_flat_file(path, entries) {
            warn!(path = %path.display(), error = %e, "cannot write known hosts");
        }
    }

    /// Validate against an explicit clock.
    pub fn validate_at(
        &self,
        host: &str,
        der: &[u8],
        now: DateTime<Utc>,
    ) -> Result<(), InvalidCertificateReason> {
        let host = host_key(host);
        let info = inspect(der)?;
        if info.names.is_empty() {
            return Err(InvalidCertificateReason::MissingInformation);
        }
        if !info.names.iter().any(|n| name_matches(n, &host)) {
            return Err(InvalidCertificateReason::NameMismatch);
        }
        let now = now.timestamp();
        if info.not_before > now {
            return Err(InvalidCertificateReason::NotYet);
        }
        if info.not_after < now {
            return Err(InvalidCertificateReason::Expired);
        }
        let hash = certificate_hash(der);
        let mut hosts = self.lock();
        let pinned = hosts.get(&host).cloned();
        match pinned {
            Some(pinned) if pinned == hash => Ok(()),
            Some(_) => Err(InvalidCertificateReason::TrustedMismatch),
            None => {
                info!(host = %host, fingerprint = %hash, "trusting certificate on first use");
                hosts.insert(host, hash);
                self.save(&hosts);
                Ok(())
            }
        }
    }

    /// Pinned hash for `host`, if any.
    pub fn trusted_fingerprint(&self, host: &str) -> Option<String> {
        self.lock().get(&host_key(host)).cloned()
    }

    /// All pins, sorted by host.
    pub fn known_hosts(&self) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = self.lock().iter().map(|(h, v)| (h.clone(), v.clone())).collect();
        out.sort();
        out
    }
}

impl CertificateTrust for TrustStore {
    fn validate(&self, host: &str, der: &[u8]) -> Result<(), InvalidCertificateReason> {
        self.validate_at(host, der, Utc::now())
    }

    fn remove_trusted(&self, host: &str) {
        let mut hosts = self.lock();
        if hosts.remove(&host_key(host)).is_some() {
            info!(host = %host, "removed trusted certificate");
            self.save(&hosts);
        }
    }
}
