/*
 * memory.rs
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

//! In-memory client certificate store. Passwords are ignored.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{normalize_locator, AuthenticationStore, CertificateSummary, ClientCertificate, PasswordRequest};
use crate::error::{CertificateError, LookupError};

#[derive(Default)]
pub struct InMemoryAuthenticationStore {
    certificates: Mutex<HashMap<String, ClientCertificate>>,
}

impl InMemoryAuthenticationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ClientCertificate>> {
        self.certificates.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Key under which `locator` is filed: exact locator, else a fingerprint match.
    fn key_for(map: &HashMap<String, ClientCertificate>, locator: &str) -> Option<String> {
        let key = normalize_locator(locator);
        if map.contains_key(&key) {
            return Some(key);
        }
        map.iter()
            .find(|(_, c)| c.fingerprint().eq_ignore_ascii_case(&key))
            .map(|(k, _)| k.clone())
    }
}

impl AuthenticationStore for InMemoryAuthenticationStore {
    fn find(
        &self,
        locator: &str,
        _password: &dyn Fn(&PasswordRequest<'_>) -> Option<String>,
    ) -> Result<ClientCertificate, LookupError> {
        let map = self.lock();
        Self::key_for(&map, locator)
            .and_then(|k| map.get(&k).cloned())
            .ok_or(LookupError::Missing)
    }

    fn add(&self, certificate: ClientCertificate, _password: Option<&str>) -> Result<(), CertificateError> {
        self.lock().insert(certificate.locator(), certificate);
        Ok(())
    }

    fn remove(&self, locator: &str) -> bool {
        let mut map = self.lock();
        match Self::key_for(&map, locator) {
            Some(k) => map.remove(&k).is_some(),
            None => false,
        }
    }

    fn list(&self) -> Vec<CertificateSummary> {
        let mut out: Vec<CertificateSummary> = self
            .lock()
            .iter()
            .map(|(locator, c)| CertificateSummary {
                locator: locator.clone(),
                name: c.name().to_string(),
                fingerprint: c.fingerprint().to_string(),
                encrypted: false,
                expiration: Some(c.expiration()),
            })
            .collect();
        out.sort_by(|a, b| a.locator.cmp(&b.locator));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn no_password(_: &PasswordRequest<'_>) -> Option<String> {
        None
    }

    #[test]
    fn find_by_host_or_fingerprint() {
        let store = InMemoryAuthenticationStore::new();
        let cert = ClientCertificate::generate("me", Duration::days(1)).unwrap().with_host("Capsule.example");
        store.add(cert.clone(), Some("ignored")).unwrap();
        assert_eq!(store.find("capsule.EXAMPLE", &no_password).unwrap(), cert);
        assert_eq!(store.find(cert.fingerprint(), &no_password).unwrap(), cert);
        assert_eq!(store.find("other.example", &no_password), Err(LookupError::Missing));
        assert_eq!(store.list().len(), 1);
        assert!(store.remove(&cert.fingerprint().to_ascii_lowercase()));
        assert!(!store.remove("capsule.example"));
        assert!(store.list().is_empty());
    }

    #[test]
    fn add_replaces_same_host() {
        let store = InMemoryAuthenticationStore::new();
        let a = ClientCertificate::generate("a", Duration::days(1)).unwrap().with_host("h");
        let b = ClientCertificate::generate("b", Duration::days(1)).unwrap().with_host("h");
        store.add(a, None).unwrap();
        store.add(b.clone(), None).unwrap();
        assert_eq!(store.find("h", &no_password).unwrap(), b);
        assert_eq!(store.list().len(), 1);
    }
}
