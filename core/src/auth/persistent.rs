/*
 * persistent.rs
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

//! Disk-backed client certificate store.
//!
//! Layout under the store directory:
//! - `host_certs.json`: index, one record per certificate
//!   (`locator`, `filePath`, `displayName`, `fingerprint`, `encrypted`).
//! - `<SHA1-HEX>.pem`: certificate and private key, the key optionally encrypted.
//!
//! Decrypted certificates are cached so the password is asked once per process.
//! A record whose file is gone or unreadable is dropped from the index.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::certificate::pem_is_encrypted;
use super::{normalize_locator, AuthenticationStore, CertificateSummary, ClientCertificate, PasswordRequest};
use crate::config;
use crate::error::{CertificateError, LookupError};

pub const INDEX_FILE: &str = "host_certs.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexEntry {
    locator: String,
    /// Relative to the store directory.
    file_path: String,
    display_name: String,
    fingerprint: String,
    encrypted: bool,
}

impl IndexEntry {
    fn matches(&self, key: &str) -> bool {
        self.locator == key || self.fingerprint.eq_ignore_ascii_case(key)
    }

    /// Host this certificate is bound to; fingerprint-filed entries have none.
    fn host(&self) -> Option<String> {
        if self.fingerprint.eq_ignore_ascii_case(&self.locator) {
            None
        } else {
            Some(self.locator.clone())
        }
    }
}

#[derive(Default)]
struct State {
    index: Vec<IndexEntry>,
    /// locator -> loaded certificate
    cache: HashMap<String, ClientCertificate>,
}

pub struct PersistentAuthenticationStore {
    dir: PathBuf,
    state: Mutex<State>,
}

enum Loaded {
    Ok(ClientCertificate),
    Failed(LookupError),
    /// Record is unusable and must be dropped.
    Corrupt(LookupError),
}

impl PersistentAuthenticationStore {
    /// Open the store in `dir`. A missing index is an empty store; a corrupt one is
    /// logged and ignored. The directory is created on first write.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let index = match Self::read_index(&dir) {
            Ok(index) => index,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "cannot read certificate index; starting empty");
                Vec::new()
            }
        };
        debug!(dir = %dir.display(), count = index.len(), "opened client certificate store");
        Self {
            dir,
            state: Mutex::new(State {
                index,
                cache: HashMap::new(),
            }),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_index(dir: &Path) -> Result<Vec<IndexEntry>, CertificateError> {
        match fs::read(dir.join(INDEX_FILE)) {
            Ok(data) => Ok(serde_json::from_slice(&data)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_index(&self, index: &[IndexEntry]) -> Result<(), CertificateError> {
        let data = serde_json::to_vec_pretty(index)?;
        config::write_private_file(&self.dir.join(INDEX_FILE), &data)?;
        Ok(())
    }

    /// Drop a record after a load failure; the index rewrite is best effort.
    fn drop_entry(&self, locator: &str) {
        let mut state = self.lock();
        let before = state.index.len();
        state.index.retain(|e| e.locator != locator);
        state.cache.remove(locator);
        if state.index.len() != before {
            if let Err(e) = self.write_index(&state.index) {
                warn!(error = %e, "cannot rewrite certificate index");
            }
        }
    }

    /// Delete a PEM file. Failures other than an already missing file are logged.
    fn remove_pem_file(&self, file_path: &str) {
        if let Err(e) = fs::remove_file(self.dir.join(file_path)) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(file = %file_path, error = %e, "cannot delete certificate file");
            }
        }
    }

    fn load(
        &self,
        entry: &IndexEntry,
        password: &dyn Fn(&PasswordRequest<'_>) -> Option<String>,
    ) -> Loaded {
        let path = self.dir.join(&entry.file_path);
        let text = match fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "certificate file missing");
                return Loaded::Corrupt(LookupError::Missing);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read certificate file");
                return Loaded::Corrupt(LookupError::Error(e.to_string()));
            }
        };
        let pw = if entry.encrypted || pem_is_encrypted(&text) {
            let request = PasswordRequest {
                locator: &entry.locator,
                fingerprint: &entry.fingerprint,
                name: &entry.display_name,
                attempt: 1,
            };
            match password(&request) {
                Some(pw) => Some(pw),
                None => return Loaded::Failed(LookupError::NoPassword),
            }
        } else {
            None
        };
        match ClientCertificate::from_pem(&text, pw.as_deref(), &entry.display_name, entry.host()) {
            Ok(cert) => Loaded::Ok(cert),
            Err(CertificateError::Decryption) => Loaded::Failed(LookupError::DecryptionFailure),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot load certificate");
                Loaded::Corrupt(LookupError::Error(e.to_string()))
            }
        }
    }
}

impl AuthenticationStore for PersistentAuthenticationStore {
    fn find(
        &self,
        locator: &str,
        password: &dyn Fn(&PasswordRequest<'_>) -> Option<String>,
    ) -> Result<ClientCertificate, LookupError> {
        let key = normalize_locator(locator);
        let entry = {
            let state = self.lock();
            if let Some(cert) = state.cache.get(&key) {
                return Ok(cert.clone());
            }
            if let Some(cert) = state.cache.values().find(|c| c.fingerprint().eq_ignore_ascii_case(&key)) {
                return Ok(cert.clone());
            }
            state.index.iter().find(|e| e.matches(&key)).cloned()
        };
        let entry = entry.ok_or(LookupError::Missing)?;
        // lock not held while the password callback runs
        match self.load(&entry, password) {
            Loaded::Ok(cert) => {
                self.lock().cache.insert(entry.locator.clone(), cert.clone());
                Ok(cert)
            }
            Loaded::Failed(e) => Err(e),
            Loaded::Corrupt(e) => {
                self.drop_entry(&entry.locator);
                Err(e)
            }
        }
    }

    fn add(&self, certificate: ClientCertificate, password: Option<&str>) -> Result<(), CertificateError> {
        let password = password.filter(|p| !p.is_empty());
        let locator = certificate.locator();
        let file_path = format!("{}.pem", certificate.sha1_hex());
        let pem = certificate.to_pem(password)?;
        let mut state = self.lock();
        config::ensure_private_dir(&self.dir)?;
        config::write_private_file(&self.dir.join(&file_path), pem.as_bytes())?;
        if let Some(old) = state.index.iter().find(|e| e.locator == locator) {
            if old.file_path != file_path {
                self.remove_pem_file(&old.file_path);
            }
        }
        state.index.retain(|e| e.locator != locator);
        state.index.push(IndexEntry {
            locator: locator.clone(),
            file_path,
            display_name: certificate.name().to_string(),
            fingerprint: certificate.fingerprint().to_string(),
            encrypted: password.is_some(),
        });
        state.index.sort_by(|a, b| a.locator.cmp(&b.locator));
        self.write_index(&state.index)?;
        info!(locator = %locator, encrypted = password.is_some(), "stored client certificate");
        state.cache.insert(locator, certificate);
        Ok(())
    }

    fn remove(&self, locator: &str) -> bool {
        let key = normalize_locator(locator);
        let mut state = self.lock();
        let Some(pos) = state.index.iter().position(|e| e.matches(&key)) else {
            return false;
        };
        let entry = state.index.remove(pos);
        state.cache.remove(&entry.locator);
        self.remove_pem_file(&entry.file_path);
        if let Err(e) = self.write_index(&state.index) {
            warn!(error = %e, "cannot rewrite certificate index");
        }
        info!(locator = %entry.locator, "removed client certificate");
        true
    }

    fn list(&self) -> Vec<CertificateSummary> {
        let state = self.lock();
        state
            .index
            .iter()
            .map(|e| CertificateSummary {
                locator: e.locator.clone(),
                name: e.display_name.clone(),
                fingerprint: e.fingerprint.clone(),
                encrypted: e.encrypted,
                expiration: state.cache.get(&e.locator).map(|c| c.expiration()),
            })
            .collect()
    }
}
