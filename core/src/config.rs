/*
 * config.rs
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

//! Client options and on-disk helpers.
//!
//! Everything Lapis persists lives under one directory (default `~/.lapis`):
//! `known_hosts` (trusted server certificate hashes, tab-separated) and
//! `certs/` (client certificates and their JSON index). Files are created
//! with mode 0o600 and directories with 0o700 on Unix.

use std::fs;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[cfg(unix)]
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};

use crate::protocol::gemini::RedirectBehavior;

pub const CONFIG_DIR_NAME: &str = ".lapis";
pub const KNOWN_HOSTS_FILE: &str = "known_hosts";
pub const CERTS_DIR: &str = "certs";

const DEFAULT_MAX_REDIRECT_DEPTH: u32 = 5;
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(4);
const DEFAULT_MAX_PASSWORD_ATTEMPTS: u32 = 3;
const DEFAULT_MAX_RESPONSE_SIZE: usize = 64 * 1024 * 1024;

/// Options for [`GeminiClient`](crate::GeminiClient).
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// When false, any server certificate is accepted (no TOFU).
    pub verify_certificates: bool,
    /// Keep trusted server certificate hashes in `known_hosts`.
    pub persistent_trust_store: bool,
    /// Keep client certificates under `certs/`.
    pub persistent_authentication_store: bool,
    pub redirect_behavior: RedirectBehavior,
    pub max_redirect_depth: u32,
    pub connect_timeout: Duration,
    /// Applies to the TLS handshake and to each write and read.
    pub io_timeout: Duration,
    /// Password prompts per encrypted certificate lookup.
    pub max_password_attempts: u32,
    /// Largest response (header and body) read before giving up.
    pub max_response_size: usize,
    /// None means [`default_config_dir`].
    pub config_dir: Option<PathBuf>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            verify_certificates: true,
            persistent_trust_store: true,
            persistent_authentication_store: true,
            redirect_behavior: RedirectBehavior::Follow,
            max_redirect_depth: DEFAULT_MAX_REDIRECT_DEPTH,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            io_timeout: DEFAULT_IO_TIMEOUT,
            max_password_attempts: DEFAULT_MAX_PASSWORD_ATTEMPTS,
            max_response_size: DEFAULT_MAX_RESPONSE_SIZE,
            config_dir: None,
        }
    }
}

impl ClientOptions {
    /// Options with nothing written to disk.
    pub fn in_memory() -> Self {
        Self {
            persistent_trust_store: false,
            persistent_authentication_store: false,
            ..Self::default()
        }
    }

    pub fn set_verify_certificates(&mut self, verify: bool) -> &mut Self {
        self.verify_certificates = verify;
        self
    }

    pub fn set_persistent_trust_store(&mut self, persistent: bool) -> &mut Self {
        self.persistent_trust_store = persistent;
        self
    }

    pub fn set_persistent_authentication_store(&mut self, persistent: bool) -> &mut Self {
        self.persistent_authentication_store = persistent;
        self
    }

    pub fn set_redirect_behavior(&mut self, behavior: RedirectBehavior) -> &mut Self {
        self.redirect_behavior = behavior;
        self
    }

    pub fn set_max_redirect_depth(&mut self, depth: u32) -> &mut Self {
        self.max_redirect_depth = depth.max(1);
        self
    }

    pub fn set_connect_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn set_io_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.io_timeout = timeout;
        self
    }

    pub fn set_max_password_attempts(&mut self, attempts: u32) -> &mut Self {
        self.max_password_attempts = attempts.max(1);
        self
    }

    pub fn set_max_response_size(&mut self, bytes: usize) -> &mut Self {
        self.max_response_size = bytes.max(1);
        self
    }

    pub fn set_config_dir(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
        self.config_dir = Some(dir.into());
        self
    }

    /// Configured directory, falling back to [`default_config_dir`].
    pub fn resolved_config_dir(&self) -> Option<PathBuf> {
        self.config_dir.clone().or_else(default_config_dir)
    }

    pub fn known_hosts_path(&self) -> Option<PathBuf> {
        self.resolved_config_dir().map(|d| d.join(KNOWN_HOSTS_FILE))
    }

    pub fn certs_dir(&self) -> Option<PathBuf> {
        self.resolved_config_dir().map(|d| d.join(CERTS_DIR))
    }
}

/// Default config directory: ~/.lapis.
pub fn default_config_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from).map(|h| h.join(CONFIG_DIR_NAME))
}

/// Create `dir` (and parents) if needed. On Unix the leaf is created with mode 0o700.
pub fn ensure_private_dir(dir: &Path) -> io::Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    if let Some(parent) = dir.parent() {
        fs::create_dir_all(parent)?;
    }
    #[cfg(unix)]
    {
        fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)
    }
    #[cfg(not(unix))]
    {
        fs::create_dir_all(dir)
    }
}

/// Open a file for writing, truncating it. On Unix, creates it with mode 0o600.
fn open_private_file_for_write(path: &Path) -> io::Result<File> {
    #[cfg(unix)]
    {
        fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .create(true)
            .mode(0o600)
            .open(path)
    }
    #[cfg(not(unix))]
    {
        File::create(path)
    }
}

/// Write `data` to `path` with owner-only permissions, creating the parent directory.
pub fn write_private_file(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        ensure_private_dir(parent)?;
    }
    let mut f = open_private_file_for_write(path)?;
    f.write_all(data)?;
    f.sync_all()
}

/// Parse a flat tab-separated file: one `key<TAB>value` per line, `#` comments and blank lines skipped.
/// Lines without a tab are ignored.
pub fn parse_flat_file(content: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('\t') {
            let key = key.trim();
            let value = value.trim();
            if !key.is_empty() && !value.is_empty() {
                out.push((key.to_string(), value.to_string()));
            }
        }
    }
    out
}

/// Load a flat file. A missing file is an empty list.
pub fn load_flat_file(path: &Path) -> io::Result<Vec<(String, String)>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(parse_flat_file(&content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}

/// Rewrite a flat file in full, with a leading `# Updated <timestamp>` line.
pub fn save_flat_file<'a, I>(path: &Path, entries: I) -> io::Result<()>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut content = format!("# Updated {}\n", chrono::Utc::now().to_rfc3339());
    for (key, value) in entries {
        content.push_str(key);
        content.push('\t');
        content.push_str(value);
        content.push('\n');
    }
    write_private_file(path, content.as_bytes())
}
