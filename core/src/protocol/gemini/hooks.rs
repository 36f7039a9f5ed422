/*
 * hooks.rs
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

//! Callbacks the client makes into the application while a request runs.
//!
//! Every method has a default, so an implementation overrides only what it handles.
//! Hooks are called synchronously, some from inside the TLS handshake, so they
//! should return promptly.

use url::Url;

use crate::auth::{ClientCertificate, PasswordRequest};
use crate::tofu::InvalidCertificateReason;

pub trait ClientHooks: Send + Sync {
    /// Status 10/11. Returning a non-empty value resends the request with it as the query.
    fn input_required(&self, _prompt: &str, _sensitive: bool) -> Option<String> {
        None
    }

    /// Redirect under `RedirectBehavior::Confirm`. True follows it.
    fn confirm_redirect(&self, _target: &Url, _permanent: bool) -> bool {
        true
    }

    /// Status 60. Return a certificate (and optional password to store it under)
    /// to resend the request with it.
    fn certificate_required(
        &self,
        _host: &str,
        _message: &str,
    ) -> Option<(ClientCertificate, Option<String>)> {
        None
    }

    /// The stored certificate for this host has expired. Return a replacement,
    /// or None to go without a certificate this time.
    fn certificate_expired(
        &self,
        _certificate: &ClientCertificate,
    ) -> Option<(ClientCertificate, Option<String>)> {
        None
    }

    /// Server certificate differs from the pinned one. True trusts the new one.
    fn remote_certificate_unrecognized(&self, _host: &str, _fingerprint: &str) -> bool {
        false
    }

    /// Server certificate rejected. Not called when `remote_certificate_unrecognized` declined it.
    fn remote_certificate_invalid(&self, _host: &str, _reason: InvalidCertificateReason) {}

    /// About to present `certificate`. True withholds it.
    fn sending_client_certificate(&self, _certificate: &ClientCertificate) -> bool {
        false
    }

    /// Password for an encrypted stored certificate.
    fn certificate_password(&self, _request: &PasswordRequest<'_>) -> Option<String> {
        None
    }
}

/// Hooks that decline everything (and follow redirects).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl ClientHooks for NoHooks {}
