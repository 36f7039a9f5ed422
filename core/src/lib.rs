/*
 * lib.rs
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

//! Lapis core: Gemini (and Titan upload) client.
//!
//! Layout:
//! - `protocol::gemini`: header parser, response model, hooks and the request orchestrator.
//! - `tofu`: trust-on-first-use store for server certificates.
//! - `auth`: client certificates and their stores.
//! - `gemtext`: line parser for `text/gemini` bodies.
//! - `net`, `uri`, `config`, `error`: plumbing.

pub mod auth;
pub mod config;
pub mod error;
pub mod gemtext;
pub mod net;
pub mod protocol;
pub mod tofu;
pub mod uri;

pub use auth::{
    AuthenticationStore, CertificateSummary, ClientCertificate, InMemoryAuthenticationStore, PasswordRequest,
    PersistentAuthenticationStore,
};
pub use config::ClientOptions;
pub use error::{CertificateError, LookupError, UriError};
pub use gemtext::{GemtextParser, Line};
pub use protocol::gemini::{
    ClientHooks, FailureKind, GeminiClient, Header, NoHooks, RedirectBehavior, Response, StatusCode,
    UploadParameters,
};
pub use tofu::{AcceptAllCertificates, CertificateTrust, InvalidCertificateReason, TrustStore};
