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

//! Gemini client (gemini:// retrieval, titan:// upload).
//!
//! Request: `<absolute-uri>\r\n` right after the TLS handshake.
//! Response: `<status> <meta>\r\n` then the body, ended by the server closing the stream.

mod client;
mod header;
mod hooks;
mod request;
mod response;
mod status;

pub use client::{GeminiClient, RedirectBehavior};
pub use header::{Header, HeaderError};
pub use hooks::{ClientHooks, NoHooks};
pub use request::UploadParameters;
pub use response::{FailureKind, Response, DEFAULT_MIME_TYPE};
pub use status::{StatusCode, StatusFamily};
