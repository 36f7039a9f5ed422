/*
 * uri.rs
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

//! Gemini and Titan URIs: scheme normalization, relative reference resolution
//! (links and redirects), query input, and the Titan upload intent line.
//! User input and upload tokens are percent-encoded; everything else is left to `url`.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

use crate::error::UriError;

pub const GEMINI_SCHEME: &str = "gemini";
pub const TITAN_SCHEME: &str = "titan";
pub const DEFAULT_PORT: u16 = 1965;

const GEMINI_PREFIX: &str = "gemini://";

/// Query input and Titan tokens: encode everything except RFC 3986 unreserved characters.
const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// True if `s` begins with an RFC 3986 scheme followed by ':'.
fn has_scheme(s: &str) -> bool {
    let colon = match s.find(':') {
        Some(i) if i > 0 => i,
        _ => return false,
    };
    let scheme = &s[..colon];
    let mut chars = scheme.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
}

/// Normalize a caller-supplied URI: prepend `gemini://` when no scheme is given,
/// reject anything that is not gemini or titan, drop the fragment.
pub fn normalize(input: &str) -> Result<Url, UriError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(UriError::Parse(String::new()));
    }
    let candidate = if input.contains("://") && has_scheme(input) {
        input.to_string()
    } else {
        format!("{}{}", GEMINI_PREFIX, input.trim_start_matches("//"))
    };
    let mut url = Url::parse(&candidate).map_err(|_| UriError::Parse(input.to_string()))?;
    if !url.scheme().eq_ignore_ascii_case(GEMINI_SCHEME) && !url.scheme().eq_ignore_ascii_case(TITAN_SCHEME) {
        return Err(UriError::UnsupportedScheme(url.scheme().to_string()));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(UriError::MissingHost);
    }
    url.set_fragment(None);
    Ok(url)
}

/// Port to connect to (explicit port, or 1965).
pub fn port(url: &Url) -> u16 {
    url.port().unwrap_or(DEFAULT_PORT)
}

/// `scheme://host[:port]` of `base`, or None if it has no host.
fn origin(base: &Url) -> Option<String> {
    let host = base.host_str()?;
    Some(match base.port() {
        Some(p) => format!("{}://{}:{}", base.scheme(), host, p),
        None => format!("{}://{}", base.scheme(), host),
    })
}

/// Directory part of a path: the last segment is dropped when it looks like a file
/// name (contains a dot); otherwise the whole path is the directory.
fn directory_of(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    let last_slash = path.rfind('/').unwrap_or(0);
    let last_segment = &path[last_slash..].trim_start_matches('/');
    if last_segment.contains('.') {
        path[..=last_slash].to_string()
    } else if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{}/", path)
    }
}

/// Resolve a link or redirect target against the URI of the current document.
///
/// - absolute (`scheme:...`): parsed as is
/// - scheme-relative (`//host/path`): inherits the base scheme
/// - host-relative (`/path`): base scheme, host and port
/// - path-relative (`c`, `../c`, `?q`): appended to the base directory
///
/// Returns None if the result is not a valid URI.
pub fn resolve(base: &Url, target: &str) -> Option<Url> {
    let target = target.trim();
    if target.is_empty() {
        return None;
    }
    if has_scheme(target) {
        return Url::parse(target).ok();
    }
    if let Some(rest) = target.strip_prefix("//") {
        return Url::parse(&format!("{}://{}", base.scheme(), rest)).ok();
    }
    let origin = origin(base)?;
    if target.starts_with('/') {
        return Url::parse(&format!("{}{}", origin, target)).ok();
    }
    if target.starts_with('?') {
        let path = if base.path().is_empty() { "/" } else { base.path() };
        return Url::parse(&format!("{}{}{}", origin, path, target)).ok();
    }
    Url::parse(&format!("{}{}{}", origin, directory_of(base.path()), target)).ok()
}

/// Percent-encode user input for use as a query string.
pub fn encode_query(input: &str) -> String {
    utf8_percent_encode(input, UNRESERVED).to_string()
}

/// Copy of `url` with `input` (percent-encoded) as its query.
pub fn with_query(url: &Url, input: &str) -> Url {
    let mut out = url.clone();
    out.set_query(Some(&encode_query(input)));
    out
}

fn with_scheme(url: &Url, scheme: &str) -> Url {
    if url.scheme() == scheme {
        return url.clone();
    }
    let mut out = url.clone();
    if out.set_scheme(scheme).is_ok() {
        return out;
    }
    // set_scheme refuses some transitions; rebuild from the serialization
    let rest = &url.as_str()[url.scheme().len()..];
    Url::parse(&format!("{}{}", scheme, rest)).unwrap_or_else(|_| url.clone())
}

/// `titan://` form of a gemini (or already titan) URI.
pub fn to_upload_uri(url: &Url) -> Url {
    with_scheme(url, TITAN_SCHEME)
}

/// `gemini://` form of a titan (or already gemini) URI. Uploads do not repeat across redirects.
pub fn to_retrieval_uri(url: &Url) -> Url {
    with_scheme(url, GEMINI_SCHEME)
}

/// Titan intent line (without CRLF): `<uri>;size=<n>;mime=<type>[;token=<escaped>]`.
pub fn upload_intent(url: &Url, size: usize, mime: &str, token: Option<&str>) -> String {
    let mut line = format!("{};size={};mime={}", url, size, mime);
    if let Some(token) = token.filter(|t| !t.is_empty()) {
        line.push_str(";token=");
        line.push_str(&utf8_percent_encode(token, UNRESERVED).to_string());
    }
    line
}
