/*
 * header.rs
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

//! Response header line: `<status><SP><meta>\r\n`.
//!
//! The status is one or two digits, the first 1-6. The space and meta are
//! optional. No leading whitespace. Meta is decoded as UTF-8 (lossy).

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HeaderError {
    #[error("header line is not terminated by CRLF")]
    Unterminated,
    #[error("malformed header line")]
    Malformed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub status: u8,
    pub meta: String,
}

impl Header {
    /// Parse the header at the start of `buf`. Returns the header and the number of
    /// bytes it occupies including CRLF; the body starts there.
    pub fn parse(buf: &[u8]) -> Result<(Header, usize), HeaderError> {
        let nl = buf.iter().position(|&b| b == b'\n').ok_or(HeaderError::Unterminated)?;
        if nl == 0 || buf[nl - 1] != b'\r' {
            return Err(HeaderError::Unterminated);
        }
        let line = &buf[..nl - 1];
        let consumed = nl + 1;

        let first = match line.first() {
            Some(&b @ b'1'..=b'6') => b - b'0',
            _ => return Err(HeaderError::Malformed),
        };
        let (status, rest) = match line.get(1) {
            Some(&b @ b'0'..=b'9') => (first * 10 + (b - b'0'), &line[2..]),
            _ => (first, &line[1..]),
        };
        let meta = match rest.split_first() {
            None => String::new(),
            Some((b' ', meta)) => String::from_utf8_lossy(meta).into_owned(),
            Some(_) => return Err(HeaderError::Malformed),
        };
        Ok((Header { status, meta }, consumed))
    }
}
