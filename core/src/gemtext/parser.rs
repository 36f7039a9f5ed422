/*
 * parser.rs
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

//! Single forward pass over a Gemtext body.
//!
//! Prefixes are matched after leading whitespace. Headings and list items need a
//! space or tab after the marker; links and quotes only need non-blank text.
//! A marker with nothing after it is plain text.

use std::borrow::Cow;

use url::Url;

use super::Line;
use crate::uri;

const PREFORMAT_TOGGLE: &str = "```";

fn is_separator(c: char) -> bool {
    c == ' ' || c == '\t'
}

/// Text after `marker` when it is followed by a separator and non-blank text.
fn after_separated<'l>(line: &'l str, marker: &str) -> Option<&'l str> {
    let rest = line.strip_prefix(marker)?;
    if !rest.starts_with(is_separator) {
        return None;
    }
    let text = rest.trim();
    (!text.is_empty()).then_some(text)
}

/// Text after `marker` when it is non-blank; the separator is optional.
fn after_marker<'l>(line: &'l str, marker: &str) -> Option<&'l str> {
    let text = line.strip_prefix(marker)?.trim();
    (!text.is_empty()).then_some(text)
}

/// Lazily yields the lines of a Gemtext body, in order. Not restartable.
pub struct GemtextParser<'a> {
    base: Url,
    body: &'a [u8],
    pos: usize,
    preformatted: bool,
}

impl<'a> GemtextParser<'a> {
    /// `base` is the document URI that relative links are resolved against.
    pub fn new(base: &Url, body: &'a [u8]) -> Self {
        Self {
            base: base.clone(),
            body,
            pos: 0,
            preformatted: false,
        }
    }

    /// Inside a preformatted block.
    pub fn is_preformatted(&self) -> bool {
        self.preformatted
    }

    /// Classify one line (without its line terminator), advancing the preformatted state.
    pub fn parse_line(&mut self, raw: &str) -> Line {
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        let line = raw.trim_start();
        if line.trim_end().is_empty() {
            return Line::Empty;
        }
        if let Some(rest) = line.strip_prefix(PREFORMAT_TOGGLE) {
            self.preformatted = !self.preformatted;
            if !self.preformatted {
                return Line::FormattedEnd;
            }
            let alt = rest.trim();
            return Line::FormattedBegin {
                alt: (!alt.is_empty()).then(|| alt.to_string()),
            };
        }
        if self.preformatted {
            return Line::Formatted(raw.to_string());
        }
        if let Some(rest) = after_marker(line, "=>") {
            return self.link(rest).unwrap_or_else(|| Line::Text(raw.to_string()));
        }
        if line.starts_with('#') {
            for (marker, level) in [("###", 3), ("##", 2), ("#", 1)] {
                if line.starts_with(marker) {
                    return match after_separated(line, marker) {
                        Some(text) => Line::Heading {
                            level,
                            text: text.to_string(),
                        },
                        None => Line::Text(raw.to_string()),
                    };
                }
            }
        }
        if let Some(text) = after_separated(line, "*") {
            return Line::List(text.to_string());
        }
        if let Some(text) = after_marker(line, ">") {
            return Line::Quote(text.to_string());
        }
        Line::Text(raw.to_string())
    }

    /// `rest` is the trimmed text after `=>`: target, then optional label.
    fn link(&self, rest: &str) -> Option<Line> {
        let (target, label) = match rest.find(is_separator) {
            Some(i) => (&rest[..i], rest[i..].trim()),
            None => (rest, ""),
        };
        let uri = uri::resolve(&self.base, target)?;
        Some(Line::Link {
            uri,
            text: (!label.is_empty()).then(|| label.to_string()),
        })
    }

    fn next_raw_line(&mut self) -> Option<Cow<'a, str>> {
        if self.pos >= self.body.len() {
            return None;
        }
        let rest = &self.body[self.pos..];
        let (line, advance) = match rest.iter().position(|&b| b == b'\n') {
            Some(i) => (&rest[..i], i + 1),
            None => (rest, rest.len()),
        };
        self.pos += advance;
        Some(String::from_utf8_lossy(line))
    }
}

impl<'a> Iterator for GemtextParser<'a> {
    type Item = Line;

    fn next(&mut self) -> Option<Line> {
        let raw = self.next_raw_line()?;
        Some(self.parse_line(&raw))
    }
}
