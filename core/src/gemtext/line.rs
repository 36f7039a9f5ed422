/*
 * line.rs
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

use url::Url;

/// One line of a Gemtext document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Empty,
    /// Verbatim.
    Text(String),
    /// Target resolved against the document URI.
    Link { uri: Url, text: Option<String> },
    /// Level 1 to 3.
    Heading { level: u8, text: String },
    List(String),
    Quote(String),
    FormattedBegin { alt: Option<String> },
    FormattedEnd,
    /// Verbatim line inside a preformatted block.
    Formatted(String),
}

impl Line {
    /// Text a reader would see, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Line::Text(t) | Line::List(t) | Line::Quote(t) | Line::Formatted(t) => Some(t),
            Line::Heading { text, .. } => Some(text),
            Line::Link { text, uri } => Some(text.as_deref().unwrap_or(uri.as_str())),
            Line::FormattedBegin { alt } => alt.as_deref(),
            Line::Empty | Line::FormattedEnd => None,
        }
    }
}

/// Gemtext form of the line (links with their resolved URI).
impl std::fmt::Display for Line {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Line::Empty => Ok(()),
            Line::Text(t) | Line::Formatted(t) => f.write_str(t),
            Line::Link { uri, text: Some(text) } => write!(f, "=> {} {}", uri, text),
            Line::Link { uri, text: None } => write!(f, "=> {}", uri),
            Line::Heading { level, text } => {
                write!(f, "{} {}", "#".repeat(usize::from(*level)), text)
            }
            Line::List(t) => write!(f, "* {}", t),
            Line::Quote(t) => write!(f, "> {}", t),
            Line::FormattedBegin { alt: Some(alt) } => write!(f, "```{}", alt),
            Line::FormattedBegin { alt: None } | Line::FormattedEnd => f.write_str("```"),
        }
    }
}
