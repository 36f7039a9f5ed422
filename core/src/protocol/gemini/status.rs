/*
 * status.rs
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

//! Gemini status codes.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StatusCode {
    Input = 10,
    SensitiveInput = 11,
    Success = 20,
    TemporaryRedirect = 30,
    PermanentRedirect = 31,
    TemporaryFailure = 40,
    ServerUnavailable = 41,
    CgiError = 42,
    ProxyError = 43,
    SlowDown = 44,
    PermanentFailure = 50,
    NotFound = 51,
    Gone = 52,
    ProxyRequestRefused = 53,
    BadRequest = 59,
    ClientCertificateRequired = 60,
    CertificateNotAuthorized = 61,
    CertificateNotValid = 62,
}

/// First digit of a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFamily {
    Input,
    Success,
    Redirect,
    TemporaryFailure,
    PermanentFailure,
    ClientCertificate,
}

impl StatusCode {
    /// Known code, or None.
    pub fn from_code(code: u8) -> Option<Self> {
        use StatusCode::*;
        Some(match code {
            10 => Input,
            11 => SensitiveInput,
            20 => Success,
            30 => TemporaryRedirect,
            31 => PermanentRedirect,
            40 => TemporaryFailure,
            41 => ServerUnavailable,
            42 => CgiError,
            43 => ProxyError,
            44 => SlowDown,
            50 => PermanentFailure,
            51 => NotFound,
            52 => Gone,
            53 => ProxyRequestRefused,
            59 => BadRequest,
            60 => ClientCertificateRequired,
            61 => CertificateNotAuthorized,
            62 => CertificateNotValid,
            _ => return None,
        })
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn family(self) -> StatusFamily {
        match self.code() / 10 {
            1 => StatusFamily::Input,
            2 => StatusFamily::Success,
            3 => StatusFamily::Redirect,
            4 => StatusFamily::TemporaryFailure,
            5 => StatusFamily::PermanentFailure,
            _ => StatusFamily::ClientCertificate,
        }
    }

    /// 4x failures may succeed if the same request is sent again.
    pub fn is_retryable(self) -> bool {
        self.family() == StatusFamily::TemporaryFailure
    }

    pub fn description(self) -> &'static str {
        use StatusCode::*;
        match self {
            Input => "input",
            SensitiveInput => "sensitive input",
            Success => "success",
            TemporaryRedirect => "temporary redirect",
            PermanentRedirect => "permanent redirect",
            TemporaryFailure => "temporary failure",
            ServerUnavailable => "server unavailable",
            CgiError => "CGI error",
            ProxyError => "proxy error",
            SlowDown => "slow down",
            PermanentFailure => "permanent failure",
            NotFound => "not found",
            Gone => "gone",
            ProxyRequestRefused => "proxy request refused",
            BadRequest => "bad request",
            ClientCertificateRequired => "client certificate required",
            CertificateNotAuthorized => "certificate not authorized",
            CertificateNotValid => "certificate not valid",
        }
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code(), self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_defined_codes_round_trip() {
        let defined = [10, 11, 20, 30, 31, 40, 41, 42, 43, 44, 50, 51, 52, 53, 59, 60, 61, 62];
        for code in defined {
            assert_eq!(StatusCode::from_code(code).map(StatusCode::code), Some(code));
        }
        let defined_count = (0..=u8::MAX).filter(|c| StatusCode::from_code(*c).is_some()).count();
        assert_eq!(defined_count, defined.len());
    }

    #[test]
    fn families_and_retry() {
        assert_eq!(StatusCode::SlowDown.family(), StatusFamily::TemporaryFailure);
        assert!(StatusCode::SlowDown.is_retryable());
        assert!(!StatusCode::NotFound.is_retryable());
        assert!(!StatusCode::ClientCertificateRequired.is_retryable());
        assert_eq!(StatusCode::CertificateNotValid.family(), StatusFamily::ClientCertificate);
        assert_eq!(StatusCode::from_code(25), None);
    }
}
