/*
 * verifier.rs
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

//! rustls server certificate verifier backed by a [`CertificateTrust`].
//!
//! One verifier per connection: it remembers why it rejected a certificate so the
//! caller can report the reason instead of a bare handshake error.

use std::sync::{Arc, Mutex, PoisonError};

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{CertificateError, DigitallySignedStruct, SignatureScheme};
use tracing::{debug, warn};

use super::{certificate_hash, CertificateTrust, InvalidCertificateReason};
use crate::protocol::gemini::ClientHooks;

pub(crate) struct TofuVerifier {
    host: String,
    trust: Arc<dyn CertificateTrust>,
    hooks: Arc<dyn ClientHooks>,
    provider: Arc<CryptoProvider>,
    rejection: Mutex<Option<InvalidCertificateReason>>,
}

impl std::fmt::Debug for TofuVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TofuVerifier").field("host", &self.host).finish_non_exhaustive()
    }
}

impl TofuVerifier {
    pub(crate) fn new(
        host: &str,
        trust: Arc<dyn CertificateTrust>,
        hooks: Arc<dyn ClientHooks>,
        provider: Arc<CryptoProvider>,
    ) -> Self {
        Self {
            host: host.to_string(),
            trust,
            hooks,
            provider,
            rejection: Mutex::new(None),
        }
    }

    pub(crate) fn provider(&self) -> Arc<CryptoProvider> {
        Arc::clone(&self.provider)
    }

    /// Why the last certificate was rejected, if it was.
    pub(crate) fn rejection(&self) -> Option<InvalidCertificateReason> {
        *self.rejection.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reject(&self, reason: InvalidCertificateReason) -> rustls::Error {
        *self.rejection.lock().unwrap_or_else(PoisonError::into_inner) = Some(reason);
        warn!(host = %self.host, reason = %reason, "server certificate rejected");
        // a declined replacement was already answered through remote_certificate_unrecognized
        if reason != InvalidCertificateReason::TrustedMismatch {
            self.hooks.remote_certificate_invalid(&self.host, reason);
        }
        let err = match reason {
            InvalidCertificateReason::Expired => CertificateError::Expired,
            InvalidCertificateReason::NotYet => CertificateError::NotValidYet,
            InvalidCertificateReason::NameMismatch => CertificateError::NotValidForName,
            InvalidCertificateReason::Other => CertificateError::BadEncoding,
            InvalidCertificateReason::MissingInformation | InvalidCertificateReason::TrustedMismatch => {
                CertificateError::ApplicationVerificationFailure
            }
        };
        rustls::Error::InvalidCertificate(err)
    }

    /// Validate; on a pin mismatch ask the user and, if approved, re-pin and validate once more.
    fn check(&self, der: &[u8]) -> Result<(), InvalidCertificateReason> {
        match self.trust.validate(&self.host, der) {
            Err(InvalidCertificateReason::TrustedMismatch) => {
                let fingerprint = certificate_hash(der);
                if !self.hooks.remote_certificate_unrecognized(&self.host, &fingerprint) {
                    return Err(InvalidCertificateReason::TrustedMismatch);
                }
                debug!(host = %self.host, fingerprint = %fingerprint, "replacing trusted certificate");
                self.trust.remove_trusted(&self.host);
                self.trust.validate(&self.host, der)
            }
            other => other,
        }
    }
}

impl ServerCertVerifier for TofuVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        match self.check(end_entity.as_ref()) {
            Ok(()) => Ok(ServerCertVerified::assertion()),
            Err(reason) => Err(self.reject(reason)),
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider.signature_verification_algorithms.supported_schemes()
    }
}
