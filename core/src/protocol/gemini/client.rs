/*
 * client.rs
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

//! Request orchestration.
//!
//! One call to a request method is a chain of attempts. After each attempt the
//! response decides what happens next:
//! - input required: ask once, resend with the answer as query
//! - client certificate required: ask once, store the certificate, resend
//! - redirect: follow up to `max_redirect_depth` requests, per `RedirectBehavior`
//! - anything else: returned to the caller
//!
//! The client holds no per-request state, so one instance can run many requests
//! concurrently. Shared state lives in the trust and authentication stores.

use std::io;
use std::sync::Arc;

use rustls::crypto::CryptoProvider;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use super::hooks::ClientHooks;
use super::request::{self, UploadParameters};
use super::response::{FailureKind, Response};
use super::status::StatusCode;
use crate::auth::{
    AuthenticationStore, ClientCertificate, InMemoryAuthenticationStore, PasswordRequest,
    PersistentAuthenticationStore,
};
use crate::config::ClientOptions;
use crate::error::{CertificateError, LookupError, RequestError};
use crate::net::Timeouts;
use crate::tofu::verifier::TofuVerifier;
use crate::tofu::{AcceptAllCertificates, CertificateTrust, TrustStore};
use crate::uri;

const MSG_EMPTY_RESPONSE: &str = "Received an empty response";
const MSG_TIMEOUT: &str = "The server took too long to respond";
const MSG_TOO_MANY_REDIRECTS: &str = "Too many redirects";
const MSG_CANCELLED: &str = "Request cancelled";
const MSG_TOO_LARGE: &str = "Response too large";

/// What to do with 30/31 responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RedirectBehavior {
    #[default]
    Follow,
    /// Ask `ClientHooks::confirm_redirect` first.
    Confirm,
    /// Return the redirect to the caller.
    Ignore,
}

/// Where a request chain is.
struct ChainState {
    uri: Url,
    upload: Option<UploadParameters>,
    /// Number of the current request in the redirect chain, from 1.
    depth: u32,
    allow_input: bool,
    allow_certificate: bool,
}

pub struct GeminiClient {
    trust: Arc<dyn CertificateTrust>,
    auth: Arc<dyn AuthenticationStore>,
    hooks: Arc<dyn ClientHooks>,
    options: ClientOptions,
    provider: Arc<CryptoProvider>,
}

impl GeminiClient {
    pub fn new(
        trust: Arc<dyn CertificateTrust>,
        auth: Arc<dyn AuthenticationStore>,
        hooks: Arc<dyn ClientHooks>,
        options: ClientOptions,
    ) -> Self {
        Self {
            trust,
            auth,
            hooks,
            options,
            provider: Arc::new(rustls::crypto::ring::default_provider()),
        }
    }

    /// Build the stores `options` asks for. Persistent stores fall back to memory
    /// when no config directory can be found.
    pub fn from_options(options: ClientOptions, hooks: Arc<dyn ClientHooks>) -> Self {
        let trust: Arc<dyn CertificateTrust> = if !options.verify_certificates {
            Arc::new(AcceptAllCertificates)
        } else if options.persistent_trust_store {
            match options.known_hosts_path() {
                Some(path) => Arc::new(TrustStore::persistent(path)),
                None => {
                    warn!("no config directory; trusted certificates will not be saved");
                    Arc::new(TrustStore::in_memory())
                }
            }
        } else {
            Arc::new(TrustStore::in_memory())
        };
        let auth: Arc<dyn AuthenticationStore> = match (options.persistent_authentication_store, options.certs_dir()) {
            (true, Some(dir)) => Arc::new(PersistentAuthenticationStore::open(dir)),
            (true, None) => {
                warn!("no config directory; client certificates will not be saved");
                Arc::new(InMemoryAuthenticationStore::new())
            }
            (false, _) => Arc::new(InMemoryAuthenticationStore::new()),
        };
        Self::new(trust, auth, hooks, options)
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn trust(&self) -> &Arc<dyn CertificateTrust> {
        &self.trust
    }

    pub fn authentication(&self) -> &Arc<dyn AuthenticationStore> {
        &self.auth
    }

    /// Request `uri` (`gemini://` is assumed when no scheme is given).
    pub async fn send_request(&self, uri: &str) -> Response {
        match uri::normalize(uri) {
            Ok(target) => self.run(target, None).await,
            Err(e) => Response::general(None, FailureKind::InvalidUri, e.to_string()),
        }
    }

    /// Request `uri` with `input` as its query, as if answering an input prompt.
    pub async fn send_request_with_input(&self, uri: &str, input: &str) -> Response {
        match uri::normalize(uri) {
            Ok(target) => self.run(uri::with_query(&target, input), None).await,
            Err(e) => Response::general(None, FailureKind::InvalidUri, e.to_string()),
        }
    }

    /// Like [`send_request`](Self::send_request); cancelling `cancel` drops the connection
    /// and yields a `Cancelled` network error.
    pub async fn send_request_cancellable(&self, uri: &str, cancel: &CancellationToken) -> Response {
        let target = match uri::normalize(uri) {
            Ok(t) => t,
            Err(e) => return Response::general(None, FailureKind::InvalidUri, e.to_string()),
        };
        tokio::select! {
            response = self.run(target.clone(), None) => response,
            _ = cancel.cancelled() => {
                info!(uri = %target, "request cancelled");
                Response::network(&target, FailureKind::Cancelled, MSG_CANCELLED)
            }
        }
    }

    /// Titan upload. A `gemini://` or scheme-less URI is sent as `titan://`.
    pub async fn upload(&self, uri: &str, params: UploadParameters) -> Response {
        match uri::normalize(uri) {
            Ok(target) => self.run(uri::to_upload_uri(&target), Some(params)).await,
            Err(e) => Response::general(None, FailureKind::InvalidUri, e.to_string()),
        }
    }

    async fn run(&self, uri: Url, upload: Option<UploadParameters>) -> Response {
        let mut state = ChainState {
            uri,
            upload,
            depth: 1,
            allow_input: true,
            allow_certificate: true,
        };
        loop {
            let response = self.attempt(&state).await;
            debug!(uri = %state.uri, depth = state.depth, response = %response, "attempt finished");
            match &response {
                Response::Input { prompt, sensitive, .. } if state.allow_input => {
                    let Some(value) = self.hooks.input_required(prompt, *sensitive).filter(|v| !v.is_empty())
                    else {
                        return response;
                    };
                    state.uri = uri::with_query(&state.uri, &value);
                    state.allow_input = false;
                }
                Response::Error {
                    status: StatusCode::ClientCertificateRequired,
                    message,
                    ..
                } if state.allow_certificate => {
                    let Some(host) = state.uri.host_str().map(str::to_string) else {
                        return response;
                    };
                    let Some((certificate, password)) = self.hooks.certificate_required(&host, message) else {
                        return response;
                    };
                    if let Err(e) = self.store_certificate(certificate.with_host(&host), password).await {
                        warn!(host = %host, error = %e, "cannot store client certificate");
                        return response;
                    }
                    state.allow_certificate = false;
                }
                Response::Redirect { target, permanent, .. } => {
                    if self.options.redirect_behavior == RedirectBehavior::Ignore {
                        return response;
                    }
                    if state.depth >= self.options.max_redirect_depth {
                        warn!(uri = %state.uri, depth = state.depth, "too many redirects");
                        return Response::general(
                            Some(&state.uri),
                            FailureKind::TooManyRedirects,
                            MSG_TOO_MANY_REDIRECTS,
                        );
                    }
                    let Some(next) = uri::resolve(&state.uri, target) else {
                        return Response::general(
                            Some(&state.uri),
                            FailureKind::InvalidUri,
                            format!("Invalid redirect target {:?}", target),
                        );
                    };
                    if next.scheme() != uri::GEMINI_SCHEME && next.scheme() != uri::TITAN_SCHEME {
                        debug!(target = %next, "not following redirect to another protocol");
                        return response;
                    }
                    if self.options.redirect_behavior == RedirectBehavior::Confirm
                        && !self.hooks.confirm_redirect(&next, *permanent)
                    {
                        return response;
                    }
                    info!(from = %state.uri, to = %next, depth = state.depth, "following redirect");
                    state.uri = uri::to_retrieval_uri(&next);
                    state.upload = None;
                    state.depth += 1;
                    state.allow_input = true;
                    state.allow_certificate = true;
                }
                _ => return response,
            }
        }
    }

    async fn attempt(&self, state: &ChainState) -> Response {
        let Some(host) = state.uri.host_str() else {
            return Response::general(Some(&state.uri), FailureKind::InvalidUri, "URI has no host");
        };
        let client_cert = self.client_certificate(host).await;
        let verifier = Arc::new(TofuVerifier::new(
            host,
            Arc::clone(&self.trust),
            Arc::clone(&self.hooks),
            Arc::clone(&self.provider),
        ));
        let timeouts = Timeouts {
            connect: self.options.connect_timeout,
            io: self.options.io_timeout,
        };
        let fetched = request::fetch(
            &state.uri,
            state.upload.as_ref(),
            verifier,
            client_cert.as_ref(),
            timeouts,
            self.options.max_response_size,
        );
        match fetched.await {
            Ok(raw) => Response::from_raw(&state.uri, raw.into()),
            Err(e) => {
                debug!(uri = %state.uri, error = %e, "request failed");
                Self::failure(&state.uri, e)
            }
        }
    }

    /// Fold an attempt error into a response.
    fn failure(target: &Url, e: RequestError) -> Response {
        match e {
            RequestError::InvalidUri(e) => Response::general(Some(target), FailureKind::InvalidUri, e.to_string()),
            RequestError::EmptyResponse => {
                Response::general(Some(target), FailureKind::EmptyResponse, MSG_EMPTY_RESPONSE)
            }
            RequestError::TooLarge(limit) => Response::general(
                Some(target),
                FailureKind::ResponseTooLarge,
                format!("{} (over {} bytes)", MSG_TOO_LARGE, limit),
            ),
            RequestError::Timeout(stage) => {
                Response::network(target, FailureKind::Timeout, format!("{} ({} timed out)", MSG_TIMEOUT, stage))
            }
            RequestError::Tls(e) => Response::network(target, FailureKind::Tls, format!("TLS error: {}", e)),
            RequestError::RemoteCertificate(reason) => Response::network(
                target,
                FailureKind::RemoteCertificate(reason),
                format!("Server certificate rejected: {}", reason),
            ),
            RequestError::Connect(e) | RequestError::Io(e) => {
                Response::network(target, FailureKind::Network, format!("Network error: {}", e))
            }
        }
    }

    /// Stored certificate for `host`. Key decryption and store writes run on the
    /// blocking pool.
    async fn client_certificate(&self, host: &str) -> Option<ClientCertificate> {
        let auth = Arc::clone(&self.auth);
        let hooks = Arc::clone(&self.hooks);
        let attempts = self.options.max_password_attempts;
        let target = host.to_string();
        let lookup = tokio::task::spawn_blocking(move || {
            select_certificate(auth.as_ref(), hooks.as_ref(), attempts, &target)
        });
        match lookup.await {
            Ok(cert) => cert,
            Err(e) => {
                warn!(host = %host, error = %e, "client certificate lookup failed");
                None
            }
        }
    }

    async fn store_certificate(
        &self,
        certificate: ClientCertificate,
        password: Option<String>,
    ) -> Result<(), CertificateError> {
        let auth = Arc::clone(&self.auth);
        tokio::task::spawn_blocking(move || auth.add(certificate, password.as_deref()))
            .await
            .map_err(io::Error::from)?
    }
}

/// Find the certificate for `host`, unlock it, renew it if expired and ask whether to send it.
fn select_certificate(
    auth: &dyn AuthenticationStore,
    hooks: &dyn ClientHooks,
    max_attempts: u32,
    host: &str,
) -> Option<ClientCertificate> {
    let mut found = None;
    for attempt in 1..=max_attempts {
        let ask = |req: &PasswordRequest<'_>| {
            hooks.certificate_password(&PasswordRequest { attempt, ..*req })
        };
        match auth.find(host, &ask) {
            Ok(cert) => {
                found = Some(cert);
                break;
            }
            Err(LookupError::DecryptionFailure) => {
                warn!(host = %host, attempt, "wrong password for client certificate");
            }
            Err(LookupError::Missing) => return None,
            Err(LookupError::NoPassword) => {
                debug!(host = %host, "no password for client certificate; sending none");
                return None;
            }
            Err(LookupError::Error(e)) => {
                warn!(host = %host, error = %e, "client certificate unusable");
                return None;
            }
        }
    }
    let mut cert = found?;
    if cert.is_expired() {
        let (replacement, password) = hooks.certificate_expired(&cert)?;
        let replacement = replacement.with_host(host);
        if replacement.is_expired() {
            return None;
        }
        auth.remove(&cert.locator());
        if let Err(e) = auth.add(replacement.clone(), password.as_deref()) {
            warn!(host = %host, error = %e, "cannot store renewed client certificate");
        }
        info!(host = %host, fingerprint = %replacement.fingerprint(), "client certificate renewed");
        cert = replacement;
    }
    if hooks.sending_client_certificate(&cert) {
        debug!(host = %host, "client certificate withheld");
        return None;
    }
    Some(cert)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::gemini::NoHooks;
    use chrono::Duration;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn client(hooks: Arc<dyn ClientHooks>) -> (GeminiClient, Arc<InMemoryAuthenticationStore>) {
        let auth = Arc::new(InMemoryAuthenticationStore::new());
        let c = GeminiClient::new(
            Arc::new(TrustStore::in_memory()),
            auth.clone(),
            hooks,
            ClientOptions::in_memory(),
        );
        (c, auth)
    }

    fn expired_cert(host: &str) -> ClientCertificate {
        ClientCertificate::generate("old", Duration::seconds(1))
            .unwrap()
            .with_host(host)
    }

    struct Renew(Option<ClientCertificate>);

    impl ClientHooks for Renew {
        fn certificate_expired(&self, _: &ClientCertificate) -> Option<(ClientCertificate, Option<String>)> {
            self.0.clone().map(|c| (c, None))
        }
    }

    struct Withhold;

    impl ClientHooks for Withhold {
        fn sending_client_certificate(&self, _: &ClientCertificate) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn no_certificate_when_none_stored() {
        let (c, _) = client(Arc::new(NoHooks));
        assert!(c.client_certificate("localhost").await.is_none());
    }

    #[tokio::test]
    async fn stored_certificate_is_used() {
        let (c, auth) = client(Arc::new(NoHooks));
        let cert = ClientCertificate::generate("me", Duration::days(1)).unwrap().with_host("localhost");
        auth.add(cert.clone(), None).unwrap();
        assert_eq!(c.client_certificate("localhost").await, Some(cert));
    }

    #[tokio::test]
    async fn sending_hook_can_withhold() {
        let (c, auth) = client(Arc::new(Withhold));
        let cert = ClientCertificate::generate("me", Duration::days(1)).unwrap().with_host("localhost");
        auth.add(cert, None).unwrap();
        assert!(c.client_certificate("localhost").await.is_none());
    }

    #[tokio::test]
    async fn expired_without_renewal_is_skipped() {
        let (c, auth) = client(Arc::new(Renew(None)));
        auth.add(expired_cert("localhost"), None).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2100)).await;
        assert!(c.client_certificate("localhost").await.is_none());
        // the stored certificate stays
        assert_eq!(auth.list().len(), 1);
    }

    #[tokio::test]
    async fn expired_with_renewal_is_swapped() {
        let fresh = ClientCertificate::generate("new", Duration::days(1)).unwrap();
        let (c, auth) = client(Arc::new(Renew(Some(fresh.clone()))));
        auth.add(expired_cert("localhost"), None).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2100)).await;
        let used = c.client_certificate("localhost").await.unwrap();
        assert_eq!(used.fingerprint(), fresh.fingerprint());
        assert_eq!(used.host(), Some("localhost"));
        let listed = auth.list();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].fingerprint, fresh.fingerprint());
    }

    struct CountingPassword {
        calls: AtomicU32,
    }

    impl ClientHooks for CountingPassword {
        fn certificate_password(&self, req: &PasswordRequest<'_>) -> Option<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(req.attempt, self.calls.load(Ordering::SeqCst));
            Some("wrong".to_string())
        }
    }

    #[tokio::test]
    async fn password_attempts_are_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let auth = Arc::new(PersistentAuthenticationStore::open(dir.path()));
        let cert = ClientCertificate::generate("me", Duration::days(1)).unwrap().with_host("localhost");
        auth.add(cert, Some("right")).unwrap();
        let reopened = Arc::new(PersistentAuthenticationStore::open(dir.path()));
        let hooks = Arc::new(CountingPassword { calls: AtomicU32::new(0) });
        let c = GeminiClient::new(
            Arc::new(TrustStore::in_memory()),
            reopened,
            hooks.clone(),
            ClientOptions::in_memory(),
        );
        assert!(c.client_certificate("localhost").await.is_none());
        assert_eq!(hooks.calls.load(Ordering::SeqCst), 3);
    }

    struct RecordThread(std::sync::Mutex<Option<std::thread::ThreadId>>);

    impl ClientHooks for RecordThread {
        fn sending_client_certificate(&self, _: &ClientCertificate) -> bool {
            *self.0.lock().unwrap() = Some(std::thread::current().id());
            false
        }
    }

    #[tokio::test]
    async fn certificate_lookup_leaves_the_runtime_thread() {
        let hooks = Arc::new(RecordThread(std::sync::Mutex::new(None)));
        let (c, auth) = client(hooks.clone());
        let cert = ClientCertificate::generate("me", Duration::days(1)).unwrap().with_host("localhost");
        auth.add(cert.clone(), None).unwrap();
        assert_eq!(c.client_certificate("localhost").await, Some(cert));
        let seen = hooks.0.lock().unwrap().expect("hook not called");
        assert_ne!(seen, std::thread::current().id());
    }

    #[tokio::test]
    async fn certificate_is_stored_from_the_blocking_pool() {
        let (c, auth) = client(Arc::new(NoHooks));
        let cert = ClientCertificate::generate("me", Duration::days(1)).unwrap().with_host("capsule.example");
        c.store_certificate(cert.clone(), None).await.unwrap();
        assert_eq!(auth.list().len(), 1);
        assert_eq!(auth.list()[0].fingerprint, cert.fingerprint());
    }

    #[tokio::test]
    async fn invalid_uris_never_connect() {
        let (c, _) = client(Arc::new(NoHooks));
        let r = c.send_request("https://example.org/").await;
        assert_eq!(r.failure_kind(), Some(FailureKind::InvalidUri));
        assert!(r.uri().is_none());
    }

    #[tokio::test]
    async fn refused_connection_is_network_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let (c, _) = client(Arc::new(NoHooks));
        let r = c.send_request(&format!("gemini://127.0.0.1:{}/", port)).await;
        assert_eq!(r.failure_kind(), Some(FailureKind::Network));
        assert!(r.can_retry());
    }

    #[tokio::test]
    async fn cancelled_before_completion() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        // accept and stay silent
        let server = tokio::spawn(async move {
            let (_sock, _) = listener.accept().await.unwrap();
            tokio::time::sleep(std::time::Duration::from_secs(10)).await;
        });
        let (c, _) = client(Arc::new(NoHooks));
        let token = CancellationToken::new();
        let t = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            t.cancel();
        });
        let r = c
            .send_request_cancellable(&format!("gemini://127.0.0.1:{}/", port), &token)
            .await;
        assert_eq!(r.failure_kind(), Some(FailureKind::Cancelled));
        server.abort();
    }
}
