//! http::mock
//!
//! Scripted transport, recording notifier and a fixed token source for
//! testing the HTTP layer without a network or an identity provider.
//!
//! # Example
//!
//! ```
//! use aula::http::mock::MockTransport;
//! use aula::http::{ApiRequest, Transport};
//! use reqwest::{StatusCode, Url};
//!
//! # tokio_test::block_on(async {
//! let transport = MockTransport::new();
//! transport.push_status(StatusCode::OK, "[]");
//!
//! let request = ApiRequest::get(Url::parse("https://api.example.edu/api").unwrap());
//! let response = transport.send(&request).await.unwrap();
//! assert!(response.is_success());
//! assert_eq!(transport.request_count(), 1);
//! # });
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{StatusCode, Url};
use serde::Serialize;

use super::notify::{Notification, Notifier};
use super::request::{ApiRequest, ApiResponse, HttpError};
use super::transport::Transport;
use crate::auth::{RefreshError, Session, SessionUser, TokenSource};

/// What a [`MockTransport`] saw for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub url: Url,
    pub authorization: Option<String>,
    pub is_retry: bool,
    pub body: Option<Vec<u8>>,
}

/// Transport that replays scripted outcomes in order.
///
/// Clones share the script and the log. An empty script answers with a
/// network error.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    inner: Arc<TransportInner>,
}

#[derive(Debug, Default)]
struct TransportInner {
    script: Mutex<VecDeque<Result<ApiResponse, HttpError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a full response.
    pub fn push_response(&self, response: ApiResponse) {
        lock(&self.inner.script).push_back(Ok(response));
    }

    /// Queue a response with a status and body.
    pub fn push_status(&self, status: StatusCode, body: impl Into<Vec<u8>>) {
        self.push_response(ApiResponse::new(status, HeaderMap::new(), body));
    }

    /// Queue a 200 with a JSON body.
    pub fn push_json<T: Serialize>(&self, body: &T) {
        let bytes = serde_json::to_vec(body).unwrap_or_default();
        self.push_status(StatusCode::OK, bytes);
    }

    /// Queue a failure to get any response.
    pub fn push_error(&self, err: HttpError) {
        lock(&self.inner.script).push_back(Err(err));
    }

    /// Requests seen so far, in order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.inner.requests).clone()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.inner.requests).len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, HttpError> {
        lock(&self.inner.requests).push(RecordedRequest {
            method: request.method().to_string(),
            url: request.url().clone(),
            authorization: request.authorization().map(str::to_string),
            is_retry: request.is_retry(),
            body: request.body().map(<[u8]>::to_vec),
        });
        lock(&self.inner.script)
            .pop_front()
            .unwrap_or_else(|| Err(HttpError::Network("no scripted response".into())))
    }
}

/// Notifier that keeps everything it is given.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    seen: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        lock(&self.seen).clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        lock(&self.seen).push(notification);
    }
}

/// Subject reported by [`StaticTokens`] sessions.
pub const STATIC_SUBJECT: &str = "static-user";

/// Token source holding a fixed token.
///
/// `refresh` installs the token set with
/// [`set_next_token`](Self::set_next_token), or keeps the current one when
/// none was set. After [`fail_refresh`](Self::fail_refresh) it signs out
/// and returns an error instead.
#[derive(Debug, Clone, Default)]
pub struct StaticTokens {
    inner: Arc<TokensInner>,
}

#[derive(Debug, Default)]
struct TokensInner {
    token: Mutex<Option<String>>,
    next: Mutex<Option<Option<String>>>,
    fail_refresh: Mutex<bool>,
    refresh_calls: AtomicUsize,
    logout_calls: AtomicUsize,
}

impl StaticTokens {
    pub fn new(token: Option<&str>) -> Self {
        let tokens = Self::default();
        *lock(&tokens.inner.token) = token.map(str::to_string);
        tokens
    }

    /// The token the next refresh installs. `None` makes refresh succeed
    /// without a token.
    pub fn set_next_token(&self, token: Option<&str>) {
        *lock(&self.inner.next) = Some(token.map(str::to_string));
    }

    /// Make every later refresh fail.
    pub fn fail_refresh(&self) {
        *lock(&self.inner.fail_refresh) = true;
    }

    pub fn refresh_calls(&self) -> usize {
        self.inner.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn logout_calls(&self) -> usize {
        self.inner.logout_calls.load(Ordering::SeqCst)
    }

    fn session_for(token: Option<String>) -> Session {
        match token {
            Some(token) => Session::authenticated(
                SessionUser {
                    subject: STATIC_SUBJECT.to_string(),
                    display_name: STATIC_SUBJECT.to_string(),
                    email: format!("{}@users.invalid", STATIC_SUBJECT),
                    roles: Vec::new(),
                    avatar_url: None,
                },
                token,
            ),
            None => Session::unauthenticated(),
        }
    }
}

#[async_trait]
impl TokenSource for StaticTokens {
    fn current_token(&self) -> Option<String> {
        lock(&self.inner.token).clone()
    }

    fn is_authenticated(&self) -> bool {
        lock(&self.inner.token).is_some()
    }

    async fn refresh(&self) -> Result<Session, RefreshError> {
        self.inner.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if *lock(&self.inner.fail_refresh) {
            *lock(&self.inner.token) = None;
            return Err(RefreshError::Unauthenticated);
        }

        let mut token = lock(&self.inner.token);
        if let Some(next) = lock(&self.inner.next).take() {
            *token = next;
        }
        Ok(Self::session_for(token.clone()))
    }

    async fn logout(&self) {
        self.inner.logout_calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.inner.token) = None;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_script_is_a_network_error() {
        let transport = MockTransport::new();
        let request = ApiRequest::get(Url::parse("https://api.example.edu/api").unwrap());
        assert!(matches!(
            transport.send(&request).await,
            Err(HttpError::Network(_))
        ));
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn static_tokens_rotate_on_refresh() {
        let tokens = StaticTokens::new(Some("a"));
        tokens.set_next_token(Some("b"));

        let session = tokens.refresh().await.unwrap();
        assert_eq!(session.access_token(), Some("b"));
        assert_eq!(tokens.current_token().as_deref(), Some("b"));

        // No next token queued: the current one stays.
        tokens.refresh().await.unwrap();
        assert_eq!(tokens.current_token().as_deref(), Some("b"));
        assert_eq!(tokens.refresh_calls(), 2);
    }

    #[tokio::test]
    async fn failed_refresh_signs_out() {
        let tokens = StaticTokens::new(Some("a"));
        tokens.fail_refresh();
        assert!(tokens.refresh().await.is_err());
        assert!(!tokens.is_authenticated());
        assert_eq!(tokens.logout_calls(), 0);
    }
}
