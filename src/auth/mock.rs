//! auth::mock
//!
//! Scripted identity provider and recording navigator for deterministic
//! testing.
//!
//! # Example
//!
//! ```
//! use aula::auth::mock::MockIdentityProvider;
//! use aula::auth::{AuthResult, Claims, IdentityProvider};
//!
//! # tokio_test::block_on(async {
//! let idp = MockIdentityProvider::new();
//! idp.push_refresh(Ok(AuthResult::authenticated("new-token", Some(Claims::with_subject("u1")))));
//!
//! let result = idp.refresh_session().await.unwrap();
//! assert_eq!(result.usable_token(), Some("new-token"));
//! assert_eq!(idp.refresh_calls(), 1);
//! # });
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::claims::Claims;
use super::errors::AuthError;
use super::navigator::Navigator;
use super::provider::IdentityProvider;
use super::session::AuthResult;

/// Authority reported by the mock.
pub const MOCK_AUTHORITY: &str = "https://id.mock.invalid";

/// Identity provider with scripted results and call counters.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share state.
/// When a script runs dry, `check_auth` reports unauthenticated and
/// `refresh_session` fails with [`AuthError::Expired`].
#[derive(Debug, Clone, Default)]
pub struct MockIdentityProvider {
    inner: Arc<MockInner>,
}

#[derive(Debug, Default)]
struct MockInner {
    checks: Mutex<VecDeque<Result<AuthResult, AuthError>>>,
    refreshes: Mutex<VecDeque<Result<AuthResult, AuthError>>>,
    profiles: Mutex<VecDeque<Result<Claims, AuthError>>>,
    refresh_delay: Mutex<Option<Duration>>,
    fail_revoke: Mutex<bool>,
    check_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    revoke_calls: AtomicUsize,
    profile_calls: AtomicUsize,
}

impl MockIdentityProvider {
    /// Create a mock with empty scripts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next `check_auth` result.
    pub fn push_check(&self, result: Result<AuthResult, AuthError>) {
        lock(&self.inner.checks).push_back(result);
    }

    /// Queue the next `refresh_session` result.
    pub fn push_refresh(&self, result: Result<AuthResult, AuthError>) {
        lock(&self.inner.refreshes).push_back(result);
    }

    /// Queue the next `user_profile` result.
    pub fn push_profile(&self, result: Result<Claims, AuthError>) {
        lock(&self.inner.profiles).push_back(result);
    }

    /// Make every `refresh_session` call sleep first, to widen race windows.
    pub fn set_refresh_delay(&self, delay: Duration) {
        *lock(&self.inner.refresh_delay) = Some(delay);
    }

    /// Make `revoke` fail.
    pub fn set_revoke_fails(&self, fails: bool) {
        *lock(&self.inner.fail_revoke) = fails;
    }

    pub fn check_calls(&self) -> usize {
        self.inner.check_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.inner.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn revoke_calls(&self) -> usize {
        self.inner.revoke_calls.load(Ordering::SeqCst)
    }

    pub fn profile_calls(&self) -> usize {
        self.inner.profile_calls.load(Ordering::SeqCst)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn check_auth(&self) -> Result<AuthResult, AuthError> {
        self.inner.check_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.inner.checks)
            .pop_front()
            .unwrap_or_else(|| Ok(AuthResult::unauthenticated()))
    }

    async fn refresh_session(&self) -> Result<AuthResult, AuthError> {
        self.inner.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *lock(&self.inner.refresh_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        lock(&self.inner.refreshes)
            .pop_front()
            .unwrap_or_else(|| Err(AuthError::Expired(MOCK_AUTHORITY.to_string())))
    }

    async fn revoke(&self) -> Result<(), AuthError> {
        self.inner.revoke_calls.fetch_add(1, Ordering::SeqCst);
        if *lock(&self.inner.fail_revoke) {
            return Err(AuthError::Network("revocation endpoint unreachable".into()));
        }
        Ok(())
    }

    async fn user_profile(&self, _access_token: &str) -> Result<Claims, AuthError> {
        self.inner.profile_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.inner.profiles)
            .pop_front()
            .unwrap_or_else(|| Err(AuthError::Unsupported("no scripted profile".into())))
    }

    fn authority(&self) -> &str {
        MOCK_AUTHORITY
    }
}

/// Navigator that counts sign-in redirects.
#[derive(Debug, Clone, Default)]
pub struct RecordingNavigator {
    redirects: Arc<AtomicUsize>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times the user was sent to sign-in.
    pub fn sign_in_redirects(&self) -> usize {
        self.redirects.load(Ordering::SeqCst)
    }
}

impl Navigator for RecordingNavigator {
    fn to_sign_in(&self) {
        self.redirects.fetch_add(1, Ordering::SeqCst);
    }
}
