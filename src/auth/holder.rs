//! auth::holder
//!
//! TokenHolder - the single source of truth for "am I authenticated, and
//! what is my current bearer token".
//!
//! # Architecture
//!
//! The holder is an explicit state container: construct one, share it by
//! `Arc`, and pass it to whatever needs the session. The session is
//! published through a tokio `watch` channel so observers see every
//! change without polling.
//!
//! The session is written only by [`TokenHolder::initialize`],
//! [`TokenHolder::complete_sign_in`], [`TokenHolder::refresh`],
//! [`TokenHolder::load_profile`] and [`TokenHolder::logout`].
//!
//! # Concurrency
//!
//! `refresh` is single-flight. Callers serialize on an async gate, and a
//! caller that waited while another refresh replaced the session reuses
//! that outcome instead of renewing again:
//!
//! 1. Note the session generation
//! 2. Acquire the refresh gate
//! 3. If the generation moved, return the current session
//! 4. Otherwise renew with the identity provider
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use aula::auth::mock::{MockIdentityProvider, RecordingNavigator};
//! use aula::auth::{AuthResult, Claims, TokenHolder};
//! use aula::store::MemorySessionStore;
//!
//! # tokio_test::block_on(async {
//! let idp = MockIdentityProvider::new();
//! idp.push_check(Ok(AuthResult::authenticated("token", Some(Claims::with_subject("user-123")))));
//!
//! let holder = TokenHolder::new(
//!     Arc::new(idp),
//!     Arc::new(MemorySessionStore::new()),
//!     Arc::new(RecordingNavigator::new()),
//! );
//! holder.initialize().await;
//! assert!(holder.is_authenticated());
//! assert_eq!(holder.current_token().as_deref(), Some("token"));
//! # });
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use super::errors::{AuthError, RefreshError};
use super::navigator::Navigator;
use super::provider::IdentityProvider;
use super::session::{AuthResult, Session, SessionUser};
use super::TokenSource;
use crate::store::SessionStore;

/// Session-store key for the post-sign-in redirect hint.
pub const REDIRECT_HINT_KEY: &str = "auth.redirect_url";

/// A completed sign-in.
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub session: Session,
    /// The redirect hint that was waiting, consumed by this sign-in.
    pub redirect: Option<String>,
}

/// Result of [`TokenHolder::initialize`].
#[derive(Debug)]
pub enum InitOutcome {
    /// A session was restored.
    SignedIn(SignedIn),
    /// The provider reported no session.
    SignedOut,
    /// The provider check failed; the session was cleared.
    Failed(AuthError),
}

impl InitOutcome {
    pub fn is_signed_in(&self) -> bool {
        matches!(self, InitOutcome::SignedIn(_))
    }
}

/// Holds the current [`Session`].
pub struct TokenHolder {
    provider: Arc<dyn IdentityProvider>,
    store: Arc<dyn SessionStore>,
    navigator: Arc<dyn Navigator>,
    state: watch::Sender<Session>,
    /// Bumped every time the session is replaced.
    generation: AtomicU64,
    refresh_gate: Mutex<()>,
}

impl TokenHolder {
    /// Create a holder with a signed-out session.
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        store: Arc<dyn SessionStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let (state, _) = watch::channel(Session::unauthenticated());
        Self {
            provider,
            store,
            navigator,
            state,
            generation: AtomicU64::new(0),
            refresh_gate: Mutex::new(()),
        }
    }

    /// Snapshot of the current session.
    pub fn session(&self) -> Session {
        self.state.borrow().clone()
    }

    /// Observe session changes.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    /// The bearer token currently held.
    pub fn current_token(&self) -> Option<String> {
        self.state.borrow().access_token().map(str::to_string)
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn authority(&self) -> &str {
        self.provider.authority()
    }

    fn install(&self, session: Session) {
        self.state.send_replace(session);
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn take_redirect_hint(&self) -> Option<String> {
        match self.store.take(REDIRECT_HINT_KEY) {
            Ok(hint) => hint,
            Err(e) => {
                warn!(error = %e, "cannot read redirect hint");
                None
            }
        }
    }

    /// Ask the provider for the current state and install it.
    ///
    /// A restored session consumes the redirect hint. When the provider
    /// reports no session, or the check fails, the session is cleared and
    /// the hint stays in place for the next sign-in.
    pub async fn initialize(&self) -> InitOutcome {
        match self.provider.check_auth().await {
            Ok(result) => {
                let session = Session::from_auth_result(&result);
                if !session.is_authenticated() {
                    debug!("no session to restore");
                    self.install(Session::unauthenticated());
                    return InitOutcome::SignedOut;
                }
                info!(subject = session.subject().unwrap_or_default(), "session restored");
                self.install(session.clone());
                InitOutcome::SignedIn(SignedIn {
                    session,
                    redirect: self.take_redirect_hint(),
                })
            }
            Err(e) => {
                warn!(error = %e, "session check failed");
                self.install(Session::unauthenticated());
                InitOutcome::Failed(e)
            }
        }
    }

    /// Install the result of an interactive sign-in.
    ///
    /// # Errors
    ///
    /// [`AuthError::SignInFailed`] when the result is not a usable session;
    /// the held session is cleared in that case.
    pub async fn complete_sign_in(&self, result: AuthResult) -> Result<SignedIn, AuthError> {
        let session = Session::from_auth_result(&result);
        if !session.is_authenticated() {
            self.install(Session::unauthenticated());
            return Err(AuthError::SignInFailed(
                "identity provider did not return an authenticated session".to_string(),
            ));
        }
        info!(subject = session.subject().unwrap_or_default(), "signed in");
        self.install(session.clone());
        Ok(SignedIn {
            session,
            redirect: self.take_redirect_hint(),
        })
    }

    /// Remember where to send the user after the next sign-in.
    pub fn remember_redirect(&self, url: &str) -> Result<(), AuthError> {
        self.store.set(REDIRECT_HINT_KEY, url)?;
        Ok(())
    }

    /// Renew the session with the identity provider.
    ///
    /// On success the held session is replaced and returned. On any
    /// failure the holder logs out exactly once and returns the reason.
    pub async fn refresh(&self) -> Result<Session, RefreshError> {
        let observed = self.generation.load(Ordering::SeqCst);
        let _gate = self.refresh_gate.lock().await;

        if self.generation.load(Ordering::SeqCst) != observed {
            debug!("session replaced while waiting, reusing outcome");
            let session = self.session();
            return if session.is_authenticated() {
                Ok(session)
            } else {
                Err(RefreshError::SessionEnded)
            };
        }

        debug!("refreshing session");
        let failure = match self.provider.refresh_session().await {
            Ok(result) if !result.is_authenticated => RefreshError::Unauthenticated,
            Ok(result) => match self.renewed_session(&result) {
                Some(session) => {
                    info!("session refreshed");
                    self.install(session.clone());
                    return Ok(session);
                }
                None => RefreshError::NoToken,
            },
            Err(e) => RefreshError::Provider(e),
        };

        warn!(error = %failure, "session refresh failed, signing out");
        self.logout().await;
        Err(failure)
    }

    /// The session a successful renewal produces, keeping the current
    /// principal when the provider sent a token without claims.
    fn renewed_session(&self, result: &AuthResult) -> Option<Session> {
        let token = result.usable_token()?;
        match result.user_data.as_ref().and_then(SessionUser::from_claims) {
            Some(user) => Some(Session::authenticated(user, token)),
            None => {
                let current = self.session();
                current
                    .is_authenticated()
                    .then(|| current.with_access_token(token))
            }
        }
    }

    /// End the session.
    ///
    /// Clears the session, revokes tokens (best-effort), forgets the
    /// redirect hint and sends the user to sign-in. Never fails; calling
    /// it again is harmless.
    pub async fn logout(&self) {
        self.install(Session::unauthenticated());

        if let Err(e) = self.provider.revoke().await {
            warn!(error = %e, "token revocation failed");
        }
        if let Err(e) = self.store.delete(REDIRECT_HINT_KEY) {
            warn!(error = %e, "cannot clear redirect hint");
        }

        info!("signed out");
        self.navigator.to_sign_in();
    }

    /// Fetch profile claims and merge them into the session.
    pub async fn load_profile(&self) -> Result<Session, AuthError> {
        let token = self
            .current_token()
            .ok_or_else(|| AuthError::NotAuthenticated(self.authority().to_string()))?;
        let profile = self.provider.user_profile(&token).await?;

        let changed = self
            .state
            .send_if_modified(|session| session.merge_profile(&profile));
        if changed {
            debug!("profile merged into session");
        }
        Ok(self.session())
    }
}

#[async_trait]
impl TokenSource for TokenHolder {
    fn current_token(&self) -> Option<String> {
        TokenHolder::current_token(self)
    }

    fn is_authenticated(&self) -> bool {
        TokenHolder::is_authenticated(self)
    }

    async fn refresh(&self) -> Result<Session, RefreshError> {
        TokenHolder::refresh(self).await
    }

    async fn logout(&self) {
        TokenHolder::logout(self).await
    }
}

impl std::fmt::Debug for TokenHolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenHolder")
            .field("authority", &self.authority())
            .field("session", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}
