//! auth - OIDC session lifecycle
//!
//! This module owns "who is signed in, and with which bearer token".
//!
//! # Architecture
//!
//! The auth system:
//! - Signs in with the OIDC authorization-code flow and PKCE
//! - Keeps the current [`Session`] in a [`TokenHolder`]
//! - Renews tokens with refresh-token rotation, single-flight per process
//!   and guarded across processes by per-authority file locks
//! - Persists token bundles in a [`SessionStore`](crate::store::SessionStore)
//! - Never exposes tokens in logs, errors, or outputs
//!
//! # Components
//!
//! - [`TokenHolder`] - Session state container and lifecycle operations
//! - [`TokenSource`] - What the HTTP layer needs from the holder
//! - [`IdentityProvider`] - Seam to the identity provider
//! - [`OidcProvider`] - OIDC implementation of `IdentityProvider`
//! - [`Claims`], [`Session`], [`AuthResult`] - Principal model
//! - [`TokenBundle`] - JSON schema for stored OIDC tokens
//! - [`AuthLock`] - File-based lock for concurrent refresh protection
//! - [`Navigator`] - Where the user goes when the session ends
//! - [`mock`] - Scripted provider for tests
//!
//! # Security
//!
//! Tokens MUST never appear in logs (including `--debug`), JSON outputs,
//! error messages or debug output. Every token-bearing type in this module
//! implements a redacting Debug.

mod callback;
mod claims;
mod errors;
mod holder;
mod lock;
pub mod mock;
mod navigator;
mod oidc;
mod pkce;
mod provider;
mod session;
mod token_bundle;

pub use callback::{CallbackListener, CALLBACK_TIMEOUT};
pub use claims::{normalize_roles, Claims, RoleClaim, EMAIL_PLACEHOLDER_DOMAIN};
pub use errors::{AuthError, RefreshError};
pub use holder::{InitOutcome, SignedIn, TokenHolder, REDIRECT_HINT_KEY};
pub use lock::{AuthLock, DEFAULT_LOCK_TIMEOUT};
pub use navigator::{ConsoleNavigator, Navigator, NoopNavigator};
pub use oidc::{AuthorizationRequest, Discovery, OidcProvider};
pub use pkce::{PkcePair, CHALLENGE_METHOD};
pub use provider::IdentityProvider;
pub use session::{AuthResult, Session, SessionUser};
pub use token_bundle::{
    authority_fingerprint, BundleTimestamps, TokenBundle, TokenInfo, EXPIRY_BUFFER_SECS,
    TOKEN_BUNDLE_KIND, TOKEN_BUNDLE_VERSION,
};

/// The session operations the HTTP layer depends on.
///
/// [`TokenHolder`] is the production implementation.
///
/// # Implementation Notes
///
/// Implementors must:
/// - Answer `current_token` synchronously and without side effects
/// - Leave the session signed out whenever `refresh` returns an error
/// - Make `logout` idempotent and infallible
/// - Never log or expose token values
#[async_trait::async_trait]
pub trait TokenSource: Send + Sync {
    /// The bearer token currently held, if any.
    fn current_token(&self) -> Option<String>;

    /// Whether a valid session exists.
    fn is_authenticated(&self) -> bool;

    /// Renew the session.
    async fn refresh(&self) -> Result<Session, RefreshError>;

    /// End the session.
    async fn logout(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_bundle_kind_is_correct() {
        assert_eq!(TOKEN_BUNDLE_KIND, "aula.oidc-session");
    }

    #[test]
    fn expiry_buffer_is_one_minute() {
        assert_eq!(EXPIRY_BUFFER_SECS, 60);
    }

    #[test]
    fn redirect_hint_key_is_stable() {
        assert_eq!(REDIRECT_HINT_KEY, "auth.redirect_url");
    }
}
