//! auth::errors
//!
//! Authentication error types.
//!
//! Error messages MUST NOT contain tokens. Every variant carries enough
//! context to act on without exposing credentials.
//!
//! # Example
//!
//! ```
//! use aula::auth::AuthError;
//!
//! let err = AuthError::NotAuthenticated("https://id.example.edu".to_string());
//! assert!(err.to_string().contains("id.example.edu"));
//! assert!(err.needs_reauth());
//! ```

use thiserror::Error;

/// Errors from identity-provider and session operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No session exists for the authority.
    #[error("not signed in to '{0}'. Run 'aula login'.")]
    NotAuthenticated(String),

    /// The refresh credential is missing, expired or was rejected.
    #[error("session expired for '{0}'. Run 'aula login' again.")]
    Expired(String),

    /// The identity provider returned an OAuth error response.
    #[error("identity provider error: {error}{}", parenthesized(.description))]
    Provider {
        /// OAuth error code (e.g. `invalid_grant`)
        error: String,
        /// Human-readable description
        description: Option<String>,
    },

    /// The identity provider answered with an unexpected HTTP status.
    #[error("identity provider returned HTTP {status}: {message}")]
    UnexpectedStatus {
        /// HTTP status code
        status: u16,
        /// Response body or summary
        message: String,
    },

    /// Discovery document is missing or incomplete.
    #[error("OIDC discovery failed: {0}")]
    Discovery(String),

    /// An issued token or claim set failed validation.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// Interactive sign-in was cancelled, denied, or returned a mismatched state.
    #[error("sign-in did not complete: {0}")]
    SignInFailed(String),

    /// Interactive sign-in timed out waiting for the browser callback.
    #[error("timed out waiting for the sign-in callback")]
    CallbackTimeout,

    /// Failed to acquire the refresh lock.
    #[error("failed to acquire auth lock: {0}")]
    LockError(String),

    /// Lock acquisition timed out.
    #[error("auth lock timeout - another process may be refreshing tokens")]
    LockTimeout,

    /// Stored token bundle is invalid or cannot be parsed.
    #[error("invalid token bundle: {0}")]
    InvalidBundle(String),

    /// Error from session storage.
    #[error("session store error: {0}")]
    Store(String),

    /// Network error while talking to the identity provider.
    #[error("network error: {0}")]
    Network(String),

    /// The operation is not supported by this provider.
    #[error("not supported: {0}")]
    Unsupported(String),

    /// Internal error (should not happen).
    #[error("internal auth error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Whether the user must sign in again to recover.
    pub fn needs_reauth(&self) -> bool {
        match self {
            AuthError::NotAuthenticated(_)
            | AuthError::Expired(_)
            | AuthError::SignInFailed(_)
            | AuthError::CallbackTimeout => true,
            AuthError::Provider { error, .. } => error == "invalid_grant",
            _ => false,
        }
    }

    /// Whether this failure might succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            AuthError::Network(_) | AuthError::LockTimeout | AuthError::LockError(_) => true,
            AuthError::UnexpectedStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<crate::store::StoreError> for AuthError {
    fn from(err: crate::store::StoreError) -> Self {
        AuthError::Store(err.to_string())
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        // Strip the URL: authorization and callback URLs carry codes and state
        AuthError::Network(err.without_url().to_string())
    }
}

impl From<std::io::Error> for AuthError {
    fn from(err: std::io::Error) -> Self {
        AuthError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(err: serde_json::Error) -> Self {
        AuthError::InvalidBundle(err.to_string())
    }
}

fn parenthesized(description: &Option<String>) -> String {
    description
        .as_deref()
        .map(|d| format!(" ({})", d))
        .unwrap_or_default()
}

/// Why a refresh did not produce a usable session.
///
/// Every variant means the session has been torn down.
#[derive(Debug, Error)]
pub enum RefreshError {
    /// The provider rejected or could not complete renewal.
    #[error("session refresh failed: {0}")]
    Provider(#[from] AuthError),

    /// The provider reported the principal as signed out.
    #[error("session refresh returned an unauthenticated result")]
    Unauthenticated,

    /// Renewal reported success without a usable access token.
    #[error("session refresh returned no access token")]
    NoToken,

    /// A concurrent refresh this call waited on ended the session.
    #[error("session ended while waiting for a concurrent refresh")]
    SessionEnded,
}
