//! auth::provider
//!
//! The identity-provider seam.
//!
//! [`TokenHolder`](super::TokenHolder) talks to the identity provider only
//! through [`IdentityProvider`], so the session lifecycle can be driven by
//! the real OIDC client ([`super::OidcProvider`]) or by
//! [`super::mock::MockIdentityProvider`] in tests.

use async_trait::async_trait;

use super::claims::Claims;
use super::errors::AuthError;
use super::session::AuthResult;

/// Operations the session lifecycle needs from an identity provider.
///
/// Implementations must never log or return token values in errors.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Report the current authentication state, renewing silently if the
    /// provider is configured to.
    async fn check_auth(&self) -> Result<AuthResult, AuthError>;

    /// Renew the session using the refresh credential the provider holds.
    async fn refresh_session(&self) -> Result<AuthResult, AuthError>;

    /// Revoke held tokens and forget them.
    async fn revoke(&self) -> Result<(), AuthError>;

    /// Look up profile claims for the given access token.
    async fn user_profile(&self, access_token: &str) -> Result<Claims, AuthError>;

    /// Issuer / authority URL.
    fn authority(&self) -> &str;
}
