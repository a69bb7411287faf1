//! auth::token_bundle
//!
//! Persisted OIDC state for one authority.
//!
//! A bundle records which authority and client issued it, the bearer and
//! refresh tokens with the access token's expiry, and the last known claims
//! so a restart can rebuild the session offline.
//!
//! Bundles live in the [`SessionStore`](crate::store::SessionStore) under
//! `oidc.bundle.<fingerprint>`, where the fingerprint is derived from the
//! authority URL.
//!
//! Debug output of both types replaces every token with `[REDACTED]`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use super::claims::Claims;
use super::errors::AuthError;

/// Value of the `kind` field.
pub const TOKEN_BUNDLE_KIND: &str = "aula.oidc-session";

/// Layout version written by this build.
pub const TOKEN_BUNDLE_VERSION: u32 = 1;

/// Seconds before expiry at which a stored token counts as stale.
pub const EXPIRY_BUFFER_SECS: i64 = 60;

/// Lifetime assumed when the token endpoint omits `expires_in`.
pub const DEFAULT_ACCESS_TOKEN_LIFETIME_SECS: u64 = 300;

/// Short, filesystem-safe fingerprint of an authority URL.
///
/// ```
/// use aula::auth::authority_fingerprint;
///
/// let a = authority_fingerprint("https://id.example.edu/realms/aula");
/// assert_eq!(a.len(), 16);
/// assert_eq!(a, authority_fingerprint("https://id.example.edu/realms/aula/"));
/// ```
pub fn authority_fingerprint(authority: &str) -> String {
    let digest = Sha256::digest(authority.trim_end_matches('/').as_bytes());
    hex::encode(&digest[..8])
}

/// The persisted session for one authority.
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenBundle {
    pub kind: String,

    pub schema_version: u32,

    /// Authority the tokens were issued by.
    pub authority: String,

    pub client_id: String,

    pub tokens: TokenInfo,

    /// Claims from the last id token or profile lookup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claims: Option<Claims>,

    pub timestamps: BundleTimestamps,
}

/// Tokens from the most recent token endpoint response.
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenInfo {
    pub access_token: String,

    pub access_token_expires_at: DateTime<Utc>,

    /// Refresh token, when the provider issued one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Id token, kept as the `id_token_hint` for end-session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleTimestamps {
    pub created_at: DateTime<Utc>,

    /// Moves forward on every refresh.
    pub updated_at: DateTime<Utc>,
}

impl TokenBundle {
    /// Bundle for a fresh sign-in.
    pub fn new(
        authority: &str,
        client_id: &str,
        tokens: TokenInfo,
        claims: Option<Claims>,
    ) -> Self {
        let now = Utc::now();
        Self {
            kind: TOKEN_BUNDLE_KIND.to_string(),
            schema_version: TOKEN_BUNDLE_VERSION,
            authority: authority.to_string(),
            client_id: client_id.to_string(),
            tokens,
            claims,
            timestamps: BundleTimestamps {
                created_at: now,
                updated_at: now,
            },
        }
    }

    /// Key under which the bundle for `authority` is stored.
    ///
    /// # Example
    ///
    /// ```
    /// use aula::auth::{authority_fingerprint, TokenBundle};
    ///
    /// let authority = "https://id.example.edu/realms/aula";
    /// assert_eq!(
    ///     TokenBundle::store_key(authority),
    ///     format!("oidc.bundle.{}", authority_fingerprint(authority)),
    /// );
    /// ```
    pub fn store_key(authority: &str) -> String {
        format!("oidc.bundle.{}", authority_fingerprint(authority))
    }

    /// The access token is past its expiry.
    pub fn is_access_token_expired(&self) -> bool {
        Utc::now() >= self.tokens.access_token_expires_at
    }

    /// The access token expires within [`EXPIRY_BUFFER_SECS`].
    pub fn needs_refresh(&self) -> bool {
        let buffer = Duration::seconds(EXPIRY_BUFFER_SECS);
        Utc::now() >= self.tokens.access_token_expires_at - buffer
    }

    /// Whether a refresh token is available.
    pub fn can_refresh(&self) -> bool {
        self.tokens
            .refresh_token
            .as_deref()
            .is_some_and(|t| !t.is_empty())
    }

    /// Decode a stored bundle, rejecting foreign kinds and other layout
    /// versions with [`AuthError::InvalidBundle`].
    pub fn parse(json: &str) -> Result<Self, AuthError> {
        let bundle: Self = serde_json::from_str(json)?;

        if bundle.kind != TOKEN_BUNDLE_KIND {
            return Err(AuthError::InvalidBundle(format!(
                "stored value is a '{}', not a session bundle",
                bundle.kind
            )));
        }

        if bundle.schema_version != TOKEN_BUNDLE_VERSION {
            return Err(AuthError::InvalidBundle(format!(
                "session bundle layout v{} cannot be read (this build reads v{})",
                bundle.schema_version, TOKEN_BUNDLE_VERSION
            )));
        }

        Ok(bundle)
    }

    pub fn to_json(&self) -> Result<String, AuthError> {
        serde_json::to_string_pretty(self).map_err(|e| AuthError::InvalidBundle(e.to_string()))
    }

    /// Apply a refresh response.
    ///
    /// Refresh tokens rotate: a new one replaces the old, and an absent one
    /// keeps the old. The id token and claims follow the same rule.
    pub fn with_refreshed_tokens(&self, tokens: TokenInfo, claims: Option<Claims>) -> Self {
        let refresh_token = tokens
            .refresh_token
            .or_else(|| self.tokens.refresh_token.clone());
        let id_token = tokens.id_token.or_else(|| self.tokens.id_token.clone());

        Self {
            kind: self.kind.clone(),
            schema_version: self.schema_version,
            authority: self.authority.clone(),
            client_id: self.client_id.clone(),
            tokens: TokenInfo {
                access_token: tokens.access_token,
                access_token_expires_at: tokens.access_token_expires_at,
                refresh_token,
                id_token,
            },
            claims: claims.or_else(|| self.claims.clone()),
            timestamps: BundleTimestamps {
                created_at: self.timestamps.created_at,
                updated_at: Utc::now(),
            },
        }
    }
}

impl TokenInfo {
    /// Expiry is computed from `expires_in`, or the default lifetime.
    pub fn new(
        access_token: String,
        expires_in: Option<u64>,
        refresh_token: Option<String>,
        id_token: Option<String>,
    ) -> Self {
        let lifetime = expires_in.unwrap_or(DEFAULT_ACCESS_TOKEN_LIFETIME_SECS);
        Self {
            access_token,
            access_token_expires_at: Utc::now() + Duration::seconds(lifetime as i64),
            refresh_token,
            id_token,
        }
    }
}

impl fmt::Debug for TokenBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenBundle")
            .field("kind", &self.kind)
            .field("schema_version", &self.schema_version)
            .field("authority", &self.authority)
            .field("client_id", &self.client_id)
            .field("tokens", &self.tokens)
            .field("subject", &self.claims.as_ref().map(|c| c.sub.as_str()))
            .field("timestamps", &self.timestamps)
            .finish()
    }
}

impl fmt::Debug for TokenInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |t: &Option<String>| t.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("TokenInfo")
            .field("access_token", &"[REDACTED]")
            .field("access_token_expires_at", &self.access_token_expires_at)
            .field("refresh_token", &redact(&self.refresh_token))
            .field("id_token", &redact(&self.id_token))
            .finish()
    }
}
