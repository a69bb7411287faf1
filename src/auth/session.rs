//! auth::session
//!
//! The authenticated principal and what the identity provider reports.
//!
//! # Invariants
//!
//! - An authenticated [`Session`] always has a non-empty subject and a
//!   non-empty access token.
//! - An unauthenticated `Session` retains nothing: no claims, no token.
//!
//! Both are enforced by construction; fields are private.

use std::fmt;

use serde::Serialize;

use super::claims::Claims;

/// Profile data for the signed-in subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionUser {
    /// Stable subject identifier.
    pub subject: String,
    pub display_name: String,
    pub email: String,
    pub roles: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl SessionUser {
    /// Derive the user from claims. `None` when the subject is blank.
    pub fn from_claims(claims: &Claims) -> Option<Self> {
        let subject = claims.sub.trim();
        if subject.is_empty() {
            return None;
        }
        Some(Self {
            subject: subject.to_string(),
            display_name: claims.display_name(),
            email: claims.email_or_placeholder(),
            roles: claims.roles(),
            avatar_url: claims.avatar_url().map(str::to_string),
        })
    }
}

/// Current authentication state.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Session {
    user: Option<SessionUser>,
    access_token: Option<String>,
}

impl Session {
    /// The signed-out session.
    pub fn unauthenticated() -> Self {
        Self::default()
    }

    /// An authenticated session. Returns the signed-out session when the
    /// token is blank.
    pub fn authenticated(user: SessionUser, access_token: impl Into<String>) -> Self {
        let access_token = access_token.into();
        if access_token.trim().is_empty() || user.subject.trim().is_empty() {
            return Self::unauthenticated();
        }
        Self {
            user: Some(user),
            access_token: Some(access_token),
        }
    }

    /// Build a session from a provider report.
    ///
    /// Authenticated only when the report says so and carries both a token
    /// and claims with a subject.
    pub fn from_auth_result(result: &AuthResult) -> Self {
        if !result.is_authenticated {
            return Self::unauthenticated();
        }
        let user = result.user_data.as_ref().and_then(SessionUser::from_claims);
        match (user, result.access_token.as_deref()) {
            (Some(user), Some(token)) => Self::authenticated(user, token),
            _ => Self::unauthenticated(),
        }
    }

    /// The same principal with a new access token.
    pub fn with_access_token(&self, access_token: impl Into<String>) -> Self {
        match &self.user {
            Some(user) => Self::authenticated(user.clone(), access_token),
            None => Self::unauthenticated(),
        }
    }

    /// Merge a profile lookup into this session.
    ///
    /// Applies only when the profile's subject matches. Each field is
    /// overwritten only when the profile carries a value for it, and the
    /// token is never touched. Returns whether anything changed.
    pub fn merge_profile(&mut self, profile: &Claims) -> bool {
        let Some(user) = self.user.as_mut() else {
            return false;
        };
        if profile.sub.trim() != user.subject {
            return false;
        }

        let mut merged = user.clone();
        // A name derived from the old email or the subject yields to the
        // profile's email.
        let fallback_name =
            merged.display_name == merged.subject || merged.display_name == merged.email;
        if let Some(email) = profile.email() {
            merged.email = email.to_string();
        }
        if let Some(name) = profile.personal_name() {
            merged.display_name = name;
        } else if fallback_name {
            if let Some(email) = profile.email() {
                merged.display_name = email.to_string();
            }
        }
        let roles = profile.roles();
        if profile.roles.is_some() || !roles.is_empty() {
            merged.roles = roles;
        }
        if let Some(avatar) = profile.avatar_url() {
            merged.avatar_url = Some(avatar.to_string());
        }

        if *user == merged {
            return false;
        }
        *user = merged;
        true
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some() && self.access_token.is_some()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn user(&self) -> Option<&SessionUser> {
        self.user.as_ref()
    }

    pub fn subject(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.subject.as_str())
    }

    pub fn display_name(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.display_name.as_str())
    }

    pub fn email(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.email.as_str())
    }

    /// Roles, empty when signed out.
    pub fn roles(&self) -> &[String] {
        self.user.as_ref().map(|u| u.roles.as_slice()).unwrap_or(&[])
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles().iter().any(|r| r == role)
    }

    pub fn avatar_url(&self) -> Option<&str> {
        self.user.as_ref().and_then(|u| u.avatar_url.as_deref())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// What the identity provider reports after a check, sign-in or renewal.
#[derive(Clone, Default)]
pub struct AuthResult {
    pub is_authenticated: bool,
    pub access_token: Option<String>,
    pub user_data: Option<Claims>,
}

impl AuthResult {
    pub fn authenticated(access_token: impl Into<String>, user_data: Option<Claims>) -> Self {
        Self {
            is_authenticated: true,
            access_token: Some(access_token.into()),
            user_data,
        }
    }

    pub fn unauthenticated() -> Self {
        Self::default()
    }

    /// The access token when it is present and non-blank.
    pub fn usable_token(&self) -> Option<&str> {
        self.access_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
    }
}

impl fmt::Debug for AuthResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthResult")
            .field("is_authenticated", &self.is_authenticated)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("user_data", &self.user_data)
            .finish()
    }
}
