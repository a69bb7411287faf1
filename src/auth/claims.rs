//! auth::claims
//!
//! Identity-provider claims and the rules that turn them into a principal.
//!
//! # Derivation rules
//!
//! - Display name: `name`, then `given_name family_name`, then `email`,
//!   then `sub`. Blank values are skipped.
//! - Email: `email`, or `<sub>@users.invalid` when absent.
//! - Roles: the `roles` claim (a single string or an array), falling back
//!   to Keycloak's `realm_access.roles`. Duplicates are dropped, first
//!   occurrence wins.
//!
//! # Example
//!
//! ```
//! use aula::auth::{normalize_roles, Claims, RoleClaim};
//!
//! let claims: Claims = serde_json::from_str(
//!     r#"{"sub":"1","given_name":"Fallback","family_name":"User","roles":"admin"}"#,
//! ).unwrap();
//! assert_eq!(claims.display_name(), "Fallback User");
//! assert_eq!(claims.roles(), vec!["admin".to_string()]);
//! assert!(normalize_roles(None).is_empty());
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Domain used for the email placeholder. `.invalid` is reserved (RFC 2606).
pub const EMAIL_PLACEHOLDER_DOMAIN: &str = "users.invalid";

/// Claims about the signed-in subject.
///
/// Unrecognized claims are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject identifier.
    #[serde(default)]
    pub sub: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Avatar URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<RoleClaim>,

    /// Every other claim, untyped.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The `roles` claim, which providers send as either shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoleClaim {
    One(String),
    Many(Vec<String>),
}

/// Normalize a role claim into an ordered, duplicate-free list.
///
/// ```
/// use aula::auth::{normalize_roles, RoleClaim};
///
/// assert_eq!(normalize_roles(Some(&RoleClaim::One("admin".into()))), vec!["admin"]);
/// assert_eq!(
///     normalize_roles(Some(&RoleClaim::Many(vec!["admin".into(), "manager".into()]))),
///     vec!["admin", "manager"],
/// );
/// ```
pub fn normalize_roles(claim: Option<&RoleClaim>) -> Vec<String> {
    match claim {
        None => Vec::new(),
        Some(RoleClaim::One(role)) => dedup_roles(std::iter::once(role.as_str())),
        Some(RoleClaim::Many(roles)) => dedup_roles(roles.iter().map(String::as_str)),
    }
}

fn dedup_roles<'a>(roles: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for role in roles.map(str::trim).filter(|r| !r.is_empty()) {
        if !out.iter().any(|seen| seen == role) {
            out.push(role.to_string());
        }
    }
    out
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl Claims {
    /// Claims with only a subject.
    pub fn with_subject(sub: impl Into<String>) -> Self {
        Self {
            sub: sub.into(),
            ..Default::default()
        }
    }

    /// The human-readable name to show for this subject.
    pub fn display_name(&self) -> String {
        self.personal_name()
            .or_else(|| self.email().map(str::to_string))
            .unwrap_or_else(|| self.sub.clone())
    }

    /// `name`, else `given_name family_name`. `None` when neither is set.
    pub fn personal_name(&self) -> Option<String> {
        if let Some(name) = non_blank(self.name.as_deref()) {
            return Some(name.to_string());
        }

        let joined = [self.given_name.as_deref(), self.family_name.as_deref()]
            .into_iter()
            .filter_map(non_blank)
            .collect::<Vec<_>>()
            .join(" ");
        (!joined.is_empty()).then_some(joined)
    }

    /// The email claim when it is non-blank.
    pub fn email(&self) -> Option<&str> {
        non_blank(self.email.as_deref())
    }

    /// The email claim, or a placeholder derived from the subject.
    pub fn email_or_placeholder(&self) -> String {
        match self.email() {
            Some(email) => email.to_string(),
            None => format!("{}@{}", self.sub, EMAIL_PLACEHOLDER_DOMAIN),
        }
    }

    /// Normalized roles, falling back to `realm_access.roles`.
    pub fn roles(&self) -> Vec<String> {
        if self.roles.is_some() {
            return normalize_roles(self.roles.as_ref());
        }
        match self.realm_roles() {
            Some(realm) => dedup_roles(realm.iter().filter_map(Value::as_str)),
            None => Vec::new(),
        }
    }

    fn realm_roles(&self) -> Option<&Vec<Value>> {
        self.extra
            .get("realm_access")?
            .as_object()?
            .get("roles")?
            .as_array()
    }

    /// Avatar URL, if one was issued.
    pub fn avatar_url(&self) -> Option<&str> {
        non_blank(self.picture.as_deref())
    }

    /// The `iss` claim.
    pub fn issuer(&self) -> Option<&str> {
        self.extra.get("iss").and_then(Value::as_str)
    }

    /// The `nonce` claim.
    pub fn nonce(&self) -> Option<&str> {
        self.extra.get("nonce").and_then(Value::as_str)
    }

    /// Whether `aud` (a string or an array) names the client.
    pub fn has_audience(&self, client_id: &str) -> bool {
        match self.extra.get("aud") {
            Some(Value::String(aud)) => aud == client_id,
            Some(Value::Array(auds)) => auds.iter().any(|a| a.as_str() == Some(client_id)),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Claims {
        serde_json::from_str(json).expect("parse claims")
    }

    mod display_name {
        use super::*;

        #[test]
        fn prefers_name() {
            let claims = parse(r#"{"sub":"1","name":"Test User","given_name":"Other"}"#);
            assert_eq!(claims.display_name(), "Test User");
        }

        #[test]
        fn falls_back_to_given_and_family() {
            let claims = parse(
                r#"{"sub":"1","given_name":"Fallback","family_name":"User","email":"fallback@example.com","roles":["manager"]}"#,
            );
            assert_eq!(claims.display_name(), "Fallback User");
            assert_eq!(claims.roles(), vec!["manager"]);
        }

        #[test]
        fn given_name_alone() {
            let claims = parse(r#"{"sub":"1","given_name":"Ana"}"#);
            assert_eq!(claims.display_name(), "Ana");
        }

        #[test]
        fn blank_name_is_skipped() {
            let claims = parse(r#"{"sub":"1","name":"  ","email":"a@example.com"}"#);
            assert_eq!(claims.display_name(), "a@example.com");
        }

        #[test]
        fn subject_is_last_resort() {
            let claims = Claims::with_subject("user-123");
            assert_eq!(claims.display_name(), "user-123");
        }
    }

    #[test]
    fn email_placeholder_uses_subject() {
        let claims = Claims::with_subject("user-123");
        assert_eq!(claims.email_or_placeholder(), "user-123@users.invalid");

        let with_email = parse(r#"{"sub":"1","email":"user@example.com"}"#);
        assert_eq!(with_email.email_or_placeholder(), "user@example.com");
    }

    mod roles {
        use super::*;

        #[test]
        fn single_string() {
            assert_eq!(
                normalize_roles(Some(&RoleClaim::One("admin".into()))),
                vec!["admin"]
            );
        }

        #[test]
        fn array_unchanged() {
            let claim = RoleClaim::Many(vec!["admin".into(), "manager".into()]);
            assert_eq!(normalize_roles(Some(&claim)), vec!["admin", "manager"]);
        }

        #[test]
        fn absent_is_empty() {
            assert!(normalize_roles(None).is_empty());
            assert!(Claims::with_subject("1").roles().is_empty());
        }

        #[test]
        fn duplicates_removed_in_order() {
            let claim = RoleClaim::Many(vec![
                "manager".into(),
                "admin".into(),
                "manager".into(),
                "".into(),
            ]);
            assert_eq!(normalize_roles(Some(&claim)), vec!["manager", "admin"]);
        }

        #[test]
        fn string_and_array_shapes_deserialize() {
            let one = parse(r#"{"sub":"1","roles":"admin"}"#);
            assert_eq!(one.roles, Some(RoleClaim::One("admin".into())));

            let many = parse(r#"{"sub":"1","roles":["admin","teacher"]}"#);
            assert_eq!(many.roles(), vec!["admin", "teacher"]);
        }

        #[test]
        fn realm_access_fallback() {
            let claims = parse(r#"{"sub":"1","realm_access":{"roles":["teacher","teacher"]}}"#);
            assert_eq!(claims.roles(), vec!["teacher"]);
        }

        #[test]
        fn explicit_roles_win_over_realm_access() {
            let claims =
                parse(r#"{"sub":"1","roles":["admin"],"realm_access":{"roles":["teacher"]}}"#);
            assert_eq!(claims.roles(), vec!["admin"]);
        }
    }

    #[test]
    fn audience_string_or_array() {
        let single = parse(r#"{"sub":"1","aud":"aula"}"#);
        assert!(single.has_audience("aula"));
        assert!(!single.has_audience("other"));

        let many = parse(r#"{"sub":"1","aud":["account","aula"]}"#);
        assert!(many.has_audience("aula"));

        assert!(!Claims::with_subject("1").has_audience("aula"));
    }

    #[test]
    fn unknown_claims_are_retained() {
        let claims = parse(r#"{"sub":"1","iss":"https://id.example.edu","nonce":"n-1"}"#);
        assert_eq!(claims.issuer(), Some("https://id.example.edu"));
        assert_eq!(claims.nonce(), Some("n-1"));
    }
}
