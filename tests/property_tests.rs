//! Property-based tests for request decoration and normalization rules.
//!
//! These tests use proptest to verify invariants hold across
//! randomly generated inputs.

use std::sync::Arc;

use proptest::prelude::*;
use reqwest::header::AUTHORIZATION;
use reqwest::Url;

use aula::auth::{normalize_roles, RoleClaim};
use aula::http::mock::StaticTokens;
use aula::http::{ApiRequest, Decoration, ProtectedRoutes, RequestDecorator};

const API: &str = "https://api.example.edu";
const IDP: &str = "https://id.example.edu";

/// Strategy for generating URL path segments.
fn segment() -> impl Strategy<Value = String> {
    "[a-z0-9_-]{1,12}"
}

/// Strategy for generating request paths.
fn request_path() -> impl Strategy<Value = String> {
    prop::collection::vec(segment(), 0..5).prop_map(|parts| format!("/{}", parts.join("/")))
}

/// Strategy for generating bearer tokens (header-safe).
fn token() -> impl Strategy<Value = String> {
    "[A-Za-z0-9._~+/-]{1,64}"
}

fn decorator(token: Option<&str>) -> RequestDecorator {
    RequestDecorator::new(
        // The identity provider's API prefix is listed on purpose.
        ProtectedRoutes::new([format!("{}/api", API), format!("{}/admin", IDP)]),
        &Url::parse(&format!("{}/realms/aula", IDP)).unwrap(),
        Arc::new(StaticTokens::new(token)),
    )
}

fn get(base: &str, path: &str) -> ApiRequest {
    ApiRequest::get(Url::parse(&format!("{}{}", base, path)).unwrap())
}

proptest! {
    /// Requests to the identity provider never carry a bearer token.
    #[test]
    fn identity_provider_never_decorated(
        path in request_path(),
        token in prop::option::of(token()),
    ) {
        let decorator = decorator(token.as_deref());
        for path in [path.clone(), format!("/admin{}", path)] {
            let (request, decision) = decorator.decorate_with(get(IDP, &path));
            prop_assert_eq!(decision, Decoration::IdentityProvider);
            prop_assert!(request.authorization().is_none());
        }
    }

    /// Requests outside every protected prefix go out bare.
    #[test]
    fn unprotected_never_decorated(path in request_path(), token in token()) {
        prop_assume!(!path.starts_with("/api"));
        let (request, decision) = decorator(Some(&token)).decorate_with(get(API, &path));
        prop_assert_eq!(decision, Decoration::Unprotected);
        prop_assert!(request.authorization().is_none());
    }

    /// Protected requests carry exactly one header equal to the current token.
    #[test]
    fn protected_carries_exactly_one_bearer(path in request_path(), token in token()) {
        let url = format!("/api{}", path);
        let stale = get(API, &url).with_header(
            AUTHORIZATION,
            reqwest::header::HeaderValue::from_static("Bearer stale"),
        );
        let (request, decision) = decorator(Some(&token)).decorate_with(stale);

        prop_assert_eq!(decision, Decoration::Bearer);
        prop_assert_eq!(request.headers().get_all(AUTHORIZATION).iter().count(), 1);
        let expected = format!("Bearer {}", token);
        prop_assert_eq!(request.authorization(), Some(expected.as_str()));
    }

    /// Without a token a protected request is sent unchanged.
    #[test]
    fn protected_without_token_is_bare(path in request_path()) {
        let (request, decision) = decorator(None).decorate_with(get(API, &format!("/api{}", path)));
        prop_assert_eq!(decision, Decoration::NoToken);
        prop_assert!(request.authorization().is_none());
    }

    /// Role normalization keeps first occurrences in order and drops blanks.
    #[test]
    fn roles_are_unique_and_ordered(roles in prop::collection::vec("[a-c ]{0,3}", 0..10)) {
        let normalized = normalize_roles(Some(&RoleClaim::Many(roles.clone())));

        let mut expected: Vec<String> = Vec::new();
        for role in roles.iter().map(|r| r.trim()).filter(|r| !r.is_empty()) {
            if !expected.iter().any(|e| e == role) {
                expected.push(role.to_string());
            }
        }
        prop_assert_eq!(normalized, expected);
    }

    /// A single string role is the same as a one-element array.
    #[test]
    fn single_role_matches_array(role in "[a-z]{1,10}") {
        prop_assert_eq!(
            normalize_roles(Some(&RoleClaim::One(role.clone()))),
            normalize_roles(Some(&RoleClaim::Many(vec![role])))
        );
    }
}
