//! http::decorator
//!
//! Outbound Request Decorator: attaches the bearer token to requests for
//! protected routes.
//!
//! # Rules, in order
//!
//! 1. Same origin as the identity provider: unchanged
//! 2. Not under a protected prefix: unchanged
//! 3. No current token: unchanged (the server answers 401)
//! 4. Otherwise: exactly one `Authorization: Bearer <token>` header
//!
//! Decoration has no side effects and performs no I/O.

use std::sync::Arc;

use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::Url;
use tracing::{debug, warn};

use super::request::ApiRequest;
use super::routes::{origin_of, ProtectedRoutes};
use crate::auth::TokenSource;

/// What the decorator decided for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoration {
    IdentityProvider,
    Unprotected,
    NoToken,
    Bearer,
}

/// Attaches bearer tokens.
pub struct RequestDecorator {
    routes: ProtectedRoutes,
    idp_origin: Option<String>,
    tokens: Arc<dyn TokenSource>,
}

impl RequestDecorator {
    /// The identity-provider origin is computed once, here.
    pub fn new(routes: ProtectedRoutes, idp_authority: &Url, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            routes,
            idp_origin: origin_of(idp_authority),
            tokens,
        }
    }

    pub fn routes(&self) -> &ProtectedRoutes {
        &self.routes
    }

    /// Whether the URL targets the identity provider itself.
    pub fn is_identity_provider(&self, url: &Url) -> bool {
        match (&self.idp_origin, origin_of(url)) {
            (Some(idp), Some(origin)) => *idp == origin,
            _ => false,
        }
    }

    pub fn is_protected(&self, url: &Url) -> bool {
        self.routes.is_protected(url.as_str())
    }

    /// Decorate a request, returning what was decided.
    pub fn decorate_with(&self, mut request: ApiRequest) -> (ApiRequest, Decoration) {
        if self.is_identity_provider(request.url()) {
            return (request, Decoration::IdentityProvider);
        }
        if !self.is_protected(request.url()) {
            return (request, Decoration::Unprotected);
        }
        let Some(token) = self.tokens.current_token() else {
            debug!(path = request.url().path(), "protected request without a token");
            return (request, Decoration::NoToken);
        };

        match HeaderValue::from_str(&format!("Bearer {}", token)) {
            Ok(mut value) => {
                value.set_sensitive(true);
                request.set_header(AUTHORIZATION, value);
                (request, Decoration::Bearer)
            }
            Err(_) => {
                warn!("current token is not a valid header value, sending without it");
                (request, Decoration::NoToken)
            }
        }
    }

    /// Decorate a request.
    pub fn decorate(&self, request: ApiRequest) -> ApiRequest {
        self.decorate_with(request).0
    }
}

impl std::fmt::Debug for RequestDecorator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestDecorator")
            .field("routes", &self.routes)
            .field("idp_origin", &self.idp_origin)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::mock::StaticTokens;

    fn decorator(token: Option<&str>) -> RequestDecorator {
        RequestDecorator::new(
            ProtectedRoutes::new(["https://api.example.edu/api", "https://id.example.edu/api"]),
            &Url::parse("https://id.example.edu/realms/aula").unwrap(),
            Arc::new(StaticTokens::new(token)),
        )
    }

    fn get(url: &str) -> ApiRequest {
        ApiRequest::get(Url::parse(url).unwrap())
    }

    #[test]
    fn attaches_bearer_to_protected_route() {
        let (request, decision) =
            decorator(Some("token")).decorate_with(get("https://api.example.edu/api/students"));
        assert_eq!(decision, Decoration::Bearer);
        assert_eq!(request.authorization(), Some("Bearer token"));
        assert_eq!(request.headers().get_all(AUTHORIZATION).iter().count(), 1);
    }

    #[test]
    fn replaces_existing_authorization() {
        let request = get("https://api.example.edu/api/students")
            .with_header(AUTHORIZATION, HeaderValue::from_static("Bearer stale"));
        let request = decorator(Some("fresh")).decorate(request);
        assert_eq!(request.authorization(), Some("Bearer fresh"));
        assert_eq!(request.headers().get_all(AUTHORIZATION).iter().count(), 1);
    }

    #[test]
    fn never_sends_token_to_identity_provider() {
        // Even though the prefix list covers it.
        let (request, decision) =
            decorator(Some("token")).decorate_with(get("https://id.example.edu/api/users"));
        assert_eq!(decision, Decoration::IdentityProvider);
        assert!(request.authorization().is_none());
    }

    #[test]
    fn unprotected_route_is_untouched() {
        let (request, decision) =
            decorator(Some("token")).decorate_with(get("https://api.example.edu/public"));
        assert_eq!(decision, Decoration::Unprotected);
        assert!(request.authorization().is_none());
    }

    #[test]
    fn missing_token_passes_through() {
        let (request, decision) =
            decorator(None).decorate_with(get("https://api.example.edu/api/students"));
        assert_eq!(decision, Decoration::NoToken);
        assert!(request.authorization().is_none());
    }

    #[test]
    fn header_value_is_sensitive() {
        let request = decorator(Some("token")).decorate(get("https://api.example.edu/api"));
        assert!(request.headers().get(AUTHORIZATION).unwrap().is_sensitive());
    }

    #[test]
    fn invalid_token_is_not_attached() {
        let request = decorator(Some("bad\ntoken")).decorate(get("https://api.example.edu/api"));
        assert!(request.authorization().is_none());
    }
}
