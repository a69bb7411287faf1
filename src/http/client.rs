//! http::client
//!
//! Back-office API client: resolves paths against the API base URL and
//! sends everything through [`FailureRecovery`].

use std::sync::Arc;

use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::decorator::RequestDecorator;
use super::interceptor::FailureRecovery;
use super::notify::Notifier;
use super::request::{ApiRequest, ApiResponse, HttpError};
use super::routes::ProtectedRoutes;
use super::transport::{ReqwestTransport, Transport};
use crate::auth::TokenSource;
use crate::config::{ApiSettings, AuthSettings, Environment};

/// Client for the back-office API.
#[derive(Debug)]
pub struct ApiClient {
    base_url: Url,
    recovery: FailureRecovery,
}

impl ApiClient {
    pub fn new(base_url: Url, recovery: FailureRecovery) -> Self {
        Self { base_url, recovery }
    }

    /// Wire a client from settings with the reqwest transport.
    pub fn from_settings(
        api: &ApiSettings,
        auth: &AuthSettings,
        environment: Environment,
        tokens: Arc<dyn TokenSource>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, HttpError> {
        let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new(api.timeout)?);
        Ok(Self::with_transport(
            api,
            auth,
            environment,
            transport,
            tokens,
            notifier,
        ))
    }

    /// Wire a client from settings over any transport.
    pub fn with_transport(
        api: &ApiSettings,
        auth: &AuthSettings,
        environment: Environment,
        transport: Arc<dyn Transport>,
        tokens: Arc<dyn TokenSource>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let routes = ProtectedRoutes::new(api.protected_routes.iter().map(String::as_str));
        let decorator = RequestDecorator::new(routes, &auth.authority, tokens.clone());
        let recovery = FailureRecovery::new(decorator, transport, tokens, notifier, environment);
        Self::new(api.base_url.clone(), recovery)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn recovery(&self) -> &FailureRecovery {
        &self.recovery
    }

    /// Resolve a path or absolute URL against the base URL.
    ///
    /// A relative path keeps the base's path prefix: with a base of
    /// `https://host/api`, `students` resolves to `https://host/api/students`.
    pub fn resolve(&self, path: &str) -> Result<Url, HttpError> {
        if let Ok(url) = Url::parse(path) {
            return Ok(url);
        }
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        base.join(path.trim_start_matches('/'))
            .map_err(|e| HttpError::InvalidRequest(format!("cannot resolve '{}': {}", path, e)))
    }

    /// Send a prepared request.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, HttpError> {
        self.recovery.execute(request).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, HttpError> {
        let request = ApiRequest::get(self.resolve(path)?);
        self.send(request).await?.json()
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = ApiRequest::post(self.resolve(path)?).with_json(body)?;
        self.send(request).await?.json()
    }

    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = ApiRequest::put(self.resolve(path)?).with_json(body)?;
        self.send(request).await?.json()
    }

    pub async fn delete(&self, path: &str) -> Result<(), HttpError> {
        let request = ApiRequest::delete(self.resolve(path)?);
        self.send(request).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::mock::{MockTransport, RecordingNotifier, StaticTokens};
    use std::time::Duration;

    fn client(transport: &MockTransport) -> ApiClient {
        let api = ApiSettings {
            base_url: Url::parse("https://api.example.edu/api").unwrap(),
            protected_routes: vec!["https://api.example.edu/api".into()],
            timeout: Duration::from_secs(5),
        };
        let auth = AuthSettings {
            authority: Url::parse("https://id.example.edu/realms/aula").unwrap(),
            client_id: "aula-cli".into(),
            redirect_url: Url::parse("http://127.0.0.1:8765/callback").unwrap(),
            post_logout_redirect_url: None,
            scopes: "openid".into(),
            silent_renew: true,
            use_refresh_tokens: true,
        };
        ApiClient::with_transport(
            &api,
            &auth,
            Environment::Development,
            Arc::new(transport.clone()),
            Arc::new(StaticTokens::new(Some("tok"))),
            Arc::new(RecordingNotifier::new()),
        )
    }

    #[test]
    fn resolve_keeps_base_prefix() {
        let client = client(&MockTransport::new());
        assert_eq!(
            client.resolve("students").unwrap().as_str(),
            "https://api.example.edu/api/students"
        );
        assert_eq!(
            client.resolve("/students?page=2").unwrap().as_str(),
            "https://api.example.edu/api/students?page=2"
        );
        assert_eq!(
            client.resolve("https://other.example.edu/x").unwrap().as_str(),
            "https://other.example.edu/x"
        );
    }

    #[tokio::test]
    async fn get_json_decodes_and_sends_bearer() {
        let transport = MockTransport::new();
        transport.push_json(&serde_json::json!([{"id": 1}]));
        let client = client(&transport);

        let rows: Vec<serde_json::Value> = client.get_json("students").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            transport.requests()[0].authorization.as_deref(),
            Some("Bearer tok")
        );
    }

    #[tokio::test]
    async fn post_json_sends_body() {
        let transport = MockTransport::new();
        transport.push_json(&serde_json::json!({"id": 7}));
        let client = client(&transport);

        let created: serde_json::Value = client
            .post_json("cycles", &serde_json::json!({"name": "2026"}))
            .await
            .unwrap();
        assert_eq!(created["id"], 7);

        let sent = &transport.requests()[0];
        assert_eq!(sent.method, "POST");
        assert_eq!(sent.body.as_deref(), Some(&br#"{"name":"2026"}"#[..]));
    }

    #[tokio::test]
    async fn delete_surfaces_status_errors() {
        let transport = MockTransport::new();
        transport.push_status(reqwest::StatusCode::NOT_FOUND, "");
        let err = client(&transport).delete("students/9").await.unwrap_err();
        assert_eq!(err.status(), Some(404));
    }
}
