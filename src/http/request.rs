//! http::request
//!
//! Request, response and error types shared by the HTTP layer.
//!
//! # Retry marker
//!
//! [`ApiRequest::is_retry`] records that a request is the one permitted
//! re-issue after a session refresh. Only the recovery interceptor can set
//! it. A [`Clone`] of a request is a new logical request and never carries
//! the marker.

use std::fmt;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Longest body excerpt carried in an error message.
const MAX_ERROR_BODY: usize = 200;

/// Errors from the HTTP layer.
#[derive(Debug, Clone, Error)]
pub enum HttpError {
    /// The server answered with a non-success status.
    #[error("{method} {path} failed with HTTP {status}: {message}")]
    Status {
        status: u16,
        method: String,
        path: String,
        /// Body excerpt or reason phrase
        message: String,
    },

    /// The request never produced a response.
    #[error("network error: {0}")]
    Network(String),

    /// The request could not be built.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A successful response body did not decode.
    #[error("cannot decode response body: {0}")]
    Decode(String),
}

impl HttpError {
    /// The HTTP status, when the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// 401 or 403.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self.status(), Some(401) | Some(403))
    }

    /// 500 through 599.
    pub fn is_server_error(&self) -> bool {
        matches!(self.status(), Some(500..=599))
    }
}

impl From<reqwest::Error> for HttpError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return HttpError::Network("request timed out".to_string());
        }
        HttpError::Network(err.without_url().to_string())
    }
}

/// An outbound request.
pub struct ApiRequest {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
    retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            retried: false,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: Url) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: Url) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn delete(url: Url) -> Self {
        Self::new(Method::DELETE, url)
    }

    /// Add a header, replacing any previous value.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set a JSON body and content type.
    pub fn with_json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, HttpError> {
        let bytes = serde_json::to_vec(body)
            .map_err(|e| HttpError::InvalidRequest(format!("cannot encode JSON body: {}", e)))?;
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.body = Some(bytes);
        Ok(self)
    }

    /// Set a raw body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Whether this request is the re-issue after a refresh.
    pub fn is_retry(&self) -> bool {
        self.retried
    }

    /// The value of the `Authorization` header, if set.
    pub fn authorization(&self) -> Option<&str> {
        self.headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok())
    }

    pub(crate) fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    /// The one permitted re-issue of this request: marked, and without the
    /// old credential so the decorator attaches the new one.
    pub(crate) fn retry_clone(&self) -> Self {
        let mut headers = self.headers.clone();
        headers.remove(AUTHORIZATION);
        Self {
            method: self.method.clone(),
            url: self.url.clone(),
            headers,
            body: self.body.clone(),
            retried: true,
        }
    }
}

impl Clone for ApiRequest {
    fn clone(&self) -> Self {
        Self {
            method: self.method.clone(),
            url: self.url.clone(),
            headers: self.headers.clone(),
            body: self.body.clone(),
            retried: false,
        }
    }
}

impl fmt::Debug for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiRequest")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("has_authorization", &self.headers.contains_key(AUTHORIZATION))
            .field("body_len", &self.body.as_ref().map(Vec::len))
            .field("retried", &self.retried)
            .finish()
    }
}

/// A response with its body read.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Body as text (lossy UTF-8).
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the body as JSON. An empty body decodes as `null`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        let body: &[u8] = if self.body.is_empty() {
            b"null"
        } else {
            &self.body
        };
        serde_json::from_slice(body).map_err(|e| HttpError::Decode(e.to_string()))
    }

    /// Turn a non-success response into [`HttpError::Status`].
    pub fn error_for_status(self, request: &ApiRequest) -> Result<Self, HttpError> {
        if self.status.is_success() {
            return Ok(self);
        }
        let text = self.text();
        let message = if text.trim().is_empty() {
            self.status
                .canonical_reason()
                .unwrap_or("no response body")
                .to_string()
        } else {
            text.chars().take(MAX_ERROR_BODY).collect()
        };
        Err(HttpError::Status {
            status: self.status.as_u16(),
            method: request.method().to_string(),
            path: request.url().path().to_string(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn new_requests_are_not_retries() {
        let request = ApiRequest::get(url("https://api.example.edu/api/students"));
        assert!(!request.is_retry());
        assert!(request.authorization().is_none());
    }

    #[test]
    fn retry_clone_sets_marker_and_drops_credential() {
        let request = ApiRequest::post(url("https://api.example.edu/api/students"))
            .with_header(AUTHORIZATION, HeaderValue::from_static("Bearer old"))
            .with_body("{}");

        let retry = request.retry_clone();
        assert!(retry.is_retry());
        assert!(retry.authorization().is_none());
        assert_eq!(retry.body(), Some(&b"{}"[..]));
        assert_eq!(retry.method(), &Method::POST);
    }

    #[test]
    fn clone_never_carries_marker() {
        let retry = ApiRequest::get(url("https://api.example.edu/api")).retry_clone();
        assert!(!retry.clone().is_retry());
    }

    #[test]
    fn with_json_sets_content_type() {
        let request = ApiRequest::post(url("https://api.example.edu/api/cycles"))
            .with_json(&serde_json::json!({"name": "2026"}))
            .unwrap();
        assert_eq!(
            request.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(request.body(), Some(&br#"{"name":"2026"}"#[..]));
    }

    #[test]
    fn debug_hides_authorization() {
        let request = ApiRequest::get(url("https://api.example.edu/api"))
            .with_header(AUTHORIZATION, HeaderValue::from_static("Bearer secret"));
        let output = format!("{:?}", request);
        assert!(!output.contains("secret"));
        assert!(output.contains("has_authorization: true"));
    }

    #[test]
    fn error_for_status_maps_failures() {
        let request = ApiRequest::get(url("https://api.example.edu/api/students?page=2"));
        let response = ApiResponse::new(StatusCode::FORBIDDEN, HeaderMap::new(), "denied");
        let err = response.error_for_status(&request).unwrap_err();

        assert_eq!(err.status(), Some(403));
        assert!(err.is_auth_failure());
        assert!(!err.is_server_error());
        assert_eq!(
            err.to_string(),
            "GET /api/students failed with HTTP 403: denied"
        );
    }

    #[test]
    fn empty_error_body_uses_reason_phrase() {
        let request = ApiRequest::get(url("https://api.example.edu/api"));
        let response = ApiResponse::new(StatusCode::BAD_GATEWAY, HeaderMap::new(), Vec::new());
        let err = response.error_for_status(&request).unwrap_err();
        assert!(err.is_server_error());
        assert!(err.to_string().contains("Bad Gateway"));
    }

    #[test]
    fn json_decodes_empty_body_as_null() {
        let response = ApiResponse::new(StatusCode::NO_CONTENT, HeaderMap::new(), Vec::new());
        let value: serde_json::Value = response.json().unwrap();
        assert!(value.is_null());

        let response = ApiResponse::new(StatusCode::OK, HeaderMap::new(), "not json");
        assert!(matches!(
            response.json::<serde_json::Value>(),
            Err(HttpError::Decode(_))
        ));
    }

    #[test]
    fn classification_without_status() {
        let err = HttpError::Network("connection reset".into());
        assert_eq!(err.status(), None);
        assert!(!err.is_auth_failure());
        assert!(!err.is_server_error());
    }
}
