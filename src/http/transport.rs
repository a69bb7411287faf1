//! http::transport
//!
//! The seam that actually sends requests.
//!
//! A transport returns every HTTP status as a response; `Err` means the
//! request never got one (DNS, connect, TLS, timeout).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::request::{ApiRequest, ApiResponse, HttpError};

/// User-Agent header for API requests.
const USER_AGENT: &str = concat!("aula/", env!("CARGO_PKG_VERSION"));

/// Sends one request and reads the whole response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, HttpError>;
}

/// [`Transport`] over a reqwest client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// A client with the given per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self, HttpError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, HttpError> {
        let mut builder = self
            .client
            .request(request.method().clone(), request.url().clone())
            .headers(request.headers().clone());
        if let Some(body) = request.body() {
            builder = builder.body(body.to_vec());
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        Ok(ApiResponse::new(status, headers, body.to_vec()))
    }
}
