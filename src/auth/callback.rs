//! auth::callback
//!
//! Loopback receiver for the authorization-code redirect.
//!
//! Binds the host and port of the configured redirect URL, answers one
//! `GET` to its path and hands back the authorization code. Requests to
//! other paths (browsers like to ask for `/favicon.ico`) get a 404 and the
//! listener keeps waiting.

use std::net::SocketAddr;
use std::time::Duration;

use reqwest::Url;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::debug;

use super::errors::AuthError;

/// How long to wait for the browser to come back.
pub const CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

const MAX_REQUEST_HEAD: usize = 8 * 1024;

const SUCCESS_PAGE: &str = "<!doctype html><html><head><title>aula</title></head>\
<body><h1>Signed in</h1><p>You can close this window and return to the terminal.</p></body></html>";

const FAILURE_PAGE: &str = "<!doctype html><html><head><title>aula</title></head>\
<body><h1>Sign-in failed</h1><p>Return to the terminal for details.</p></body></html>";

/// A bound loopback listener.
#[derive(Debug)]
pub struct CallbackListener {
    listener: TcpListener,
    path: String,
}

enum Callback {
    Code(String),
    Denied(String),
    StateMismatch,
    NotOurs,
}

impl CallbackListener {
    /// Bind the redirect URL's host and port.
    pub async fn bind(redirect_url: &Url) -> Result<Self, AuthError> {
        let host = redirect_url
            .host_str()
            .ok_or_else(|| AuthError::SignInFailed("redirect URL has no host".to_string()))?;
        let port = redirect_url
            .port_or_known_default()
            .ok_or_else(|| AuthError::SignInFailed("redirect URL has no port".to_string()))?;

        let listener = TcpListener::bind((host, port)).await.map_err(|e| {
            AuthError::SignInFailed(format!("cannot listen on {}:{}: {}", host, port, e))
        })?;

        Ok(Self {
            listener,
            path: redirect_url.path().to_string(),
        })
    }

    /// The address actually bound (useful when the port was 0).
    pub fn local_addr(&self) -> Result<SocketAddr, AuthError> {
        Ok(self.listener.local_addr()?)
    }

    /// Wait for the redirect carrying `expected_state` and return its code.
    ///
    /// # Errors
    ///
    /// - [`AuthError::CallbackTimeout`] when nothing arrives in time
    /// - [`AuthError::SignInFailed`] when the provider reports an error or
    ///   the state does not match
    pub async fn wait_for_code(
        self,
        expected_state: &str,
        timeout: Duration,
    ) -> Result<String, AuthError> {
        tokio::time::timeout(timeout, self.accept_loop(expected_state))
            .await
            .map_err(|_| AuthError::CallbackTimeout)?
    }

    async fn accept_loop(&self, expected_state: &str) -> Result<String, AuthError> {
        loop {
            let (mut stream, peer) = self.listener.accept().await?;
            debug!(%peer, "callback connection");

            let target = match read_request_target(&mut stream).await {
                Ok(target) => target,
                Err(e) => {
                    debug!(error = %e, "ignoring malformed callback request");
                    let _ = respond(&mut stream, "400 Bad Request", FAILURE_PAGE).await;
                    continue;
                }
            };

            match self.classify(&target, expected_state) {
                Callback::NotOurs => {
                    let _ = respond(&mut stream, "404 Not Found", "").await;
                }
                Callback::Code(code) => {
                    let _ = respond(&mut stream, "200 OK", SUCCESS_PAGE).await;
                    return Ok(code);
                }
                Callback::Denied(reason) => {
                    let _ = respond(&mut stream, "200 OK", FAILURE_PAGE).await;
                    return Err(AuthError::SignInFailed(reason));
                }
                Callback::StateMismatch => {
                    let _ = respond(&mut stream, "400 Bad Request", FAILURE_PAGE).await;
                    return Err(AuthError::SignInFailed(
                        "state parameter did not match".to_string(),
                    ));
                }
            }
        }
    }

    fn classify(&self, target: &str, expected_state: &str) -> Callback {
        let Ok(url) = Url::parse("http://localhost/").and_then(|base| base.join(target)) else {
            return Callback::NotOurs;
        };
        if url.path() != self.path {
            return Callback::NotOurs;
        }

        let mut code = None;
        let mut state = None;
        let mut error = None;
        let mut description = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => code = Some(value.into_owned()),
                "state" => state = Some(value.into_owned()),
                "error" => error = Some(value.into_owned()),
                "error_description" => description = Some(value.into_owned()),
                _ => {}
            }
        }

        if let Some(error) = error {
            return Callback::Denied(match description {
                Some(d) => format!("{} ({})", error, d),
                None => error,
            });
        }
        if state.as_deref() != Some(expected_state) {
            return Callback::StateMismatch;
        }
        match code {
            Some(code) if !code.is_empty() => Callback::Code(code),
            _ => Callback::Denied("callback carried no authorization code".to_string()),
        }
    }
}

async fn read_request_target(stream: &mut TcpStream) -> Result<String, AuthError> {
    let mut head = Vec::with_capacity(1024);
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        head.extend_from_slice(&buf[..n]);
        if head.len() > MAX_REQUEST_HEAD {
            return Err(AuthError::SignInFailed("callback request too large".into()));
        }
    }

    let text = String::from_utf8_lossy(&head);
    let request_line = text.lines().next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("GET"), Some(target)) => Ok(target.to_string()),
        _ => Err(AuthError::SignInFailed("unexpected callback request".into())),
    }
}

async fn respond(stream: &mut TcpStream, status: &str, body: &str) -> std::io::Result<()> {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}
