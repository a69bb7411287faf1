//! http::interceptor
//!
//! Failure Recovery Interceptor: one refresh-and-retry for a 401/403 on a
//! protected route.
//!
//! # State machine (per request)
//!
//! ```text
//! Sent ──ok──────────────────────────────────────────────> Done
//!  │
//!  ├─401/403, protected, not a retry──> Refreshing
//!  │                                     ├─token──> Retrying ──ok──> Done
//!  │                                     │            └─error──> Failed
//!  │                                     └─fail/no token──> LoggedOut ──> Failed
//!  └─any other error─────────────────────────────────────> Failed
//! ```
//!
//! Requests to the identity provider's origin are never refreshed, even
//! when a protected prefix covers them.
//!
//! A retry that still fails with 401/403 ends the session (`LoggedOut`)
//! before failing. A `Failed` with a 5xx status also raises a transient
//! notification. The original error always reaches the caller.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::decorator::RequestDecorator;
use super::notify::{Notification, Notifier};
use super::request::{ApiRequest, ApiResponse, HttpError};
use super::transport::Transport;
use crate::auth::TokenSource;
use crate::config::Environment;

/// Where a request is in the recovery protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Sent,
    Refreshing,
    Retrying,
    LoggedOut,
    Done,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Sent => "sent",
            Phase::Refreshing => "refreshing",
            Phase::Retrying => "retrying",
            Phase::LoggedOut => "logged-out",
            Phase::Done => "done",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// The phases one request went through, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trace {
    phases: Vec<Phase>,
}

impl Trace {
    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    /// The last phase entered.
    pub fn outcome(&self) -> Option<Phase> {
        self.phases.last().copied()
    }

    fn enter(&mut self, phase: Phase, request: &ApiRequest) {
        debug!(
            %phase,
            method = %request.method(),
            path = request.url().path(),
            retry = request.is_retry(),
            "request phase"
        );
        self.phases.push(phase);
    }
}

/// Sends requests through the decorator and recovers from one auth failure.
pub struct FailureRecovery {
    decorator: RequestDecorator,
    transport: Arc<dyn Transport>,
    tokens: Arc<dyn TokenSource>,
    notifier: Arc<dyn Notifier>,
    environment: Environment,
}

impl FailureRecovery {
    pub fn new(
        decorator: RequestDecorator,
        transport: Arc<dyn Transport>,
        tokens: Arc<dyn TokenSource>,
        notifier: Arc<dyn Notifier>,
        environment: Environment,
    ) -> Self {
        Self {
            decorator,
            transport,
            tokens,
            notifier,
            environment,
        }
    }

    pub fn decorator(&self) -> &RequestDecorator {
        &self.decorator
    }

    /// Send a request and return its final outcome.
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, HttpError> {
        self.execute_traced(request).await.0
    }

    /// Like [`execute`](Self::execute), also returning the phase trace.
    pub async fn execute_traced(
        &self,
        request: ApiRequest,
    ) -> (Result<ApiResponse, HttpError>, Trace) {
        let mut trace = Trace::default();
        let outcome = self.run(request, &mut trace).await;

        if let Err(err) = &outcome {
            if err.is_server_error() {
                self.notifier
                    .notify(Notification::server_error(err, self.environment));
            }
        }
        (outcome, trace)
    }

    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, HttpError> {
        self.transport
            .send(request)
            .await?
            .error_for_status(request)
    }

    async fn run(
        &self,
        request: ApiRequest,
        trace: &mut Trace,
    ) -> Result<ApiResponse, HttpError> {
        // The identity provider never receives our bearer, so its 401s are
        // not ours to recover.
        let recoverable = self.decorator.is_protected(request.url())
            && !self.decorator.is_identity_provider(request.url());
        let retry = (recoverable && !request.is_retry()).then(|| request.retry_clone());

        let request = self.decorator.decorate(request);
        trace.enter(Phase::Sent, &request);
        let err = match self.send(&request).await {
            Ok(response) => {
                trace.enter(Phase::Done, &request);
                return Ok(response);
            }
            Err(err) => err,
        };

        let retry = match retry {
            Some(retry) if err.is_auth_failure() => retry,
            _ => {
                trace.enter(Phase::Failed, &request);
                return Err(err);
            }
        };

        trace.enter(Phase::Refreshing, &request);
        if let Err(refresh_err) = self.tokens.refresh().await {
            // The token source has already ended the session.
            debug!(error = %refresh_err, "refresh failed");
            trace.enter(Phase::LoggedOut, &request);
            trace.enter(Phase::Failed, &request);
            return Err(err);
        }
        // TokenHolder never reports success without a token; other token
        // sources may.
        if self.tokens.current_token().is_none() {
            self.tokens.logout().await;
            trace.enter(Phase::LoggedOut, &request);
            trace.enter(Phase::Failed, &request);
            return Err(err);
        }

        let retry = self.decorator.decorate(retry);
        trace.enter(Phase::Retrying, &retry);
        match self.send(&retry).await {
            Ok(response) => {
                trace.enter(Phase::Done, &retry);
                Ok(response)
            }
            Err(retry_err) if retry_err.is_auth_failure() => {
                self.tokens.logout().await;
                trace.enter(Phase::LoggedOut, &retry);
                trace.enter(Phase::Failed, &retry);
                Err(retry_err)
            }
            Err(retry_err) => {
                trace.enter(Phase::Failed, &retry);
                Err(retry_err)
            }
        }
    }
}

impl fmt::Debug for FailureRecovery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailureRecovery")
            .field("decorator", &self.decorator)
            .field("environment", &self.environment)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::mock::{MockTransport, RecordingNotifier, StaticTokens};
    use crate::http::ProtectedRoutes;
    use reqwest::{StatusCode, Url};

    struct Fixture {
        transport: MockTransport,
        tokens: StaticTokens,
        notifier: RecordingNotifier,
        recovery: FailureRecovery,
    }

    fn fixture(environment: Environment) -> Fixture {
        fixture_with_routes(["https://api.example.edu/api"], environment)
    }

    fn fixture_with_routes<const N: usize>(
        routes: [&str; N],
        environment: Environment,
    ) -> Fixture {
        let transport = MockTransport::new();
        let tokens = StaticTokens::new(Some("old"));
        let notifier = RecordingNotifier::new();
        let shared: Arc<dyn TokenSource> = Arc::new(tokens.clone());
        let decorator = RequestDecorator::new(
            ProtectedRoutes::new(routes),
            &Url::parse("https://id.example.edu/realms/aula").unwrap(),
            shared.clone(),
        );
        let recovery = FailureRecovery::new(
            decorator,
            Arc::new(transport.clone()),
            shared,
            Arc::new(notifier.clone()),
            environment,
        );
        Fixture {
            transport,
            tokens,
            notifier,
            recovery,
        }
    }

    fn protected() -> ApiRequest {
        ApiRequest::get(Url::parse("https://api.example.edu/api/students").unwrap())
    }

    #[tokio::test]
    async fn success_passes_through() {
        let f = fixture(Environment::Production);
        f.transport.push_status(StatusCode::OK, r#"{"ok":true}"#);

        let (outcome, trace) = f.recovery.execute_traced(protected()).await;
        assert!(outcome.is_ok());
        assert_eq!(trace.phases(), [Phase::Sent, Phase::Done]);
        assert_eq!(f.tokens.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn unauthorized_refreshes_and_retries_once() {
        let f = fixture(Environment::Production);
        f.tokens.set_next_token(Some("new"));
        f.transport.push_status(StatusCode::UNAUTHORIZED, "");
        f.transport.push_status(StatusCode::OK, "[]");

        let (outcome, trace) = f.recovery.execute_traced(protected()).await;
        assert!(outcome.is_ok());
        assert_eq!(
            trace.phases(),
            [Phase::Sent, Phase::Refreshing, Phase::Retrying, Phase::Done]
        );

        let sent = f.transport.requests();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].authorization.as_deref(), Some("Bearer old"));
        assert!(!sent[0].is_retry);
        assert_eq!(sent[1].authorization.as_deref(), Some("Bearer new"));
        assert!(sent[1].is_retry);
        assert_eq!(f.tokens.refresh_calls(), 1);
    }

    #[tokio::test]
    async fn forbidden_after_retry_logs_out() {
        let f = fixture(Environment::Production);
        f.tokens.set_next_token(Some("new"));
        f.transport.push_status(StatusCode::FORBIDDEN, "");
        f.transport.push_status(StatusCode::FORBIDDEN, "still no");

        let (outcome, trace) = f.recovery.execute_traced(protected()).await;
        let err = outcome.unwrap_err();
        assert_eq!(err.status(), Some(403));
        assert!(err.to_string().contains("still no"));
        assert_eq!(trace.outcome(), Some(Phase::Failed));
        assert!(trace.phases().contains(&Phase::LoggedOut));
        assert_eq!(f.transport.request_count(), 2);
        assert_eq!(f.tokens.logout_calls(), 1);
    }

    #[tokio::test]
    async fn identity_provider_rejection_is_not_refreshed() {
        // The protected prefix also covers the identity provider's origin.
        let f = fixture_with_routes(
            ["https://api.example.edu/api", "https://id.example.edu/"],
            Environment::Production,
        );
        f.transport.push_status(StatusCode::UNAUTHORIZED, "");

        let request = ApiRequest::get(Url::parse("https://id.example.edu/admin/users").unwrap());
        let (outcome, trace) = f.recovery.execute_traced(request).await;
        assert_eq!(outcome.unwrap_err().status(), Some(401));
        assert_eq!(trace.phases(), [Phase::Sent, Phase::Failed]);

        let sent = f.transport.requests();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].authorization.is_none());
        assert_eq!(f.tokens.refresh_calls(), 0);
        assert_eq!(f.tokens.logout_calls(), 0);
    }

    #[tokio::test]
    async fn refresh_failure_propagates_original_error() {
        let f = fixture(Environment::Production);
        f.tokens.fail_refresh();
        f.transport.push_status(StatusCode::UNAUTHORIZED, "expired");

        let (outcome, trace) = f.recovery.execute_traced(protected()).await;
        let err = outcome.unwrap_err();
        assert_eq!(err.status(), Some(401));
        assert!(err.to_string().contains("expired"));
        assert_eq!(
            trace.phases(),
            [Phase::Sent, Phase::Refreshing, Phase::LoggedOut, Phase::Failed]
        );
        assert_eq!(f.transport.request_count(), 1);
        // The token source ends the session itself on refresh failure
        assert_eq!(f.tokens.logout_calls(), 0);
    }

    #[tokio::test]
    async fn refresh_without_token_logs_out() {
        let f = fixture(Environment::Production);
        f.tokens.set_next_token(None);
        f.transport.push_status(StatusCode::UNAUTHORIZED, "");

        let (outcome, trace) = f.recovery.execute_traced(protected()).await;
        assert_eq!(outcome.unwrap_err().status(), Some(401));
        assert!(trace.phases().contains(&Phase::LoggedOut));
        assert_eq!(f.tokens.logout_calls(), 1);
        assert_eq!(f.transport.request_count(), 1);
    }

    #[tokio::test]
    async fn unprotected_unauthorized_is_not_intercepted() {
        let f = fixture(Environment::Production);
        f.transport.push_status(StatusCode::UNAUTHORIZED, "");
        let request = ApiRequest::get(Url::parse("https://api.example.edu/public").unwrap());

        let (outcome, trace) = f.recovery.execute_traced(request).await;
        assert_eq!(outcome.unwrap_err().status(), Some(401));
        assert_eq!(trace.phases(), [Phase::Sent, Phase::Failed]);
        assert_eq!(f.tokens.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn marked_request_is_not_retried_again() {
        let f = fixture(Environment::Production);
        f.transport.push_status(StatusCode::UNAUTHORIZED, "");

        let (outcome, trace) = f.recovery.execute_traced(protected().retry_clone()).await;
        assert!(outcome.is_err());
        assert_eq!(trace.phases(), [Phase::Sent, Phase::Failed]);
        assert_eq!(f.tokens.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn server_error_notifies_generically_in_production() {
        let f = fixture(Environment::Production);
        f.transport
            .push_status(StatusCode::INTERNAL_SERVER_ERROR, "stack trace here");

        let err = f.recovery.execute(protected()).await.unwrap_err();
        assert_eq!(err.status(), Some(500));

        let notes = f.notifier.notifications();
        assert_eq!(notes.len(), 1);
        assert!(!notes[0].message.contains("stack trace"));
    }

    #[tokio::test]
    async fn server_error_shows_raw_message_in_development() {
        let f = fixture(Environment::Development);
        f.transport.push_status(StatusCode::BAD_GATEWAY, "upstream down");

        f.recovery.execute(protected()).await.unwrap_err();
        assert!(f.notifier.notifications()[0].message.contains("upstream down"));
    }

    #[tokio::test]
    async fn client_errors_do_not_notify() {
        let f = fixture(Environment::Production);
        f.transport.push_status(StatusCode::NOT_FOUND, "");

        f.recovery.execute(protected()).await.unwrap_err();
        assert!(f.notifier.notifications().is_empty());
    }

    #[tokio::test]
    async fn network_error_fails_without_refresh() {
        let f = fixture(Environment::Production);
        f.transport
            .push_error(HttpError::Network("connection refused".into()));

        let (outcome, trace) = f.recovery.execute_traced(protected()).await;
        assert!(matches!(outcome, Err(HttpError::Network(_))));
        assert_eq!(trace.phases(), [Phase::Sent, Phase::Failed]);
    }
}
