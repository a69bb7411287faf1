//! http - authenticated calls to the back-office API
//!
//! # Architecture
//!
//! Every request takes the same path:
//!
//! ```text
//! ApiClient ─> FailureRecovery ─> RequestDecorator ─> Transport
//!                   │                    │
//!                   └── TokenSource <────┘
//! ```
//!
//! - [`RequestDecorator`] attaches `Authorization: Bearer` to protected
//!   routes and never to the identity provider
//! - [`FailureRecovery`] turns one 401/403 into a refresh and one retry
//! - [`Transport`] sends bytes; [`ReqwestTransport`] is the real one
//! - [`Notifier`] shows transient messages for server failures
//! - [`mock`] - Scripted transport and token source for tests

mod client;
mod decorator;
mod interceptor;
pub mod mock;
mod notify;
mod request;
mod routes;
mod transport;

pub use client::ApiClient;
pub use decorator::{Decoration, RequestDecorator};
pub use interceptor::{FailureRecovery, Phase, Trace};
pub use notify::{
    ConsoleNotifier, Notification, NotificationLevel, Notifier, GENERIC_SERVER_ERROR,
    NOTIFICATION_TTL,
};
pub use request::{ApiRequest, ApiResponse, HttpError};
pub use routes::{origin_of, ProtectedRoutes};
pub use transport::{ReqwestTransport, Transport};
