//! http::notify
//!
//! Transient user-facing notifications for server errors.

use std::time::Duration;

use super::request::HttpError;
use crate::config::Environment;
use crate::ui::output::{self, Verbosity};

/// How long a notification stays visible.
pub const NOTIFICATION_TTL: Duration = Duration::from_secs(5);

/// Shown instead of raw error text in production.
pub const GENERIC_SERVER_ERROR: &str =
    "The server could not complete the request. Please try again later.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// A transient, dismissible message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub level: NotificationLevel,
    /// How long the message stays before it expires on its own.
    pub ttl: Duration,
}

impl Notification {
    /// The notification for a 5xx failure.
    ///
    /// Production gets a generic message; other environments see the raw
    /// error text.
    pub fn server_error(err: &HttpError, environment: Environment) -> Self {
        let message = if environment.is_production() {
            GENERIC_SERVER_ERROR.to_string()
        } else {
            err.to_string()
        };
        Self {
            message,
            level: NotificationLevel::Error,
            ttl: NOTIFICATION_TTL,
        }
    }
}

/// Non-blocking notification surface.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to stderr.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleNotifier {
    verbosity: Verbosity,
}

impl ConsoleNotifier {
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Info => output::hint(&notification.message),
            NotificationLevel::Warning | NotificationLevel::Error => {
                output::warn(&notification.message, self.verbosity)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server_error() -> HttpError {
        HttpError::Status {
            status: 503,
            method: "GET".into(),
            path: "/api/students".into(),
            message: "upstream timeout".into(),
        }
    }

    #[test]
    fn production_message_is_generic() {
        let n = Notification::server_error(&server_error(), Environment::Production);
        assert_eq!(n.message, GENERIC_SERVER_ERROR);
        assert_eq!(n.level, NotificationLevel::Error);
        assert_eq!(n.ttl, NOTIFICATION_TTL);
    }

    #[test]
    fn development_message_is_raw() {
        let n = Notification::server_error(&server_error(), Environment::Development);
        assert!(n.message.contains("upstream timeout"));
        assert!(n.message.contains("503"));
    }
}
