//! auth::navigator
//!
//! Where the user is sent when a session ends.

use crate::ui::output;

/// Receives the "go to sign-in" signal from [`super::TokenHolder::logout`].
pub trait Navigator: Send + Sync {
    /// The session ended; the user has to sign in again.
    fn to_sign_in(&self);
}

/// Tells the terminal user how to sign in again.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNavigator;

impl Navigator for ConsoleNavigator {
    fn to_sign_in(&self) {
        output::hint("Signed out. Run 'aula login' to sign in again.");
    }
}

/// Ignores the signal.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn to_sign_in(&self) {}
}
