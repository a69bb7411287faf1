//! store::traits
//!
//! Session storage trait definition.
//!
//! # Design
//!
//! `SessionStore` is a small key-value interface. It holds the two pieces of
//! state that survive between runs: the OIDC token bundle and the one-shot
//! "where to go after sign-in" hint. Keys are namespaced (e.g.
//! `oidc.bundle.<fingerprint>`, `auth.redirect_url`).
//!
//! # Security
//!
//! Implementations MUST:
//! - Never log, print, or include stored values in error messages
//! - Be thread-safe (Send + Sync)

use thiserror::Error;

/// Errors from session storage operations.
///
/// Error messages intentionally do not include stored values.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to read from storage.
    #[error("failed to read session store: {0}")]
    ReadError(String),

    /// Failed to write to storage.
    #[error("failed to write session store: {0}")]
    WriteError(String),

    /// Failed to delete from storage.
    #[error("failed to delete from session store: {0}")]
    DeleteError(String),

    /// Provider not available or not configured.
    #[error("session store provider not available: {0}")]
    ProviderNotAvailable(String),
}

/// Trait for session storage providers.
///
/// # Example
///
/// ```
/// use aula::store::{MemorySessionStore, SessionStore};
///
/// let store = MemorySessionStore::new();
/// store.set("auth.redirect_url", "/students").unwrap();
/// assert_eq!(store.take("auth.redirect_url").unwrap().as_deref(), Some("/students"));
/// assert!(store.get("auth.redirect_url").unwrap().is_none());
/// ```
pub trait SessionStore: Send + Sync {
    /// Get a value by key.
    ///
    /// Returns `Ok(None)` if the key does not exist.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Set a value, overwriting any existing one.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Delete a value.
    ///
    /// Returns `Ok(())` even if the key did not exist.
    fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Check if a key exists.
    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get(key)?.is_some())
    }

    /// Read a value and delete it, so it is observed at most once.
    fn take(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = self.get(key)?;
        if value.is_some() {
            self.delete(key)?;
        }
        Ok(value)
    }
}
