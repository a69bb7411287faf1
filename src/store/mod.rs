//! store
//!
//! Key-value session storage.
//!
//! # Architecture
//!
//! Session state is stored through the [`SessionStore`] trait, which has
//! several implementations:
//!
//! - [`FileSessionStore`]: `~/.aula/session.toml` (default)
//! - [`MemorySessionStore`]: in-process only
//! - `KeychainSessionStore`: OS keychain (feature `keychain`)
//!
//! Two kinds of values live here: the OIDC token bundle written by
//! [`crate::auth::OidcProvider`] and the post-sign-in redirect hint managed
//! by [`crate::auth::TokenHolder`].

mod file_store;
#[cfg(feature = "keychain")]
mod keychain_store;
mod memory_store;
mod traits;

pub use file_store::FileSessionStore;
#[cfg(feature = "keychain")]
pub use keychain_store::KeychainSessionStore;
pub use memory_store::MemorySessionStore;
pub use traits::{SessionStore, StoreError};

/// The default store provider name.
pub const DEFAULT_PROVIDER: &str = "file";

/// Provider names accepted by [`create_store`].
pub fn valid_provider_names() -> &'static [&'static str] {
    &["file", "memory", "keychain"]
}

/// Create a session store by provider name.
///
/// # Errors
///
/// - Unknown provider name
/// - `keychain` without the `keychain` feature
/// - Initialization errors from the store
pub fn create_store(provider: &str) -> Result<Box<dyn SessionStore>, StoreError> {
    match provider {
        "file" => Ok(Box::new(FileSessionStore::new()?)),
        "memory" => Ok(Box::new(MemorySessionStore::new())),
        #[cfg(feature = "keychain")]
        "keychain" => Ok(Box::new(KeychainSessionStore::new()?)),
        #[cfg(not(feature = "keychain"))]
        "keychain" => Err(StoreError::ProviderNotAvailable(
            "keychain support not enabled (compile with --features keychain)".into(),
        )),
        other => Err(StoreError::ProviderNotAvailable(format!(
            "unknown session store provider: '{}' (valid: {})",
            other,
            valid_provider_names().join(", ")
        ))),
    }
}
