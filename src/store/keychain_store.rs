//! store::keychain_store
//!
//! Session storage in the OS keychain (macOS Keychain, Windows Credential
//! Manager, Linux Secret Service) via the `keyring` crate.
//!
//! Only compiled with the `keychain` feature.

use keyring::Entry;

use super::traits::{SessionStore, StoreError};

/// Keychain-backed session store.
#[derive(Debug)]
pub struct KeychainSessionStore {
    service: String,
}

impl KeychainSessionStore {
    /// Create a store using `aula` as the keychain service name.
    pub fn new() -> Result<Self, StoreError> {
        Ok(Self::with_service("aula"))
    }

    /// Create a store with a custom service name.
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    /// The keychain service name.
    pub fn service(&self) -> &str {
        &self.service
    }

    fn entry(&self, key: &str) -> Result<Entry, StoreError> {
        Entry::new(&self.service, key)
            .map_err(|e| StoreError::ReadError(format!("cannot create keyring entry: {}", e)))
    }
}

impl SessionStore for KeychainSessionStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(keyring::Error::Ambiguous(_)) => {
                Err(StoreError::ReadError("ambiguous keychain entry".to_string()))
            }
            Err(e) => Err(StoreError::ReadError(format!(
                "cannot read from keychain: {}",
                e
            ))),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entry(key)?
            .set_password(value)
            .map_err(|e| StoreError::WriteError(format!("cannot write to keychain: {}", e)))
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(StoreError::DeleteError(format!(
                "cannot delete from keychain: {}",
                e
            ))),
        }
    }
}
