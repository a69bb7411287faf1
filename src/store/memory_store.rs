//! store::memory_store
//!
//! In-process session storage. Nothing survives the process; used by tests
//! and by callers that want a session scoped to a single run.

use std::collections::HashMap;
use std::sync::Mutex;

use super::traits::{SessionStore, StoreError};

/// Session store backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    data: Mutex<HashMap<String, String>>,
}

impl MemorySessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.data.lock().map(|d| d.len()).unwrap_or(0)
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let data = self
            .data
            .lock()
            .map_err(|_| StoreError::ReadError("memory store poisoned".into()))?;
        Ok(data.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut data = self
            .data
            .lock()
            .map_err(|_| StoreError::WriteError("memory store poisoned".into()))?;
        data.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut data = self
            .data
            .lock()
            .map_err(|_| StoreError::DeleteError("memory store poisoned".into()))?;
        data.remove(key);
        Ok(())
    }
}
