//! store::file_store
//!
//! File-based session storage.
//!
//! # Security
//!
//! - Values are stored in `~/.aula/session.toml`
//! - File permissions are set to 0600 on Unix (owner read/write only)
//! - All writes are atomic (write to temp file, then rename)
//! - Values are never logged, printed, or included in error messages

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use super::traits::{SessionStore, StoreError};

/// File-based session storage.
///
/// Stores values in a flat TOML table at `~/.aula/session.toml`.
/// This is the default store.
///
/// # Example
///
/// ```ignore
/// use aula::store::{FileSessionStore, SessionStore};
///
/// let store = FileSessionStore::new()?;
/// store.set("auth.redirect_url", "/students")?;
/// ```
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    /// Create a store at the default location (`~/.aula/session.toml`).
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self, StoreError> {
        let home = dirs::home_dir()
            .ok_or_else(|| StoreError::ReadError("cannot determine home directory".into()))?;
        Ok(Self {
            path: home.join(".aula").join("session.toml"),
        })
    }

    /// Create a store at a custom path.
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    /// Path to the backing file.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn read_all(&self) -> Result<HashMap<String, String>, StoreError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }

        let content = fs::read_to_string(&self.path)
            .map_err(|e| StoreError::ReadError(format!("cannot read session file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| StoreError::ReadError(format!("cannot parse session file: {}", e)))
    }

    fn write_all(&self, values: &HashMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| StoreError::WriteError(format!("cannot create directory: {}", e)))?;
        }

        let content = toml::to_string_pretty(values)
            .map_err(|e| StoreError::WriteError(format!("cannot serialize session: {}", e)))?;

        let temp_path = self.path.with_extension("tmp");
        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)
                .map_err(|e| StoreError::WriteError(format!("cannot create temp file: {}", e)))?;

            // Restrict permissions before any content lands on disk
            #[cfg(unix)]
            {
                file.set_permissions(fs::Permissions::from_mode(0o600))
                    .map_err(|e| {
                        StoreError::WriteError(format!("cannot set permissions: {}", e))
                    })?;
            }

            file.write_all(content.as_bytes())
                .map_err(|e| StoreError::WriteError(format!("cannot write session: {}", e)))?;
            file.sync_all()
                .map_err(|e| StoreError::WriteError(format!("cannot sync to disk: {}", e)))?;
        }

        fs::rename(&temp_path, &self.path)
            .map_err(|e| StoreError::WriteError(format!("cannot rename temp file: {}", e)))
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.read_all()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut values = self.read_all()?;
        values.insert(key.to_string(), value.to_string());
        self.write_all(&values)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut values = self.read_all()?;
        if values.remove(key).is_none() {
            return Ok(());
        }
        self.write_all(&values)
            .map_err(|e| StoreError::DeleteError(e.to_string()))
    }
}
