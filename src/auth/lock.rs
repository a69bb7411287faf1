//! auth::lock
//!
//! Authority-scoped lock for concurrent token refresh protection.
//!
//! # Architecture
//!
//! Refresh tokens are single-use and rotate on each refresh. This lock
//! prevents double-refresh races across concurrent `aula` processes
//! sharing one session store. It is per-authority and uses blocking
//! acquisition with timeout.
//!
//! # Storage
//!
//! - `~/.aula/auth/lock.<authority-fingerprint>` - Lock file with OS-level exclusive lock
//!
//! # Invariants
//!
//! - Lock must be held during token refresh operations
//! - After acquiring lock, caller must re-read the bundle (another process
//!   may have completed the refresh)
//! - Lock is automatically released on drop (RAII pattern)

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;

use super::errors::AuthError;
use super::token_bundle::authority_fingerprint;

/// Default timeout for lock acquisition (10 seconds).
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// Polling interval when waiting for lock (100ms).
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// An exclusive lock for token refresh operations.
///
/// Released when dropped.
#[derive(Debug)]
pub struct AuthLock {
    path: PathBuf,
    file: Option<File>,
    authority: String,
}

impl AuthLock {
    /// Default directory for lock files: `~/.aula/auth`.
    pub fn default_dir() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".aula").join("auth")
    }

    /// Get the lock file path for an authority inside `dir`.
    ///
    /// # Example
    ///
    /// ```
    /// use aula::auth::{authority_fingerprint, AuthLock};
    ///
    /// let authority = "https://id.example.edu/realms/aula";
    /// let path = AuthLock::lock_path(&AuthLock::default_dir(), authority);
    /// let expected = format!("lock.{}", authority_fingerprint(authority));
    /// assert!(path.to_string_lossy().ends_with(&expected));
    /// ```
    pub fn lock_path(dir: &Path, authority: &str) -> PathBuf {
        dir.join(format!("lock.{}", authority_fingerprint(authority)))
    }

    /// Acquire the auth lock with blocking and timeout.
    ///
    /// Polls at 100ms intervals. Call from a blocking context.
    ///
    /// # Errors
    ///
    /// - [`AuthError::LockTimeout`] if the timeout expires before acquiring
    /// - [`AuthError::LockError`] if there's an I/O error
    pub fn acquire(dir: &Path, authority: &str, timeout: Duration) -> Result<Self, AuthError> {
        let path = Self::lock_path(dir, authority);
        let deadline = Instant::now() + timeout;
        Self::ensure_dir(dir)?;

        loop {
            match Self::try_acquire_internal(authority, &path)? {
                Some(lock) => return Ok(lock),
                None => {
                    if Instant::now() >= deadline {
                        return Err(AuthError::LockTimeout);
                    }
                    thread::sleep(LOCK_POLL_INTERVAL);
                }
            }
        }
    }

    /// Try to acquire the lock without blocking.
    ///
    /// Returns `Ok(Some(lock))` if acquired, `Ok(None)` if already held.
    pub fn try_acquire(dir: &Path, authority: &str) -> Result<Option<Self>, AuthError> {
        Self::ensure_dir(dir)?;
        Self::try_acquire_internal(authority, &Self::lock_path(dir, authority))
    }

    fn ensure_dir(dir: &Path) -> Result<(), AuthError> {
        fs::create_dir_all(dir)
            .map_err(|e| AuthError::LockError(format!("cannot create {}: {}", dir.display(), e)))
    }

    fn try_acquire_internal(authority: &str, path: &Path) -> Result<Option<Self>, AuthError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| AuthError::LockError(format!("cannot open {}: {}", path.display(), e)))?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self {
                path: path.to_path_buf(),
                file: Some(file),
                authority: authority.to_string(),
            })),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(AuthError::LockError(format!("lock failed: {}", e))),
        }
    }

    /// Check if the lock is currently held.
    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Get the path to the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the authority this lock is for.
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Release the lock before the guard goes out of scope.
    pub fn release(&mut self) -> Result<(), AuthError> {
        if let Some(file) = self.file.take() {
            file.unlock()
                .map_err(|e| AuthError::LockError(format!("unlock failed: {}", e)))?;
        }
        Ok(())
    }
}

impl Drop for AuthLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = file.unlock();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const AUTHORITY: &str = "https://id.example.edu/realms/aula";

    #[test]
    fn lock_path_uses_fingerprint() {
        let dir = PathBuf::from("/tmp/aula-auth");
        let path = AuthLock::lock_path(&dir, AUTHORITY);
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert_eq!(name, format!("lock.{}", authority_fingerprint(AUTHORITY)));
        assert!(!name.contains('/'));
    }

    #[test]
    fn lock_path_different_authorities() {
        let dir = PathBuf::from("/tmp/aula-auth");
        let a = AuthLock::lock_path(&dir, AUTHORITY);
        let b = AuthLock::lock_path(&dir, "https://id.example.org");
        assert_ne!(a, b);
    }

    #[test]
    fn acquire_creates_directory_and_holds_lock() {
        let temp = TempDir::new().expect("create temp dir");
        let dir = temp.path().join("auth");

        let lock = AuthLock::acquire(&dir, AUTHORITY, Duration::from_secs(1)).expect("acquire");
        assert!(lock.is_held());
        assert!(lock.path().exists());
        assert_eq!(lock.authority(), AUTHORITY);
    }

    #[test]
    fn release_then_reacquire() {
        let temp = TempDir::new().expect("create temp dir");

        let mut lock =
            AuthLock::acquire(temp.path(), AUTHORITY, Duration::from_secs(1)).expect("acquire");
        lock.release().expect("release");
        assert!(!lock.is_held());

        let again = AuthLock::try_acquire(temp.path(), AUTHORITY).expect("try acquire");
        assert!(again.is_some());
    }

    #[test]
    fn lock_released_on_drop() {
        let temp = TempDir::new().expect("create temp dir");

        {
            let _lock = AuthLock::acquire(temp.path(), AUTHORITY, Duration::from_secs(1))
                .expect("acquire");
        }

        let lock = AuthLock::try_acquire(temp.path(), AUTHORITY).expect("try acquire");
        assert!(lock.is_some());
    }

    #[test]
    fn default_timeout_is_reasonable() {
        assert!(DEFAULT_LOCK_TIMEOUT >= Duration::from_secs(5));
        assert!(DEFAULT_LOCK_TIMEOUT <= Duration::from_secs(60));
    }
}
