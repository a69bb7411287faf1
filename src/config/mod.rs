//! config
//!
//! Configuration loading and resolution.
//!
//! # Locations
//!
//! Searched in order, first hit wins:
//! 1. An explicit path (`--config <path>`)
//! 2. `$AULA_CONFIG` if set
//! 3. `$XDG_CONFIG_HOME/aula/config.toml`
//! 4. `~/.aula/config.toml` (canonical write location)
//!
//! A missing file is not an error; defaults are used. Required values
//! (authority, client id, API base URL) are checked only when the settings
//! that need them are resolved.
//!
//! # Example
//!
//! ```no_run
//! use aula::config::Config;
//!
//! let config = Config::load(None).unwrap();
//! let auth = config.auth_settings().unwrap();
//! println!("Authority: {}", auth.authority);
//! println!("Environment: {}", config.environment());
//! ```

pub mod schema;

pub use schema::{ApiConfig, AuthConfig, Environment, GlobalConfig, StoreConfig};

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Url;
use thiserror::Error;

use schema::parse_absolute;

/// Scopes requested when none are configured.
pub const DEFAULT_SCOPES: &str = "openid profile email offline_access";

/// Loopback redirect used when none is configured.
pub const DEFAULT_REDIRECT_URL: &str = "http://127.0.0.1:8765/callback";

/// Request timeout used when none is configured.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("failed to write config file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("'{0}' is not configured. Set it in the config file (see 'aula config path').")]
    Missing(&'static str),

    #[error("home directory not found")]
    NoHomeDir,
}

/// Resolved identity-provider settings.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthSettings {
    /// Issuer / authority URL.
    pub authority: Url,
    /// Registered client id.
    pub client_id: String,
    /// Loopback redirect URL.
    pub redirect_url: Url,
    /// Post-logout redirect URL, if configured.
    pub post_logout_redirect_url: Option<Url>,
    /// Space-separated scopes.
    pub scopes: String,
    /// Renew near-expiry tokens silently during `check_auth`.
    pub silent_renew: bool,
    /// Request and rotate refresh tokens.
    pub use_refresh_tokens: bool,
}

/// Resolved backend API settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiSettings {
    /// Base URL for relative request paths.
    pub base_url: Url,
    /// URL prefixes that receive the bearer token.
    pub protected_routes: Vec<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

/// Loaded configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Parsed file contents (defaults when no file was found)
    pub global: GlobalConfig,
    /// Path the configuration was loaded from
    path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from an explicit path or the default locations.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read, parsed
    /// or validated. An explicit path that does not exist is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }

        match Self::discover() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load and validate a specific config file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let global: GlobalConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        global.validate()?;

        Ok(Self {
            global,
            path: Some(path.to_path_buf()),
        })
    }

    /// Build a configuration from an in-memory file body.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let global: GlobalConfig = toml::from_str(contents).map_err(|e| ConfigError::ParseError {
            path: PathBuf::from("<inline>"),
            message: e.to_string(),
        })?;
        global.validate()?;
        Ok(Self { global, path: None })
    }

    /// Find the first existing config file in the standard locations.
    fn discover() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("AULA_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("aula/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        let path = dirs::home_dir()?.join(".aula/config.toml");
        path.exists().then_some(path)
    }

    /// Canonical path for the config file (`~/.aula/config.toml`).
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".aula/config.toml"))
    }

    /// Write a config file atomically (temp file, then rename).
    pub fn write(path: &Path, config: &GlobalConfig) -> Result<(), ConfigError> {
        config.validate()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        let contents =
            toml::to_string_pretty(config).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        let temp_path = path.with_extension("toml.tmp");
        let mut file = fs::File::create(&temp_path).map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;
        file.write_all(contents.as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(|e| ConfigError::WriteError {
                path: temp_path.clone(),
                source: e,
            })?;

        fs::rename(&temp_path, path).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Path the configuration was loaded from, if any.
    pub fn loaded_from(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Deployment environment. Defaults to production.
    pub fn environment(&self) -> Environment {
        self.global.environment.unwrap_or_default()
    }

    /// Session store provider. Defaults to "file".
    pub fn store_provider(&self) -> &str {
        self.global
            .store
            .as_ref()
            .and_then(|s| s.provider.as_deref())
            .unwrap_or(crate::store::DEFAULT_PROVIDER)
    }

    /// Resolve identity-provider settings.
    ///
    /// # Errors
    ///
    /// `ConfigError::Missing` if the authority or client id is absent.
    pub fn auth_settings(&self) -> Result<AuthSettings, ConfigError> {
        let auth = self.global.auth.clone().unwrap_or_default();

        let authority = auth
            .authority
            .as_deref()
            .ok_or(ConfigError::Missing("auth.authority"))?;
        let client_id = auth
            .client_id
            .clone()
            .ok_or(ConfigError::Missing("auth.client_id"))?;
        let redirect_url = auth.redirect_url.as_deref().unwrap_or(DEFAULT_REDIRECT_URL);

        Ok(AuthSettings {
            authority: parse_absolute("auth.authority", authority)?,
            client_id,
            redirect_url: parse_absolute("auth.redirect_url", redirect_url)?,
            post_logout_redirect_url: auth
                .post_logout_redirect_url
                .as_deref()
                .map(|u| parse_absolute("auth.post_logout_redirect_url", u))
                .transpose()?,
            scopes: auth.scopes.unwrap_or_else(|| DEFAULT_SCOPES.to_string()),
            silent_renew: auth.silent_renew.unwrap_or(true),
            use_refresh_tokens: auth.use_refresh_tokens.unwrap_or(true),
        })
    }

    /// Resolve backend API settings.
    ///
    /// When no protected routes are configured, the base URL itself is the
    /// only protected prefix.
    ///
    /// # Errors
    ///
    /// `ConfigError::Missing` if the base URL is absent.
    pub fn api_settings(&self) -> Result<ApiSettings, ConfigError> {
        let api = self.global.api.clone().unwrap_or_default();

        let base = api
            .base_url
            .as_deref()
            .ok_or(ConfigError::Missing("api.base_url"))?;
        let base_url = parse_absolute("api.base_url", base)?;

        let protected_routes = match api.protected_routes {
            Some(routes) if !routes.is_empty() => routes,
            _ => vec![base.trim_end_matches('/').to_string()],
        };

        Ok(ApiSettings {
            base_url,
            protected_routes,
            timeout: Duration::from_secs(api.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
        })
    }
}
