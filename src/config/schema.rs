//! config::schema
//!
//! Configuration file schema.
//!
//! Every field is optional in the file; defaults and required-field checks
//! are applied by the accessors on [`super::Config`].
//!
//! # Example
//!
//! ```toml
//! environment = "production"
//!
//! [auth]
//! authority = "https://id.example.edu/realms/aula"
//! client_id = "aula-backoffice"
//! redirect_url = "http://127.0.0.1:8765/callback"
//! scopes = "openid profile email offline_access"
//!
//! [api]
//! base_url = "https://api.example.edu"
//! protected_routes = ["https://api.example.edu/api"]
//!
//! [store]
//! provider = "file"
//! ```

use std::fmt;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Deployment environment. Controls how much error detail reaches the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Generic user-facing messages.
    #[default]
    Production,
    /// Raw error text is shown.
    Development,
}

impl Environment {
    /// Whether this is a production build.
    pub fn is_production(self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Production => write!(f, "production"),
            Environment::Development => write!(f, "development"),
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Deployment environment
    pub environment: Option<Environment>,

    /// Identity provider settings
    pub auth: Option<AuthConfig>,

    /// Backend API settings
    pub api: Option<ApiConfig>,

    /// Session storage settings
    pub store: Option<StoreConfig>,
}

impl GlobalConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(auth) = &self.auth {
            auth.validate()?;
        }
        if let Some(api) = &self.api {
            api.validate()?;
        }
        if let Some(store) = &self.store {
            store.validate()?;
        }
        Ok(())
    }
}

/// `[auth]` section: OIDC client registration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// Issuer / authority URL
    pub authority: Option<String>,

    /// Registered client id
    pub client_id: Option<String>,

    /// Loopback redirect URL for the authorization-code flow
    pub redirect_url: Option<String>,

    /// Where the provider sends the browser after end-session
    pub post_logout_redirect_url: Option<String>,

    /// Space-separated scopes
    pub scopes: Option<String>,

    /// Renew near-expiry tokens silently on startup
    pub silent_renew: Option<bool>,

    /// Request and rotate refresh tokens
    pub use_refresh_tokens: Option<bool>,
}

impl AuthConfig {
    /// Validate the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(authority) = &self.authority {
            parse_absolute("auth.authority", authority)?;
        }
        if let Some(client_id) = &self.client_id {
            if client_id.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "auth.client_id cannot be empty".to_string(),
                ));
            }
        }
        if let Some(redirect) = &self.redirect_url {
            parse_absolute("auth.redirect_url", redirect)?;
        }
        if let Some(redirect) = &self.post_logout_redirect_url {
            parse_absolute("auth.post_logout_redirect_url", redirect)?;
        }
        if let Some(scopes) = &self.scopes {
            if !scopes.split_whitespace().any(|s| s == "openid") {
                return Err(ConfigError::InvalidValue(format!(
                    "auth.scopes must include 'openid' (got '{}')",
                    scopes
                )));
            }
        }
        Ok(())
    }
}

/// `[api]` section: the REST backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    /// Base URL for relative request paths
    pub base_url: Option<String>,

    /// URL prefixes that receive the bearer token
    pub protected_routes: Option<Vec<String>>,

    /// Per-request timeout in seconds
    pub timeout_secs: Option<u64>,
}

impl ApiConfig {
    /// Validate the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(base) = &self.base_url {
            parse_absolute("api.base_url", base)?;
        }
        if let Some(routes) = &self.protected_routes {
            if routes.iter().any(|r| r.trim().is_empty()) {
                return Err(ConfigError::InvalidValue(
                    "api.protected_routes cannot contain empty prefixes".to_string(),
                ));
            }
        }
        if self.timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue(
                "api.timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// `[store]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Provider name: "file", "memory" or "keychain"
    pub provider: Option<String>,
}

impl StoreConfig {
    /// Validate the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(provider) = &self.provider {
            let valid = crate::store::valid_provider_names();
            if !valid.contains(&provider.as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid store provider '{}', must be one of: {}",
                    provider,
                    valid.join(", ")
                )));
            }
        }
        Ok(())
    }
}

pub(crate) fn parse_absolute(field: &str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidValue(format!("{} is not a valid URL: {}", field, e)))?;
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(ConfigError::InvalidValue(format!(
            "{} must be an absolute http(s) URL",
            field
        )));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    mod global_config {
        use super::*;

        #[test]
        fn defaults() {
            let config = GlobalConfig::default();
            assert!(config.environment.is_none());
            assert!(config.auth.is_none());
            assert!(config.validate().is_ok());
        }

        #[test]
        fn parses_environment() {
            let config: GlobalConfig = toml::from_str(r#"environment = "development""#).unwrap();
            assert_eq!(config.environment, Some(Environment::Development));
        }

        #[test]
        fn reject_unknown_fields() {
            let result: Result<GlobalConfig, _> = toml::from_str(r#"theme = "dark""#);
            assert!(result.is_err());
        }

        #[test]
        fn roundtrip() {
            let config = GlobalConfig {
                environment: Some(Environment::Production),
                auth: Some(AuthConfig {
                    authority: Some("https://id.example.edu/realms/aula".into()),
                    client_id: Some("aula-backoffice".into()),
                    ..Default::default()
                }),
                ..Default::default()
            };
            let text = toml::to_string(&config).unwrap();
            let parsed: GlobalConfig = toml::from_str(&text).unwrap();
            assert_eq!(config, parsed);
        }
    }

    mod auth_config {
        use super::*;

        #[test]
        fn valid_authority() {
            let auth = AuthConfig {
                authority: Some("https://id.example.edu/realms/aula".into()),
                ..Default::default()
            };
            assert!(auth.validate().is_ok());
        }

        #[test]
        fn relative_authority_rejected() {
            let auth = AuthConfig {
                authority: Some("/realms/aula".into()),
                ..Default::default()
            };
            assert!(auth.validate().is_err());
        }

        #[test]
        fn blank_client_id_rejected() {
            let auth = AuthConfig {
                client_id: Some("  ".into()),
                ..Default::default()
            };
            assert!(auth.validate().is_err());
        }

        #[test]
        fn scopes_require_openid() {
            let auth = AuthConfig {
                scopes: Some("profile email".into()),
                ..Default::default()
            };
            let err = auth.validate().unwrap_err();
            assert!(err.to_string().contains("openid"));
        }
    }

    mod api_config {
        use super::*;

        #[test]
        fn empty_prefix_rejected() {
            let api = ApiConfig {
                protected_routes: Some(vec!["https://api.example.edu/api".into(), "".into()]),
                ..Default::default()
            };
            assert!(api.validate().is_err());
        }

        #[test]
        fn zero_timeout_rejected() {
            let api = ApiConfig {
                timeout_secs: Some(0),
                ..Default::default()
            };
            assert!(api.validate().is_err());
        }
    }

    mod store_config {
        use super::*;

        #[test]
        fn valid_file_provider() {
            let store = StoreConfig {
                provider: Some("file".into()),
            };
            assert!(store.validate().is_ok());
        }

        #[test]
        fn invalid_provider() {
            let store = StoreConfig {
                provider: Some("vault".into()),
            };
            assert!(store.validate().is_err());
        }
    }
}
