//! auth::oidc
//!
//! OpenID Connect client: authorization code + PKCE, refresh-token
//! rotation, revocation and userinfo.
//!
//! # Architecture
//!
//! [`OidcProvider`] implements [`IdentityProvider`] and owns the persisted
//! [`TokenBundle`]. The session lifecycle above it never sees refresh
//! tokens.
//!
//! ```text
//! sign_in:  bind loopback -> authorize URL -> browser -> code -> token endpoint
//! refresh:  auth lock -> re-read bundle -> refresh_token grant -> rotate -> save
//! revoke:   revocation endpoint (refresh, then access) -> delete bundle
//! ```
//!
//! # Concurrency
//!
//! Token refresh uses the [`AuthLock`] so two processes sharing one
//! session store never spend the same refresh token. The pattern is:
//!
//! 1. Read the bundle
//! 2. Acquire the auth lock
//! 3. Re-read the bundle; if another process already rotated it, use that
//! 4. Otherwise perform the refresh grant and save the rotated bundle
//! 5. Release lock
//!
//! # Id tokens
//!
//! Claims are read from the id token payload. The token arrives directly
//! from the token endpoint over TLS, so the issuer, audience and nonce are
//! checked but the signature is not re-verified.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64ct::{Base64UrlUnpadded, Encoding};
use reqwest::header::ACCEPT;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::callback::{CallbackListener, CALLBACK_TIMEOUT};
use super::claims::Claims;
use super::errors::AuthError;
use super::lock::{AuthLock, DEFAULT_LOCK_TIMEOUT};
use super::pkce::{random_token, PkcePair, CHALLENGE_METHOD};
use super::provider::IdentityProvider;
use super::session::AuthResult;
use super::token_bundle::{TokenBundle, TokenInfo};
use crate::config::AuthSettings;
use crate::store::SessionStore;

/// User-Agent header for identity-provider requests.
const USER_AGENT: &str = concat!("aula/", env!("CARGO_PKG_VERSION"));

/// Timeout for identity-provider requests.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest error body echoed into an error message.
const MAX_ERROR_BODY: usize = 200;

/// Endpoints from `/.well-known/openid-configuration`.
#[derive(Debug, Clone, Deserialize)]
pub struct Discovery {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    #[serde(default)]
    pub userinfo_endpoint: Option<String>,
    #[serde(default)]
    pub revocation_endpoint: Option<String>,
    #[serde(default)]
    pub end_session_endpoint: Option<String>,
}

/// A prepared authorization request.
///
/// Keep it until the callback arrives: the state, nonce and verifier are
/// needed to finish the exchange.
#[derive(Debug)]
pub struct AuthorizationRequest {
    /// Where to send the browser.
    pub url: Url,
    pub state: String,
    pub nonce: String,
    pkce: PkcePair,
}

impl AuthorizationRequest {
    pub fn code_verifier(&self) -> &str {
        self.pkce.verifier()
    }
}

/// Successful token endpoint response.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
}

/// OAuth error body (RFC 6749 section 5.2).
#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// OIDC identity provider backed by a [`SessionStore`].
pub struct OidcProvider {
    settings: AuthSettings,
    authority: String,
    client: Client,
    store: Arc<dyn SessionStore>,
    lock_dir: PathBuf,
    discovery: OnceCell<Discovery>,
}

impl OidcProvider {
    /// Create a provider for the configured authority.
    pub fn new(settings: AuthSettings, store: Arc<dyn SessionStore>) -> Result<Self, AuthError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let authority = settings.authority.as_str().trim_end_matches('/').to_string();
        Ok(Self {
            settings,
            authority,
            client,
            store,
            lock_dir: AuthLock::default_dir(),
            discovery: OnceCell::new(),
        })
    }

    /// Keep refresh lock files in `dir` instead of `~/.aula/auth`.
    pub fn with_lock_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.lock_dir = dir.into();
        self
    }

    pub fn settings(&self) -> &AuthSettings {
        &self.settings
    }

    fn store_key(&self) -> String {
        TokenBundle::store_key(&self.authority)
    }

    /// The stored bundle for this authority, if any.
    pub fn stored_bundle(&self) -> Result<Option<TokenBundle>, AuthError> {
        match self.store.get(&self.store_key())? {
            Some(json) => Ok(Some(TokenBundle::parse(&json)?)),
            None => Ok(None),
        }
    }

    fn save_bundle(&self, bundle: &TokenBundle) -> Result<(), AuthError> {
        self.store.set(&self.store_key(), &bundle.to_json()?)?;
        Ok(())
    }

    fn delete_bundle(&self) -> Result<(), AuthError> {
        self.store.delete(&self.store_key())?;
        Ok(())
    }

    /// Fetch (once) and return the discovery document.
    pub async fn discovery(&self) -> Result<&Discovery, AuthError> {
        self.discovery
            .get_or_try_init(|| async {
                let url = format!("{}/.well-known/openid-configuration", self.authority);
                debug!(%url, "fetching OIDC discovery document");

                let response = self
                    .client
                    .get(&url)
                    .header(ACCEPT, "application/json")
                    .send()
                    .await?;
                let status = response.status();
                let body = response.text().await?;
                if !status.is_success() {
                    return Err(AuthError::Discovery(format!(
                        "{} returned HTTP {}",
                        url,
                        status.as_u16()
                    )));
                }
                serde_json::from_str::<Discovery>(&body)
                    .map_err(|e| AuthError::Discovery(format!("malformed document: {}", e)))
            })
            .await
    }

    /// Build the authorization URL with fresh state, nonce and PKCE pair.
    pub async fn authorization_request(&self) -> Result<AuthorizationRequest, AuthError> {
        let discovery = self.discovery().await?;
        let mut url = parse_endpoint("authorization_endpoint", &discovery.authorization_endpoint)?;

        let pkce = PkcePair::generate();
        let state = random_token();
        let nonce = random_token();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.settings.client_id)
            .append_pair("redirect_uri", self.settings.redirect_url.as_str())
            .append_pair("scope", &self.settings.scopes)
            .append_pair("state", &state)
            .append_pair("nonce", &nonce)
            .append_pair("code_challenge", pkce.challenge())
            .append_pair("code_challenge_method", CHALLENGE_METHOD);

        Ok(AuthorizationRequest {
            url,
            state,
            nonce,
            pkce,
        })
    }

    /// Run the interactive sign-in.
    ///
    /// `on_authorize` receives the URL the user must open; the loopback
    /// listener is already bound when it is called.
    pub async fn sign_in<F>(&self, on_authorize: F) -> Result<AuthResult, AuthError>
    where
        F: FnOnce(&Url) + Send,
    {
        let listener = CallbackListener::bind(&self.settings.redirect_url).await?;
        let request = self.authorization_request().await?;
        on_authorize(&request.url);

        let code = listener
            .wait_for_code(&request.state, CALLBACK_TIMEOUT)
            .await?;
        self.exchange_code(&code, &request).await
    }

    /// Exchange an authorization code and persist the resulting bundle.
    pub async fn exchange_code(
        &self,
        code: &str,
        request: &AuthorizationRequest,
    ) -> Result<AuthResult, AuthError> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.settings.redirect_url.as_str()),
            ("client_id", self.settings.client_id.as_str()),
            ("code_verifier", request.code_verifier()),
        ];
        let response = self.token_request(&form).await?;

        let id_token = response.id_token.as_deref().ok_or_else(|| {
            AuthError::InvalidToken("token response carried no id_token".to_string())
        })?;
        let claims = self.validate_id_token(id_token, Some(&request.nonce)).await?;

        let tokens = TokenInfo::new(
            response.access_token,
            response.expires_in,
            self.keep_refresh_token(response.refresh_token),
            response.id_token,
        );
        let bundle = TokenBundle::new(
            &self.authority,
            &self.settings.client_id,
            tokens,
            Some(claims),
        );
        self.save_bundle(&bundle)?;
        info!(subject = %claims_subject(&bundle), "signed in");

        Ok(result_from_bundle(&bundle))
    }

    fn keep_refresh_token(&self, token: Option<String>) -> Option<String> {
        token.filter(|_| self.settings.use_refresh_tokens)
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse, AuthError> {
        let endpoint = self.discovery().await?.token_endpoint.clone();
        let response = self
            .client
            .post(endpoint)
            .header(ACCEPT, "application/json")
            .form(form)
            .send()
            .await?;
        read_json(response, "token").await
    }

    /// Decode the id token and check issuer, audience and (optionally) nonce.
    async fn validate_id_token(
        &self,
        id_token: &str,
        expected_nonce: Option<&str>,
    ) -> Result<Claims, AuthError> {
        let claims = decode_jwt_payload(id_token)?;
        let issuer = &self.discovery().await?.issuer;

        let matches_issuer = claims
            .issuer()
            .is_some_and(|iss| iss.trim_end_matches('/') == issuer.trim_end_matches('/'));
        if !matches_issuer {
            return Err(AuthError::InvalidToken("id token issuer mismatch".into()));
        }
        if !claims.has_audience(&self.settings.client_id) {
            return Err(AuthError::InvalidToken("id token audience mismatch".into()));
        }
        if let Some(nonce) = expected_nonce {
            if claims.nonce() != Some(nonce) {
                return Err(AuthError::InvalidToken("id token nonce mismatch".into()));
            }
        }
        if claims.sub.trim().is_empty() {
            return Err(AuthError::InvalidToken("id token has no subject".into()));
        }
        Ok(claims)
    }

    async fn acquire_lock(&self) -> Result<AuthLock, AuthError> {
        let dir = self.lock_dir.clone();
        let authority = self.authority.clone();
        tokio::task::spawn_blocking(move || {
            AuthLock::acquire(&dir, &authority, DEFAULT_LOCK_TIMEOUT)
        })
        .await
        .map_err(|e| AuthError::Internal(format!("lock task failed: {}", e)))?
    }

    /// Refresh the stored bundle under the auth lock.
    async fn refresh_bundle(&self) -> Result<TokenBundle, AuthError> {
        let before = self
            .stored_bundle()?
            .ok_or_else(|| AuthError::NotAuthenticated(self.authority.clone()))?;

        let _lock = self.acquire_lock().await?;

        // Re-load bundle and re-check (another process may have refreshed)
        let bundle = self
            .stored_bundle()?
            .ok_or_else(|| AuthError::NotAuthenticated(self.authority.clone()))?;
        if bundle.tokens.access_token != before.tokens.access_token && !bundle.needs_refresh() {
            debug!("session already renewed by another process");
            return Ok(bundle);
        }

        if !self.settings.use_refresh_tokens {
            return Err(AuthError::Expired(self.authority.clone()));
        }
        let Some(refresh_token) = bundle
            .tokens
            .refresh_token
            .clone()
            .filter(|t| !t.is_empty())
        else {
            return Err(AuthError::Expired(self.authority.clone()));
        };

        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
            ("client_id", self.settings.client_id.as_str()),
        ];
        let response = match self.token_request(&form).await {
            Err(AuthError::Provider { error, description }) if error == "invalid_grant" => {
                warn!("refresh token rejected, discarding stored session");
                self.delete_bundle()?;
                return Err(AuthError::Provider { error, description });
            }
            other => other?,
        };

        let claims = match response.id_token.as_deref() {
            Some(id_token) => Some(self.validate_id_token(id_token, None).await?),
            None => None,
        };
        let tokens = TokenInfo::new(
            response.access_token,
            response.expires_in,
            self.keep_refresh_token(response.refresh_token),
            response.id_token,
        );
        let refreshed = bundle.with_refreshed_tokens(tokens, claims);
        self.save_bundle(&refreshed)?;
        info!("session refreshed");

        Ok(refreshed)
    }

    /// End-session URL for the browser, when the provider advertises one.
    pub async fn end_session_url(&self) -> Result<Option<Url>, AuthError> {
        let discovery = self.discovery().await?;
        let Some(endpoint) = discovery.end_session_endpoint.as_deref() else {
            return Ok(None);
        };
        let mut url = parse_endpoint("end_session_endpoint", endpoint)?;
        let id_token = self
            .stored_bundle()
            .ok()
            .flatten()
            .and_then(|b| b.tokens.id_token);

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("client_id", &self.settings.client_id);
            if let Some(redirect) = &self.settings.post_logout_redirect_url {
                query.append_pair("post_logout_redirect_uri", redirect.as_str());
            }
            if let Some(hint) = id_token.as_deref() {
                query.append_pair("id_token_hint", hint);
            }
        }
        Ok(Some(url))
    }

    async fn revoke_token(&self, endpoint: &str, token: &str, hint: &str) {
        let form = [
            ("token", token),
            ("token_type_hint", hint),
            ("client_id", self.settings.client_id.as_str()),
        ];
        let outcome = self.client.post(endpoint).form(&form).send().await;
        match outcome {
            Ok(response) if response.status().is_success() => {
                debug!(token_type = hint, "token revoked");
            }
            Ok(response) => {
                warn!(token_type = hint, status = response.status().as_u16(), "token revocation rejected");
            }
            Err(e) => {
                warn!(token_type = hint, error = %e.without_url(), "token revocation failed");
            }
        }
    }
}

#[async_trait]
impl IdentityProvider for OidcProvider {
    async fn check_auth(&self) -> Result<AuthResult, AuthError> {
        let Some(bundle) = self.stored_bundle()? else {
            return Ok(AuthResult::unauthenticated());
        };
        if bundle.client_id != self.settings.client_id {
            debug!("stored session belongs to another client");
            return Ok(AuthResult::unauthenticated());
        }

        if bundle.needs_refresh() {
            if self.settings.silent_renew && self.settings.use_refresh_tokens && bundle.can_refresh()
            {
                debug!("access token near expiry, renewing silently");
                let renewed = self.refresh_bundle().await?;
                return Ok(result_from_bundle(&renewed));
            }
            if bundle.is_access_token_expired() {
                return Ok(AuthResult::unauthenticated());
            }
        }

        Ok(result_from_bundle(&bundle))
    }

    async fn refresh_session(&self) -> Result<AuthResult, AuthError> {
        let bundle = self.refresh_bundle().await?;
        Ok(result_from_bundle(&bundle))
    }

    async fn revoke(&self) -> Result<(), AuthError> {
        let bundle = match self.stored_bundle() {
            Ok(Some(bundle)) => bundle,
            Ok(None) => return Ok(()),
            Err(e) => {
                warn!(error = %e, "discarding unreadable stored session");
                return self.delete_bundle();
            }
        };

        match self.discovery().await {
            Ok(discovery) => {
                if let Some(endpoint) = discovery.revocation_endpoint.as_deref() {
                    if let Some(refresh) = bundle.tokens.refresh_token.as_deref() {
                        self.revoke_token(endpoint, refresh, "refresh_token").await;
                    }
                    self.revoke_token(endpoint, &bundle.tokens.access_token, "access_token")
                        .await;
                }
            }
            Err(e) => warn!(error = %e, "skipping token revocation"),
        }

        self.delete_bundle()
    }

    async fn user_profile(&self, access_token: &str) -> Result<Claims, AuthError> {
        let discovery = self.discovery().await?;
        let endpoint = discovery.userinfo_endpoint.as_deref().ok_or_else(|| {
            AuthError::Unsupported("identity provider has no userinfo endpoint".into())
        })?;

        let response = self
            .client
            .get(endpoint)
            .header(ACCEPT, "application/json")
            .bearer_auth(access_token)
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AuthError::Expired(self.authority.clone()));
        }
        read_json(response, "userinfo").await
    }

    fn authority(&self) -> &str {
        &self.authority
    }
}

impl std::fmt::Debug for OidcProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OidcProvider")
            .field("authority", &self.authority)
            .field("client_id", &self.settings.client_id)
            .finish_non_exhaustive()
    }
}

fn result_from_bundle(bundle: &TokenBundle) -> AuthResult {
    AuthResult::authenticated(bundle.tokens.access_token.clone(), bundle.claims.clone())
}

fn claims_subject(bundle: &TokenBundle) -> &str {
    bundle.claims.as_ref().map(|c| c.sub.as_str()).unwrap_or("")
}

fn parse_endpoint(name: &str, value: &str) -> Result<Url, AuthError> {
    Url::parse(value).map_err(|e| AuthError::Discovery(format!("invalid {}: {}", name, e)))
}

/// Decode the payload segment of a JWT without verifying it.
pub(crate) fn decode_jwt_payload(token: &str) -> Result<Claims, AuthError> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => return Err(AuthError::InvalidToken("id token is not a JWT".into())),
    };
    let bytes = Base64UrlUnpadded::decode_vec(payload.trim_end_matches('='))
        .map_err(|_| AuthError::InvalidToken("id token payload is not base64url".into()))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::InvalidToken(format!("id token payload: {}", e)))
}

async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
    what: &str,
) -> Result<T, AuthError> {
    let status = response.status();
    let body = response.text().await?;

    if status.is_success() {
        return serde_json::from_str(&body)
            .map_err(|e| AuthError::InvalidToken(format!("malformed {} response: {}", what, e)));
    }
    if let Ok(err) = serde_json::from_str::<OAuthErrorBody>(&body) {
        return Err(AuthError::Provider {
            error: err.error,
            description: err.error_description,
        });
    }
    Err(AuthError::UnexpectedStatus {
        status: status.as_u16(),
        message: body.chars().take(MAX_ERROR_BODY).collect(),
    })
}
