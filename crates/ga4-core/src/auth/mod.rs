//! Credential Broker
//!
//! Owns the Google credential for the lifetime of the process and serves
//! bearer tokens to the Data API client. Two strategies: service account
//! keys exchanged via a signed JWT assertion, and delegated OAuth tokens
//! persisted by an interactive authorization flow. Refresh is lazy: a token
//! is renewed on the first use after it enters the expiry margin, never on
//! a timer.

pub mod service;
pub mod stored;

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use self::service::ServiceAccountKey;
use self::stored::StoredToken;
use crate::config::{AuthMode, GaConfig};
use crate::http;

/// OAuth scope requested for every token. Reporting is read-only.
pub const ANALYTICS_SCOPE: &str = "https://www.googleapis.com/auth/analytics.readonly";

/// Google's OAuth 2.0 token endpoint.
pub const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// Seconds before expiry at which a token counts as stale.
const EXPIRY_MARGIN_SECS: i64 = 60;

// ── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
    #[error("no stored OAuth token found (searched: {0})")]
    TokenNotFound(String),
    #[error("failed to read {path}: {reason}")]
    Unreadable { path: String, reason: String },
    #[error("malformed credential JSON in {path}: {reason}")]
    Malformed { path: String, reason: String },
    #[error("no service account key configured; set GOOGLE_SERVICE_ACCOUNT_KEY or GOOGLE_APPLICATION_CREDENTIALS")]
    MissingServiceKey,
    #[error("service account token signing failed: {0}")]
    Signing(String),
    #[error("token request failed: {0}")]
    TokenRequest(String),
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),
    #[error("access token expired and refresh is disabled; set GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET to enable refresh")]
    RefreshUnavailable,
    #[error("failed to persist token to {path}: {reason}")]
    Persist { path: String, reason: String },
}

// ── Token endpoint plumbing ─────────────────────────────────────────────────

/// Successful token endpoint response body.
#[derive(Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// Parse a token endpoint response body. Error bodies carry `error` and
/// `error_description` regardless of HTTP status, so the key is checked
/// before the status.
fn parse_token_response(status: reqwest::StatusCode, body: &str) -> Result<TokenResponse, AuthError> {
    let parsed: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| AuthError::TokenRequest(format!("invalid JSON from token endpoint: {}", e)))?;

    if let Some(err) = parsed.get("error").and_then(|v| v.as_str()) {
        let description = parsed
            .get("error_description")
            .and_then(|v| v.as_str())
            .unwrap_or("no description");
        return Err(AuthError::TokenRequest(format!("{}: {}", err, description)));
    }

    if !status.is_success() {
        return Err(AuthError::TokenRequest(format!("HTTP {} from token endpoint", status)));
    }

    serde_json::from_value(parsed)
        .map_err(|e| AuthError::TokenRequest(format!("unexpected token endpoint shape: {}", e)))
}

async fn post_form(
    http: &reqwest::Client,
    url: &str,
    params: &HashMap<&str, &str>,
) -> Result<TokenResponse, AuthError> {
    let response = http
        .post(url)
        .form(params)
        .send()
        .await
        .map_err(|e| AuthError::TokenRequest(format!("HTTP request failed: {}", e)))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| AuthError::TokenRequest(format!("failed to read response body: {}", e)))?;

    parse_token_response(status, &body)
}

// ── Token Broker ────────────────────────────────────────────────────────────

/// The process-wide credential holder. Hands out a valid access token per
/// Data API call, refreshing behind a write lock when the current one is
/// inside the expiry margin.
pub struct TokenBroker {
    http: reqwest::Client,
    credential: RwLock<Credential>,
}

enum Credential {
    Service {
        key: ServiceAccountKey,
        cached: Option<MintedToken>,
    },
    OAuth2 {
        record: StoredToken,
        path: PathBuf,
        refresh: Option<ClientSecrets>,
    },
}

struct MintedToken {
    access_token: String,
    expiry_ms: i64,
}

struct ClientSecrets {
    id: String,
    secret: String,
}

impl TokenBroker {
    /// Load the credential selected by `config`. Missing or malformed
    /// credential material fails here, before the transport comes up.
    pub fn from_config(config: &GaConfig) -> Result<Self, AuthError> {
        let http = http::build_client().map_err(|e| AuthError::HttpClient(e.to_string()))?;

        let credential = match config.auth_mode {
            AuthMode::Service => {
                let key = ServiceAccountKey::load(config)?;
                info!("Credential broker ready (service account {})", key.client_email);
                Credential::Service { key, cached: None }
            }
            AuthMode::OAuth2 => {
                let path = stored::locate(config.token_file.as_deref())?;
                let record = StoredToken::load(&path)?;
                if let Some(scope) = &record.scope {
                    if !scope.contains("analytics") {
                        warn!("Stored token scope does not mention analytics: {}", scope);
                    }
                }
                let refresh = match (&config.client_id, &config.client_secret) {
                    (Some(id), Some(secret)) => Some(ClientSecrets {
                        id: id.clone(),
                        secret: secret.clone(),
                    }),
                    _ => {
                        warn!("GOOGLE_CLIENT_ID / GOOGLE_CLIENT_SECRET not set; token refresh is disabled");
                        None
                    }
                };
                info!("Credential broker ready (stored token at {})", path.display());
                Credential::OAuth2 { record, path, refresh }
            }
        };

        Ok(Self {
            http,
            credential: RwLock::new(credential),
        })
    }

    /// Retrieve a valid access token, refreshing if necessary.
    pub async fn access_token(&self) -> Result<String, AuthError> {
        // Fast path: current token still outside the expiry margin.
        {
            let credential = self.credential.read().await;
            if let Some(token) = credential.fresh_token() {
                return Ok(token);
            }
        }
        self.refresh().await
    }

    async fn refresh(&self) -> Result<String, AuthError> {
        let mut credential = self.credential.write().await;

        // Another caller may have refreshed while we waited for the lock.
        if let Some(token) = credential.fresh_token() {
            return Ok(token);
        }

        match &mut *credential {
            Credential::Service { key, cached } => {
                let response = exchange_assertion(&self.http, key).await?;
                let lifetime = response.expires_in.unwrap_or(3600);
                debug!("Minted service account token (expires in {}s)", lifetime);
                *cached = Some(MintedToken {
                    access_token: response.access_token.clone(),
                    expiry_ms: expiry_from_now_ms(lifetime),
                });
                Ok(response.access_token)
            }
            Credential::OAuth2 { record, path, refresh } => {
                let Some(secrets) = refresh else {
                    // Inside the margin but not yet hard-expired: keep
                    // serving the current token.
                    if !record.is_expiring(0) {
                        warn!("Token inside expiry margin and refresh is disabled; continuing with it");
                        return Ok(record.access_token.clone());
                    }
                    return Err(AuthError::RefreshUnavailable);
                };

                match refresh_stored(&self.http, secrets, &record.refresh_token).await {
                    Ok(response) => {
                        record.apply_refresh(&response);
                        if let Err(e) = record.persist(path) {
                            warn!("Failed to persist refreshed token (continuing with in-memory copy): {}", e);
                        }
                        info!("Refreshed delegated access token");
                        Ok(record.access_token.clone())
                    }
                    Err(e) => {
                        if !record.is_expiring(0) {
                            warn!("Token refresh failed but token not yet expired: {}", e);
                            return Ok(record.access_token.clone());
                        }
                        Err(e)
                    }
                }
            }
        }
    }
}

impl Credential {
    fn fresh_token(&self) -> Option<String> {
        match self {
            Credential::Service { cached: Some(token), .. }
                if !is_expiring_ms(token.expiry_ms, EXPIRY_MARGIN_SECS) =>
            {
                Some(token.access_token.clone())
            }
            Credential::OAuth2 { record, .. } if !record.is_expiring(EXPIRY_MARGIN_SECS) => {
                Some(record.access_token.clone())
            }
            _ => None,
        }
    }
}

async fn exchange_assertion(
    http: &reqwest::Client,
    key: &ServiceAccountKey,
) -> Result<TokenResponse, AuthError> {
    let assertion = key.sign_assertion(ANALYTICS_SCOPE)?;
    let mut params = HashMap::new();
    params.insert("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer");
    params.insert("assertion", assertion.as_str());
    post_form(http, &key.token_uri, &params).await
}

async fn refresh_stored(
    http: &reqwest::Client,
    secrets: &ClientSecrets,
    refresh_token: &str,
) -> Result<TokenResponse, AuthError> {
    let mut params = HashMap::new();
    params.insert("client_id", secrets.id.as_str());
    params.insert("client_secret", secrets.secret.as_str());
    params.insert("refresh_token", refresh_token);
    params.insert("grant_type", "refresh_token");
    post_form(http, TOKEN_ENDPOINT, &params)
        .await
        .map_err(|e| match e {
            AuthError::TokenRequest(msg) => AuthError::RefreshFailed(msg),
            other => other,
        })
}

// ── Helpers ─────────────────────────────────────────────────────────────────

/// Epoch-millisecond deadline `lifetime_secs` from now.
pub(crate) fn expiry_from_now_ms(lifetime_secs: i64) -> i64 {
    chrono::Utc::now().timestamp_millis() + lifetime_secs * 1000
}

/// Check whether an epoch-millisecond expiry is within `margin_secs` of now.
/// Past expiries are always within the margin.
pub(crate) fn is_expiring_ms(expiry_ms: i64, margin_secs: i64) -> bool {
    let now = chrono::Utc::now().timestamp_millis();
    expiry_ms - now < margin_secs * 1000
}
