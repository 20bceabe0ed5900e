//! Runtime Configuration
//!
//! Every setting comes from the environment; there is no config file. The
//! auth mode is read once at startup and fixed for the life of the process.
//!
//! Recognized variables:
//! - `GOOGLE_AUTH_MODE`: `service` (default) or `oauth2`
//! - `GOOGLE_SERVICE_ACCOUNT_KEY`: service account key as inline JSON
//! - `GOOGLE_APPLICATION_CREDENTIALS`: path to a service account key file
//! - `GOOGLE_OAUTH_TOKEN_FILE`: path to a stored OAuth token (tried before
//!   the default search locations)
//! - `GOOGLE_CLIENT_ID` / `GOOGLE_CLIENT_SECRET`: enable refresh of stored
//!   OAuth tokens

use std::env;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unrecognized GOOGLE_AUTH_MODE {0:?}; expected \"service\" or \"oauth2\"")]
    UnknownAuthMode(String),
}

/// Which credential strategy the broker runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Service account key, exchanged for tokens via a signed JWT assertion.
    Service,
    /// Delegated OAuth token persisted by an interactive authorization flow.
    OAuth2,
}

impl AuthMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "service" => Some(Self::Service),
            "oauth2" => Some(Self::OAuth2),
            _ => None,
        }
    }
}

/// Settings snapshot taken at startup.
#[derive(Clone)]
pub struct GaConfig {
    pub auth_mode: AuthMode,
    /// Service account key as inline JSON. Takes precedence over the file.
    pub service_account_key: Option<String>,
    pub service_account_file: Option<PathBuf>,
    pub token_file: Option<PathBuf>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

// The inline key holds a private key and the client secret is a secret;
// neither belongs in logs.
impl fmt::Debug for GaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GaConfig")
            .field("auth_mode", &self.auth_mode)
            .field(
                "service_account_key",
                &self.service_account_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("service_account_file", &self.service_account_file)
            .field("token_file", &self.token_file)
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl GaConfig {
    /// Read the environment. Fails only on an unparseable auth mode; missing
    /// credential material is diagnosed later by the broker, which knows
    /// which pieces its mode actually needs.
    pub fn from_env() -> Result<Self, ConfigError> {
        let auth_mode = match env::var("GOOGLE_AUTH_MODE") {
            Ok(raw) => AuthMode::parse(&raw).ok_or(ConfigError::UnknownAuthMode(raw))?,
            Err(_) => AuthMode::Service,
        };

        Ok(Self {
            auth_mode,
            service_account_key: non_empty("GOOGLE_SERVICE_ACCOUNT_KEY"),
            service_account_file: non_empty("GOOGLE_APPLICATION_CREDENTIALS").map(PathBuf::from),
            token_file: non_empty("GOOGLE_OAUTH_TOKEN_FILE").map(PathBuf::from),
            client_id: non_empty("GOOGLE_CLIENT_ID"),
            client_secret: non_empty("GOOGLE_CLIENT_SECRET"),
        })
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
