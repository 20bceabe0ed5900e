//! Stored OAuth Tokens
//!
//! Reads and writes the token file produced by an interactive authorization
//! flow. The on-disk shape is the google-auth-library one: `expiry_date` is
//! epoch milliseconds, and the refresh token persists across refreshes
//! unless the endpoint rotates it.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{AuthError, TokenResponse};

/// Candidate token locations, relative to the working directory, tried in
/// order after the `GOOGLE_OAUTH_TOKEN_FILE` override.
pub const DEFAULT_LOCATIONS: [&str; 3] = [
    "google-analytics-token.json",
    "token.json",
    "credentials/google-analytics-token.json",
];

/// Persisted token record.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct StoredToken {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    #[zeroize(skip)]
    pub scope: Option<String>,
    #[serde(default = "default_token_type")]
    #[zeroize(skip)]
    pub token_type: String,
    /// Expiry as epoch milliseconds.
    #[zeroize(skip)]
    pub expiry_date: i64,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl fmt::Debug for StoredToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredToken")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("scope", &self.scope)
            .field("token_type", &self.token_type)
            .field("expiry_date", &self.expiry_date)
            .finish()
    }
}

/// Resolve the token file path. The override is the first candidate, the
/// default locations follow, and the first existing file wins.
pub fn locate(override_path: Option<&Path>) -> Result<PathBuf, AuthError> {
    locate_from(Path::new("."), override_path)
}

fn locate_from(base: &Path, override_path: Option<&Path>) -> Result<PathBuf, AuthError> {
    let mut candidates = Vec::new();
    if let Some(path) = override_path {
        candidates.push(path.to_path_buf());
    }
    candidates.extend(DEFAULT_LOCATIONS.iter().map(|name| base.join(name)));

    for candidate in &candidates {
        if candidate.exists() {
            return Ok(candidate.clone());
        }
    }

    let searched: Vec<String> = candidates.iter().map(|p| p.display().to_string()).collect();
    Err(AuthError::TokenNotFound(searched.join(", ")))
}

impl StoredToken {
    /// Load and validate a token file.
    pub fn load(path: &Path) -> Result<Self, AuthError> {
        let raw = fs::read_to_string(path).map_err(|e| AuthError::Unreadable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let token: Self = serde_json::from_str(&raw).map_err(|e| AuthError::Malformed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        if token.access_token.is_empty() || token.refresh_token.is_empty() {
            return Err(AuthError::Malformed {
                path: path.display().to_string(),
                reason: "access_token and refresh_token are required".to_string(),
            });
        }
        Ok(token)
    }

    /// Write the record back where it was loaded from, readable only by
    /// the owner on unix.
    pub fn persist(&self, path: &Path) -> Result<(), AuthError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| AuthError::Persist {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        write_owner_only(path, &json).map_err(|e| AuthError::Persist {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Whether the token is within `margin_secs` of its expiry.
    pub fn is_expiring(&self, margin_secs: i64) -> bool {
        super::is_expiring_ms(self.expiry_date, margin_secs)
    }

    /// Fold a refresh response into the record. The endpoint usually omits
    /// the refresh token; the existing one stays in that case.
    pub fn apply_refresh(&mut self, response: &TokenResponse) {
        self.access_token = response.access_token.clone();
        if let Some(refresh_token) = &response.refresh_token {
            self.refresh_token = refresh_token.clone();
        }
        if let Some(scope) = &response.scope {
            self.scope = Some(scope.clone());
        }
        if let Some(token_type) = &response.token_type {
            self.token_type = token_type.clone();
        }
        self.expiry_date = super::expiry_from_now_ms(response.expires_in.unwrap_or(3600));
    }
}

#[cfg(unix)]
fn write_owner_only(path: &Path, contents: &str) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    // 0o600 at open covers creation; set_permissions covers a file that
    // already existed with a looser mode.
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    file.write_all(contents.as_bytes())
}

#[cfg(not(unix))]
fn write_owner_only(path: &Path, contents: &str) -> std::io::Result<()> {
    fs::write(path, contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_token() -> StoredToken {
        StoredToken {
            access_token: "ya29.sample".to_string(),
            refresh_token: "1//sample-refresh".to_string(),
            scope: Some("https://www.googleapis.com/auth/analytics.readonly".to_string()),
            token_type: "Bearer".to_string(),
            expiry_date: chrono::Utc::now().timestamp_millis() + 3_600_000,
        }
    }

    #[test]
    fn test_persist_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");

        let token = sample_token();
        token.persist(&path).unwrap();

        let loaded = StoredToken::load(&path).unwrap();
        assert_eq!(loaded.access_token, token.access_token);
        assert_eq!(loaded.refresh_token, token.refresh_token);
        assert_eq!(loaded.expiry_date, token.expiry_date);
        assert_eq!(loaded.token_type, "Bearer");
    }

    #[cfg(unix)]
    #[test]
    fn test_persist_sets_owner_only_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        sample_token().persist(&path).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn test_persist_tightens_existing_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        fs::write(&path, "{}").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        sample_token().persist(&path).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_load_accepts_node_written_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        fs::write(
            &path,
            r#"{
                "access_token": "ya29.from-node",
                "refresh_token": "1//from-node",
                "scope": "https://www.googleapis.com/auth/analytics.readonly",
                "token_type": "Bearer",
                "expiry_date": 1755000000000
            }"#,
        )
        .unwrap();

        let token = StoredToken::load(&path).unwrap();
        assert_eq!(token.access_token, "ya29.from-node");
        assert_eq!(token.expiry_date, 1_755_000_000_000);
    }

    #[test]
    fn test_load_rejects_empty_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        fs::write(&path, r#"{"access_token": "", "refresh_token": "", "expiry_date": 0}"#).unwrap();

        let err = StoredToken::load(&path).unwrap_err();
        assert!(matches!(err, AuthError::Malformed { .. }));
    }

    #[test]
    fn test_load_rejects_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        fs::write(&path, "not json").unwrap();

        let err = StoredToken::load(&path).unwrap_err();
        assert!(matches!(err, AuthError::Malformed { .. }));
    }

    #[test]
    fn test_locate_prefers_named_file_over_generic() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("token.json"), "{}").unwrap();
        fs::write(dir.path().join("google-analytics-token.json"), "{}").unwrap();

        let found = locate_from(dir.path(), None).unwrap();
        assert!(found.ends_with("google-analytics-token.json"));
    }

    #[test]
    fn test_locate_checks_credentials_subdirectory() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("credentials")).unwrap();
        fs::write(dir.path().join("credentials/google-analytics-token.json"), "{}").unwrap();

        let found = locate_from(dir.path(), None).unwrap();
        assert!(found.ends_with("credentials/google-analytics-token.json"));
    }

    #[test]
    fn test_locate_reports_all_candidates_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = locate_from(dir.path(), None).unwrap_err();
        let msg = err.to_string();
        for candidate in DEFAULT_LOCATIONS {
            assert!(msg.contains(candidate), "missing {} in {}", candidate, msg);
        }
    }

    #[test]
    fn test_override_wins_over_default_locations() {
        let dir = tempfile::tempdir().unwrap();
        let override_path = dir.path().join("elsewhere.json");
        fs::write(&override_path, "{}").unwrap();
        fs::write(dir.path().join("google-analytics-token.json"), "{}").unwrap();

        let found = locate_from(dir.path(), Some(&override_path)).unwrap();
        assert_eq!(found, override_path);
    }

    #[test]
    fn test_missing_override_falls_through_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("google-analytics-token.json"), "{}").unwrap();

        let found =
            locate_from(dir.path(), Some(Path::new("/nonexistent/override.json"))).unwrap();
        assert!(found.ends_with("google-analytics-token.json"));
    }

    #[test]
    fn test_unlocatable_token_lists_override_in_error() {
        let dir = tempfile::tempdir().unwrap();
        let err =
            locate_from(dir.path(), Some(Path::new("/nonexistent/override.json"))).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("/nonexistent/override.json"));
        assert!(msg.contains("google-analytics-token.json"));
    }

    #[test]
    fn test_apply_refresh_keeps_refresh_token_when_omitted() {
        let mut token = sample_token();
        let response = TokenResponse {
            access_token: "ya29.renewed".to_string(),
            refresh_token: None,
            expires_in: Some(3600),
            scope: None,
            token_type: None,
        };

        token.apply_refresh(&response);

        assert_eq!(token.access_token, "ya29.renewed");
        assert_eq!(token.refresh_token, "1//sample-refresh");
        assert_eq!(token.token_type, "Bearer");
        let now = chrono::Utc::now().timestamp_millis();
        assert!(token.expiry_date > now + 3_500_000);
        assert!(token.expiry_date <= now + 3_600_000);
    }

    #[test]
    fn test_apply_refresh_adopts_rotated_refresh_token() {
        let mut token = sample_token();
        let response = TokenResponse {
            access_token: "ya29.renewed".to_string(),
            refresh_token: Some("1//rotated".to_string()),
            expires_in: None,
            scope: Some("scope-b".to_string()),
            token_type: Some("Bearer".to_string()),
        };

        token.apply_refresh(&response);

        assert_eq!(token.refresh_token, "1//rotated");
        assert_eq!(token.scope.as_deref(), Some("scope-b"));
    }

    #[test]
    fn test_is_expiring_uses_margin() {
        let mut token = sample_token();
        token.expiry_date = chrono::Utc::now().timestamp_millis() + 30_000;
        assert!(token.is_expiring(60));
        assert!(!token.is_expiring(0));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let rendered = format!("{:?}", sample_token());
        assert!(!rendered.contains("ya29.sample"));
        assert!(!rendered.contains("sample-refresh"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
