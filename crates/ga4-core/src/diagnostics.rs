//! Failure Diagnostics
//!
//! Maps credential and Data API failures onto the caller-facing categories
//! and builds the remediation envelope every tool shares. The envelope has
//! the same outer shape as a success payload; callers tell them apart by
//! the presence of the top-level `error` key.

use serde::Serialize;
use serde_json::{json, Value};

use crate::analytics::client::ApiError;

/// Coarse failure category surfaced to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// The identity is authenticated but not granted on the property.
    Permission,
    /// The credential itself is invalid, expired, or unrefreshable.
    Authentication,
    /// Bad arguments, caught before any network call.
    Validation,
    /// Everything else; the original detail is passed along.
    Generic,
}

/// Structured tool failure.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub category: Category,
    pub message: String,
    pub remediation: Vec<String>,
    #[serde(rename = "propertyId")]
    pub property_id: String,
    pub detail: String,
}

impl Diagnostic {
    /// The shared failure envelope: the diagnostic under a top-level
    /// `error` key.
    pub fn envelope(&self) -> Value {
        json!({"error": self})
    }

    /// Locally-detected argument problem; no network call was made.
    pub fn validation(message: impl Into<String>, property_id: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            category: Category::Validation,
            detail: message.clone(),
            message,
            remediation: Vec::new(),
            property_id: property_id.into(),
        }
    }
}

/// Classify an upstream failure. Order matters: permission evidence wins
/// over authentication wording, and a 403 counts as permission even when
/// the message says neither.
pub fn classify(error: &ApiError, property_id: &str) -> Diagnostic {
    let detail = error.to_string();
    let lowered = detail.to_lowercase();

    let category = if error.status() == Some(403) || lowered.contains("permission") {
        Category::Permission
    } else if lowered.contains("token") || lowered.contains("auth") {
        Category::Authentication
    } else {
        Category::Generic
    };

    let message = match category {
        Category::Permission => format!("Access denied for property {}", property_id),
        Category::Authentication => "Google Analytics authentication failed".to_string(),
        _ => format!("Google Analytics request failed for property {}", property_id),
    };

    Diagnostic {
        category,
        message,
        remediation: remediation(category, property_id),
        property_id: property_id.to_string(),
        detail,
    }
}

fn remediation(category: Category, property_id: &str) -> Vec<String> {
    match category {
        Category::Permission => vec![
            format!("Confirm that property ID {} is correct", property_id),
            "Grant the authenticated identity at least Viewer access under Admin > Property Access Management in Google Analytics".to_string(),
            "If access was granted recently, wait a few minutes and retry".to_string(),
        ],
        Category::Authentication => vec![
            "Re-run the authorization flow to obtain a fresh token".to_string(),
            "For service accounts, verify the key has not been deleted or revoked".to_string(),
        ],
        Category::Validation | Category::Generic => Vec::new(),
    }
}
