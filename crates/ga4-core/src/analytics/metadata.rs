//! Metadata Projection
//!
//! The raw `properties/{id}/metadata` catalog is far too large to hand to a
//! model whole. These helpers trim each entry down to the usable fields and
//! run the search tool's case-insensitive matching. Unlike reports, this is
//! the one place responses are reshaped rather than relayed.

use serde_json::{json, Map, Value};

/// Which halves of the catalog a metadata call wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataKind {
    Dimensions,
    Metrics,
    Both,
}

impl MetadataKind {
    /// Parse the tools' `type` argument.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "dimensions" => Some(Self::Dimensions),
            "metrics" => Some(Self::Metrics),
            "both" => Some(Self::Both),
            _ => None,
        }
    }

    fn wants_dimensions(self) -> bool {
        matches!(self, Self::Dimensions | Self::Both)
    }

    fn wants_metrics(self) -> bool {
        matches!(self, Self::Metrics | Self::Both)
    }
}

/// Project the catalog down to the compact per-entry shape. Requesting one
/// kind omits the other section entirely.
pub fn project(catalog: &Value, kind: MetadataKind) -> Value {
    filtered(catalog, kind, |_| true)
}

/// Project and keep only entries matching `query` (case-insensitive, over
/// API name, display name, and description), optionally narrowed to a
/// category first.
pub fn search(catalog: &Value, kind: MetadataKind, query: &str, category: Option<&str>) -> Value {
    let needle = query.to_lowercase();
    filtered(catalog, kind, |entry| entry_matches(entry, &needle, category))
}

fn filtered(catalog: &Value, kind: MetadataKind, keep: impl Fn(&Value) -> bool) -> Value {
    let mut out = Map::new();
    if kind.wants_dimensions() {
        out.insert(
            "dimensions".to_string(),
            project_entries(catalog.get("dimensions"), false, &keep),
        );
    }
    if kind.wants_metrics() {
        out.insert(
            "metrics".to_string(),
            project_entries(catalog.get("metrics"), true, &keep),
        );
    }
    Value::Object(out)
}

fn project_entries(entries: Option<&Value>, with_type: bool, keep: &impl Fn(&Value) -> bool) -> Value {
    let projected: Vec<Value> = entries
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter(|entry| keep(entry))
                .map(|entry| project_entry(entry, with_type))
                .collect()
        })
        .unwrap_or_default();
    Value::Array(projected)
}

/// One catalog entry, trimmed. The API calls the display name `uiName`;
/// metrics additionally carry a value `type`.
fn project_entry(entry: &Value, with_type: bool) -> Value {
    let mut out = json!({
        "apiName": entry.get("apiName").cloned().unwrap_or(Value::Null),
        "displayName": entry.get("uiName").cloned().unwrap_or(Value::Null),
        "description": entry.get("description").cloned().unwrap_or(Value::Null),
        "category": entry.get("category").cloned().unwrap_or(Value::Null),
        "customDefinition": entry.get("customDefinition").cloned().unwrap_or(Value::Bool(false)),
    });
    if with_type {
        out["type"] = entry.get("type").cloned().unwrap_or(Value::Null);
    }
    out
}

fn entry_matches(entry: &Value, needle: &str, category: Option<&str>) -> bool {
    if let Some(want) = category {
        let got = entry.get("category").and_then(Value::as_str).unwrap_or("");
        if !got.eq_ignore_ascii_case(want) {
            return false;
        }
    }
    if needle.is_empty() {
        return true;
    }
    ["apiName", "uiName", "description"].iter().any(|field| {
        entry
            .get(*field)
            .and_then(Value::as_str)
            .is_some_and(|text| text.to_lowercase().contains(needle))
    })
}
