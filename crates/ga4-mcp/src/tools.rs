use serde_json::{json, Value};

use ga4_core::analytics::metadata::{self, MetadataKind};
use ga4_core::analytics::presets::ReportType;
use ga4_core::analytics::reports::{
    DateRange, OrderBy, RealtimeSpec, ReportSpec, DEFAULT_INSIGHT_LIMIT, DEFAULT_REALTIME_LIMIT,
    DEFAULT_REALTIME_METRIC, DEFAULT_REPORT_LIMIT,
};
use ga4_core::diagnostics::{classify, Diagnostic};
use ga4_core::AnalyticsData;

use crate::protocol::{McpTool, ToolAnnotations, ToolContent, ToolsCallResponse, ToolsListResponse};

/// Dispatches MCP tool calls onto a query engine. Everything that goes
/// wrong inside a known tool resolves to the shared error envelope in the
/// tool result; only an unknown tool name escapes as a protocol error.
pub struct ToolRegistry<E> {
    engine: E,
    tools: Vec<McpTool>,
}

#[derive(Debug)]
pub enum ToolCallError {
    UnknownTool(String),
}

impl<E: AnalyticsData> ToolRegistry<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            tools: definitions(),
        }
    }

    pub fn list_response(&self) -> ToolsListResponse {
        ToolsListResponse {
            tools: self.tools.clone(),
            next_cursor: None,
        }
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolsCallResponse, ToolCallError> {
        let payload = match name {
            "run_report" => self.run_report(&arguments).await,
            "run_realtime_report" => self.run_realtime_report(&arguments).await,
            "quick_insight" => self.quick_insight(&arguments).await,
            "get_metadata" => self.get_metadata(&arguments).await,
            "search_metadata" => self.search_metadata(&arguments).await,
            _ => return Err(ToolCallError::UnknownTool(name.to_string())),
        };
        Ok(respond(payload))
    }

    // ── Tool handlers ───────────────────────────────────────────────────────

    async fn run_report(&self, args: &Value) -> Result<Value, Diagnostic> {
        let property = property_id(args)?;
        let start_date = required_str(args, "startDate", &property)?;
        let end_date = required_str(args, "endDate", &property)?;
        let metrics = string_list(args, "metrics");
        if metrics.is_empty() {
            return Err(Diagnostic::validation("at least one metric is required", &property));
        }

        let spec = ReportSpec {
            date_range: DateRange { start_date, end_date },
            dimensions: string_list(args, "dimensions"),
            metrics,
            dimension_filter: opaque_filter(args, "dimensionFilter"),
            metric_filter: opaque_filter(args, "metricFilter"),
            order_by: order_by(args),
            limit: limit_or(args, DEFAULT_REPORT_LIMIT),
        };

        self.engine
            .run_report(&property, &spec.body())
            .await
            .map_err(|e| classify(&e, &property))
    }

    async fn run_realtime_report(&self, args: &Value) -> Result<Value, Diagnostic> {
        let property = property_id(args)?;
        let mut metrics = string_list(args, "metrics");
        if metrics.is_empty() {
            metrics.push(DEFAULT_REALTIME_METRIC.to_string());
        }

        let spec = RealtimeSpec {
            dimensions: string_list(args, "dimensions"),
            metrics,
            limit: limit_or(args, DEFAULT_REALTIME_LIMIT),
        };

        self.engine
            .run_realtime_report(&property, &spec.body())
            .await
            .map_err(|e| classify(&e, &property))
    }

    async fn quick_insight(&self, args: &Value) -> Result<Value, Diagnostic> {
        let property = property_id(args)?;
        let raw_type = required_str(args, "reportType", &property)?;
        let Some(report_type) = ReportType::parse(&raw_type) else {
            return Err(Diagnostic::validation(
                format!(
                    "unknown reportType {:?}; expected one of: {}",
                    raw_type,
                    ReportType::ALL.map(ReportType::name).join(", ")
                ),
                &property,
            ));
        };
        let start_date = required_str(args, "startDate", &property)?;
        let end_date = required_str(args, "endDate", &property)?;

        let spec = report_type.preset().into_spec(
            DateRange { start_date, end_date },
            limit_or(args, DEFAULT_INSIGHT_LIMIT),
        );

        self.engine
            .run_report(&property, &spec.body())
            .await
            .map_err(|e| classify(&e, &property))
    }

    async fn get_metadata(&self, args: &Value) -> Result<Value, Diagnostic> {
        let property = property_id(args)?;
        let kind = metadata_kind(args, &property)?;
        let catalog = self
            .engine
            .metadata(&property)
            .await
            .map_err(|e| classify(&e, &property))?;
        Ok(metadata::project(&catalog, kind))
    }

    async fn search_metadata(&self, args: &Value) -> Result<Value, Diagnostic> {
        let property = property_id(args)?;
        let query = required_str(args, "query", &property)?;
        let kind = metadata_kind(args, &property)?;
        let category = args
            .get("category")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from);

        let catalog = self
            .engine
            .metadata(&property)
            .await
            .map_err(|e| classify(&e, &property))?;
        Ok(metadata::search(&catalog, kind, &query, category.as_deref()))
    }
}

/// Wrap a handler outcome as a tool result. Failures carry the envelope
/// JSON in the text content with `isError` set; they are still successful
/// JSON-RPC responses.
fn respond(payload: Result<Value, Diagnostic>) -> ToolsCallResponse {
    match payload {
        Ok(value) => ToolsCallResponse {
            content: vec![ToolContent {
                content_type: "text".to_string(),
                text: serde_json::to_string(&value).unwrap_or_else(|_| "null".to_string()),
            }],
            is_error: false,
        },
        Err(diagnostic) => ToolsCallResponse {
            content: vec![ToolContent {
                content_type: "text".to_string(),
                text: serde_json::to_string(&diagnostic.envelope())
                    .unwrap_or_else(|_| "{}".to_string()),
            }],
            is_error: true,
        },
    }
}

// ── Argument extraction ─────────────────────────────────────────────────────

/// Property IDs arrive as strings or bare numbers, with or without the
/// `properties/` prefix. Normalized to the bare numeric form.
fn property_id(args: &Value) -> Result<String, Diagnostic> {
    let raw = match args.get("propertyId") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => {
            return Err(Diagnostic::validation("missing required parameter: propertyId", ""));
        }
    };
    Ok(raw.strip_prefix("properties/").unwrap_or(&raw).to_string())
}

fn required_str(args: &Value, key: &str, property_id: &str) -> Result<String, Diagnostic> {
    match args.get(key).and_then(Value::as_str).map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => Err(Diagnostic::validation(
            format!("missing required parameter: {}", key),
            property_id,
        )),
    }
}

fn string_list(args: &Value, key: &str) -> Vec<String> {
    args.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

fn limit_or(args: &Value, default: u64) -> u64 {
    args.get("limit")
        .and_then(Value::as_u64)
        .filter(|n| *n > 0)
        .unwrap_or(default)
}

/// Filter expressions are relayed opaquely, but a null or empty object is
/// treated as absent rather than forwarded.
fn opaque_filter(args: &Value, key: &str) -> Option<Value> {
    match args.get(key)? {
        Value::Null => None,
        Value::Object(map) if map.is_empty() => None,
        other => Some(other.clone()),
    }
}

fn order_by(args: &Value) -> Option<OrderBy> {
    let obj = args.get("orderBy")?.as_object()?;
    let order = OrderBy {
        metric: obj.get("metric").and_then(Value::as_str).map(String::from),
        dimension: obj.get("dimension").and_then(Value::as_str).map(String::from),
        desc: obj.get("desc").and_then(Value::as_bool),
    };
    if order.metric.is_none() && order.dimension.is_none() {
        return None;
    }
    Some(order)
}

fn metadata_kind(args: &Value, property_id: &str) -> Result<MetadataKind, Diagnostic> {
    match args.get("type").and_then(Value::as_str) {
        None => Ok(MetadataKind::Both),
        Some(raw) => MetadataKind::parse(raw).ok_or_else(|| {
            Diagnostic::validation(
                format!("unknown type {:?}; expected dimensions, metrics, or both", raw),
                property_id,
            )
        }),
    }
}

// ── Tool definitions ────────────────────────────────────────────────────────

fn definitions() -> Vec<McpTool> {
    vec![
        McpTool {
            name: "run_report".to_string(),
            description: "Run a Google Analytics 4 report over a date range. Returns the raw \
                          Data API response (dimension/metric headers, rows, row count)."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "propertyId": {
                        "type": "string",
                        "description": "GA4 property ID, with or without the properties/ prefix"
                    },
                    "startDate": {
                        "type": "string",
                        "description": "Start date: YYYY-MM-DD or a relative form like 7daysAgo"
                    },
                    "endDate": {
                        "type": "string",
                        "description": "End date: YYYY-MM-DD, today, or yesterday"
                    },
                    "metrics": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Metric API names, e.g. activeUsers, sessions"
                    },
                    "dimensions": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Dimension API names, e.g. date, country, pagePath"
                    },
                    "dimensionFilter": {
                        "type": "object",
                        "description": "Data API FilterExpression, relayed unchanged"
                    },
                    "metricFilter": {
                        "type": "object",
                        "description": "Data API metric FilterExpression, relayed unchanged"
                    },
                    "orderBy": {
                        "type": "object",
                        "properties": {
                            "metric": {"type": "string"},
                            "dimension": {"type": "string"},
                            "desc": {"type": "boolean"}
                        },
                        "description": "Sort directive; metric wins when both are named, descending by default"
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Maximum rows to return (default 100)"
                    }
                },
                "required": ["propertyId", "startDate", "endDate", "metrics"]
            }),
            annotations: query_annotations(),
        },
        McpTool {
            name: "run_realtime_report".to_string(),
            description: "Snapshot of activity in the last 30 minutes for a GA4 property. \
                          Defaults to the activeUsers metric when none is given."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "propertyId": {
                        "type": "string",
                        "description": "GA4 property ID, with or without the properties/ prefix"
                    },
                    "metrics": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Realtime metric API names (default: activeUsers)"
                    },
                    "dimensions": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Realtime dimension API names, e.g. country, unifiedScreenName"
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Maximum rows to return (default 50)"
                    }
                },
                "required": ["propertyId"]
            }),
            annotations: query_annotations(),
        },
        McpTool {
            name: "quick_insight".to_string(),
            description: "Run one of the predefined GA4 report templates over a date range. \
                          Templates fix the dimensions and metrics; some add an ordering or a \
                          United States country filter."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "propertyId": {
                        "type": "string",
                        "description": "GA4 property ID, with or without the properties/ prefix"
                    },
                    "reportType": {
                        "type": "string",
                        "enum": [
                            "overview",
                            "top_pages",
                            "traffic_sources",
                            "geographic",
                            "demographics",
                            "conversions",
                            "engagement",
                            "ecommerce",
                            "devices"
                        ],
                        "description": "Which template to run"
                    },
                    "startDate": {
                        "type": "string",
                        "description": "Start date: YYYY-MM-DD or a relative form like 30daysAgo"
                    },
                    "endDate": {
                        "type": "string",
                        "description": "End date: YYYY-MM-DD, today, or yesterday"
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Maximum rows to return (default 20)"
                    }
                },
                "required": ["propertyId", "reportType", "startDate", "endDate"]
            }),
            annotations: query_annotations(),
        },
        McpTool {
            name: "get_metadata".to_string(),
            description: "List the dimensions and metrics available on a GA4 property, including \
                          custom definitions, trimmed to name, display name, description, and \
                          category."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "propertyId": {
                        "type": "string",
                        "description": "GA4 property ID, with or without the properties/ prefix"
                    },
                    "type": {
                        "type": "string",
                        "enum": ["dimensions", "metrics", "both"],
                        "description": "Which halves of the catalog to return (default both)"
                    }
                },
                "required": ["propertyId"]
            }),
            annotations: query_annotations(),
        },
        McpTool {
            name: "search_metadata".to_string(),
            description: "Search a GA4 property's dimensions and metrics by name, display name, \
                          or description, optionally narrowed to one category."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "propertyId": {
                        "type": "string",
                        "description": "GA4 property ID, with or without the properties/ prefix"
                    },
                    "query": {
                        "type": "string",
                        "description": "Case-insensitive substring to look for"
                    },
                    "type": {
                        "type": "string",
                        "enum": ["dimensions", "metrics", "both"],
                        "description": "Which halves of the catalog to search (default both)"
                    },
                    "category": {
                        "type": "string",
                        "description": "Restrict matches to one catalog category, e.g. Geography"
                    }
                },
                "required": ["propertyId", "query"]
            }),
            annotations: query_annotations(),
        },
    ]
}

fn query_annotations() -> Option<ToolAnnotations> {
    Some(ToolAnnotations {
        read_only_hint: Some(true),
        destructive_hint: Some(false),
        idempotent_hint: Some(true),
        open_world_hint: Some(true),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use ga4_core::ApiError;

    use super::*;

    enum StubBehavior {
        Succeed(Value),
        Fail(u16, &'static str),
    }

    struct StubEngine {
        calls: AtomicUsize,
        last: Mutex<Option<(String, Value)>>,
        behavior: StubBehavior,
    }

    impl StubEngine {
        fn ok(value: Value) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                last: Mutex::new(None),
                behavior: StubBehavior::Succeed(value),
            }
        }

        fn fail(status: u16, message: &'static str) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                last: Mutex::new(None),
                behavior: StubBehavior::Fail(status, message),
            }
        }

        fn record(&self, property_id: &str, body: &Value) -> Result<Value, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some((property_id.to_string(), body.clone()));
            match &self.behavior {
                StubBehavior::Succeed(value) => Ok(value.clone()),
                StubBehavior::Fail(status, message) => Err(ApiError::Api {
                    status: *status,
                    message: (*message).to_string(),
                }),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn last_property(&self) -> String {
            self.last.lock().unwrap().clone().unwrap().0
        }

        fn last_body(&self) -> Value {
            self.last.lock().unwrap().clone().unwrap().1
        }
    }

    impl AnalyticsData for StubEngine {
        async fn run_report(&self, property_id: &str, body: &Value) -> Result<Value, ApiError> {
            self.record(property_id, body)
        }

        async fn run_realtime_report(&self, property_id: &str, body: &Value) -> Result<Value, ApiError> {
            self.record(property_id, body)
        }

        async fn metadata(&self, property_id: &str) -> Result<Value, ApiError> {
            self.record(property_id, &Value::Null)
        }
    }

    fn decode(response: &ToolsCallResponse) -> Value {
        serde_json::from_str(&response.content[0].text).unwrap()
    }

    #[test]
    fn test_definitions_cover_the_reporting_surface() {
        let registry = ToolRegistry::new(StubEngine::ok(json!({})));
        let listed = registry.list_response();

        let names: Vec<&str> = listed.tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["run_report", "run_realtime_report", "quick_insight", "get_metadata", "search_metadata"]
        );

        for tool in &listed.tools {
            let required = tool.input_schema["required"].as_array().unwrap();
            assert!(
                required.iter().any(|v| v == "propertyId"),
                "{} must require propertyId",
                tool.name
            );
            let annotations = tool.annotations.as_ref().unwrap();
            assert_eq!(annotations.read_only_hint, Some(true));
        }
    }

    #[tokio::test]
    async fn test_run_report_relays_payload_unchanged() {
        let payload = json!({
            "dimensionHeaders": [{"name": "date"}],
            "metricHeaders": [{"name": "activeUsers", "type": "TYPE_INTEGER"}],
            "rows": [{"dimensionValues": [{"value": "20260801"}], "metricValues": [{"value": "42"}]}],
            "rowCount": 1
        });
        let registry = ToolRegistry::new(StubEngine::ok(payload.clone()));

        let response = registry
            .call_tool(
                "run_report",
                json!({
                    "propertyId": "123456",
                    "startDate": "2026-08-01",
                    "endDate": "2026-08-21",
                    "metrics": ["activeUsers"],
                    "dimensions": ["date"]
                }),
            )
            .await
            .unwrap();

        assert!(!response.is_error);
        assert_eq!(decode(&response), payload);
        assert_eq!(registry.engine.call_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_property_id_short_circuits() {
        let registry = ToolRegistry::new(StubEngine::ok(json!({})));

        let response = registry
            .call_tool("run_report", json!({"startDate": "7daysAgo", "endDate": "today", "metrics": ["sessions"]}))
            .await
            .unwrap();

        assert!(response.is_error);
        let body = decode(&response);
        assert_eq!(body["error"]["category"], "validation");
        assert!(body["error"]["message"].as_str().unwrap().contains("propertyId"));
        assert_eq!(registry.engine.call_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_metrics_is_validation() {
        let registry = ToolRegistry::new(StubEngine::ok(json!({})));

        let response = registry
            .call_tool(
                "run_report",
                json!({"propertyId": "123456", "startDate": "7daysAgo", "endDate": "today"}),
            )
            .await
            .unwrap();

        assert!(response.is_error);
        let body = decode(&response);
        assert_eq!(body["error"]["category"], "validation");
        assert_eq!(body["error"]["propertyId"], "123456");
        assert_eq!(registry.engine.call_count(), 0);
    }

    #[tokio::test]
    async fn test_property_prefix_and_numeric_forms_normalized() {
        let registry = ToolRegistry::new(StubEngine::ok(json!({})));

        registry
            .call_tool("run_realtime_report", json!({"propertyId": "properties/987654"}))
            .await
            .unwrap();
        assert_eq!(registry.engine.last_property(), "987654");

        registry
            .call_tool("run_realtime_report", json!({"propertyId": 987654}))
            .await
            .unwrap();
        assert_eq!(registry.engine.last_property(), "987654");
    }

    #[tokio::test]
    async fn test_run_report_builds_full_body() {
        let registry = ToolRegistry::new(StubEngine::ok(json!({})));
        let filter = json!({"filter": {"fieldName": "country", "stringFilter": {"value": "Ireland"}}});

        registry
            .call_tool(
                "run_report",
                json!({
                    "propertyId": "123456",
                    "startDate": "2026-08-01",
                    "endDate": "2026-08-21",
                    "metrics": ["sessions"],
                    "dimensionFilter": filter,
                    "orderBy": {"metric": "sessions", "desc": false},
                    "limit": 5
                }),
            )
            .await
            .unwrap();

        let body = registry.engine.last_body();
        assert_eq!(body["dimensionFilter"], filter);
        assert_eq!(body["orderBys"][0]["metric"]["metricName"], "sessions");
        assert_eq!(body["orderBys"][0]["desc"], json!(false));
        assert_eq!(body["limit"], json!(5));
        assert!(body.get("dimensions").is_none());
    }

    #[tokio::test]
    async fn test_empty_filter_objects_are_dropped() {
        let registry = ToolRegistry::new(StubEngine::ok(json!({})));

        registry
            .call_tool(
                "run_report",
                json!({
                    "propertyId": "123456",
                    "startDate": "7daysAgo",
                    "endDate": "today",
                    "metrics": ["sessions"],
                    "dimensionFilter": {},
                    "metricFilter": null
                }),
            )
            .await
            .unwrap();

        let body = registry.engine.last_body();
        assert!(body.get("dimensionFilter").is_none());
        assert!(body.get("metricFilter").is_none());
    }

    #[tokio::test]
    async fn test_realtime_defaults() {
        let registry = ToolRegistry::new(StubEngine::ok(json!({})));

        registry
            .call_tool("run_realtime_report", json!({"propertyId": "123456"}))
            .await
            .unwrap();

        let body = registry.engine.last_body();
        assert_eq!(body["metrics"], json!([{"name": "activeUsers"}]));
        assert_eq!(body["limit"], json!(50));
        assert!(body.get("dateRanges").is_none());
    }

    #[tokio::test]
    async fn test_quick_insight_applies_template() {
        let registry = ToolRegistry::new(StubEngine::ok(json!({})));

        registry
            .call_tool(
                "quick_insight",
                json!({
                    "propertyId": "123456",
                    "reportType": "geographic",
                    "startDate": "30daysAgo",
                    "endDate": "yesterday"
                }),
            )
            .await
            .unwrap();

        let body = registry.engine.last_body();
        assert_eq!(body["dimensionFilter"]["filter"]["fieldName"], "country");
        assert_eq!(body["dimensionFilter"]["filter"]["stringFilter"]["value"], "United States");
        assert_eq!(body["limit"], json!(20));
        assert_eq!(body["dateRanges"][0]["startDate"], "30daysAgo");
    }

    #[tokio::test]
    async fn test_quick_insight_unknown_type_is_validation() {
        let registry = ToolRegistry::new(StubEngine::ok(json!({})));

        let response = registry
            .call_tool(
                "quick_insight",
                json!({
                    "propertyId": "123456",
                    "reportType": "revenue",
                    "startDate": "7daysAgo",
                    "endDate": "today"
                }),
            )
            .await
            .unwrap();

        assert!(response.is_error);
        let body = decode(&response);
        assert_eq!(body["error"]["category"], "validation");
        assert!(body["error"]["message"].as_str().unwrap().contains("overview"));
        assert_eq!(registry.engine.call_count(), 0);
    }

    #[tokio::test]
    async fn test_permission_failure_classified_in_envelope() {
        let registry = ToolRegistry::new(StubEngine::fail(403, "The caller does not have permission"));

        let response = registry
            .call_tool(
                "run_report",
                json!({
                    "propertyId": "123456",
                    "startDate": "7daysAgo",
                    "endDate": "today",
                    "metrics": ["sessions"]
                }),
            )
            .await
            .unwrap();

        assert!(response.is_error);
        let body = decode(&response);
        assert_eq!(body["error"]["category"], "permission");
        assert_eq!(body["error"]["propertyId"], "123456");
        assert!(!body["error"]["remediation"].as_array().unwrap().is_empty());
        assert!(body["error"]["detail"].as_str().unwrap().contains("does not have permission"));
    }

    #[tokio::test]
    async fn test_auth_failure_classified_in_envelope() {
        let registry = ToolRegistry::new(StubEngine::fail(401, "Request had invalid authentication credentials"));

        let response = registry
            .call_tool("run_realtime_report", json!({"propertyId": "123456"}))
            .await
            .unwrap();

        assert!(response.is_error);
        assert_eq!(decode(&response)["error"]["category"], "authentication");
    }

    #[tokio::test]
    async fn test_get_metadata_projects_catalog() {
        let catalog = json!({
            "dimensions": [{
                "apiName": "city",
                "uiName": "City",
                "description": "User city.",
                "category": "Geography",
                "customDefinition": false,
                "deprecatedApiNames": []
            }],
            "metrics": [{
                "apiName": "activeUsers",
                "uiName": "Active users",
                "description": "Distinct users.",
                "category": "User",
                "type": "TYPE_INTEGER"
            }]
        });
        let registry = ToolRegistry::new(StubEngine::ok(catalog));

        let response = registry
            .call_tool("get_metadata", json!({"propertyId": "123456"}))
            .await
            .unwrap();

        let body = decode(&response);
        assert_eq!(body["dimensions"][0]["displayName"], "City");
        assert!(body["dimensions"][0].get("uiName").is_none());
        assert_eq!(body["metrics"][0]["type"], "TYPE_INTEGER");
    }

    #[tokio::test]
    async fn test_get_metadata_rejects_unknown_kind() {
        let registry = ToolRegistry::new(StubEngine::ok(json!({})));

        let response = registry
            .call_tool("get_metadata", json!({"propertyId": "123456", "type": "events"}))
            .await
            .unwrap();

        assert!(response.is_error);
        assert_eq!(decode(&response)["error"]["category"], "validation");
        assert_eq!(registry.engine.call_count(), 0);
    }

    #[tokio::test]
    async fn test_search_metadata_filters_catalog() {
        let catalog = json!({
            "dimensions": [
                {"apiName": "city", "uiName": "City", "description": "User city.", "category": "Geography"},
                {"apiName": "browser", "uiName": "Browser", "description": "Browser name.", "category": "Platform / Device"}
            ],
            "metrics": []
        });
        let registry = ToolRegistry::new(StubEngine::ok(catalog));

        let response = registry
            .call_tool(
                "search_metadata",
                json!({"propertyId": "123456", "query": "CITY", "type": "dimensions"}),
            )
            .await
            .unwrap();

        let body = decode(&response);
        let dims = body["dimensions"].as_array().unwrap();
        assert_eq!(dims.len(), 1);
        assert_eq!(dims[0]["apiName"], "city");
        assert!(body.get("metrics").is_none());
    }

    #[tokio::test]
    async fn test_search_metadata_requires_query() {
        let registry = ToolRegistry::new(StubEngine::ok(json!({})));

        let response = registry
            .call_tool("search_metadata", json!({"propertyId": "123456"}))
            .await
            .unwrap();

        assert!(response.is_error);
        assert_eq!(decode(&response)["error"]["category"], "validation");
        assert_eq!(registry.engine.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_protocol_error() {
        let registry = ToolRegistry::new(StubEngine::ok(json!({})));

        let err = registry.call_tool("drop_tables", json!({})).await.unwrap_err();
        let ToolCallError::UnknownTool(name) = err;
        assert_eq!(name, "drop_tables");
    }
}
