//! Report Requests
//!
//! Uniform tool parameters shaped into Data API request bodies. Filter
//! expressions are relayed opaquely; everything else is named fields.

use serde_json::{json, Value};

/// Default row limit for core reports.
pub const DEFAULT_REPORT_LIMIT: u64 = 100;
/// Default row limit for realtime snapshots.
pub const DEFAULT_REALTIME_LIMIT: u64 = 50;
/// Default row limit for preset insights.
pub const DEFAULT_INSIGHT_LIMIT: u64 = 20;
/// Metric used when a realtime request names none.
pub const DEFAULT_REALTIME_METRIC: &str = "activeUsers";

/// Inclusive date window. Values are `YYYY-MM-DD` or the API's relative
/// forms (`7daysAgo`, `today`, `yesterday`); they are relayed unvalidated
/// and the API rejects bad ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRange {
    pub start_date: String,
    pub end_date: String,
}

/// Single ordering directive. When both fields are set the metric wins;
/// direction defaults to descending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderBy {
    pub metric: Option<String>,
    pub dimension: Option<String>,
    pub desc: Option<bool>,
}

impl OrderBy {
    /// Render the API's `orderBys` entry, or `None` when neither field
    /// names anything.
    pub fn directive(&self) -> Option<Value> {
        let desc = self.desc.unwrap_or(true);
        if let Some(metric) = &self.metric {
            return Some(json!({"metric": {"metricName": metric}, "desc": desc}));
        }
        if let Some(dimension) = &self.dimension {
            return Some(json!({"dimension": {"dimensionName": dimension}, "desc": desc}));
        }
        None
    }
}

/// Everything a `runReport` body needs.
#[derive(Debug, Clone)]
pub struct ReportSpec {
    pub date_range: DateRange,
    pub dimensions: Vec<String>,
    pub metrics: Vec<String>,
    pub dimension_filter: Option<Value>,
    pub metric_filter: Option<Value>,
    pub order_by: Option<OrderBy>,
    pub limit: u64,
}

impl ReportSpec {
    /// Render the `runReport` request body.
    pub fn body(&self) -> Value {
        let mut body = json!({
            "dateRanges": [{
                "startDate": self.date_range.start_date,
                "endDate": self.date_range.end_date,
            }],
            "metrics": name_objects(&self.metrics),
            "limit": self.limit,
        });
        if !self.dimensions.is_empty() {
            body["dimensions"] = name_objects(&self.dimensions);
        }
        if let Some(filter) = &self.dimension_filter {
            body["dimensionFilter"] = filter.clone();
        }
        if let Some(filter) = &self.metric_filter {
            body["metricFilter"] = filter.clone();
        }
        if let Some(order) = self.order_by.as_ref().and_then(OrderBy::directive) {
            body["orderBys"] = json!([order]);
        }
        body
    }
}

/// Realtime snapshot request. No date ranges: the window is the API's own
/// last-30-minutes.
#[derive(Debug, Clone)]
pub struct RealtimeSpec {
    pub dimensions: Vec<String>,
    pub metrics: Vec<String>,
    pub limit: u64,
}

impl RealtimeSpec {
    /// Render the `runRealtimeReport` request body.
    pub fn body(&self) -> Value {
        let mut body = json!({
            "metrics": name_objects(&self.metrics),
            "limit": self.limit,
        });
        if !self.dimensions.is_empty() {
            body["dimensions"] = name_objects(&self.dimensions);
        }
        body
    }
}

/// The API takes names as `[{"name": "..."}]`, not bare strings.
fn name_objects(names: &[String]) -> Value {
    Value::Array(names.iter().map(|n| json!({"name": n})).collect())
}
