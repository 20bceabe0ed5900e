//! Report Presets
//!
//! The named templates behind the quick-insight tool. The set is closed:
//! each name maps to fixed dimension and metric lists, and a few carry a
//! built-in ordering or country filter. Lookup is a pure function of the
//! name.

use serde_json::{json, Value};

use super::reports::{DateRange, OrderBy, ReportSpec};

/// The nine quick-insight report types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportType {
    Overview,
    TopPages,
    TrafficSources,
    Geographic,
    Demographics,
    Conversions,
    Engagement,
    Ecommerce,
    Devices,
}

impl ReportType {
    pub const ALL: [ReportType; 9] = [
        ReportType::Overview,
        ReportType::TopPages,
        ReportType::TrafficSources,
        ReportType::Geographic,
        ReportType::Demographics,
        ReportType::Conversions,
        ReportType::Engagement,
        ReportType::Ecommerce,
        ReportType::Devices,
    ];

    /// Parse a tool argument; names are the snake_case strings advertised
    /// in the quick-insight schema.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "overview" => Some(Self::Overview),
            "top_pages" => Some(Self::TopPages),
            "traffic_sources" => Some(Self::TrafficSources),
            "geographic" => Some(Self::Geographic),
            "demographics" => Some(Self::Demographics),
            "conversions" => Some(Self::Conversions),
            "engagement" => Some(Self::Engagement),
            "ecommerce" => Some(Self::Ecommerce),
            "devices" => Some(Self::Devices),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Overview => "overview",
            Self::TopPages => "top_pages",
            Self::TrafficSources => "traffic_sources",
            Self::Geographic => "geographic",
            Self::Demographics => "demographics",
            Self::Conversions => "conversions",
            Self::Engagement => "engagement",
            Self::Ecommerce => "ecommerce",
            Self::Devices => "devices",
        }
    }

    /// The template for this report type.
    pub fn preset(self) -> Preset {
        match self {
            Self::Overview => Preset {
                dimensions: &["date"],
                metrics: &["activeUsers", "sessions", "screenPageViews", "bounceRate"],
                dimension_filter: None,
                order_metric: None,
            },
            Self::TopPages => Preset {
                dimensions: &["pagePath", "pageTitle"],
                metrics: &["screenPageViews", "activeUsers", "averageSessionDuration"],
                dimension_filter: None,
                order_metric: Some("screenPageViews"),
            },
            Self::TrafficSources => Preset {
                dimensions: &["sessionSource", "sessionMedium"],
                metrics: &["sessions", "activeUsers", "newUsers"],
                dimension_filter: None,
                order_metric: Some("sessions"),
            },
            // State-level geography; narrowed to United States traffic.
            Self::Geographic => Preset {
                dimensions: &["region", "city"],
                metrics: &["activeUsers", "sessions"],
                dimension_filter: Some(united_states_filter()),
                order_metric: None,
            },
            Self::Demographics => Preset {
                dimensions: &["userAgeBracket", "userGender"],
                metrics: &["activeUsers", "sessions"],
                dimension_filter: None,
                order_metric: None,
            },
            Self::Conversions => Preset {
                dimensions: &["eventName"],
                metrics: &["conversions", "eventCount", "totalRevenue"],
                dimension_filter: None,
                order_metric: None,
            },
            Self::Engagement => Preset {
                dimensions: &["date"],
                metrics: &[
                    "engagementRate",
                    "engagedSessions",
                    "averageSessionDuration",
                    "screenPageViewsPerSession",
                ],
                dimension_filter: None,
                order_metric: None,
            },
            Self::Ecommerce => Preset {
                dimensions: &["date"],
                metrics: &[
                    "totalRevenue",
                    "transactions",
                    "averagePurchaseRevenue",
                    "ecommercePurchases",
                ],
                dimension_filter: None,
                order_metric: None,
            },
            Self::Devices => Preset {
                dimensions: &["deviceCategory", "operatingSystem", "browser"],
                metrics: &["activeUsers", "sessions"],
                dimension_filter: None,
                order_metric: None,
            },
        }
    }
}

/// Fixed dimension/metric lists plus the optional extras a template bakes
/// in. Preset orderings are always descending.
#[derive(Debug, Clone)]
pub struct Preset {
    pub dimensions: &'static [&'static str],
    pub metrics: &'static [&'static str],
    pub dimension_filter: Option<Value>,
    pub order_metric: Option<&'static str>,
}

impl Preset {
    /// Concretize with the caller's date window and row limit.
    pub fn into_spec(self, date_range: DateRange, limit: u64) -> ReportSpec {
        ReportSpec {
            date_range,
            dimensions: self.dimensions.iter().map(|s| s.to_string()).collect(),
            metrics: self.metrics.iter().map(|s| s.to_string()).collect(),
            dimension_filter: self.dimension_filter,
            metric_filter: None,
            order_by: self.order_metric.map(|metric| OrderBy {
                metric: Some(metric.to_string()),
                dimension: None,
                desc: Some(true),
            }),
            limit,
        }
    }
}

fn united_states_filter() -> Value {
    json!({
        "filter": {
            "fieldName": "country",
            "stringFilter": {"matchType": "EXACT", "value": "United States"}
        }
    })
}
