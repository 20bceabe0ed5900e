//! GA4 Core
//!
//! Credential brokering, Data API access, and report construction for the
//! Google Analytics MCP server. The binary crate wires these pieces to a
//! stdio transport; everything here is transport-agnostic.

pub mod analytics;
pub mod auth;
pub mod config;
pub mod diagnostics;

mod http;

pub use analytics::client::{AnalyticsData, ApiError, DataApiClient};
pub use analytics::metadata::MetadataKind;
pub use analytics::presets::ReportType;
pub use analytics::reports::{DateRange, OrderBy, RealtimeSpec, ReportSpec};
pub use auth::{AuthError, TokenBroker};
pub use config::{AuthMode, ConfigError, GaConfig};
pub use diagnostics::{classify, Category, Diagnostic};
