//! HTTP Client Construction
//!
//! Shared reqwest client configuration for the token endpoint and the Data
//! API. One client per owner, reused across requests.

use std::time::Duration;

/// Build a client with the standard timeouts: 30s per request, 10s to
/// connect.
pub(crate) fn build_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .build()
}
