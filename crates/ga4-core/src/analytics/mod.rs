//! GA4 Data API
//!
//! Request construction, the HTTP client, and response shaping for the
//! reporting surface.

pub mod client;
pub mod metadata;
pub mod presets;
pub mod reports;
