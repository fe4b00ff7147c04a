//! Telemetry data source: query batches against the telemetry time-series API.
//!
//! A [`DataSource`] takes a batch of YAML query documents, fetches each one
//! through a [`TelemetryFetcher`] and returns one Arrow-backed frame (or a
//! user-facing error) per query. The pure pipeline lives in
//! [`telemetry_core`]; this crate adds configuration, the HTTP transport and
//! the batch handling around it.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use chrono::{TimeDelta, Utc};
//! use telemetry_core::TimeRange;
//! use telemetry_datasource::{ConfigArgs, DataQuery, DataSource, QueryDataRequest, Settings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::new(&ConfigArgs::default())?;
//!     let data_source = DataSource::from_settings(&settings)?;
//!
//!     let to = Utc::now();
//!     let request = QueryDataRequest {
//!         user: None,
//!         queries: vec![DataQuery {
//!             ref_id: "A".to_string(),
//!             query_type: "telemetry".to_string(),
//!             json: serde_json::json!({ "text": "telemetry: voltage\ndevice: abc\n" }),
//!             interval: Duration::from_secs(60),
//!             time_range: TimeRange::new(to - TimeDelta::hours(6), to),
//!         }],
//!     };
//!
//!     let response = data_source.query_data(request).await;
//!     if let Some(frame) = response.get("A").and_then(|r| r.frame.as_ref()) {
//!         println!("{} rows", frame.num_rows());
//!     }
//!     Ok(())
//! }
//! ```

pub mod api_error;
pub mod client;
pub mod config;
pub mod datasource;

#[cfg(test)]
mod tests;

pub use crate::api_error::{ApiError, MultiError};
pub use crate::client::{ApiVersion, FetchError, HttpTelemetryClient, TelemetryFetcher, TimeseriesRequest};
pub use crate::config::{ConfigArgs, Settings};
pub use crate::datasource::{
    DataQuery, DataResponse, DataSource, QueryDataRequest, QueryDataResponse, QueryError,
    UserFacingError,
};
