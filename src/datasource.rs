//! Batch query handler.
//!
//! Every sub-query of a request is prepared, fetched, decoded and assembled
//! on its own; one failing sub-query never affects its siblings. Label
//! cleanup runs once all of them are done because it looks at the whole
//! batch.

use std::time::Duration;

use chrono::TimeDelta;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use telemetry_core::alerts::expand_alerts;
use telemetry_core::error::AssembleError;
use telemetry_core::frame::assemble;
use telemetry_core::labels::make_labels_unique;
use telemetry_core::query::{prepare, TimeRange};
use telemetry_core::{Frame, PrepareError};
use thiserror::Error;
use tracing::warn;

use crate::client::{
    ClientError, FetchError, HttpTelemetryClient, TelemetryFetcher, TimeseriesRequest,
};
use crate::config::Settings;

pub const TELEMETRY_QUERY_TYPE: &str = "telemetry";
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

pub const SOMETHING_WENT_WRONG: &str = "Something went wrong. Try again later or contact support.";
pub const DATA_TYPE_NOT_SUPPORTED: &str = "The requested metric data type is currently not supported.";
pub const INVALID_YAML: &str = "The query is not a valid YAML.";
pub const INVALID_OFFSET: &str = "The query contains an invalid @offset value.";

/// Editor state of one panel query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct QueryProperties {
    pub hide: bool,
    pub text: String,
}

/// One sub-query of a batch.
#[derive(Debug, Clone)]
pub struct DataQuery {
    pub ref_id: String,
    /// Empty selects the telemetry query type.
    pub query_type: String,
    /// Serialized [`QueryProperties`].
    pub json: serde_json::Value,
    /// Dashboard sampling interval, drives the default granularity.
    pub interval: Duration,
    pub time_range: TimeRange,
}

#[derive(Debug, Clone, Default)]
pub struct QueryDataRequest {
    /// Acting user, forwarded upstream when known.
    pub user: Option<String>,
    pub queries: Vec<DataQuery>,
}

/// Outcome of one sub-query. Both fields empty means "no data".
#[derive(Debug, Clone, Default)]
pub struct DataResponse {
    pub frame: Option<Frame>,
    pub error: Option<UserFacingError>,
}

/// Responses keyed by ref id, in request order.
#[derive(Debug, Clone, Default)]
pub struct QueryDataResponse {
    pub responses: Vec<(String, DataResponse)>,
}

impl QueryDataResponse {
    pub fn get(&self, ref_id: &str) -> Option<&DataResponse> {
        self.responses
            .iter()
            .find(|(id, _)| id == ref_id)
            .map(|(_, response)| response)
    }
}

/// Message safe to show to the query author.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct UserFacingError {
    message: String,
}

impl UserFacingError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("unexpected query type: {0:?}")]
    UnexpectedQueryType(String),
    #[error("parse query properties: {0}")]
    Properties(#[source] serde_json::Error),
    #[error("prepare query text: {0}")]
    Prepare(#[from] PrepareError),
    #[error("query timeseries: {0}")]
    Fetch(#[from] FetchError),
    #[error("shift timeseries by {0}: timestamp out of range")]
    Shift(TimeDelta),
    #[error("convert timeseries to data frame: {0}")]
    Assemble(#[from] AssembleError),
}

impl QueryError {
    /// Maps internal failures to the text shown in the panel.
    pub fn user_facing(&self) -> UserFacingError {
        match self {
            QueryError::Assemble(AssembleError::UnsupportedDataType(_)) => {
                UserFacingError::new(DATA_TYPE_NOT_SUPPORTED)
            }
            QueryError::Prepare(PrepareError::InvalidDocument(_)) => {
                UserFacingError::new(INVALID_YAML)
            }
            QueryError::Prepare(PrepareError::InvalidOffset(_)) => {
                UserFacingError::new(INVALID_OFFSET)
            }
            QueryError::Fetch(FetchError::Api(errors)) => {
                if errors.errors().len() > 1 {
                    warn!(
                        count = errors.errors().len(),
                        "upstream returned multiple errors, only the first is shown"
                    );
                }
                let message = &errors.first().message;
                if message.is_empty() {
                    UserFacingError::new(SOMETHING_WENT_WRONG)
                } else {
                    UserFacingError::new(message.clone())
                }
            }
            _ => UserFacingError::new(SOMETHING_WENT_WRONG),
        }
    }
}

pub struct DataSource {
    fetcher: Box<dyn TelemetryFetcher>,
    max_concurrency: usize,
}

impl DataSource {
    pub fn new(fetcher: Box<dyn TelemetryFetcher>) -> Self {
        Self {
            fetcher,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Data source backed by the HTTP client for the configured API version.
    pub fn from_settings(settings: &Settings) -> Result<Self, ClientError> {
        let client = HttpTelemetryClient::new(&settings.api)?;
        Ok(Self::new(Box::new(client)).with_max_concurrency(settings.query.max_concurrency))
    }

    /// Runs every sub-query and returns one response per ref id.
    pub async fn query_data(&self, request: QueryDataRequest) -> QueryDataResponse {
        let user = request.user.as_deref();

        let results: Vec<DataResponse> = stream::iter(&request.queries)
            .map(|query| self.handle_query(user, query))
            .buffered(self.max_concurrency)
            .collect()
            .await;

        let mut responses: Vec<(String, DataResponse)> = request
            .queries
            .iter()
            .map(|query| query.ref_id.clone())
            .zip(results)
            .collect();

        make_labels_unique(
            responses
                .iter_mut()
                .filter_map(|(_, response)| response.frame.as_mut()),
        );

        QueryDataResponse { responses }
    }

    async fn handle_query(&self, user: Option<&str>, query: &DataQuery) -> DataResponse {
        match self.run_query(user, query).await {
            Ok(frame) => DataResponse { frame, error: None },
            Err(err) => {
                warn!(ref_id = %query.ref_id, error = %err, "failed to handle query");
                DataResponse {
                    frame: None,
                    error: Some(err.user_facing()),
                }
            }
        }
    }

    async fn run_query(
        &self,
        user: Option<&str>,
        query: &DataQuery,
    ) -> Result<Option<Frame>, QueryError> {
        if !query.query_type.is_empty() && query.query_type != TELEMETRY_QUERY_TYPE {
            return Err(QueryError::UnexpectedQueryType(query.query_type.clone()));
        }

        let props: QueryProperties =
            serde_json::from_value(query.json.clone()).map_err(QueryError::Properties)?;
        if props.hide || props.text.is_empty() {
            return Ok(None);
        }

        let prepared = prepare(&props.text, query.interval, query.time_range)?;

        let request = TimeseriesRequest {
            user: user.map(str::to_string),
            query: prepared.text,
        };
        let series = match self.fetcher.query_timeseries(request).await {
            Ok(series) => series,
            Err(FetchError::Empty) => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let series = if prepared.offset.is_zero() {
            series
        } else {
            series
                .shift_time(prepared.offset)
                .ok_or(QueryError::Shift(prepared.offset))?
        };

        let series = expand_alerts(&series);
        Ok(Some(assemble(&series)?))
    }
}
