//! HTTP client for the telemetry time-series API.

use std::time::Duration;

use async_trait::async_trait;
use clap::ValueEnum;
use futures::{Stream, TryStreamExt};
use reqwest::header::{HeaderMap, ACCEPT, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::Deserialize;
use telemetry_core::decoder::{decode, parse_data_types};
use telemetry_core::{DecodeError, TimeSeries};
use thiserror::Error;
use tracing::{debug, warn};

use crate::api_error::{dump_body, parse_multi_error, ErrorBodyError, MultiError};
use crate::config::ApiConfig;

const CSV_CONTENT_TYPE: &str = "text/csv";
const USER_HEADER: &str = "x-enapter-auth-user";
const TOKEN_HEADER: &str = "x-enapter-auth-token";
const DATA_TYPES_HEADER: &str = "x-enapter-timeseries-data-types";

/// Upstream API revision; each one serves time series at its own path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ApiVersion {
    V1,
    V3,
}

impl ApiVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiVersion::V1 => "v1",
            ApiVersion::V3 => "v3",
        }
    }

    fn timeseries_path(&self) -> &'static str {
        match self {
            ApiVersion::V1 => "/telemetry/v1/timeseries",
            ApiVersion::V3 => "/v3/telemetry/query_timeseries",
        }
    }
}

/// One wire query on behalf of a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeseriesRequest {
    /// Sent as the acting user when known.
    pub user: Option<String>,
    pub query: String,
}

#[derive(Debug, Error)]
pub enum FetchError {
    /// Valid response without data.
    #[error("no values")]
    Empty,
    #[error(transparent)]
    Api(MultiError),
    #[error("multi-error: <not available>: {0}")]
    ErrorBody(#[source] ErrorBodyError),
    #[error("unexpected status: {status}: body dump: {body_dump}")]
    UnexpectedStatus { status: StatusCode, body_dump: String },
    #[error("parse content length: {0:?}")]
    ContentLength(String),
    #[error("unexpected content type: want text/csv, have {0}")]
    UnexpectedContentType(String),
    #[error("empty header field: {0}")]
    EmptyHeaderField(&'static str),
    #[error("parse CSV: {0}")]
    Decode(#[source] DecodeError),
    #[error("do HTTP request: {0}")]
    Http(#[from] reqwest::Error),
    #[error("read body: {0}")]
    ReadBody(#[source] reqwest::Error),
    #[error("response body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },
}

impl From<DecodeError> for FetchError {
    fn from(err: DecodeError) -> Self {
        if err.is_no_values() {
            FetchError::Empty
        } else {
            FetchError::Decode(err)
        }
    }
}

/// Source of decoded time series for the batch handler.
#[async_trait]
pub trait TelemetryFetcher: Send + Sync {
    async fn query_timeseries(&self, request: TimeseriesRequest) -> Result<TimeSeries, FetchError>;
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("telemetry API URL empty or missing")]
    EmptyUrl,
    #[error("telemetry API timeout must be positive")]
    ZeroTimeout,
    #[error("build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

pub struct HttpTelemetryClient {
    client: reqwest::Client,
    endpoint: String,
    token: String,
    max_body_bytes: usize,
}

impl HttpTelemetryClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ClientError> {
        if config.url.is_empty() {
            return Err(ClientError::EmptyUrl);
        }
        if config.timeout_secs == 0 {
            return Err(ClientError::ZeroTimeout);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}{}",
                config.url.trim_end_matches('/'),
                config.version.timeseries_path()
            ),
            token: config.token.clone(),
            max_body_bytes: config.max_body_bytes,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TelemetryFetcher for HttpTelemetryClient {
    async fn query_timeseries(&self, request: TimeseriesRequest) -> Result<TimeSeries, FetchError> {
        debug!(
            endpoint = %self.endpoint,
            query_len = request.query.len(),
            "requesting timeseries"
        );

        let mut builder = self
            .client
            .post(&self.endpoint)
            .header(ACCEPT, CSV_CONTENT_TYPE)
            .header(TOKEN_HEADER, &self.token);
        if let Some(user) = request.user.as_deref().filter(|u| !u.is_empty()) {
            builder = builder.header(USER_HEADER, user);
        }

        let response = builder.body(request.query).send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = read_body(response.bytes_stream(), self.max_body_bytes)
            .await
            .map_err(|err| {
                warn!(endpoint = %self.endpoint, error = %err, "failed to read response body");
                err
            })?;

        process_response(status, &headers, &body)
    }
}

/// Collects a response body chunk by chunk, giving up once it grows past
/// `limit` bytes.
async fn read_body<S, B>(stream: S, limit: usize) -> Result<Vec<u8>, FetchError>
where
    S: Stream<Item = reqwest::Result<B>>,
    B: AsRef<[u8]>,
{
    futures::pin_mut!(stream);

    let mut body = Vec::new();
    while let Some(chunk) = stream.try_next().await.map_err(FetchError::ReadBody)? {
        let chunk = chunk.as_ref();
        if body.len() + chunk.len() > limit {
            return Err(FetchError::BodyTooLarge { limit });
        }
        body.extend_from_slice(chunk);
    }
    Ok(body)
}

/// Interprets a complete upstream response.
pub fn process_response(
    status: StatusCode,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<TimeSeries, FetchError> {
    match status {
        StatusCode::OK => {}
        StatusCode::BAD_REQUEST
        | StatusCode::FORBIDDEN
        | StatusCode::NOT_FOUND
        | StatusCode::UNPROCESSABLE_ENTITY
        | StatusCode::TOO_MANY_REQUESTS
        | StatusCode::INTERNAL_SERVER_ERROR => {
            return Err(match parse_multi_error(body) {
                Ok(errors) => FetchError::Api(errors),
                Err(err) => FetchError::ErrorBody(err),
            });
        }
        _ => {
            let body_dump = dump_body(body)
                .unwrap_or_else(|| format!("<not available>: {}", ErrorBodyError::EmptyData));
            return Err(FetchError::UnexpectedStatus { status, body_dump });
        }
    }

    if let Some(value) = headers.get(CONTENT_LENGTH) {
        let text = String::from_utf8_lossy(value.as_bytes());
        let length: u64 = text
            .trim()
            .parse()
            .map_err(|_| FetchError::ContentLength(text.to_string()))?;
        if length == 0 {
            return Err(FetchError::Empty);
        }
    }

    let content_type = headers
        .get(CONTENT_TYPE)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        .unwrap_or_default();
    let media_type = content_type.split(';').next().unwrap_or_default().trim();
    if !media_type.eq_ignore_ascii_case(CSV_CONTENT_TYPE) {
        return Err(FetchError::UnexpectedContentType(content_type));
    }

    let names: Vec<String> = headers
        .get_all(DATA_TYPES_HEADER)
        .iter()
        .flat_map(|value| {
            String::from_utf8_lossy(value.as_bytes())
                .split(',')
                .map(|name| name.trim().to_string())
                .collect::<Vec<_>>()
        })
        .collect();
    if names.first().map_or(true, String::is_empty) {
        return Err(FetchError::EmptyHeaderField(DATA_TYPES_HEADER));
    }

    let data_types = parse_data_types(&names)?;
    Ok(decode(body, &data_types)?)
}
