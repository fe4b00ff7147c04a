//! Structured error bodies returned by the telemetry API.

use std::fmt::{Display, Formatter};

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

const EMPTY_CODE: &str = "<empty>";
const MAX_DUMP_LEN: usize = 200;

/// One entry of an upstream error list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub details: Option<Map<String, Value>>,
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "code={}", self.code)?;
        if !self.message.is_empty() {
            write!(f, ", message={:?}", self.message)?;
        }
        if let Some(details) = self.details.as_ref().filter(|d| !d.is_empty()) {
            write!(f, ", details={}", Value::Object(details.clone()))?;
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {}

/// Non-empty list of upstream errors.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiError {
    errors: Vec<ApiError>,
}

impl MultiError {
    pub fn errors(&self) -> &[ApiError] {
        &self.errors
    }

    /// The error shown to users; the rest are only logged.
    pub fn first(&self) -> &ApiError {
        &self.errors[0]
    }
}

impl Display for MultiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let [single] = self.errors.as_slice() {
            return write!(f, "{}", single);
        }
        write!(f, "{} errors: [", self.errors.len())?;
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", error)?;
        }
        f.write_str("]")
    }
}

impl std::error::Error for MultiError {}

#[derive(Debug, Error)]
pub enum ErrorBodyError {
    #[error("empty data")]
    EmptyData,
    #[error("parse data: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("empty error list")]
    EmptyErrorList,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<ApiError>,
}

/// Parses `{"errors": [...]}`. Entries without a code get `<empty>`.
pub fn parse_multi_error(body: &[u8]) -> Result<MultiError, ErrorBodyError> {
    if body.is_empty() {
        return Err(ErrorBodyError::EmptyData);
    }

    let mut parsed: ErrorBody = serde_json::from_slice(body)?;
    if parsed.errors.is_empty() {
        return Err(ErrorBodyError::EmptyErrorList);
    }

    for error in &mut parsed.errors {
        if error.code.is_empty() {
            error.code = EMPTY_CODE.to_string();
        }
    }

    Ok(MultiError {
        errors: parsed.errors,
    })
}

/// Printable prefix of an unexpected response body, `None` when empty.
pub fn dump_body(body: &[u8]) -> Option<String> {
    if body.is_empty() {
        return None;
    }
    if body.len() < MAX_DUMP_LEN {
        return Some(String::from_utf8_lossy(body).into_owned());
    }
    Some(format!(
        "{}[...] (full len = {})",
        String::from_utf8_lossy(&body[..MAX_DUMP_LEN]),
        body.len()
    ))
}
