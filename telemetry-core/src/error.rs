//! Error types for every stage of the telemetry pipeline.
//!
//! Each stage owns one enum. Outer errors wrap inner ones with `#[source]`,
//! so the rendered message reads like a path through the pipeline:
//!
//! ```text
//! record 2: field 0: invalid float literal
//! ```

use std::fmt::{Display, Formatter};
use std::num::{ParseFloatError, ParseIntError};

use thiserror::Error;

use crate::field::DataType;

/// A column type name that is not part of the wire vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unexpected timeseries data type: {0}")]
pub struct UnknownDataType(pub String);

/// A tag string that is not a space separated list of `key=value` pairs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("bad key-value pair {pair:?}: len: want 2, have {parts}")]
pub struct TagsError {
    pub pair: String,
    pub parts: usize,
}

/// A non-empty cell that does not parse as its column type.
#[derive(Debug, Error)]
pub enum FieldParseError {
    #[error(transparent)]
    Float(#[from] ParseFloatError),
    #[error(transparent)]
    Integer(#[from] ParseIntError),
    #[error("invalid boolean literal {0:?}")]
    Boolean(String),
    #[error("invalid string array: {0}")]
    StringArray(#[source] serde_json::Error),
}

/// Location of a record inside the tabular body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Header,
    /// Zero-based record index; the header is record 0.
    Record(usize),
}

impl Display for Position {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Position::Header => write!(f, "header"),
            Position::Record(index) => write!(f, "record {}", index),
        }
    }
}

/// Failures while turning a tabular response into a [`crate::TimeSeries`].
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("data type {index}: {source}")]
    UnknownDataType {
        index: usize,
        #[source]
        source: UnknownDataType,
    },
    #[error("{position}: unexpected number of fields: want {want}, have {have}")]
    UnexpectedShape {
        position: Position,
        want: usize,
        have: usize,
    },
    #[error("header: unexpected field name: want {want}, have {have}")]
    UnexpectedFieldName { want: &'static str, have: String },
    #[error("header: tags of field {column}: {source}")]
    MalformedTags {
        column: usize,
        #[source]
        source: TagsError,
    },
    #[error("record {row}: timestamp: {source}")]
    Timestamp {
        row: usize,
        #[source]
        source: ParseIntError,
    },
    #[error("record {row}: timestamp {value} out of range")]
    TimestampOutOfRange { row: usize, value: i64 },
    #[error("record {row}: field {column}: {source}")]
    FieldParse {
        row: usize,
        column: usize,
        #[source]
        source: FieldParseError,
    },
    #[error("read record {row}: {source}")]
    Csv {
        row: usize,
        #[source]
        source: csv::Error,
    },
    /// Well-formed response without a single data row.
    #[error("no values")]
    NoValues,
}

impl DecodeError {
    /// True for the "valid response, nothing to show" condition.
    pub fn is_no_values(&self) -> bool {
        matches!(self, DecodeError::NoValues)
    }
}

/// Problems with the structured-text query document itself.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("decode YAML: {0}")]
    Syntax(#[from] serde_yaml::Error),
    #[error("want a mapping at the top level, have {0}")]
    NotAMapping(&'static str),
}

/// Problems with the `@offset` directive.
#[derive(Debug, Error)]
pub enum OffsetError {
    #[error("unexpected type: want string, have {0}")]
    UnexpectedType(&'static str),
    #[error("{0}")]
    Parse(#[from] humantime::DurationError),
    #[error("duration {0:?} is out of range")]
    OutOfRange(String),
}

/// Failures of the query preparer. All of them concern one sub-query only.
#[derive(Debug, Error)]
pub enum PrepareError {
    #[error("invalid document: {0}")]
    InvalidDocument(#[from] DocumentError),
    #[error("invalid offset: {0}")]
    InvalidOffset(#[from] OffsetError),
    #[error("window bound out of range after applying offset")]
    WindowOutOfRange,
    #[error("encode JSON: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Failures while turning a [`crate::TimeSeries`] into a [`crate::Frame`].
#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("unsupported timeseries data type: {0}")]
    UnsupportedDataType(DataType),
    #[error("field {column}: row {row}: value does not match declared type {data_type}")]
    ValueTypeMismatch {
        column: usize,
        row: usize,
        data_type: DataType,
    },
    #[error("row {row}: timestamp not representable in nanoseconds")]
    TimestampOutOfRange { row: usize },
}
