//! Scalar codec for a single column: wire type names, cell parsing and tag strings.
//!
//! A cell is parsed according to the type declared for its column. An empty
//! cell is a gap in sampling and decodes to `None`, never to a zero value.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::error::{FieldParseError, TagsError, UnknownDataType};

/// Key/value labels of one data column, ordered by key.
pub type Tags = BTreeMap<String, String>;

/// Column type, fixed per field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Float,
    Integer,
    String,
    StringArray,
    Boolean,
}

/// A single non-null sample.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
    String(String),
    StringArray(Vec<String>),
    Boolean(bool),
}

impl DataType {
    /// Canonical wire name.
    pub fn name(&self) -> &'static str {
        match self {
            DataType::Float => "float",
            DataType::Integer => "integer",
            DataType::String => "string",
            DataType::StringArray => "string_array",
            DataType::Boolean => "boolean",
        }
    }

    /// Parses one cell. Empty text is a typed null.
    pub fn parse(&self, cell: &str) -> Result<Option<FieldValue>, FieldParseError> {
        if cell.is_empty() {
            return Ok(None);
        }

        let value = match self {
            DataType::Float => FieldValue::Float(cell.parse()?),
            DataType::Integer => FieldValue::Integer(cell.parse()?),
            DataType::String => FieldValue::String(cell.to_string()),
            DataType::StringArray => FieldValue::StringArray(
                serde_json::from_str(cell).map_err(FieldParseError::StringArray)?,
            ),
            DataType::Boolean => FieldValue::Boolean(parse_bool(cell)?),
        };

        Ok(Some(value))
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DataType {
    type Err = UnknownDataType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "float" => Ok(DataType::Float),
            "integer" => Ok(DataType::Integer),
            "string" => Ok(DataType::String),
            "string_array" => Ok(DataType::StringArray),
            "boolean" => Ok(DataType::Boolean),
            other => Err(UnknownDataType(other.to_string())),
        }
    }
}

// Boolean literals the upstream API emits.
fn parse_bool(cell: &str) -> Result<bool, FieldParseError> {
    match cell {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        other => Err(FieldParseError::Boolean(other.to_string())),
    }
}

/// Parses `"device=123 attribute=temp"` into a tag map.
///
/// An empty string yields an empty map. Every pair must contain exactly one `=`.
pub fn parse_tags(s: &str) -> Result<Tags, TagsError> {
    let mut tags = Tags::new();
    if s.is_empty() {
        return Ok(tags);
    }

    for pair in s.split(' ') {
        let parts: Vec<&str> = pair.split('=').collect();
        if parts.len() != 2 {
            return Err(TagsError {
                pair: pair.to_string(),
                parts: parts.len(),
            });
        }
        tags.insert(parts[0].to_string(), parts[1].to_string());
    }

    Ok(tags)
}

/// Inverse of [`parse_tags`], ordered by key.
pub fn format_tags(tags: &Tags) -> String {
    tags.iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(" ")
}
