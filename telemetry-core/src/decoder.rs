//! Streaming decoder for the typed CSV body returned by the telemetry API.
//!
//! The body is one header row (`ts` followed by one tag string per data
//! column) and one row per timestamp. Column types are not part of the body;
//! they arrive separately and are passed in as `data_types`.

use std::io::Read;

use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, StringRecord};
use tracing::debug;

use crate::error::{DecodeError, Position};
use crate::field::{parse_tags, DataType};
use crate::timeseries::{DataField, TimeSeries, PREALLOC_VALUES};

/// Name of the reserved timestamp column.
pub const TIMESTAMP_FIELD: &str = "ts";

/// Resolves declared type names, in column order.
pub fn parse_data_types<I, S>(names: I) -> Result<Vec<DataType>, DecodeError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .enumerate()
        .map(|(index, name)| {
            name.as_ref()
                .parse()
                .map_err(|source| DecodeError::UnknownDataType { index, source })
        })
        .collect()
}

/// Decodes a complete response body.
///
/// Any structural problem aborts the whole series. A well-formed body with
/// no data rows (or no body at all) yields [`DecodeError::NoValues`].
pub fn decode<R: Read>(reader: R, data_types: &[DataType]) -> Result<TimeSeries, DecodeError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut decoder = Decoder::new(data_types);
    let mut record = StringRecord::new();
    let mut row = 0;

    loop {
        match reader.read_record(&mut record) {
            Ok(true) => {}
            Ok(false) => break,
            Err(source) => return Err(DecodeError::Csv { row, source }),
        }

        if row == 0 {
            decoder.header(&record)?;
        } else {
            decoder.record(row, &record)?;
        }
        row += 1;
    }

    decoder.finish()
}

struct Decoder<'a> {
    data_types: &'a [DataType],
    time_field: Vec<DateTime<Utc>>,
    data_fields: Vec<DataField>,
}

impl<'a> Decoder<'a> {
    fn new(data_types: &'a [DataType]) -> Self {
        Self {
            data_types,
            time_field: Vec::with_capacity(PREALLOC_VALUES),
            data_fields: data_types
                .iter()
                .map(|data_type| DataField::with_capacity(*data_type, PREALLOC_VALUES))
                .collect(),
        }
    }

    fn width(&self) -> usize {
        self.data_types.len() + 1
    }

    fn check_width(&self, position: Position, record: &StringRecord) -> Result<(), DecodeError> {
        if record.len() != self.width() {
            return Err(DecodeError::UnexpectedShape {
                position,
                want: self.width(),
                have: record.len(),
            });
        }
        Ok(())
    }

    fn header(&mut self, record: &StringRecord) -> Result<(), DecodeError> {
        self.check_width(Position::Header, record)?;

        if &record[0] != TIMESTAMP_FIELD {
            return Err(DecodeError::UnexpectedFieldName {
                want: TIMESTAMP_FIELD,
                have: record[0].to_string(),
            });
        }

        for (column, (cell, field)) in record
            .iter()
            .skip(1)
            .zip(self.data_fields.iter_mut())
            .enumerate()
        {
            field.tags =
                parse_tags(cell).map_err(|source| DecodeError::MalformedTags { column, source })?;
        }

        Ok(())
    }

    fn record(&mut self, row: usize, record: &StringRecord) -> Result<(), DecodeError> {
        self.check_width(Position::Record(row), record)?;

        let value: i64 = record[0]
            .parse()
            .map_err(|source| DecodeError::Timestamp { row, source })?;
        let timestamp = DateTime::from_timestamp(value, 0)
            .ok_or(DecodeError::TimestampOutOfRange { row, value })?;
        self.time_field.push(timestamp);

        for (column, (cell, field)) in record
            .iter()
            .skip(1)
            .zip(self.data_fields.iter_mut())
            .enumerate()
        {
            let value = field
                .data_type
                .parse(cell)
                .map_err(|source| DecodeError::FieldParse {
                    row,
                    column,
                    source,
                })?;
            field.values.push(value);
        }

        Ok(())
    }

    fn finish(self) -> Result<TimeSeries, DecodeError> {
        if self.time_field.is_empty() {
            return Err(DecodeError::NoValues);
        }

        debug!(
            rows = self.time_field.len(),
            fields = self.data_fields.len(),
            "decoded timeseries"
        );

        Ok(TimeSeries::new(self.time_field, self.data_fields))
    }
}
