//! Columnar output frames backed by Arrow arrays.

use std::collections::HashMap;
use std::sync::Arc;

use arrow_array::{
    Array, ArrayRef, BooleanArray, Float64Array, Int64Array, RecordBatch, StringArray,
    TimestampNanosecondArray,
};
use arrow_schema::{ArrowError, Field, Schema};

use crate::error::AssembleError;
use crate::field::{DataType, FieldValue, Tags};
use crate::timeseries::{DataField, TimeSeries};

/// Name of the time column in exported batches.
pub const TIME_FIELD_NAME: &str = "time";

/// One value column of a [`Frame`].
#[derive(Debug, Clone)]
pub struct FrameField {
    /// Display name; only set when the labels alone do not identify the column.
    pub name: Option<String>,
    pub labels: Tags,
    pub values: ArrayRef,
}

/// A time column plus value columns of equal length.
#[derive(Debug, Clone)]
pub struct Frame {
    time: TimestampNanosecondArray,
    fields: Vec<FrameField>,
}

impl Frame {
    pub fn time(&self) -> &TimestampNanosecondArray {
        &self.time
    }

    pub fn fields(&self) -> &[FrameField] {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut [FrameField] {
        &mut self.fields
    }

    pub fn num_rows(&self) -> usize {
        self.time.len()
    }

    /// Exports the frame as a record batch. Labels become field metadata.
    pub fn to_record_batch(&self) -> Result<RecordBatch, ArrowError> {
        let mut schema_fields = Vec::with_capacity(self.fields.len() + 1);
        let mut columns: Vec<ArrayRef> = Vec::with_capacity(self.fields.len() + 1);

        schema_fields.push(Field::new(
            TIME_FIELD_NAME,
            self.time.data_type().clone(),
            false,
        ));
        columns.push(Arc::new(self.time.clone()));

        for field in &self.fields {
            let metadata: HashMap<String, String> = field
                .labels
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            schema_fields.push(
                Field::new(
                    field.name.clone().unwrap_or_default(),
                    field.values.data_type().clone(),
                    true,
                )
                .with_metadata(metadata),
            );
            columns.push(field.values.clone());
        }

        RecordBatch::try_new(Arc::new(Schema::new(schema_fields)), columns)
    }
}

/// Builds a frame from a decoded series, one value column per data field in
/// the original order.
///
/// Fails for types without a column representation.
pub fn assemble(series: &TimeSeries) -> Result<Frame, AssembleError> {
    let nanos = series
        .time_field()
        .iter()
        .enumerate()
        .map(|(row, t)| {
            t.timestamp_nanos_opt()
                .ok_or(AssembleError::TimestampOutOfRange { row })
        })
        .collect::<Result<Vec<i64>, _>>()?;
    let time = TimestampNanosecondArray::from(nanos).with_timezone("UTC");

    let fields = series
        .data_fields()
        .iter()
        .enumerate()
        .map(|(column, field)| {
            Ok(FrameField {
                name: None,
                labels: field.tags.clone(),
                values: column_values(column, field)?,
            })
        })
        .collect::<Result<Vec<_>, AssembleError>>()?;

    Ok(Frame { time, fields })
}

fn column_values(column: usize, field: &DataField) -> Result<ArrayRef, AssembleError> {
    let array: ArrayRef = match field.data_type {
        DataType::Float => Arc::new(Float64Array::from(typed_values(column, field, |v| {
            match v {
                FieldValue::Float(x) => Some(*x),
                _ => None,
            }
        })?)),
        DataType::Integer => Arc::new(Int64Array::from(typed_values(column, field, |v| {
            match v {
                FieldValue::Integer(x) => Some(*x),
                _ => None,
            }
        })?)),
        DataType::String => Arc::new(StringArray::from(typed_values(column, field, |v| {
            match v {
                FieldValue::String(s) => Some(s.as_str()),
                _ => None,
            }
        })?)),
        DataType::Boolean => Arc::new(BooleanArray::from(typed_values(column, field, |v| {
            match v {
                FieldValue::Boolean(b) => Some(*b),
                _ => None,
            }
        })?)),
        DataType::StringArray => {
            return Err(AssembleError::UnsupportedDataType(field.data_type));
        }
    };
    Ok(array)
}

fn typed_values<'a, T>(
    column: usize,
    field: &'a DataField,
    pick: impl Fn(&'a FieldValue) -> Option<T>,
) -> Result<Vec<Option<T>>, AssembleError> {
    field
        .values
        .iter()
        .enumerate()
        .map(|(row, value)| match value {
            None => Ok(None),
            Some(value) => pick(value)
                .map(Some)
                .ok_or(AssembleError::ValueTypeMismatch {
                    column,
                    row,
                    data_type: field.data_type,
                }),
        })
        .collect()
}
