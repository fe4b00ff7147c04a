//! In-memory columnar time-series model.
//!
//! A [`TimeSeries`] is one shared time axis plus any number of typed data
//! columns of the same length. Data fields are reference counted so a
//! time-shifted copy of a series does not duplicate its samples.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};

use crate::field::{DataType, FieldValue, Tags};

/// Initial capacity of freshly decoded columns.
pub(crate) const PREALLOC_VALUES: usize = 64;

/// One typed column of samples identified by its tags.
#[derive(Debug, Clone, PartialEq)]
pub struct DataField {
    pub tags: Tags,
    pub data_type: DataType,
    /// `None` is "no sample at this timestamp".
    pub values: Vec<Option<FieldValue>>,
}

impl DataField {
    pub fn new(data_type: DataType) -> Self {
        Self::with_capacity(data_type, 0)
    }

    pub fn with_capacity(data_type: DataType, capacity: usize) -> Self {
        Self {
            tags: Tags::new(),
            data_type,
            values: Vec::with_capacity(capacity),
        }
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_values(mut self, values: Vec<Option<FieldValue>>) -> Self {
        self.values = values;
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Time column plus parallel data columns, rows in the order received.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    time_field: Vec<DateTime<Utc>>,
    data_fields: Vec<Arc<DataField>>,
}

impl TimeSeries {
    /// Builds a series from complete columns.
    ///
    /// # Panics
    ///
    /// Panics if any data field has a different number of values than the
    /// time field.
    pub fn new(time_field: Vec<DateTime<Utc>>, data_fields: Vec<DataField>) -> Self {
        Self::from_shared(time_field, data_fields.into_iter().map(Arc::new).collect())
    }

    pub(crate) fn from_shared(
        time_field: Vec<DateTime<Utc>>,
        data_fields: Vec<Arc<DataField>>,
    ) -> Self {
        for (i, field) in data_fields.iter().enumerate() {
            assert_eq!(
                field.len(),
                time_field.len(),
                "data field {} has {} values for {} timestamps",
                i,
                field.len(),
                time_field.len()
            );
        }
        Self {
            time_field,
            data_fields,
        }
    }

    pub fn time_field(&self) -> &[DateTime<Utc>] {
        &self.time_field
    }

    pub fn data_fields(&self) -> &[Arc<DataField>] {
        &self.data_fields
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.time_field.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time_field.is_empty()
    }

    /// Returns a copy with every timestamp moved by `offset`. Data fields are
    /// shared with `self`.
    ///
    /// Returns `None` if a shifted timestamp leaves the representable range.
    pub fn shift_time(&self, offset: TimeDelta) -> Option<TimeSeries> {
        let time_field = self
            .time_field
            .iter()
            .map(|t| t.checked_add_signed(offset))
            .collect::<Option<Vec<_>>>()?;

        Some(TimeSeries {
            time_field,
            data_fields: self.data_fields.clone(),
        })
    }
}
