//! Splits active-alert lists into one boolean column per alert.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::field::{DataType, FieldValue};
use crate::labels::DEFAULT_NAME_TAG;
use crate::timeseries::{DataField, TimeSeries};

pub const ALERTS_METRIC: &str = "alerts";

/// True for a string array column holding the `alerts` metric.
pub fn is_alerts_field(field: &DataField) -> bool {
    field.data_type == DataType::StringArray
        && field.tags.get(DEFAULT_NAME_TAG).map(String::as_str) == Some(ALERTS_METRIC)
}

/// Replaces every alerts column with boolean columns, one per alert name
/// raised at least once, ordered by name. Other columns are shared with
/// `series` unchanged.
pub fn expand_alerts(series: &TimeSeries) -> TimeSeries {
    let mut data_fields = Vec::with_capacity(series.data_fields().len());

    for field in series.data_fields() {
        if is_alerts_field(field) {
            data_fields.extend(split_alerts(field).into_iter().map(Arc::new));
        } else {
            data_fields.push(Arc::clone(field));
        }
    }

    TimeSeries::from_shared(series.time_field().to_vec(), data_fields)
}

fn split_alerts(base: &DataField) -> Vec<DataField> {
    let mut by_alert: BTreeMap<&str, DataField> = BTreeMap::new();

    for (row, value) in base.values.iter().enumerate() {
        let Some(FieldValue::StringArray(alerts)) = value else {
            continue;
        };
        for alert in alerts {
            let field = by_alert
                .entry(alert.as_str())
                .or_insert_with(|| alert_field(base, alert));
            field.values[row] = Some(FieldValue::Boolean(true));
        }
    }

    by_alert.into_values().collect()
}

fn alert_field(base: &DataField, name: &str) -> DataField {
    let mut tags = base.tags.clone();
    tags.insert(
        DEFAULT_NAME_TAG.to_string(),
        format!("{}.{}", ALERTS_METRIC, name),
    );

    DataField::new(DataType::Boolean)
        .with_tags(tags)
        .with_values(vec![Some(FieldValue::Boolean(false)); base.len()])
}
