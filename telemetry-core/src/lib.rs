/*!
# telemetry-core: typed time-series decoding and frame assembly for telemetry dashboards

This crate holds the synchronous part of the telemetry query pipeline. It does
no I/O; the HTTP client and the batch request handler live in the
`telemetry-datasource` package.

## Pipeline

1. [`query::prepare`] turns a YAML query document into the JSON wire query,
   injecting the requested window, a default granularity and aggregation,
   and extracting an optional `@offset`.
2. [`decoder::decode`] reads the upstream CSV body into a [`TimeSeries`],
   given the column types announced by the upstream response headers.
3. [`TimeSeries::shift_time`] moves an offset series back onto the requested
   window and [`alerts::expand_alerts`] splits alert lists into boolean
   columns.
4. [`frame::assemble`] builds an Arrow-backed [`Frame`].
5. [`labels::make_labels_unique`] strips labels shared by every column of a
   batch of frames.

## Usage

```rust
use std::time::Duration;

use chrono::DateTime;
use telemetry_core::{decoder, frame, labels, query, DataType};

let range = query::TimeRange::new(
    DateTime::from_timestamp(5, 0).unwrap(),
    DateTime::from_timestamp(10, 0).unwrap(),
);
let prepared = query::prepare("telemetry: voltage\n", Duration::from_secs(1), range).unwrap();
assert!(prepared.text.contains(r#""granularity":"1s""#));

let body = "ts,device=a telemetry=voltage\n5,230.1\n6,\n";
let series = decoder::decode(body.as_bytes(), &[DataType::Float]).unwrap();

let mut frames = vec![frame::assemble(&series).unwrap()];
labels::make_labels_unique(frames.iter_mut());
assert_eq!(frames[0].fields()[0].name.as_deref(), Some("voltage"));
```
*/

pub mod alerts;
pub mod decoder;
pub mod error;
pub mod field;
pub mod frame;
pub mod granularity;
pub mod labels;
pub mod query;
pub mod timeseries;

pub use error::{AssembleError, DecodeError, PrepareError};
pub use field::{DataType, FieldValue, Tags};
pub use frame::{Frame, FrameField};
pub use query::{PreparedQuery, TimeRange};
pub use timeseries::{DataField, TimeSeries};
