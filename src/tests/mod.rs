use std::time::Duration;

use arrow::array::{Array, AsArray};
use arrow::datatypes::Float64Type;
use async_trait::async_trait;
use chrono::DateTime;
use mockall::*;
use serde_json::{json, Value};
use telemetry_core::decoder::decode;
use telemetry_core::{DataField, DataType, FieldValue, Tags, TimeRange, TimeSeries};

use crate::api_error::parse_multi_error;
use crate::client::{FetchError, TelemetryFetcher, TimeseriesRequest};
use crate::datasource::{
    DataQuery, DataSource, QueryDataRequest, DATA_TYPE_NOT_SUPPORTED, INVALID_OFFSET,
    INVALID_YAML, SOMETHING_WENT_WRONG,
};

mock! {
    pub Fetcher {}
    #[async_trait]
    impl TelemetryFetcher for Fetcher {
        async fn query_timeseries(&self, request: TimeseriesRequest) -> Result<TimeSeries, FetchError>;
    }
}

fn window(from: i64, to: i64) -> TimeRange {
    TimeRange::new(
        DateTime::from_timestamp(from, 0).unwrap(),
        DateTime::from_timestamp(to, 0).unwrap(),
    )
}

fn query(ref_id: &str, text: &str) -> DataQuery {
    DataQuery {
        ref_id: ref_id.to_string(),
        query_type: "telemetry".to_string(),
        json: json!({ "text": text }),
        interval: Duration::from_secs(1),
        time_range: window(5, 10),
    }
}

fn request(queries: Vec<DataQuery>) -> QueryDataRequest {
    QueryDataRequest {
        user: Some("gizmo@example.com".to_string()),
        queries,
    }
}

fn tags(pairs: &[(&str, &str)]) -> Tags {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn float_series(secs: &[i64], tags: Tags) -> TimeSeries {
    TimeSeries::new(
        secs.iter()
            .map(|s| DateTime::from_timestamp(*s, 0).unwrap())
            .collect(),
        vec![DataField::new(DataType::Float)
            .with_tags(tags)
            .with_values(secs.iter().map(|s| Some(FieldValue::Float(*s as f64))).collect())],
    )
}

fn wire_query(request: &TimeseriesRequest) -> Value {
    serde_json::from_str(&request.query).unwrap()
}

#[tokio::test]
async fn test_offset_round_trip() {
    let mut fetcher = MockFetcher::new();
    fetcher
        .expect_query_timeseries()
        .withf(|request| {
            let query = wire_query(request);
            query["from"] == "1970-01-01T00:00:03Z"
                && query["to"] == "1970-01-01T00:00:08Z"
                && query.get("@offset").is_none()
        })
        .times(1)
        .returning(|_| Ok(float_series(&[3, 4, 5, 6, 7], tags(&[("telemetry", "voltage")]))));

    let data_source = DataSource::new(Box::new(fetcher));
    let response = data_source
        .query_data(request(vec![query("A", "telemetry: voltage\n\"@offset\": 2s\n")]))
        .await;

    let result = response.get("A").unwrap();
    assert!(result.error.is_none());
    let frame = result.frame.as_ref().unwrap();
    let secs: Vec<i64> = frame
        .time()
        .values()
        .iter()
        .map(|ns| ns / 1_000_000_000)
        .collect();
    assert_eq!(secs, vec![5, 6, 7, 8, 9]);

    let values = frame.fields()[0].values.as_primitive::<Float64Type>();
    assert_eq!(values.value(0), 3.0);
}

#[tokio::test]
async fn test_user_is_forwarded() {
    let mut fetcher = MockFetcher::new();
    fetcher
        .expect_query_timeseries()
        .withf(|request| request.user.as_deref() == Some("gizmo@example.com"))
        .times(1)
        .returning(|_| Ok(float_series(&[1], Tags::new())));

    let data_source = DataSource::new(Box::new(fetcher));
    let response = data_source
        .query_data(request(vec![query("A", "telemetry: voltage")]))
        .await;
    assert!(response.get("A").unwrap().frame.is_some());
}

#[tokio::test]
async fn test_hidden_and_empty_queries_are_skipped() {
    let mut fetcher = MockFetcher::new();
    fetcher.expect_query_timeseries().never();

    let mut hidden = query("A", "telemetry: voltage");
    hidden.json = json!({ "hide": true, "text": "telemetry: voltage" });
    let empty = query("B", "");

    let data_source = DataSource::new(Box::new(fetcher));
    let response = data_source.query_data(request(vec![hidden, empty])).await;

    for ref_id in ["A", "B"] {
        let result = response.get(ref_id).unwrap();
        assert!(result.frame.is_none());
        assert!(result.error.is_none());
    }
}

#[tokio::test]
async fn test_no_values_is_not_an_error() {
    let mut fetcher = MockFetcher::new();
    fetcher
        .expect_query_timeseries()
        .times(1)
        .returning(|_| Err(FetchError::Empty));

    let data_source = DataSource::new(Box::new(fetcher));
    let response = data_source
        .query_data(request(vec![query("A", "telemetry: voltage")]))
        .await;

    let result = response.get("A").unwrap();
    assert!(result.frame.is_none());
    assert!(result.error.is_none());
}

#[tokio::test]
async fn test_malformed_response_is_an_error() {
    let mut fetcher = MockFetcher::new();
    fetcher.expect_query_timeseries().times(1).returning(|_| {
        let err = decode("nope,k=v\n1,2\n".as_bytes(), &[DataType::Float]).unwrap_err();
        Err(FetchError::from(err))
    });

    let data_source = DataSource::new(Box::new(fetcher));
    let response = data_source
        .query_data(request(vec![query("A", "telemetry: voltage")]))
        .await;

    let result = response.get("A").unwrap();
    assert!(result.frame.is_none());
    assert_eq!(result.error.as_ref().unwrap().message(), SOMETHING_WENT_WRONG);
}

#[tokio::test]
async fn test_upstream_message_is_shown() {
    let mut fetcher = MockFetcher::new();
    fetcher
        .expect_query_timeseries()
        .withf(|request| request.query.contains("voltage"))
        .returning(|_| {
            let body = br#"{"errors":[{"code":"not_found","message":"Device not found."},{"code":"other"}]}"#;
            Err(FetchError::Api(parse_multi_error(body).unwrap()))
        });
    fetcher
        .expect_query_timeseries()
        .withf(|request| request.query.contains("current"))
        .returning(|_| {
            Err(FetchError::Api(
                parse_multi_error(br#"{"errors":[{"code":"oops"}]}"#).unwrap(),
            ))
        });

    let data_source = DataSource::new(Box::new(fetcher));
    let response = data_source
        .query_data(request(vec![
            query("A", "telemetry: voltage"),
            query("B", "telemetry: current"),
        ]))
        .await;

    assert_eq!(
        response.get("A").unwrap().error.as_ref().unwrap().message(),
        "Device not found."
    );
    assert_eq!(
        response.get("B").unwrap().error.as_ref().unwrap().message(),
        SOMETHING_WENT_WRONG
    );
}

#[tokio::test]
async fn test_user_input_errors() {
    let mut fetcher = MockFetcher::new();
    fetcher.expect_query_timeseries().never();

    let mut unknown_type = query("C", "telemetry: voltage");
    unknown_type.query_type = "command".to_string();
    let mut bad_props = query("D", "telemetry: voltage");
    bad_props.json = json!({ "text": 42 });

    let data_source = DataSource::new(Box::new(fetcher));
    let response = data_source
        .query_data(request(vec![
            query("A", "telemetry: [voltage"),
            query("B", "telemetry: voltage\n\"@offset\": yesterday\n"),
            unknown_type,
            bad_props,
        ]))
        .await;

    let message = |ref_id: &str| {
        response
            .get(ref_id)
            .unwrap()
            .error
            .as_ref()
            .unwrap()
            .message()
            .to_string()
    };
    assert_eq!(message("A"), INVALID_YAML);
    assert_eq!(message("B"), INVALID_OFFSET);
    assert_eq!(message("C"), SOMETHING_WENT_WRONG);
    assert_eq!(message("D"), SOMETHING_WENT_WRONG);
}

#[tokio::test]
async fn test_unsupported_type_does_not_affect_sibling() {
    let mut fetcher = MockFetcher::new();
    fetcher
        .expect_query_timeseries()
        .withf(|request| request.query.contains("tags"))
        .returning(|_| {
            Ok(TimeSeries::new(
                vec![DateTime::from_timestamp(1, 0).unwrap()],
                vec![DataField::new(DataType::StringArray)
                    .with_tags(tags(&[("telemetry", "tags")]))
                    .with_values(vec![None])],
            ))
        });
    fetcher
        .expect_query_timeseries()
        .withf(|request| request.query.contains("voltage"))
        .returning(|_| Ok(float_series(&[1, 2], tags(&[("telemetry", "voltage")]))));

    let data_source = DataSource::new(Box::new(fetcher));
    let response = data_source
        .query_data(request(vec![
            query("A", "telemetry: tags"),
            query("B", "telemetry: voltage"),
        ]))
        .await;

    let a = response.get("A").unwrap();
    assert!(a.frame.is_none());
    assert_eq!(a.error.as_ref().unwrap().message(), DATA_TYPE_NOT_SUPPORTED);

    let b = response.get("B").unwrap();
    assert!(b.error.is_none());
    assert_eq!(b.frame.as_ref().unwrap().num_rows(), 2);
}

#[tokio::test]
async fn test_labels_deduplicated_across_batch() {
    let mut fetcher = MockFetcher::new();
    fetcher
        .expect_query_timeseries()
        .withf(|request| request.query.contains("voltage"))
        .returning(|_| {
            Ok(float_series(
                &[1],
                tags(&[("device", "abc"), ("telemetry", "voltage")]),
            ))
        });
    fetcher
        .expect_query_timeseries()
        .withf(|request| request.query.contains("current"))
        .returning(|_| {
            Ok(float_series(
                &[1],
                tags(&[("device", "abc"), ("telemetry", "current")]),
            ))
        });
    fetcher
        .expect_query_timeseries()
        .withf(|request| request.query.contains("broken"))
        .returning(|_| Err(FetchError::Empty));

    let data_source = DataSource::new(Box::new(fetcher)).with_max_concurrency(2);
    let response = data_source
        .query_data(request(vec![
            query("A", "telemetry: voltage"),
            query("B", "telemetry: current"),
            query("C", "telemetry: broken"),
        ]))
        .await;

    let ref_ids: Vec<&str> = response.responses.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(ref_ids, vec!["A", "B", "C"]);

    let labels = |ref_id: &str| {
        response.get(ref_id).unwrap().frame.as_ref().unwrap().fields()[0]
            .labels
            .clone()
    };
    assert_eq!(labels("A"), tags(&[("telemetry", "voltage")]));
    assert_eq!(labels("B"), tags(&[("telemetry", "current")]));
}

#[tokio::test]
async fn test_single_series_named_after_metric() {
    let mut fetcher = MockFetcher::new();
    fetcher.expect_query_timeseries().times(1).returning(|_| {
        Ok(float_series(
            &[1, 2],
            tags(&[("foo", "bar"), ("telemetry", "h2_flow")]),
        ))
    });

    let data_source = DataSource::new(Box::new(fetcher));
    let response = data_source
        .query_data(request(vec![query("A", "telemetry: h2_flow")]))
        .await;

    let frame = response.get("A").unwrap().frame.as_ref().unwrap();
    let field = &frame.fields()[0];
    assert!(field.labels.is_empty());
    assert_eq!(field.name.as_deref(), Some("h2_flow"));

    let batch = frame.to_record_batch().unwrap();
    assert_eq!(batch.schema().field(1).name(), "h2_flow");
}

#[tokio::test]
async fn test_alerts_are_split_into_boolean_fields() {
    let mut fetcher = MockFetcher::new();
    fetcher.expect_query_timeseries().times(1).returning(|_| {
        let alerts = |names: &[&str]| {
            Some(FieldValue::StringArray(
                names.iter().map(|s| s.to_string()).collect(),
            ))
        };
        Ok(TimeSeries::new(
            (1..=3)
                .map(|s| DateTime::from_timestamp(s, 0).unwrap())
                .collect(),
            vec![DataField::new(DataType::StringArray)
                .with_tags(tags(&[("telemetry", "alerts")]))
                .with_values(vec![alerts(&["1"]), alerts(&["1", "2"]), alerts(&["2"])])],
        ))
    });

    let data_source = DataSource::new(Box::new(fetcher));
    let response = data_source
        .query_data(request(vec![query("A", "telemetry: alerts")]))
        .await;

    let result = response.get("A").unwrap();
    assert!(result.error.is_none());
    let fields = result.frame.as_ref().unwrap().fields();
    assert_eq!(fields.len(), 2);
    assert_eq!(fields[0].labels["telemetry"], "alerts.1");
    assert_eq!(fields[1].labels["telemetry"], "alerts.2");

    let first = fields[0].values.as_boolean();
    assert!(first.value(0) && first.value(1) && !first.value(2));
    let second = fields[1].values.as_boolean();
    assert!(!second.value(0) && second.value(1) && second.value(2));
    assert_eq!(second.null_count(), 0);
}

#[tokio::test]
async fn test_default_granularity_and_aggregation() {
    let mut fetcher = MockFetcher::new();
    fetcher
        .expect_query_timeseries()
        .withf(|request| {
            let query = wire_query(request);
            query["granularity"] == "1m0s" && query["aggregation"] == "auto"
        })
        .times(1)
        .returning(|_| Err(FetchError::Empty));

    let mut q = query("A", "telemetry: voltage");
    q.interval = Duration::from_secs(30);

    let data_source = DataSource::new(Box::new(fetcher));
    let response = data_source.query_data(request(vec![q])).await;
    assert!(response.get("A").unwrap().error.is_none());
}
