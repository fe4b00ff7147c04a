//! `telemetry-query`: run telemetry query documents from the command line.
//!
//! Every file given on the command line is one YAML query document. The
//! documents run as one batch, exactly like the panels of a dashboard, and
//! each result is printed as a table.
//!
//! # Configuration
//!
//! Configuration can be provided through multiple sources, in order of precedence:
//!
//! 1. Command-line arguments (highest precedence)
//! 2. Environment variables (`TELEMETRY_API_URL`, `TELEMETRY_API_TOKEN`,
//!    `TELEMETRY_API__VERSION`, `TELEMETRY_QUERY__MAX_CONCURRENCY`, ...)
//! 3. User-specified configuration file (via `--config`)
//! 4. System-wide configuration (`/etc/telemetry-datasource/config.toml`)
//! 5. Default configuration (embedded in binary)
//!
//! A `.env` file in the working directory is loaded first. Log verbosity
//! follows `RUST_LOG` (default `info`).
//!
//! # Examples
//!
//! ```bash
//! # Last six hours of one query, one-minute dashboard interval
//! telemetry-query --api-url https://api.example.com voltage.yaml
//!
//! # Two queries over a fixed window, as a specific user
//! telemetry-query \
//!   --from 2024-05-01T00:00:00Z --to 2024-05-02T00:00:00Z \
//!   --interval 5m --user gizmo@example.com \
//!   voltage.yaml current.yaml
//! ```

use std::path::PathBuf;
use std::time::Duration;

use arrow::util::pretty::pretty_format_batches;
use chrono::{DateTime, TimeDelta, Utc};
use clap::Parser;
use dotenv::dotenv;
use serde_json::json;
use telemetry_core::TimeRange;
use telemetry_datasource::datasource::TELEMETRY_QUERY_TYPE;
use telemetry_datasource::{ConfigArgs, DataQuery, DataSource, QueryDataRequest, Settings};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    /// Window start: RFC 3339 timestamp or a duration before now (e.g. "6h")
    #[arg(long, default_value = "6h")]
    from: String,

    /// Window end: RFC 3339 timestamp or a duration before now
    #[arg(long, default_value = "0s")]
    to: String,

    /// Dashboard sampling interval
    #[arg(long, default_value = "1m", value_parser = humantime::parse_duration)]
    interval: Duration,

    /// Acting user forwarded to the API
    #[arg(long, env = "TELEMETRY_USER")]
    user: Option<String>,

    /// Query documents, one sub-query each
    #[arg(required = true, value_name = "QUERY_FILE")]
    files: Vec<PathBuf>,
}

fn resolve_time(
    value: &str,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, Box<dyn std::error::Error>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(value) {
        return Ok(t.with_timezone(&Utc));
    }
    let ago = TimeDelta::from_std(humantime::parse_duration(value)?)?;
    now.checked_sub_signed(ago)
        .ok_or_else(|| format!("time {:?} out of range", value).into())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::new(&cli.config)?;
    let data_source = DataSource::from_settings(&settings)?;

    let now = Utc::now();
    let time_range = TimeRange::new(resolve_time(&cli.from, now)?, resolve_time(&cli.to, now)?);

    let mut queries = Vec::with_capacity(cli.files.len());
    for path in &cli.files {
        let text = std::fs::read_to_string(path)?;
        queries.push(DataQuery {
            ref_id: path.display().to_string(),
            query_type: TELEMETRY_QUERY_TYPE.to_string(),
            json: json!({ "text": text }),
            interval: cli.interval,
            time_range,
        });
    }

    info!(
        queries = queries.len(),
        api_version = settings.api.version.as_str(),
        "running query batch"
    );

    let response = data_source
        .query_data(QueryDataRequest {
            user: cli.user,
            queries,
        })
        .await;

    for (ref_id, result) in &response.responses {
        println!("== {}", ref_id);
        match (&result.frame, &result.error) {
            (_, Some(error)) => println!("error: {}", error),
            (Some(frame), None) => {
                let batch = frame.to_record_batch()?;
                println!("{}", pretty_format_batches(&[batch])?);
            }
            (None, None) => println!("no data"),
        }
    }

    Ok(())
}
