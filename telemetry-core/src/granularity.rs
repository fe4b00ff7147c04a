//! Default sampling granularity derived from the dashboard interval.

use std::fmt::Write;
use std::time::Duration;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;

/// Ascending bucket sizes the telemetry API is asked for.
pub const LADDER: [Duration; 14] = [
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(5),
    Duration::from_secs(MINUTE),
    Duration::from_secs(2 * MINUTE),
    Duration::from_secs(5 * MINUTE),
    Duration::from_secs(10 * MINUTE),
    Duration::from_secs(20 * MINUTE),
    Duration::from_secs(30 * MINUTE),
    Duration::from_secs(HOUR),
    Duration::from_secs(2 * HOUR),
    Duration::from_secs(6 * HOUR),
    Duration::from_secs(12 * HOUR),
    Duration::from_secs(24 * HOUR),
];

/// Smallest ladder entry not below `interval`, saturating at the top entry.
///
/// ```
/// use std::time::Duration;
/// use telemetry_core::granularity::default_granularity;
///
/// assert_eq!(default_granularity(Duration::from_secs(5)), Duration::from_secs(5));
/// assert_eq!(default_granularity(Duration::from_secs(6)), Duration::from_secs(60));
/// ```
pub fn default_granularity(interval: Duration) -> Duration {
    let index = LADDER.partition_point(|step| *step < interval);
    LADDER[index.min(LADDER.len() - 1)]
}

/// Renders a duration the way the telemetry API parses it, e.g. `5s`,
/// `1m0s`, `24h0m0s`, `500ms`.
pub fn format_granularity(d: Duration) -> String {
    if d.is_zero() {
        return "0s".to_string();
    }

    let mut out = String::new();
    if d < Duration::from_secs(1) {
        let nanos = d.subsec_nanos();
        let (unit, scale) = if nanos >= 1_000_000 {
            ("ms", 1_000_000)
        } else if nanos >= 1_000 {
            ("µs", 1_000)
        } else {
            ("ns", 1)
        };
        write_fraction(&mut out, nanos / scale, nanos % scale, scale);
        out.push_str(unit);
        return out;
    }

    let secs = d.as_secs();
    let (hours, minutes, seconds) = (secs / HOUR, secs % HOUR / MINUTE, secs % MINUTE);
    if hours > 0 {
        let _ = write!(out, "{}h", hours);
    }
    if hours > 0 || minutes > 0 {
        let _ = write!(out, "{}m", minutes);
    }
    write_fraction(&mut out, seconds as u32, d.subsec_nanos(), 1_000_000_000);
    out.push('s');
    out
}

fn write_fraction(out: &mut String, whole: u32, rem: u32, scale: u32) {
    let _ = write!(out, "{}", whole);
    if rem == 0 {
        return;
    }
    let width = scale.ilog10() as usize;
    let digits = format!("{:0width$}", rem, width = width);
    let _ = write!(out, ".{}", digits.trim_end_matches('0'));
}
