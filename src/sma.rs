//! Pure SMA math and series ordering. No I/O — everything here is
//! deterministic over its inputs.

use chrono::{NaiveDate, NaiveDateTime};

/// Arithmetic mean of the first `window` closes of a most-recent-first series.
///
/// Returns `None` when the window is zero or the series is too short —
/// insufficient data is a soft condition, not an error. Plain f64 summation;
/// daily closes over a few hundred points need no compensation.
pub fn compute_sma(closes_latest_first: &[f64], window: usize) -> Option<f64> {
    if window == 0 || closes_latest_first.len() < window {
        return None;
    }
    let sum: f64 = closes_latest_first[..window].iter().sum();
    Some(sum / window as f64)
}

/// Reorder a series to most-recent-first by comparing the first and last
/// timestamps. Providers usually send newest-first already, so the common
/// case returns the input untouched.
///
/// Degenerate input (fewer than two elements, or timestamps that fail to
/// parse) is returned unchanged — the order cannot or need not be determined.
pub fn ensure_latest_first<T, F>(mut values: Vec<T>, timestamp_of: F) -> Vec<T>
where
    F: Fn(&T) -> Option<&str>,
{
    if values.len() < 2 {
        return values;
    }

    let first = values.first().and_then(&timestamp_of).and_then(parse_timestamp);
    let last = values.last().and_then(&timestamp_of).and_then(parse_timestamp);

    match (first, last) {
        (Some(a), Some(b)) if a < b => {
            values.reverse();
            values
        }
        _ => values,
    }
}

/// Parse a provider timestamp of heterogeneous granularity: date-time
/// (`2024-03-01 15:30:00`, with space or `T`) or date-only (`2024-03-01`,
/// which compares as midnight).
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
