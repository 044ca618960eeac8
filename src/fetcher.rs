//! Market data fetchers.
//!
//! Two independent paths feed the scanner:
//! - a bulk JSON time-series endpoint taking comma-joined symbol batches,
//!   whose response shape varies by batch size and provider mood — decoded
//!   through an explicit [`SeriesResponse`] sum type rather than ad hoc
//!   probing at call sites;
//! - a per-symbol plain-text daily history endpoint (comma-delimited rows,
//!   newest-last) used by the automated batch job.
//!
//! Both paths absorb per-symbol and per-batch faults: a symbol that cannot be
//! fetched or parsed is simply absent from the result for this run.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::Result;
use crate::sma::ensure_latest_first;
use crate::types::{PricePoint, SymbolSeries};

// ---------------------------------------------------------------------------
// Bulk JSON path
// ---------------------------------------------------------------------------

/// One bar from a bulk response: timestamp plus the close if it parsed to a
/// finite number. Kept as a pair so ordering is decided before bad closes
/// are dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBar {
    pub datetime: String,
    pub close: Option<f64>,
}

/// The known shapes of a bulk time-series response.
#[derive(Debug)]
pub enum SeriesResponse {
    /// Top-level `{status:"error", message:...}` — the whole batch is lost.
    GlobalError(String),
    /// Single-symbol shape: `{meta:{symbol}, values:[...]}`. Seen when a
    /// batch degenerates to one symbol.
    Single {
        symbol: Option<String>,
        entry: Value,
    },
    /// Wrapper shape: `{data: {SYM: entry, ...}, status:"ok"}`.
    Wrapped(serde_json::Map<String, Value>),
    /// Flat mapping of symbol to per-symbol entry: `{SYM: entry, ...}`.
    FlatMap(serde_json::Map<String, Value>),
}

/// Classify a bulk response body into one of the known shapes.
/// Returns `None` for bodies that match none of them (treated by callers as
/// a whole-batch failure).
pub fn decode_response(json: &Value) -> Option<SeriesResponse> {
    let obj = json.as_object()?;

    if obj.get("status").and_then(|s| s.as_str()) == Some("error") {
        let message = obj
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown provider error")
            .to_string();
        return Some(SeriesResponse::GlobalError(message));
    }

    // Single-symbol shape carries a top-level values array.
    if obj.get("values").map(Value::is_array).unwrap_or(false) {
        let symbol = obj
            .get("meta")
            .and_then(|m| m.get("symbol"))
            .and_then(|s| s.as_str())
            .map(|s| s.to_string());
        return Some(SeriesResponse::Single {
            symbol,
            entry: json.clone(),
        });
    }

    if let Some(data) = obj.get("data").and_then(|d| d.as_object()) {
        return Some(SeriesResponse::Wrapped(data.clone()));
    }

    Some(SeriesResponse::FlatMap(obj.clone()))
}

/// Salvage one symbol's series from a per-symbol response entry.
///
/// Returns `None` when the entry is not usable: its own status is an error,
/// the values list is missing or empty, or no close parses to a finite
/// number. `None` means "unavailable this run", never a hard failure.
pub fn extract_series(symbol: &str, entry: &Value) -> Option<SymbolSeries> {
    let obj = entry.as_object()?;

    if obj.get("status").and_then(|s| s.as_str()) == Some("error") {
        return None;
    }

    let values = obj.get("values")?.as_array()?;
    if values.is_empty() {
        return None;
    }

    let bars: Vec<RawBar> = values
        .iter()
        .filter_map(|v| {
            let datetime = v.get("datetime")?.as_str()?.to_string();
            // Closes arrive as strings from this provider, but tolerate
            // plain numbers too.
            let close = v
                .get("close")
                .and_then(|c| c.as_f64().or_else(|| c.as_str().and_then(|s| s.parse().ok())))
                .filter(|n| n.is_finite());
            Some(RawBar { datetime, close })
        })
        .collect();

    let ordered = ensure_latest_first(bars, |b| Some(b.datetime.as_str()));

    let closes: Vec<f64> = ordered.iter().filter_map(|b| b.close).collect();
    if closes.is_empty() {
        return None;
    }

    // datetime may be "2025-02-21 12:51:00" or "2025-02-21" — the as-of date
    // is the calendar-date prefix of the latest timestamp.
    let latest = &ordered.first()?.datetime;
    let as_of = latest.chars().take(10).collect::<String>();

    Some(SymbolSeries {
        symbol: symbol.to_string(),
        as_of,
        closes_latest_first: closes,
    })
}

/// Fetch daily series for many symbols in fixed-size batches over the bulk
/// endpoint. Returns the per-symbol series that could be salvaged plus the
/// number of whole batches lost. Batch failures never abort the run.
pub async fn fetch_daily_series_bulk(
    client: &reqwest::Client,
    cfg: &Config,
    symbols: &[String],
    outputsize: usize,
    end_date: Option<&str>,
) -> (HashMap<String, SymbolSeries>, usize) {
    let mut result = HashMap::new();
    let mut batches_failed = 0usize;
    let url = format!("{}/time_series", cfg.bulk_api_url);

    for batch in symbols.chunks(cfg.fetch_batch_size) {
        let joined = batch.join(",");
        let outputsize_s = outputsize.to_string();
        let mut query: Vec<(&str, &str)> = vec![
            ("symbol", joined.as_str()),
            ("interval", "1day"),
            ("outputsize", outputsize_s.as_str()),
            ("apikey", cfg.api_key.as_str()),
            ("format", "JSON"),
        ];
        if let Some(end) = end_date {
            query.push(("end_date", end));
        }

        let json: Value = match client
            .get(&url)
            .query(&query)
            .timeout(Duration::from_secs(cfg.fetch_timeout_secs))
            .send()
            .await
        {
            Ok(resp) => match resp.json().await {
                Ok(v) => v,
                Err(e) => {
                    warn!("Bulk batch starting at {} failed to parse: {e}", batch[0]);
                    batches_failed += 1;
                    continue;
                }
            },
            Err(e) => {
                warn!("Bulk batch starting at {} failed: {e}", batch[0]);
                batches_failed += 1;
                continue;
            }
        };

        match decode_response(&json) {
            Some(SeriesResponse::GlobalError(message)) => {
                warn!("Bulk batch starting at {} rejected upstream: {message}", batch[0]);
                batches_failed += 1;
            }
            Some(SeriesResponse::Single { symbol, entry }) => {
                // A one-symbol batch may come back without the mapping layer.
                let sym = symbol.unwrap_or_else(|| batch[0].clone());
                if let Some(series) = extract_series(&sym, &entry) {
                    result.insert(series.symbol.clone(), series);
                }
            }
            Some(SeriesResponse::Wrapped(map)) | Some(SeriesResponse::FlatMap(map)) => {
                for sym in batch {
                    let Some(entry) = map.get(sym) else { continue };
                    if let Some(series) = extract_series(sym, entry) {
                        result.insert(sym.clone(), series);
                    }
                }
            }
            None => {
                warn!("Bulk batch starting at {} returned an undecodable body", batch[0]);
                batches_failed += 1;
            }
        }

        debug!(
            batch_first = %batch[0],
            batch_len = batch.len(),
            salvaged = result.len(),
            "bulk batch processed",
        );
    }

    (result, batches_failed)
}

// ---------------------------------------------------------------------------
// Per-symbol daily-CSV path
// ---------------------------------------------------------------------------

/// Map an S&P 500 ticker to the CSV provider's naming scheme:
/// `BRK.B` → `brk-b.us`.
pub fn to_stooq_symbol(symbol: &str) -> String {
    let mut s = symbol.replace('.', "-").to_lowercase();
    s.push_str(".us");
    s
}

/// Parse a daily-history CSV body into (date, close) rows, oldest-first as
/// delivered. Skips the header row, rows with fewer than five fields, and
/// rows whose close is not a finite number.
pub fn parse_daily_csv(body: &str) -> Vec<PricePoint> {
    let mut rows = Vec::new();
    for line in body.trim().lines().skip(1) {
        let parts: Vec<&str> = line.split(',').collect();
        if parts.len() < 5 {
            continue;
        }
        let date = parts[0].trim();
        if date.is_empty() {
            continue;
        }
        let Ok(close) = parts[4].trim().parse::<f64>() else { continue };
        if !close.is_finite() {
            continue;
        }
        rows.push(PricePoint {
            date: date.to_string(),
            close,
        });
    }
    rows
}

/// Fetch one symbol's full daily history from the CSV endpoint.
pub async fn fetch_daily_history(
    client: &reqwest::Client,
    cfg: &Config,
    symbol: &str,
) -> Result<Vec<PricePoint>> {
    let url = format!("{}/?s={}&i=d", cfg.daily_csv_url, to_stooq_symbol(symbol));
    let body = client
        .get(&url)
        .timeout(Duration::from_secs(cfg.fetch_timeout_secs))
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    Ok(parse_daily_csv(&body))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
