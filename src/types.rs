use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SMA windows
// ---------------------------------------------------------------------------

/// The fixed set of supported SMA windows. Anything else is a caller error,
/// not an empty result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SmaWindow {
    W20,
    W50,
    W120,
    W200,
}

impl SmaWindow {
    pub const ALL: [SmaWindow; 4] = [
        SmaWindow::W20,
        SmaWindow::W50,
        SmaWindow::W120,
        SmaWindow::W200,
    ];

    pub fn value(self) -> u32 {
        match self {
            SmaWindow::W20 => 20,
            SmaWindow::W50 => 50,
            SmaWindow::W120 => 120,
            SmaWindow::W200 => 200,
        }
    }

    pub fn from_value(v: u32) -> Option<Self> {
        match v {
            20 => Some(SmaWindow::W20),
            50 => Some(SmaWindow::W50),
            120 => Some(SmaWindow::W120),
            200 => Some(SmaWindow::W200),
            _ => None,
        }
    }
}

impl std::fmt::Display for SmaWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value())
    }
}

// ---------------------------------------------------------------------------
// Scan output
// ---------------------------------------------------------------------------

/// One ticker trading below its SMA for a given window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BelowSmaRecord {
    pub symbol: String,
    /// Latest close.
    pub close: f64,
    /// SMA(window) as of the latest close.
    pub sma: f64,
    /// (close - sma) / sma — strictly negative for every emitted record.
    pub pct_below: f64,
}

/// Full output of one scan run. Window keys serialize as numeric strings
/// ("20", "50", ...), matching the persisted snapshot format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    /// Most recent market date observed across all resolved symbols (YYYY-MM-DD).
    pub as_of: String,
    pub count_by_window: BTreeMap<u32, usize>,
    pub results_by_window: BTreeMap<u32, Vec<BelowSmaRecord>>,
}

/// Narrow per-request view of one window's results.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanView {
    pub window: u32,
    pub as_of: String,
    pub count: usize,
    pub below: Vec<BelowSmaRecord>,
}

// ---------------------------------------------------------------------------
// Market data
// ---------------------------------------------------------------------------

/// One (date, close) observation from the daily-CSV path. Rows arrive
/// oldest-first from the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct PricePoint {
    /// Calendar date string, YYYY-MM-DD.
    pub date: String,
    pub close: f64,
}

/// Normalized per-symbol history from the bulk JSON path.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolSeries {
    pub symbol: String,
    /// Market date of the latest close, YYYY-MM-DD.
    pub as_of: String,
    /// Closes ordered most-recent-first (index 0 = latest trading day).
    pub closes_latest_first: Vec<f64>,
}

// ---------------------------------------------------------------------------
// Per-symbol scan outcomes and run diagnostics
// ---------------------------------------------------------------------------

/// What happened to one symbol during a scan. Failures are data, not errors —
/// the aggregate never fails because a symbol did.
#[derive(Debug, Clone)]
pub enum SymbolOutcome {
    /// Fetched and ranked; `records` may be empty if the close sits above
    /// every SMA.
    Ranked {
        as_of: String,
        records: Vec<(SmaWindow, BelowSmaRecord)>,
    },
    /// Fewer observations than the minimum-history gate requires.
    ShortHistory,
    /// Fetch or parse failed; the symbol is simply absent this run.
    Failed,
}

/// Diagnostics for one scan run. The result set never says which symbols were
/// dropped — these counters and the log line do.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ScanStats {
    pub symbols_total: usize,
    pub symbols_ok: usize,
    pub symbols_short_history: usize,
    pub symbols_failed: usize,
    /// Bulk path only: whole batches lost to a global error or timeout.
    pub batches_failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_round_trip() {
        for w in SmaWindow::ALL {
            assert_eq!(SmaWindow::from_value(w.value()), Some(w));
        }
        assert_eq!(SmaWindow::from_value(37), None);
        assert_eq!(SmaWindow::from_value(0), None);
    }

    #[test]
    fn scan_result_uses_wire_field_names() {
        let mut result = ScanResult {
            as_of: "2024-03-01".to_string(),
            ..Default::default()
        };
        result.count_by_window.insert(20, 1);
        result.results_by_window.insert(
            20,
            vec![BelowSmaRecord {
                symbol: "AAPL".to_string(),
                close: 90.0,
                sma: 100.0,
                pct_below: -0.1,
            }],
        );

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["asOf"], "2024-03-01");
        assert_eq!(json["countByWindow"]["20"], 1);
        assert_eq!(json["resultsByWindow"]["20"][0]["pctBelow"], -0.1);
        assert_eq!(json["resultsByWindow"]["20"][0]["symbol"], "AAPL");
    }

    #[test]
    fn scan_result_round_trips_through_json() {
        let mut result = ScanResult {
            as_of: "2024-03-01".to_string(),
            ..Default::default()
        };
        for w in SmaWindow::ALL {
            result.count_by_window.insert(w.value(), 0);
            result.results_by_window.insert(w.value(), Vec::new());
        }

        let text = serde_json::to_string(&result).unwrap();
        let back: ScanResult = serde_json::from_str(&text).unwrap();
        assert_eq!(back.as_of, result.as_of);
        assert_eq!(back.count_by_window.len(), 4);
    }
}
