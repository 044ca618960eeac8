//! Below-SMA ranking and scan aggregation.
//!
//! The aggregate contract: given a well-formed universe, a scan always
//! produces a (possibly partial or empty) [`ScanResult`] — per-symbol and
//! per-batch faults are absorbed here and surface only as smaller result
//! sets plus [`ScanStats`] counters.

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::{Config, DataProvider, HISTORY_SLICE, MIN_HISTORY};
use crate::fetcher::{fetch_daily_history, fetch_daily_series_bulk};
use crate::pool::run_pool;
use crate::sma::compute_sma;
use crate::types::{BelowSmaRecord, PricePoint, ScanResult, ScanStats, SmaWindow, SymbolOutcome};

// ---------------------------------------------------------------------------
// Ranker
// ---------------------------------------------------------------------------

/// Compare one symbol's latest close against the SMA of every configured
/// window. Emits a record only when the close is strictly below a defined,
/// non-zero SMA, so `pct_below` is strictly negative for every record.
///
/// A symbol contributes independently to zero, one, or several windows.
pub fn rank_symbol(symbol: &str, closes_latest_first: &[f64]) -> Vec<(SmaWindow, BelowSmaRecord)> {
    let Some(&close) = closes_latest_first.first() else {
        return Vec::new();
    };

    let mut records = Vec::new();
    for window in SmaWindow::ALL {
        let Some(sma) = compute_sma(closes_latest_first, window.value() as usize) else {
            continue;
        };
        if sma == 0.0 {
            // Guards the division below; cannot happen with real prices but
            // the input is not ours to trust.
            continue;
        }
        if close < sma {
            records.push((
                window,
                BelowSmaRecord {
                    symbol: symbol.to_string(),
                    close,
                    sma,
                    pct_below: (close - sma) / sma,
                },
            ));
        }
    }
    records
}

/// Turn one symbol's raw daily rows (oldest-first, newest-last) into a scan
/// outcome: gate on minimum history, keep the most recent closes, rank.
pub fn outcome_from_rows(symbol: &str, rows: &[PricePoint]) -> SymbolOutcome {
    if rows.len() < MIN_HISTORY {
        return SymbolOutcome::ShortHistory;
    }

    // Rows are newest-last; the ranker wants latest-first.
    let as_of = rows[rows.len() - 1].date.clone();
    let closes_latest_first: Vec<f64> = rows
        .iter()
        .rev()
        .take(HISTORY_SLICE)
        .map(|r| r.close)
        .collect();

    SymbolOutcome::Ranked {
        as_of,
        records: rank_symbol(symbol, &closes_latest_first),
    }
}

// ---------------------------------------------------------------------------
// Aggregator
// ---------------------------------------------------------------------------

async fn scan_symbol_daily(client: &reqwest::Client, cfg: &Config, symbol: &str) -> SymbolOutcome {
    match fetch_daily_history(client, cfg, symbol).await {
        Ok(rows) => outcome_from_rows(symbol, &rows),
        Err(e) => {
            debug!("fetch failed for {symbol}: {e}");
            SymbolOutcome::Failed
        }
    }
}

/// Run one full scan over the ticker universe using the configured provider.
/// Never fails: unavailable symbols shrink the result and bump the stats.
pub async fn run_scan(
    client: &reqwest::Client,
    cfg: &Config,
    universe: &[String],
) -> (ScanResult, ScanStats) {
    let (outcomes, batches_failed) = match cfg.provider {
        DataProvider::DailyCsv => {
            let outcomes = run_pool(universe.to_vec(), cfg.fetch_concurrency, |symbol| {
                let client = client.clone();
                let cfg = cfg.clone();
                async move { scan_symbol_daily(&client, &cfg, &symbol).await }
            })
            .await;
            (outcomes, 0)
        }
        DataProvider::BulkJson => {
            let (series_by_symbol, batches_failed) =
                fetch_daily_series_bulk(client, cfg, universe, HISTORY_SLICE, None).await;
            let outcomes = universe
                .iter()
                .map(|symbol| match series_by_symbol.get(symbol) {
                    Some(series) => SymbolOutcome::Ranked {
                        as_of: series.as_of.clone(),
                        records: rank_symbol(symbol, &series.closes_latest_first),
                    },
                    None => SymbolOutcome::Failed,
                })
                .collect();
            (outcomes, batches_failed)
        }
    };

    finalize(outcomes, batches_failed)
}

/// Merge per-symbol outcomes into the final result: accumulate per-window
/// records, pick the as-of date, sort each window ascending by `pct_below`
/// (most below first; stable, so ties keep accumulation order).
///
/// The as-of date is the maximum calendar date across resolved symbols —
/// deterministic for a given outcome set, unlike first-to-resolve.
pub fn finalize(outcomes: Vec<SymbolOutcome>, batches_failed: usize) -> (ScanResult, ScanStats) {
    let mut stats = ScanStats {
        symbols_total: outcomes.len(),
        batches_failed,
        ..Default::default()
    };

    let mut results_by_window: BTreeMap<u32, Vec<BelowSmaRecord>> = SmaWindow::ALL
        .iter()
        .map(|w| (w.value(), Vec::new()))
        .collect();
    let mut as_of = String::new();

    for outcome in outcomes {
        match outcome {
            SymbolOutcome::Ranked { as_of: sym_as_of, records } => {
                stats.symbols_ok += 1;
                // ISO dates compare chronologically as strings.
                if sym_as_of > as_of {
                    as_of = sym_as_of;
                }
                for (window, record) in records {
                    if let Some(bucket) = results_by_window.get_mut(&window.value()) {
                        bucket.push(record);
                    }
                }
            }
            SymbolOutcome::ShortHistory => stats.symbols_short_history += 1,
            SymbolOutcome::Failed => stats.symbols_failed += 1,
        }
    }

    for bucket in results_by_window.values_mut() {
        bucket.sort_by(|a, b| a.pct_below.total_cmp(&b.pct_below));
    }

    let count_by_window = results_by_window
        .iter()
        .map(|(w, bucket)| (*w, bucket.len()))
        .collect();

    (
        ScanResult {
            as_of,
            count_by_window,
            results_by_window,
        },
        stats,
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Latest-first closes: `latest` at index 0, then `rest` copies of `fill`.
    fn closes(latest: f64, fill: f64, rest: usize) -> Vec<f64> {
        let mut v = vec![latest];
        v.extend(std::iter::repeat(fill).take(rest));
        v
    }

    #[test]
    fn emitted_records_are_strictly_below_with_negative_pct() {
        // 210 closes at 100, latest at 90 — below every window's SMA.
        let series = closes(90.0, 100.0, 209);
        let records = rank_symbol("AAPL", &series);
        assert_eq!(records.len(), SmaWindow::ALL.len());
        for (_, r) in &records {
            assert!(r.close < r.sma);
            assert!(r.pct_below < 0.0, "pct_below={}", r.pct_below);
            let expected = (r.close - r.sma) / r.sma;
            assert!((r.pct_below - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn close_above_sma_emits_nothing() {
        let series = closes(110.0, 100.0, 209);
        assert!(rank_symbol("AAPL", &series).is_empty());
    }

    #[test]
    fn short_series_only_hits_windows_it_can_fill() {
        // 60 closes: enough for the 20 and 50 windows, not 120 or 200.
        let series = closes(90.0, 100.0, 59);
        let windows: Vec<u32> = rank_symbol("AAPL", &series)
            .iter()
            .map(|(w, _)| w.value())
            .collect();
        assert_eq!(windows, vec![20, 50]);
    }

    #[test]
    fn zero_sma_window_is_skipped() {
        // First 20 closes sum to zero: latest -1.0, eighteen 0.0, one 1.0.
        let mut series = vec![-1.0];
        series.extend(std::iter::repeat(0.0).take(18));
        series.push(1.0);
        // close (-1.0) < sma (0.0), but the window must be skipped anyway.
        assert!(rank_symbol("JUNK", &series).is_empty());
    }

    #[test]
    fn empty_series_emits_nothing() {
        assert!(rank_symbol("AAPL", &[]).is_empty());
    }

    fn rows(n: usize, close: f64, last_close: f64) -> Vec<PricePoint> {
        (0..n)
            .map(|i| PricePoint {
                date: format!("2024-{:02}-{:02}", 1 + i / 28, 1 + i % 28),
                close: if i == n - 1 { last_close } else { close },
            })
            .collect()
    }

    #[test]
    fn minimum_history_gate_skips_short_series() {
        let short = rows(MIN_HISTORY - 1, 100.0, 90.0);
        assert!(matches!(
            outcome_from_rows("AAPL", &short),
            SymbolOutcome::ShortHistory
        ));

        let enough = rows(MIN_HISTORY, 100.0, 90.0);
        assert!(matches!(
            outcome_from_rows("AAPL", &enough),
            SymbolOutcome::Ranked { .. }
        ));
    }

    #[test]
    fn outcome_takes_latest_close_and_date_from_last_row() {
        let data = rows(MIN_HISTORY, 100.0, 90.0);
        let last_date = data[data.len() - 1].date.clone();
        match outcome_from_rows("AAPL", &data) {
            SymbolOutcome::Ranked { as_of, records } => {
                assert_eq!(as_of, last_date);
                assert!(!records.is_empty());
                assert_eq!(records[0].1.close, 90.0);
            }
            other => panic!("expected Ranked, got {other:?}"),
        }
    }

    fn ranked(symbol: &str, as_of: &str, pct_below: f64) -> SymbolOutcome {
        SymbolOutcome::Ranked {
            as_of: as_of.to_string(),
            records: vec![(
                SmaWindow::W20,
                BelowSmaRecord {
                    symbol: symbol.to_string(),
                    close: 100.0 * (1.0 + pct_below),
                    sma: 100.0,
                    pct_below,
                },
            )],
        }
    }

    #[test]
    fn finalize_sorts_each_window_most_below_first() {
        let outcomes = vec![
            ranked("A", "2024-03-01", -0.01),
            ranked("B", "2024-03-01", -0.10),
            ranked("C", "2024-03-01", -0.03),
        ];
        let (result, _) = finalize(outcomes, 0);
        let bucket = &result.results_by_window[&20];
        let pcts: Vec<f64> = bucket.iter().map(|r| r.pct_below).collect();
        assert_eq!(pcts, vec![-0.10, -0.03, -0.01]);
        assert_eq!(result.count_by_window[&20], 3);
    }

    #[test]
    fn finalize_sort_is_stable_on_ties() {
        let outcomes = vec![
            ranked("FIRST", "2024-03-01", -0.05),
            ranked("SECOND", "2024-03-01", -0.05),
        ];
        let (result, _) = finalize(outcomes, 0);
        let symbols: Vec<&str> = result.results_by_window[&20]
            .iter()
            .map(|r| r.symbol.as_str())
            .collect();
        assert_eq!(symbols, vec!["FIRST", "SECOND"]);
    }

    #[test]
    fn finalize_absorbs_failures_and_counts_them() {
        let outcomes = vec![
            SymbolOutcome::Failed,
            ranked("Y", "2024-03-01", -0.02),
            SymbolOutcome::ShortHistory,
            ranked("Z", "2024-03-01", -0.04),
        ];
        let (result, stats) = finalize(outcomes, 1);

        assert_eq!(stats.symbols_total, 4);
        assert_eq!(stats.symbols_ok, 2);
        assert_eq!(stats.symbols_failed, 1);
        assert_eq!(stats.symbols_short_history, 1);
        assert_eq!(stats.batches_failed, 1);

        let symbols: Vec<&str> = result.results_by_window[&20]
            .iter()
            .map(|r| r.symbol.as_str())
            .collect();
        assert_eq!(symbols, vec!["Z", "Y"]);
    }

    #[test]
    fn finalize_as_of_is_maximum_resolved_date() {
        let outcomes = vec![
            ranked("A", "2024-03-01", -0.01),
            ranked("B", "2024-02-29", -0.02),
            ranked("C", "2024-03-04", -0.03),
        ];
        let (result, _) = finalize(outcomes, 0);
        assert_eq!(result.as_of, "2024-03-04");
    }

    #[test]
    fn finalize_empty_outcomes_yields_empty_windows() {
        let (result, stats) = finalize(Vec::new(), 0);
        assert_eq!(stats.symbols_total, 0);
        assert!(result.as_of.is_empty());
        for w in SmaWindow::ALL {
            assert_eq!(result.count_by_window[&w.value()], 0);
            assert!(result.results_by_window[&w.value()].is_empty());
        }
    }
}
