//! Shared health state for the /health endpoint.
//! Updated by the scan refresher, read by the API.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::ScanStats;

/// Scan liveness and the outcome counters of the most recent run.
#[derive(Default)]
pub struct HealthState {
    /// Unix seconds of the last completed scan (0 = none this process).
    pub last_scan_at_secs: AtomicU64,
    pub scans_completed: AtomicU64,
    pub universe_size: AtomicU64,
    pub last_symbols_ok: AtomicU64,
    pub last_symbols_short_history: AtomicU64,
    pub last_symbols_failed: AtomicU64,
    pub last_batches_failed: AtomicU64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_universe_size(&self, n: usize) {
        self.universe_size.store(n as u64, Ordering::Relaxed);
    }

    pub fn record_scan(&self, stats: &ScanStats, completed_at_secs: u64) {
        self.last_scan_at_secs.store(completed_at_secs, Ordering::Relaxed);
        self.scans_completed.fetch_add(1, Ordering::Relaxed);
        self.last_symbols_ok.store(stats.symbols_ok as u64, Ordering::Relaxed);
        self.last_symbols_short_history
            .store(stats.symbols_short_history as u64, Ordering::Relaxed);
        self.last_symbols_failed
            .store(stats.symbols_failed as u64, Ordering::Relaxed);
        self.last_batches_failed
            .store(stats.batches_failed as u64, Ordering::Relaxed);
    }

    pub fn last_scan_at_secs(&self) -> u64 {
        self.last_scan_at_secs.load(Ordering::Relaxed)
    }

    pub fn scans_completed(&self) -> u64 {
        self.scans_completed.load(Ordering::Relaxed)
    }
}
