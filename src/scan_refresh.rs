use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::time::interval;
use tracing::{info, warn};

use crate::api::health::HealthState;
use crate::config::Config;
use crate::error::Result;
use crate::scanner::run_scan;
use crate::state::ScanStore;

/// Background task that runs the below-SMA scan on a fixed interval and
/// publishes the result. One scan runs immediately at startup so a fresh
/// deployment does not wait a full interval for data.
pub struct ScanRefresher {
    cfg: Config,
    universe: Vec<String>,
    store: Arc<ScanStore>,
    health: Arc<HealthState>,
    client: reqwest::Client,
}

impl ScanRefresher {
    pub fn new(
        cfg: Config,
        universe: Vec<String>,
        store: Arc<ScanStore>,
        health: Arc<HealthState>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self { cfg, universe, store, health, client })
    }

    pub async fn run(self) {
        let mut ticker = interval(Duration::from_secs(self.cfg.scan_interval_secs));

        loop {
            ticker.tick().await; // first tick fires immediately
            self.refresh().await;
        }
    }

    async fn refresh(&self) {
        info!(
            symbols = self.universe.len(),
            provider = ?self.cfg.provider,
            "Starting below-SMA scan",
        );
        let started = std::time::Instant::now();

        let (result, stats) = run_scan(&self.client, &self.cfg, &self.universe).await;

        info!(
            as_of = %result.as_of,
            ok = stats.symbols_ok,
            short_history = stats.symbols_short_history,
            failed = stats.symbols_failed,
            batches_failed = stats.batches_failed,
            elapsed_secs = started.elapsed().as_secs(),
            "Scan complete: {} of {} symbols ranked",
            stats.symbols_ok, stats.symbols_total,
        );
        if stats.symbols_failed > 0 || stats.batches_failed > 0 {
            warn!(
                "Scan dropped {} symbols and {} batches this run",
                stats.symbols_failed, stats.batches_failed,
            );
        }

        self.store.publish(result);
        if let Err(e) = self.store.save_snapshot(&self.cfg.snapshot_path) {
            // Serving continues from memory; only restart recovery is affected.
            warn!("Failed to write snapshot to {}: {e}", self.cfg.snapshot_path);
        }
        self.health.record_scan(&stats, now_secs());
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
