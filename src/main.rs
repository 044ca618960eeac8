mod api;
mod config;
mod error;
mod fetcher;
mod pool;
mod scan_refresh;
mod scanner;
mod sma;
mod state;
mod types;
mod universe;

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::api::health::HealthState;
use crate::api::routes::{router, ApiState};
use crate::config::Config;
use crate::error::Result;
use crate::scan_refresh::ScanRefresher;
use crate::state::ScanStore;
use crate::universe::load_universe;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Ticker universe bootstrap ---
    let universe = load_universe(&cfg.tickers_path)?;

    // --- Scan state ---
    let store = ScanStore::new(Duration::from_secs(cfg.view_cache_ttl_secs));
    let health = Arc::new(HealthState::new());
    health.set_universe_size(universe.len());

    if !store.load_snapshot(&cfg.snapshot_path) {
        info!(
            "No snapshot at {}; queries return 503 until the first scan completes",
            cfg.snapshot_path,
        );
    }

    // --- Background scan ---
    let refresher = ScanRefresher::new(
        cfg.clone(),
        universe,
        Arc::clone(&store),
        Arc::clone(&health),
    )?;
    tokio::spawn(async move { refresher.run().await });

    // --- HTTP API server ---
    let app = router(ApiState { store, health });
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
