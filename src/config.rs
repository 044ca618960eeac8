use crate::error::{AppError, Result};

pub const BULK_API_URL: &str = "https://api.twelvedata.com";
pub const DAILY_CSV_URL: &str = "https://stooq.com/q/d/l";

/// SMA windows computed for every symbol, in ascending order.
pub const SMA_WINDOWS: [u32; 4] = [20, 50, 120, 200];

/// A series with fewer observations than this is skipped entirely on the
/// batch path — the longest window (200) needs headroom over raw row count.
pub const MIN_HISTORY: usize = 205;

/// Number of most-recent closes kept per symbol before ranking.
pub const HISTORY_SLICE: usize = 210;

/// Maximum symbols per bulk time-series request.
pub const DEFAULT_FETCH_BATCH_SIZE: usize = 50;

/// Simultaneously in-flight per-symbol fetches on the daily-CSV path.
/// Backpressure against the data source's rate limits, not a correctness knob.
pub const DEFAULT_FETCH_CONCURRENCY: usize = 6;

/// Per-request timeout (seconds) after which a fetch counts as failed.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 20;

/// How often the background scan re-runs (seconds). Daily data — a few runs
/// per day is plenty.
pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 6 * 3600;

/// How long a per-window scan view stays cached (seconds).
pub const DEFAULT_VIEW_CACHE_TTL_SECS: u64 = 60;

/// Which market-data path feeds the background scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataProvider {
    /// Per-symbol plain-text daily history, fetched under the bounded pool.
    DailyCsv,
    /// Chunked multi-symbol JSON time series (requires an API key).
    BulkJson,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bulk_api_url: String,
    pub daily_csv_url: String,
    pub log_level: String,
    pub api_port: u16,
    /// Newline-delimited ticker universe file (TICKERS_PATH)
    pub tickers_path: String,
    /// Where the latest scan result JSON is persisted (SNAPSHOT_PATH)
    pub snapshot_path: String,
    /// Which fetch path the scan uses (DATA_PROVIDER: daily-csv | bulk-json)
    pub provider: DataProvider,
    /// API key for the bulk JSON provider (MARKET_API_KEY)
    pub api_key: String,
    pub fetch_batch_size: usize,
    pub fetch_concurrency: usize,
    pub fetch_timeout_secs: u64,
    pub scan_interval_secs: u64,
    pub view_cache_ttl_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let provider = match std::env::var("DATA_PROVIDER")
            .unwrap_or_else(|_| "daily-csv".to_string())
            .as_str()
        {
            "daily-csv" => DataProvider::DailyCsv,
            "bulk-json" => DataProvider::BulkJson,
            other => {
                return Err(AppError::Config(format!(
                    "DATA_PROVIDER must be daily-csv or bulk-json, got {other:?}"
                )))
            }
        };

        let api_key = std::env::var("MARKET_API_KEY").unwrap_or_default();
        if provider == DataProvider::BulkJson && api_key.is_empty() {
            return Err(AppError::Config(
                "DATA_PROVIDER=bulk-json requires MARKET_API_KEY".to_string(),
            ));
        }

        Ok(Self {
            bulk_api_url: std::env::var("BULK_API_URL")
                .unwrap_or_else(|_| BULK_API_URL.to_string()),
            daily_csv_url: std::env::var("DAILY_CSV_URL")
                .unwrap_or_else(|_| DAILY_CSV_URL.to_string()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            tickers_path: std::env::var("TICKERS_PATH")
                .unwrap_or_else(|_| "sp500.txt".to_string()),
            snapshot_path: std::env::var("SNAPSHOT_PATH")
                .unwrap_or_else(|_| "sma-scan.json".to_string()),
            provider,
            api_key,
            fetch_batch_size: std::env::var("FETCH_BATCH_SIZE")
                .unwrap_or_default()
                .parse::<usize>()
                .unwrap_or(DEFAULT_FETCH_BATCH_SIZE)
                .max(1),
            fetch_concurrency: std::env::var("FETCH_CONCURRENCY")
                .unwrap_or_default()
                .parse::<usize>()
                .unwrap_or(DEFAULT_FETCH_CONCURRENCY)
                .max(1),
            fetch_timeout_secs: std::env::var("FETCH_TIMEOUT_SECS")
                .unwrap_or_default()
                .parse::<u64>()
                .unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS),
            scan_interval_secs: std::env::var("SCAN_INTERVAL_SECS")
                .unwrap_or_default()
                .parse::<u64>()
                .unwrap_or(DEFAULT_SCAN_INTERVAL_SECS),
            view_cache_ttl_secs: std::env::var("VIEW_CACHE_TTL_SECS")
                .unwrap_or_default()
                .parse::<u64>()
                .unwrap_or(DEFAULT_VIEW_CACHE_TTL_SECS),
        })
    }
}
