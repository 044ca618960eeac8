//! Process-wide store for the latest scan result.
//!
//! Holds the most recent [`ScanResult`] published by the background scan, a
//! small TTL cache of per-window views, and the JSON snapshot used to answer
//! queries across restarts before the first scan of a process completes.

use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{info, warn};

use crate::error::Result;
use crate::types::{ScanResult, ScanView, SmaWindow};

struct CachedView {
    expires_at: Instant,
    view: ScanView,
}

pub struct ScanStore {
    /// Latest published result; None until the first publish or snapshot load.
    latest: RwLock<Option<Arc<ScanResult>>>,
    /// window value → cached view. Cleared on every publish.
    views: DashMap<u32, CachedView>,
    view_ttl: Duration,
}

impl ScanStore {
    pub fn new(view_ttl: Duration) -> Arc<Self> {
        Arc::new(Self {
            latest: RwLock::new(None),
            views: DashMap::new(),
            view_ttl,
        })
    }

    /// Replace the latest result and drop all cached views.
    pub fn publish(&self, result: ScanResult) {
        let mut guard = self.latest.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(Arc::new(result));
        drop(guard);
        self.views.clear();
    }

    pub fn latest(&self) -> Option<Arc<ScanResult>> {
        self.latest
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Single-window view of the latest result, served through the TTL cache.
    /// Returns None while no scan data exists at all. A window with no
    /// records yields an empty `below`, not None.
    pub fn view(&self, window: SmaWindow) -> Option<ScanView> {
        let key = window.value();

        if let Some(cached) = self.views.get(&key) {
            if cached.expires_at > Instant::now() {
                return Some(cached.view.clone());
            }
        }

        let latest = self.latest()?;
        let below = latest
            .results_by_window
            .get(&key)
            .cloned()
            .unwrap_or_default();
        let view = ScanView {
            window: key,
            as_of: latest.as_of.clone(),
            count: below.len(),
            below,
        };

        self.views.insert(
            key,
            CachedView {
                expires_at: Instant::now() + self.view_ttl,
                view: view.clone(),
            },
        );
        Some(view)
    }

    /// Persist the latest result as pretty-printed JSON. No latest result is
    /// a no-op.
    pub fn save_snapshot(&self, path: &str) -> Result<()> {
        let Some(latest) = self.latest() else {
            return Ok(());
        };
        let mut body = serde_json::to_string_pretty(latest.as_ref())?;
        body.push('\n');
        std::fs::write(path, body)?;
        Ok(())
    }

    /// Load a previously saved snapshot, if one exists. Returns whether a
    /// snapshot was loaded. A missing file is normal on first deploy; a
    /// corrupt one is logged and ignored.
    pub fn load_snapshot(&self, path: &str) -> bool {
        if !Path::new(path).exists() {
            return false;
        }
        let raw = match std::fs::read_to_string(path) {
            Ok(r) => r,
            Err(e) => {
                warn!("Snapshot at {path} unreadable: {e}");
                return false;
            }
        };
        match serde_json::from_str::<ScanResult>(&raw) {
            Ok(result) => {
                info!("Loaded scan snapshot from {path} (asOf {})", result.as_of);
                self.publish(result);
                true
            }
            Err(e) => {
                warn!("Snapshot at {path} is corrupt, ignoring: {e}");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
