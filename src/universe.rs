//! Ticker universe bootstrap from a static text file.

use std::collections::HashSet;
use std::path::Path;

use tracing::info;

use crate::error::{AppError, Result};

/// Load the ticker universe: one symbol per line, blanks and `#` comments
/// skipped, uppercased, de-duplicated preserving first occurrence. The list
/// is immutable for the duration of a scan.
pub fn load_universe(path: &str) -> Result<Vec<String>> {
    let raw = std::fs::read_to_string(Path::new(path)).map_err(|e| {
        AppError::Bootstrap(format!("cannot read ticker list at {path}: {e}"))
    })?;
    let symbols = parse_universe(&raw);
    if symbols.is_empty() {
        return Err(AppError::Bootstrap(format!("ticker list at {path} is empty")));
    }
    info!("Loaded {} tickers from {path}", symbols.len());
    Ok(symbols)
}

pub fn parse_universe(raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.lines()
        .map(|line| line.trim().to_uppercase())
        .filter(|s| !s.is_empty() && !s.starts_with('#'))
        .filter(|s| seen.insert(s.clone()))
        .collect()
}
