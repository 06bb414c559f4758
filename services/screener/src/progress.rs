//! Run progress reporting, passed in by the caller for one run

use crate::error::SymbolError;
use crate::regime::RegimeReading;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// Observer for one analysis run. Every hook defaults to a no-op.
pub trait ProgressReporter: Send + Sync {
    fn run_started(&self, _run_id: Uuid, _sectors: &[String], _benchmark: &str) {}

    fn regime_detected(&self, _reading: &RegimeReading) {}

    fn sector_started(&self, _sector: &str, _symbols: usize) {}

    fn symbol_analyzed(&self, _symbol: &str, _score: f64) {}

    fn symbol_skipped(&self, _symbol: &str, _error: &SymbolError) {}

    fn run_finished(&self, _analyzed: usize, _elapsed: Duration) {}
}

/// Reports nothing
pub struct NoProgress;

impl ProgressReporter for NoProgress {}

/// Reports through `tracing`. Skipped symbols are already logged by the ranker.
pub struct TracingProgress;

impl ProgressReporter for TracingProgress {
    fn run_started(&self, run_id: Uuid, sectors: &[String], benchmark: &str) {
        info!(
            "Starting analysis run {} over {} sectors (benchmark {})",
            run_id,
            sectors.len(),
            benchmark
        );
    }

    fn regime_detected(&self, reading: &RegimeReading) {
        info!(
            "Market regime: {} (volatility {:.1}%)",
            reading.regime,
            reading.volatility * 100.0
        );
    }

    fn sector_started(&self, sector: &str, symbols: usize) {
        info!("Analyzing {} ({} stocks)", sector, symbols);
    }


    fn run_finished(&self, analyzed: usize, elapsed: Duration) {
        info!(
            "Analysis complete: {} stocks in {:.1}s",
            analyzed,
            elapsed.as_secs_f64()
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressLevel {
    Info,
    Warn,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub level: ProgressLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Keeps every event of one run for later inspection
#[derive(Debug, Default)]
pub struct ProgressLog {
    entries: Mutex<Vec<ProgressEntry>>,
}

impl ProgressLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, level: ProgressLevel, message: String) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(ProgressEntry {
                level,
                message,
                timestamp: Utc::now(),
            });
        }
    }

    pub fn entries(&self) -> Vec<ProgressEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

impl ProgressReporter for ProgressLog {
    fn run_started(&self, run_id: Uuid, sectors: &[String], benchmark: &str) {
        self.push(
            ProgressLevel::Info,
            format!("Run {} started: {} vs {}", run_id, sectors.join(", "), benchmark),
        );
    }

    fn regime_detected(&self, reading: &RegimeReading) {
        self.push(
            ProgressLevel::Info,
            format!("Market regime: {}", reading.regime),
        );
    }

    fn sector_started(&self, sector: &str, symbols: usize) {
        self.push(
            ProgressLevel::Info,
            format!("Analyzing {} ({} stocks)", sector, symbols),
        );
    }

    fn symbol_analyzed(&self, symbol: &str, score: f64) {
        self.push(ProgressLevel::Info, format!("{} scored {:.1}", symbol, score));
    }

    fn symbol_skipped(&self, symbol: &str, error: &SymbolError) {
        self.push(ProgressLevel::Warn, format!("Skipped {}: {}", symbol, error));
    }

    fn run_finished(&self, analyzed: usize, elapsed: Duration) {
        self.push(
            ProgressLevel::Info,
            format!("Analyzed {} stocks in {:.1}s", analyzed, elapsed.as_secs_f64()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InsufficientData;

    #[test]
    fn test_progress_log_records_levels() {
        let log = ProgressLog::new();
        log.sector_started("Technology", 50);
        log.symbol_skipped(
            "XYZ",
            &SymbolError::InsufficientData(InsufficientData {
                required: 60,
                available: 12,
            }),
        );

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].level, ProgressLevel::Info);
        assert_eq!(entries[0].message, "Analyzing Technology (50 stocks)");
        assert_eq!(entries[1].level, ProgressLevel::Warn);
        assert!(entries[1].message.contains("need 60 bars, have 12"));
    }
}
