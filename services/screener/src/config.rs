//! Screener configuration
//!
//! Read from a YAML file and overridden by `SCREENER__SECTION__KEY`
//! environment variables. The engine gets an immutable snapshot per run.

use crate::factors::WeightTable;
use crate::ranker::EngineSettings;
use crate::recommendation::AccountSettings;
use crate::universe::{Sector, Universe};
use anyhow::{ensure, Context, Result};
use config::{Config, Environment, File};
use market_data::{Lookback, YahooSettings};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenerConfig {
    pub account: AccountSettings,
    pub screening: ScreeningConfig,
    pub scoring: WeightTable,
    pub provider: ProviderConfig,
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreeningConfig {
    /// Empty means every sector in the universe
    pub enabled_sectors: Vec<String>,
    pub top_opportunities: usize,
    pub min_score: f64,
    /// Cut the sector list before the run starts
    pub max_sectors: Option<usize>,
    pub max_symbols_per_sector: usize,
    pub benchmark: String,
    pub lookback: Lookback,
    pub concurrency: usize,
    pub headline_limit: usize,
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self {
            enabled_sectors: Vec::new(),
            top_opportunities: 20,
            min_score: 50.0,
            max_sectors: None,
            max_symbols_per_sector: 50,
            benchmark: "SPY".to_string(),
            lookback: Lookback::OneYear,
            concurrency: 1,
            headline_limit: 5,
        }
    }
}

impl ScreeningConfig {
    /// Sectors for one run: `requested` (or the configured list) resolved
    /// against the universe and cut to `max_sectors`
    pub fn select_sectors(&self, universe: &Universe, requested: Option<&[String]>) -> Vec<Sector> {
        let names = requested.unwrap_or(&self.enabled_sectors);
        let mut sectors = universe.resolve(names, self.max_symbols_per_sector);
        if let Some(max) = self.max_sectors {
            sectors.truncate(max);
        }
        sectors
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub max_concurrent_requests: usize,
    pub min_request_interval_ms: u64,
    pub news_enabled: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        let yahoo = YahooSettings::default();
        Self {
            base_url: yahoo.base_url,
            user_agent: yahoo.user_agent,
            timeout_secs: yahoo.timeout.as_secs(),
            max_concurrent_requests: yahoo.max_concurrent_requests,
            min_request_interval_ms: yahoo.min_request_interval.as_millis() as u64,
            news_enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub universe: PathBuf,
    pub results: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            universe: PathBuf::from("data/sectors.yaml"),
            results: PathBuf::from("storage/latest_results.json"),
        }
    }
}

impl ScreenerConfig {
    /// Load `path` (optional) layered with `SCREENER__*` environment variables
    pub fn load(path: &Path) -> Result<Self> {
        let cfg = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(Environment::with_prefix("SCREENER").separator("__"))
            .build()
            .context("building config")?;

        let screener: ScreenerConfig = cfg.try_deserialize().context("deserializing config")?;
        screener.validate()?;
        Ok(screener)
    }

    pub fn validate(&self) -> Result<()> {
        let account = &self.account;
        ensure!(account.capital > Decimal::ZERO, "account.capital must be positive");
        ensure!(
            account.position_size_pct > Decimal::ZERO
                && account.position_size_pct <= Decimal::ONE_HUNDRED,
            "account.position_size_pct must be in (0, 100]"
        );
        ensure!(
            account.stop_loss_pct >= Decimal::ZERO && account.stop_loss_pct < Decimal::ONE_HUNDRED,
            "account.stop_loss_pct must be in [0, 100)"
        );
        ensure!(
            account.take_profit_pct >= Decimal::ZERO,
            "account.take_profit_pct must not be negative"
        );

        let screening = &self.screening;
        ensure!(
            screening.top_opportunities >= 1,
            "screening.top_opportunities must be at least 1"
        );
        ensure!(screening.concurrency >= 1, "screening.concurrency must be at least 1");
        ensure!(
            !screening.benchmark.trim().is_empty(),
            "screening.benchmark must be set"
        );

        if let Some(weight) = self.scoring.invalid_weight() {
            anyhow::bail!("scoring weights must be non-negative, got {}", weight);
        }

        ensure!(
            self.provider.max_concurrent_requests >= 1,
            "provider.max_concurrent_requests must be at least 1"
        );
        Ok(())
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            benchmark: self.screening.benchmark.trim().to_uppercase(),
            lookback: self.screening.lookback,
            top_n: self.screening.top_opportunities,
            concurrency: self.screening.concurrency,
            headline_limit: self.screening.headline_limit,
            weights: self.scoring,
        }
    }

    pub fn yahoo_settings(&self) -> YahooSettings {
        YahooSettings {
            base_url: self.provider.base_url.clone(),
            user_agent: self.provider.user_agent.clone(),
            timeout: Duration::from_secs(self.provider.timeout_secs),
            max_concurrent_requests: self.provider.max_concurrent_requests,
            min_request_interval: Duration::from_millis(self.provider.min_request_interval_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::str::FromStr;

    fn write_yaml(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = ScreenerConfig::load(Path::new("/nonexistent/screener.yaml")).unwrap();
        assert_eq!(config.account.position_size_pct, Decimal::from(10));
        assert_eq!(config.screening.top_opportunities, 20);
        assert_eq!(config.scoring, WeightTable::default());
        assert_eq!(config.paths.universe, PathBuf::from("data/sectors.yaml"));
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let file = write_yaml(
            r#"
account:
  stop_loss_pct: 7.5
screening:
  enabled_sectors: [Technology, Energy]
  lookback: 6mo
  max_sectors: 1
scoring:
  bull:
    momentum: 0.5
"#,
        );
        let config = ScreenerConfig::load(file.path()).unwrap();
        assert_eq!(config.account.stop_loss_pct, Decimal::from_str("7.5").unwrap());
        assert_eq!(config.account.take_profit_pct, Decimal::from(10));
        assert_eq!(config.screening.enabled_sectors, vec!["Technology", "Energy"]);
        assert_eq!(config.screening.lookback, Lookback::SixMonths);
        assert_eq!(config.screening.max_sectors, Some(1));
        assert_eq!(config.scoring.bull.momentum, Some(0.5));
        assert_eq!(config.scoring.base.volume, 0.15);
    }

    #[test]
    fn test_environment_overrides_file() {
        let file = write_yaml("screening:\n  headline_limit: 3\n");
        std::env::set_var("SCREENER__SCREENING__HEADLINE_LIMIT", "8");
        let config = ScreenerConfig::load(file.path());
        std::env::remove_var("SCREENER__SCREENING__HEADLINE_LIMIT");
        assert_eq!(config.unwrap().screening.headline_limit, 8);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = ScreenerConfig::default();
        assert!(config.validate().is_ok());

        config.account.position_size_pct = Decimal::from(150);
        assert!(config.validate().is_err());

        let mut config = ScreenerConfig::default();
        config.screening.concurrency = 0;
        assert!(config.validate().is_err());

        let mut config = ScreenerConfig::default();
        config.scoring.base.trend = -0.3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_select_sectors_applies_limits() {
        let universe = Universe::from_yaml_str(
            r#"
sectors:
  - name: Technology
    symbols: [AAPL, MSFT, NVDA]
  - name: Energy
    symbols: [XOM, CVX]
"#,
        )
        .unwrap();

        let mut screening = ScreeningConfig {
            max_symbols_per_sector: 2,
            ..ScreeningConfig::default()
        };
        let all = screening.select_sectors(&universe, None);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].symbols, vec!["AAPL", "MSFT"]);

        screening.max_sectors = Some(1);
        let requested = vec!["Energy".to_string(), "Technology".to_string()];
        let cut = screening.select_sectors(&universe, Some(&requested));
        assert_eq!(cut.len(), 1);
        assert_eq!(cut[0].name, "Energy");
    }

    #[test]
    fn test_engine_settings_snapshot() {
        let mut config = ScreenerConfig::default();
        config.screening.benchmark = " qqq ".to_string();
        let settings = config.engine_settings();
        assert_eq!(settings.benchmark, "QQQ");
        assert_eq!(settings.top_n, 20);
        assert_eq!(config.yahoo_settings().timeout, Duration::from_secs(10));
    }
}
