use crate::types::*;
use anyhow::Context;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// On-disk layout of an offline data set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub series: Vec<Series>,
    #[serde(default)]
    pub companies: Vec<CompanyInfo>,
    #[serde(default)]
    pub headlines: HashMap<String, Vec<Headline>>,
}

/// Preloaded market data. Serves offline runs and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    series: HashMap<String, Series>,
    companies: HashMap<String, CompanyInfo>,
    headlines: HashMap<String, Vec<Headline>>,
    failing: HashSet<String>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(mut self, series: Series) -> Self {
        self.series.insert(key(series.symbol()), series);
        self
    }

    pub fn with_company(mut self, info: CompanyInfo) -> Self {
        self.companies.insert(key(&info.symbol), info);
        self
    }

    pub fn with_headlines(mut self, symbol: &str, headlines: Vec<Headline>) -> Self {
        self.headlines.insert(key(symbol), headlines);
        self
    }

    /// Every request for `symbol` fails with an API error
    pub fn with_failing(mut self, symbol: &str) -> Self {
        self.failing.insert(key(symbol));
        self
    }

    pub fn from_fixture(fixture: Fixture) -> Self {
        let mut source = Self::new();
        for series in fixture.series {
            source = source.with_series(series);
        }
        for info in fixture.companies {
            source = source.with_company(info);
        }
        for (symbol, headlines) in fixture.headlines {
            source = source.with_headlines(&symbol, headlines);
        }
        source
    }

    /// Load a JSON fixture written in the [`Fixture`] layout
    pub async fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read offline data {}", path.display()))?;
        let fixture: Fixture = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse offline data {}", path.display()))?;
        Ok(Self::from_fixture(fixture))
    }

    fn check(&self, symbol: &str) -> Result<()> {
        if self.failing.contains(&key(symbol)) {
            return Err(MarketDataError::Api(format!(
                "simulated failure for {}",
                symbol
            )));
        }
        Ok(())
    }
}

fn key(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

#[async_trait::async_trait]
impl MarketDataSource for InMemorySource {
    async fn get_series(&self, symbol: &str, _lookback: Lookback) -> Result<Series> {
        self.check(symbol)?;
        self.series
            .get(&key(symbol))
            .cloned()
            .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))
    }

    async fn get_company_info(&self, symbol: &str) -> Result<CompanyInfo> {
        self.check(symbol)?;
        Ok(self
            .companies
            .get(&key(symbol))
            .cloned()
            .unwrap_or_else(|| CompanyInfo::bare(&key(symbol))))
    }

    async fn health(&self) -> SourceHealth {
        SourceHealth {
            source: "memory".to_string(),
            is_healthy: true,
            last_success: Some(Utc::now()),
            last_error: None,
            success_rate: 1.0,
            avg_latency_ms: 0,
        }
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[async_trait::async_trait]
impl NewsSource for InMemorySource {
    async fn get_headlines(&self, symbol: &str, limit: usize) -> Result<Vec<Headline>> {
        self.check(symbol)?;
        Ok(self
            .headlines
            .get(&key(symbol))
            .map(|h| h.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}
