use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One trading session.
///
/// Prices are f64: the upstream APIs hand out JSON numbers, and every
/// consumer of a bar does floating-point indicator math anyway.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Absolute distance between open and close
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    /// High minus low
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    pub fn upper_shadow(&self) -> f64 {
        self.high - self.open.max(self.close)
    }

    pub fn lower_shadow(&self) -> f64 {
        self.open.min(self.close) - self.low
    }

    /// Closed above the open
    pub fn is_green(&self) -> bool {
        self.close > self.open
    }

    /// Closed below the open
    pub fn is_red(&self) -> bool {
        self.close < self.open
    }
}

/// Chronologically ordered bars for one symbol. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSeries", into = "RawSeries")]
pub struct Series {
    symbol: String,
    bars: Vec<Bar>,
}

#[derive(Serialize, Deserialize)]
struct RawSeries {
    symbol: String,
    bars: Vec<Bar>,
}

impl TryFrom<RawSeries> for Series {
    type Error = MarketDataError;

    fn try_from(raw: RawSeries) -> Result<Self> {
        Series::new(raw.symbol, raw.bars)
    }
}

impl From<Series> for RawSeries {
    fn from(series: Series) -> Self {
        RawSeries {
            symbol: series.symbol,
            bars: series.bars,
        }
    }
}

impl Series {
    /// Build a series, rejecting out-of-order or duplicate dates
    pub fn new(symbol: impl Into<String>, bars: Vec<Bar>) -> Result<Self> {
        let symbol = symbol.into();
        if let Some(pair) = bars.windows(2).find(|w| w[1].date <= w[0].date) {
            return Err(MarketDataError::InvalidSeries(format!(
                "{}: bar dated {} does not follow {}",
                symbol, pair[1].date, pair[0].date
            )));
        }
        Ok(Self { symbol, bars })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Most recent bar
    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }
}

/// Static company metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyInfo {
    pub symbol: String,
    pub display_name: String,
    pub sector: Option<String>,
}

impl CompanyInfo {
    /// Metadata with nothing but the ticker, used when a provider knows nothing else
    pub fn bare(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            display_name: symbol.to_string(),
            sector: None,
        }
    }
}

/// A news headline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Headline {
    pub title: String,
    pub publisher: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

impl Headline {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            publisher: None,
            published_at: None,
        }
    }
}

/// How much history to request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Lookback {
    #[serde(rename = "1mo")]
    OneMonth,
    #[serde(rename = "3mo")]
    ThreeMonths,
    #[serde(rename = "6mo")]
    SixMonths,
    #[default]
    #[serde(rename = "1y")]
    OneYear,
    #[serde(rename = "2y")]
    TwoYears,
    #[serde(rename = "5y")]
    FiveYears,
}

impl Lookback {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lookback::OneMonth => "1mo",
            Lookback::ThreeMonths => "3mo",
            Lookback::SixMonths => "6mo",
            Lookback::OneYear => "1y",
            Lookback::TwoYears => "2y",
            Lookback::FiveYears => "5y",
        }
    }
}

impl fmt::Display for Lookback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Lookback {
    type Err = MarketDataError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "1mo" => Ok(Lookback::OneMonth),
            "3mo" => Ok(Lookback::ThreeMonths),
            "6mo" => Ok(Lookback::SixMonths),
            "1y" => Ok(Lookback::OneYear),
            "2y" => Ok(Lookback::TwoYears),
            "5y" => Ok(Lookback::FiveYears),
            other => Err(MarketDataError::InvalidResponse(format!(
                "unsupported lookback: {}",
                other
            ))),
        }
    }
}

/// Data source health/status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceHealth {
    pub source: String,
    pub is_healthy: bool,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub success_rate: f64,
    pub avg_latency_ms: u64,
}

/// Error types for data retrieval
#[derive(Debug, thiserror::Error)]
pub enum MarketDataError {
    #[error("API request failed: {0}")]
    Api(String),

    #[error("Rate limit exceeded for {source_name}")]
    RateLimit {
        source_name: String,
        retry_after: Option<u64>,
    },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("Invalid series: {0}")]
    InvalidSeries(String),
}

/// Result type for data retrieval operations
pub type Result<T> = std::result::Result<T, MarketDataError>;

/// Source of daily bars and company metadata
#[async_trait::async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Get daily bars covering `lookback`
    async fn get_series(&self, symbol: &str, lookback: Lookback) -> Result<Series>;

    /// Get static company metadata
    async fn get_company_info(&self, symbol: &str) -> Result<CompanyInfo>;

    /// Get source health status
    async fn health(&self) -> SourceHealth;

    /// Source name
    fn name(&self) -> &str;
}

/// Source of recent headlines
#[async_trait::async_trait]
pub trait NewsSource: Send + Sync {
    /// Most recent headlines first, at most `limit`
    async fn get_headlines(&self, symbol: &str, limit: usize) -> Result<Vec<Headline>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(day: u32, close: f64) -> Bar {
        Bar {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1_000.0,
        }
    }

    #[test]
    fn test_series_rejects_unordered_dates() {
        let err = Series::new("AAPL", vec![bar(2, 10.0), bar(1, 11.0)]).unwrap_err();
        assert!(matches!(err, MarketDataError::InvalidSeries(_)));

        let dup = Series::new("AAPL", vec![bar(1, 10.0), bar(1, 11.0)]);
        assert!(dup.is_err());
    }

    #[test]
    fn test_series_accessors() {
        let series = Series::new("MSFT", vec![bar(1, 10.0), bar(2, 12.0)]).unwrap();
        assert_eq!(series.symbol(), "MSFT");
        assert_eq!(series.len(), 2);
        assert_eq!(series.closes(), vec![10.0, 12.0]);
        assert_eq!(series.last().map(|b| b.close), Some(12.0));
    }

    #[test]
    fn test_series_deserialize_validates() {
        let json = serde_json::json!({
            "symbol": "X",
            "bars": [
                {"date": "2024-01-02", "open": 1.0, "high": 1.0, "low": 1.0, "close": 1.0, "volume": 1.0},
                {"date": "2024-01-01", "open": 1.0, "high": 1.0, "low": 1.0, "close": 1.0, "volume": 1.0}
            ]
        });
        assert!(serde_json::from_value::<Series>(json).is_err());
    }

    #[test]
    fn test_candle_geometry() {
        let b = Bar {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            open: 10.0,
            high: 12.0,
            low: 7.0,
            close: 11.0,
            volume: 0.0,
        };
        assert_eq!(b.body(), 1.0);
        assert_eq!(b.range(), 5.0);
        assert_eq!(b.upper_shadow(), 1.0);
        assert_eq!(b.lower_shadow(), 3.0);
        assert!(b.is_green());
        assert!(!b.is_red());
    }

    #[test]
    fn test_lookback_parse() {
        assert_eq!("1y".parse::<Lookback>().unwrap(), Lookback::OneYear);
        assert_eq!(" 6MO ".parse::<Lookback>().unwrap(), Lookback::SixMonths);
        assert!("10y".parse::<Lookback>().is_err());
        assert_eq!(Lookback::default().to_string(), "1y");
    }
}
