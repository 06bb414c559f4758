use crate::types::*;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const YAHOO_QUERY_BASE: &str = "https://query1.finance.yahoo.com";
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; screener/0.1)";

/// Request outcomes, read by `health()` without touching the network
#[derive(Default)]
struct HealthTracker {
    successes: AtomicU64,
    failures: AtomicU64,
    /// Failures since the last success
    failure_streak: AtomicU64,
    /// Millis since epoch, 0 until the first success
    last_success_ms: AtomicI64,
    last_latency_ms: AtomicU64,
}

impl HealthTracker {
    fn record_success(&self, latency_ms: u64) {
        self.successes.fetch_add(1, Ordering::Relaxed);
        self.failure_streak.store(0, Ordering::Relaxed);
        self.last_success_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
        self.last_latency_ms.store(latency_ms, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        self.failure_streak.fetch_add(1, Ordering::Relaxed);
    }

    fn last_success(&self) -> Option<DateTime<Utc>> {
        match self.last_success_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => DateTime::from_timestamp_millis(ms),
        }
    }

    /// At least one success and nothing failed since
    fn is_healthy(&self) -> bool {
        self.last_success().is_some() && self.failure_streak.load(Ordering::Relaxed) == 0
    }

    /// 1.0 before the first request
    fn success_rate(&self) -> f64 {
        let successes = self.successes.load(Ordering::Relaxed);
        let total = successes + self.failures.load(Ordering::Relaxed);
        if total == 0 {
            return 1.0;
        }
        successes as f64 / total as f64
    }
}

/// Connection settings for [`YahooFinanceClient`]
#[derive(Debug, Clone)]
pub struct YahooSettings {
    pub base_url: String,
    pub user_agent: String,
    pub timeout: Duration,
    /// Upper bound on in-flight requests
    pub max_concurrent_requests: usize,
    /// Minimum spacing between two requests
    pub min_request_interval: Duration,
}

impl Default for YahooSettings {
    fn default() -> Self {
        Self {
            base_url: YAHOO_QUERY_BASE.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(10),
            max_concurrent_requests: 1,
            min_request_interval: Duration::from_millis(100),
        }
    }
}

/// Yahoo Finance client: daily bars from the chart API, company metadata
/// and headlines from the search API.
///
/// Failures are returned as-is; the caller decides what a failed symbol means.
pub struct YahooFinanceClient {
    client: Client,
    base_url: String,
    rate_limiter: tokio::sync::Semaphore,
    min_request_interval: Duration,
    last_request: tokio::sync::Mutex<Instant>,
    health_tracker: HealthTracker,
}

impl YahooFinanceClient {
    pub fn new(settings: YahooSettings) -> Self {
        let client = Client::builder()
            .timeout(settings.timeout)
            .user_agent(settings.user_agent.clone())
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            rate_limiter: tokio::sync::Semaphore::new(settings.max_concurrent_requests.max(1)),
            min_request_interval: settings.min_request_interval,
            last_request: tokio::sync::Mutex::new(
                Instant::now()
                    .checked_sub(settings.min_request_interval)
                    .unwrap_or_else(Instant::now),
            ),
            health_tracker: HealthTracker::default(),
        }
    }

    /// Rate-limited GET returning the decoded JSON body
    async fn rate_limited_request<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
        symbol: &str,
    ) -> Result<T> {
        let _permit = self.rate_limiter.acquire().await.map_err(|e| {
            self.health_tracker.record_failure();
            MarketDataError::Api(e.to_string())
        })?;

        {
            let mut last = self.last_request.lock().await;
            let elapsed = last.elapsed();
            if elapsed < self.min_request_interval {
                tokio::time::sleep(self.min_request_interval - elapsed).await;
            }
            *last = Instant::now();
        }

        let url = format!("{}{}", self.base_url, endpoint);
        debug!("GET {} {:?}", url, query);
        let request_start = Instant::now();

        let response = match self.client.get(&url).query(query).send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!("Yahoo request for {} failed: {}", symbol, e);
                self.health_tracker.record_failure();
                return Err(MarketDataError::Api(e.to_string()));
            }
        };

        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            debug!("Yahoo has no {} for {}", endpoint, symbol);
            self.health_tracker.record_failure();
            return Err(MarketDataError::SymbolNotFound(symbol.to_string()));
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            warn!("Yahoo rate limited while fetching {}", symbol);
            self.health_tracker.record_failure();
            return Err(MarketDataError::RateLimit {
                source_name: "yahoo".to_string(),
                retry_after,
            });
        }

        if !status.is_success() {
            self.health_tracker.record_failure();
            let text = response.text().await.unwrap_or_default();
            warn!("Yahoo returned {} for {}", status, symbol);
            return Err(MarketDataError::Api(format!(
                "Yahoo API error ({}): {}",
                status, text
            )));
        }

        let latency_ms = request_start.elapsed().as_millis() as u64;
        self.health_tracker.record_success(latency_ms);

        response.json::<T>().await.map_err(|e| {
            warn!("Undecodable Yahoo response for {}: {}", symbol, e);
            self.health_tracker.record_failure();
            MarketDataError::InvalidResponse(e.to_string())
        })
    }

    /// Daily bars for `symbol` over `lookback`
    pub async fn get_series(&self, symbol: &str, lookback: Lookback) -> Result<Series> {
        let endpoint = format!("/v8/finance/chart/{}", symbol);
        let query = [
            ("range", lookback.as_str().to_string()),
            ("interval", "1d".to_string()),
            ("includePrePost", "false".to_string()),
        ];

        let response: ChartResponse = self.rate_limited_request(&endpoint, &query, symbol).await?;

        if let Some(err) = response.chart.error {
            return Err(MarketDataError::Api(format!(
                "{}: {}",
                err.code, err.description
            )));
        }

        let result = response
            .chart
            .result
            .and_then(|r| r.into_iter().next())
            .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))?;

        let bars = chart_to_bars(&result)?;
        debug!("Yahoo returned {} bars for {}", bars.len(), symbol);
        Series::new(symbol.to_uppercase(), bars)
    }

    async fn search(&self, symbol: &str, news_count: usize) -> Result<SearchResponse> {
        let query = [
            ("q", symbol.to_string()),
            ("quotesCount", "5".to_string()),
            ("newsCount", news_count.to_string()),
        ];
        self.rate_limited_request("/v1/finance/search", &query, symbol)
            .await
    }

    /// Company display name and sector. A search that does not list the
    /// ticker itself yields bare metadata.
    pub async fn get_company_info(&self, symbol: &str) -> Result<CompanyInfo> {
        let response = self.search(symbol, 0).await?;

        let Some(quote) = response
            .quotes
            .into_iter()
            .find(|q| q.symbol.eq_ignore_ascii_case(symbol))
        else {
            debug!("Yahoo search has no exact match for {}", symbol);
            return Ok(CompanyInfo::bare(&symbol.to_uppercase()));
        };

        let display_name = quote
            .longname
            .or(quote.shortname)
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| symbol.to_uppercase());

        Ok(CompanyInfo {
            symbol: symbol.to_uppercase(),
            display_name,
            sector: quote.sector.filter(|s| !s.trim().is_empty()),
        })
    }

    /// Most recent headlines for `symbol`
    pub async fn get_headlines(&self, symbol: &str, limit: usize) -> Result<Vec<Headline>> {
        let response = self.search(symbol, limit).await?;

        Ok(response
            .news
            .into_iter()
            .take(limit)
            .map(|n| Headline {
                title: n.title,
                publisher: n.publisher,
                published_at: n
                    .provider_publish_time
                    .and_then(|ts| DateTime::from_timestamp(ts, 0)),
            })
            .collect())
    }

    /// Health from recorded request outcomes
    pub async fn health(&self) -> SourceHealth {
        let tracker = &self.health_tracker;
        let streak = tracker.failure_streak.load(Ordering::Relaxed);

        SourceHealth {
            source: "yahoo".to_string(),
            is_healthy: tracker.is_healthy(),
            last_success: tracker.last_success(),
            last_error: (streak > 0).then(|| format!("{} consecutive failed requests", streak)),
            success_rate: tracker.success_rate(),
            avg_latency_ms: tracker.last_latency_ms.load(Ordering::Relaxed),
        }
    }
}

/// Zip the chart's column arrays into bars, dropping sessions with any gap
fn chart_to_bars(result: &ChartResult) -> Result<Vec<Bar>> {
    let quote = result
        .indicators
        .quote
        .first()
        .ok_or_else(|| MarketDataError::InvalidResponse("chart has no quote block".to_string()))?;

    let timestamps = result.timestamp.as_deref().unwrap_or_default();
    let mut bars: Vec<Bar> = Vec::with_capacity(timestamps.len());

    for (i, ts) in timestamps.iter().enumerate() {
        let column = |v: &Vec<Option<f64>>| v.get(i).copied().flatten();
        let (Some(open), Some(high), Some(low), Some(close), Some(volume)) = (
            column(&quote.open),
            column(&quote.high),
            column(&quote.low),
            column(&quote.close),
            column(&quote.volume),
        ) else {
            continue;
        };

        let Some(date) = DateTime::from_timestamp(*ts, 0).map(|dt| dt.date_naive()) else {
            continue;
        };

        // Yahoo occasionally repeats the live session; keep the latest print
        if let Some(prev) = bars.last_mut() {
            if prev.date == date {
                *prev = Bar {
                    date,
                    open,
                    high,
                    low,
                    close,
                    volume,
                };
                continue;
            }
        }

        bars.push(Bar {
            date,
            open,
            high,
            low,
            close,
            volume,
        });
    }

    Ok(bars)
}

// Response types for the Yahoo chart API
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartEnvelope,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    timestamp: Option<Vec<i64>>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

// Response types for the Yahoo search API
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    quotes: Vec<SearchQuote>,
    #[serde(default)]
    news: Vec<SearchNews>,
}

#[derive(Debug, Deserialize)]
struct SearchQuote {
    symbol: String,
    longname: Option<String>,
    shortname: Option<String>,
    sector: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchNews {
    title: String,
    publisher: Option<String>,
    #[serde(rename = "providerPublishTime")]
    provider_publish_time: Option<i64>,
}

#[async_trait::async_trait]
impl MarketDataSource for YahooFinanceClient {
    async fn get_series(&self, symbol: &str, lookback: Lookback) -> Result<Series> {
        YahooFinanceClient::get_series(self, symbol, lookback).await
    }

    async fn get_company_info(&self, symbol: &str) -> Result<CompanyInfo> {
        YahooFinanceClient::get_company_info(self, symbol).await
    }

    async fn health(&self) -> SourceHealth {
        YahooFinanceClient::health(self).await
    }

    fn name(&self) -> &str {
        "yahoo"
    }
}

#[async_trait::async_trait]
impl NewsSource for YahooFinanceClient {
    async fn get_headlines(&self, symbol: &str, limit: usize) -> Result<Vec<Headline>> {
        YahooFinanceClient::get_headlines(self, symbol, limit).await
    }
}
