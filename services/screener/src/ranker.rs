//! Opportunity ranker: drives per-symbol analysis over a universe and
//! ranks the survivors by composite score.

use crate::error::{EngineError, InsufficientData, SymbolError};
use crate::factors::{build_factors, composite_score, FactorBundle, WeightTable, MIN_FACTOR_BARS};
use crate::patterns::{detect_patterns, Pattern};
use crate::prediction::{predict, PredictionSet};
use crate::progress::ProgressReporter;
use crate::regime::{detect_regime, Regime, RegimeReading};
use crate::sentiment::{fetch_sentiment, SentimentSummary};
use crate::universe::Sector;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use market_data::{CompanyInfo, Lookback, MarketDataError, MarketDataSource, NewsSource, Series};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

/// Immutable per-run engine parameters
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub benchmark: String,
    pub lookback: Lookback,
    pub top_n: usize,
    /// Symbols analyzed at once; 1 is strictly sequential
    pub concurrency: usize,
    /// Headlines that take part in the sentiment vote
    pub headline_limit: usize,
    pub weights: WeightTable,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            benchmark: "SPY".to_string(),
            lookback: Lookback::OneYear,
            top_n: 20,
            concurrency: 1,
            headline_limit: 5,
            weights: WeightTable::default(),
        }
    }
}

/// Everything known about one symbol after a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub symbol: String,
    pub company_name: String,
    pub sector: String,
    pub current_price: f64,
    pub score: f64,
    pub factors: FactorBundle,
    pub patterns: Vec<Pattern>,
    pub news: SentimentSummary,
    pub predictions: PredictionSet,
    pub regime: Regime,
}

/// Result of one run, ranked by score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRun {
    pub run_id: Uuid,
    pub regime: RegimeReading,
    pub total_analyzed: usize,
    pub top_opportunities: Vec<Analysis>,
    pub all_stocks: Vec<Analysis>,
    pub timestamp: DateTime<Utc>,
}

impl AnalysisRun {
    pub fn find(&self, symbol: &str) -> Option<&Analysis> {
        self.all_stocks
            .iter()
            .find(|a| a.symbol.eq_ignore_ascii_case(symbol.trim()))
    }

    /// Top opportunities scoring at least `min_score`
    pub fn above_min_score(&self, min_score: f64) -> impl Iterator<Item = &Analysis> {
        self.top_opportunities
            .iter()
            .filter(move |a| a.score >= min_score)
    }
}

/// Sort descending by score. Stable: equal scores keep their order.
pub fn rank(analyses: &mut [Analysis]) {
    analyses.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
}

/// Fetched inputs for one symbol
pub struct SymbolData<'a> {
    pub series: &'a Series,
    pub info: &'a CompanyInfo,
    /// Universe sector, used when the provider has none
    pub sector: &'a str,
    pub news: SentimentSummary,
}

/// Pure per-symbol analysis. Panics and non-finite numbers come back as
/// [`SymbolError::Computation`].
pub fn analyze_series(
    data: SymbolData<'_>,
    regime: Regime,
    weights: &WeightTable,
) -> Result<Analysis, SymbolError> {
    let symbol = data.series.symbol().to_string();
    match catch_unwind(AssertUnwindSafe(|| compute(data, regime, weights))) {
        Ok(result) => result,
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panic during analysis".to_string());
            Err(SymbolError::Computation { symbol, reason })
        }
    }
}

fn compute(
    data: SymbolData<'_>,
    regime: Regime,
    weights: &WeightTable,
) -> Result<Analysis, SymbolError> {
    let series = data.series;
    let symbol = series.symbol().to_string();

    let factors = build_factors(series)?;
    if !factors.is_finite() {
        return Err(SymbolError::Computation {
            symbol,
            reason: "non-finite factor value".to_string(),
        });
    }

    let score = composite_score(&factors, regime, weights);
    if !score.is_finite() {
        return Err(SymbolError::Computation {
            symbol,
            reason: format!("non-finite score {}", score),
        });
    }

    let patterns = detect_patterns(series);
    let predictions = predict(series, &factors, regime)?;

    Ok(Analysis {
        company_name: data.info.display_name.clone(),
        sector: data
            .info
            .sector
            .clone()
            .unwrap_or_else(|| data.sector.to_string()),
        current_price: factors.price(),
        score,
        factors,
        patterns,
        news: data.news,
        predictions,
        regime,
        symbol,
    })
}

/// Runs the analysis pipeline against a market data source.
///
/// Holds no state between runs; the caller keeps the results.
pub struct OpportunityRanker {
    market: Arc<dyn MarketDataSource>,
    news: Option<Arc<dyn NewsSource>>,
    settings: EngineSettings,
}

impl OpportunityRanker {
    pub fn new(
        market: Arc<dyn MarketDataSource>,
        settings: EngineSettings,
    ) -> Result<Self, EngineError> {
        if settings.concurrency == 0 {
            return Err(EngineError::Config("concurrency must be at least 1".to_string()));
        }
        if settings.top_n == 0 {
            return Err(EngineError::Config("top_n must be at least 1".to_string()));
        }
        if let Some(weight) = settings.weights.invalid_weight() {
            return Err(EngineError::Config(format!("invalid factor weight {}", weight)));
        }

        Ok(Self {
            market,
            news: None,
            settings,
        })
    }

    pub fn with_news(mut self, news: Arc<dyn NewsSource>) -> Self {
        self.news = Some(news);
        self
    }

    /// Fetch the benchmark and classify it. A failed fetch is fatal.
    pub async fn detect_regime(&self) -> Result<RegimeReading, EngineError> {
        let benchmark = &self.settings.benchmark;
        let series = self
            .market
            .get_series(benchmark, self.settings.lookback)
            .await
            .map_err(|source| EngineError::Benchmark {
                symbol: benchmark.clone(),
                source,
            })?;
        Ok(detect_regime(&series))
    }

    /// Fetch and analyze one symbol
    pub async fn analyze_symbol(
        &self,
        symbol: &str,
        sector: &str,
        regime: Regime,
    ) -> Result<Analysis, SymbolError> {
        let fetch_error = |source| SymbolError::Fetch {
            symbol: symbol.to_string(),
            source,
        };

        let series = self
            .market
            .get_series(symbol, self.settings.lookback)
            .await
            .map_err(fetch_error)?;
        InsufficientData::check(MIN_FACTOR_BARS, series.len())?;

        // metadata is display-only; an unknown ticker still has its bars
        let info = match self.market.get_company_info(symbol).await {
            Ok(info) => info,
            Err(MarketDataError::SymbolNotFound(_)) => {
                debug!("No company metadata for {}", symbol);
                CompanyInfo::bare(symbol)
            }
            Err(e) => return Err(fetch_error(e)),
        };

        let news = fetch_sentiment(self.news.as_deref(), symbol, self.settings.headline_limit).await;
        debug!("{}: {} bars, {} headlines", symbol, series.len(), news.news_count);

        analyze_series(
            SymbolData {
                series: &series,
                info: &info,
                sector,
                news,
            },
            regime,
            &self.settings.weights,
        )
    }

    /// Analyze every symbol of `sectors` and rank the results.
    ///
    /// Symbols that fail are reported to `progress` and left out. Only a
    /// benchmark failure aborts the run.
    pub async fn run(
        &self,
        sectors: &[Sector],
        progress: &dyn ProgressReporter,
    ) -> Result<AnalysisRun, EngineError> {
        if sectors.is_empty() {
            return Err(EngineError::EmptyRequest);
        }

        let run_id = Uuid::new_v4();
        let started = Instant::now();
        let names: Vec<String> = sectors.iter().map(|s| s.name.clone()).collect();
        progress.run_started(run_id, &names, &self.settings.benchmark);

        let regime = self.detect_regime().await?;
        progress.regime_detected(&regime);

        let mut analyses = Vec::new();
        for sector in sectors {
            progress.sector_started(&sector.name, sector.symbols.len());

            // buffered keeps results in symbol order whatever the concurrency
            let results: Vec<(&String, Result<Analysis, SymbolError>)> =
                stream::iter(sector.symbols.iter())
                    .map(move |symbol| async move {
                        let result = self
                            .analyze_symbol(symbol, &sector.name, regime.regime)
                            .await;
                        (symbol, result)
                    })
                    .buffered(self.settings.concurrency)
                    .collect()
                    .await;

            for (symbol, result) in results {
                match result {
                    Ok(analysis) => {
                        progress.symbol_analyzed(symbol, analysis.score);
                        analyses.push(analysis);
                    }
                    Err(e) => {
                        warn!("Skipping {}: {}", symbol, e);
                        progress.symbol_skipped(symbol, &e);
                    }
                }
            }
        }

        rank(&mut analyses);
        progress.run_finished(analyses.len(), started.elapsed());

        Ok(AnalysisRun {
            run_id,
            regime,
            total_analyzed: analyses.len(),
            top_opportunities: analyses.iter().take(self.settings.top_n).cloned().collect(),
            all_stocks: analyses,
            timestamp: Utc::now(),
        })
    }
}
