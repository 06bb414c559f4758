//! Screener Library
//!
//! Equity screening engine: regime detection, factor scoring, candle
//! patterns, dampened price targets and opportunity ranking.

pub mod config;
pub mod error;
pub mod factors;
pub mod indicators;
pub mod patterns;
pub mod prediction;
pub mod progress;
pub mod ranker;
pub mod recommendation;
pub mod regime;
pub mod sentiment;
pub mod snapshot;
pub mod universe;

#[cfg(test)]
mod fixtures;

// Re-export main types for convenience
pub use config::{PathsConfig, ProviderConfig, ScreenerConfig, ScreeningConfig};
pub use error::{EngineError, InsufficientData, SymbolError};
pub use factors::{build_factors, composite_score, Direction, FactorBundle, WeightTable};
pub use patterns::{detect_patterns, Pattern, PatternKind};
pub use prediction::{predict, Action, Confidence, PredictionSet};
pub use progress::{NoProgress, ProgressEntry, ProgressLog, ProgressReporter, TracingProgress};
pub use ranker::{Analysis, AnalysisRun, EngineSettings, OpportunityRanker};
pub use recommendation::{AccountSettings, Recommendation};
pub use regime::{detect_regime, Regime, RegimeInputs, RegimeReading};
pub use sentiment::{Sentiment, SentimentSummary};
pub use snapshot::ResultsStore;
pub use universe::{Sector, Universe};
