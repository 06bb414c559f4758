//! Error types for the analysis engine

use market_data::MarketDataError;

/// A series is shorter than a component needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("insufficient data: need {required} bars, have {available}")]
pub struct InsufficientData {
    pub required: usize,
    pub available: usize,
}

impl InsufficientData {
    /// Ok when `available` meets `required`
    pub fn check(required: usize, available: usize) -> Result<(), Self> {
        if available < required {
            return Err(Self {
                required,
                available,
            });
        }
        Ok(())
    }
}

/// Why a single symbol was left out of a run. Never fatal.
#[derive(Debug, thiserror::Error)]
pub enum SymbolError {
    #[error(transparent)]
    InsufficientData(#[from] InsufficientData),

    #[error("failed to fetch {symbol}: {source}")]
    Fetch {
        symbol: String,
        #[source]
        source: MarketDataError,
    },

    #[error("computation failed for {symbol}: {reason}")]
    Computation { symbol: String, reason: String },
}

/// Run-level failures
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("benchmark {symbol} unavailable: {source}")]
    Benchmark {
        symbol: String,
        #[source]
        source: MarketDataError,
    },

    #[error("no sectors to analyze")]
    EmptyRequest,

    #[error("invalid engine configuration: {0}")]
    Config(String),
}
