//! Market regime detection from a benchmark series

use crate::error::InsufficientData;
use crate::indicators::{annualized_volatility, momentum, sma};
use market_data::Series;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bars needed before a regime can be classified
pub const MIN_REGIME_BARS: usize = 100;

/// Annualized volatility above which a trendless market counts as volatile
const VOLATILE_THRESHOLD: f64 = 0.30;

/// Coarse market condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    StrongBull,
    Bull,
    Sideways,
    Bear,
    StrongBear,
    Volatile,
    #[default]
    Unknown,
}

impl Regime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Regime::StrongBull => "strong_bull",
            Regime::Bull => "bull",
            Regime::Sideways => "sideways",
            Regime::Bear => "bear",
            Regime::StrongBear => "strong_bear",
            Regime::Volatile => "volatile",
            Regime::Unknown => "unknown",
        }
    }

    pub fn is_bullish(&self) -> bool {
        matches!(self, Regime::StrongBull | Regime::Bull)
    }

    pub fn is_bearish(&self) -> bool {
        matches!(self, Regime::StrongBear | Regime::Bear)
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The six numbers classification depends on
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeInputs {
    pub price: f64,
    pub ma20: f64,
    pub ma50: f64,
    pub ma100: f64,
    /// Annualized 20-day return volatility
    pub vol20: f64,
    pub momentum_3m: f64,
}

impl RegimeInputs {
    /// Measure the benchmark. Needs at least [`MIN_REGIME_BARS`] bars.
    pub fn measure(series: &Series) -> Result<Self, InsufficientData> {
        InsufficientData::check(MIN_REGIME_BARS, series.len())?;

        let closes = series.closes();
        let short = InsufficientData {
            required: MIN_REGIME_BARS,
            available: closes.len(),
        };

        Ok(Self {
            price: *closes.last().ok_or(short)?,
            ma20: sma(&closes, 20).ok_or(short)?,
            ma50: sma(&closes, 50).ok_or(short)?,
            ma100: sma(&closes, 100).ok_or(short)?,
            vol20: annualized_volatility(&closes, 20).ok_or(short)?,
            momentum_3m: momentum(&closes, 60).unwrap_or(0.0),
        })
    }

    /// First matching rule wins
    pub fn classify(&self) -> Regime {
        let Self {
            price,
            ma20,
            ma50,
            ma100,
            vol20,
            momentum_3m,
        } = *self;

        if price > ma20 && ma20 > ma50 && ma50 > ma100 && momentum_3m > 0.05 {
            Regime::StrongBull
        } else if price > ma50 && momentum_3m > 0.0 {
            Regime::Bull
        } else if price < ma20 && ma20 < ma50 && ma50 < ma100 && momentum_3m < -0.05 {
            Regime::StrongBear
        } else if price < ma50 && momentum_3m < 0.0 {
            Regime::Bear
        } else if vol20 > VOLATILE_THRESHOLD {
            Regime::Volatile
        } else {
            Regime::Sideways
        }
    }
}

/// Regime label with the benchmark volatility it was measured at
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeReading {
    pub regime: Regime,
    pub volatility: f64,
    /// 0 when unknown, 1 when classified
    pub confidence: f64,
}

impl RegimeReading {
    pub fn unknown() -> Self {
        Self {
            regime: Regime::Unknown,
            volatility: 0.0,
            confidence: 0.0,
        }
    }
}

impl Default for RegimeReading {
    fn default() -> Self {
        Self::unknown()
    }
}

/// Classify the benchmark, or report `unknown` when the history is too short
pub fn detect_regime(benchmark: &Series) -> RegimeReading {
    match RegimeInputs::measure(benchmark) {
        Ok(inputs) if inputs.vol20.is_finite() && inputs.price.is_finite() => RegimeReading {
            regime: inputs.classify(),
            volatility: inputs.vol20,
            confidence: 1.0,
        },
        _ => RegimeReading::unknown(),
    }
}
