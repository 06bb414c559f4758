//! Per-symbol technical factors and the regime-weighted composite score

use crate::error::InsufficientData;
use crate::indicators::{
    annualized_volatility, bollinger, high_low, macd, momentum, rsi, sma, TRADING_DAYS,
};
use crate::regime::Regime;
use market_data::Series;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bars needed before factors can be built
pub const MIN_FACTOR_BARS: usize = 60;

const RSI_PERIOD: usize = 14;
const BOLLINGER_PERIOD: usize = 20;
const BOLLINGER_WIDTH: f64 = 2.0;
const VOLUME_WINDOW: usize = 20;

/// Direction of a crossover, candle formation or headline vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Bullish,
    Bearish,
    Neutral,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Bullish => "bullish",
            Direction::Bearish => "bearish",
            Direction::Neutral => "neutral",
        })
    }
}

/// Where price sits within its Bollinger band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BandSignal {
    Oversold,
    Overbought,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MomentumFactor {
    /// 20-session fractional return
    pub one_month: f64,
    /// 60-session fractional return
    pub three_month: f64,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolatilityFactor {
    /// Annualized 20-day return volatility
    pub twenty_day: f64,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendFactor {
    /// Share of moving-average checks passed, 0-100
    pub score: f64,
    pub ma10: f64,
    pub ma20: f64,
    pub ma50: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumeFactor {
    /// Today's volume over the 20-session average
    pub surge: f64,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdFactor {
    pub value: f64,
    pub signal: f64,
    pub histogram: f64,
    pub crossover: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerFactor {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    /// Percent position of price between the bands
    pub position: f64,
    pub signal: BandSignal,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceLevels {
    pub current: f64,
    pub high_52w: f64,
    pub low_52w: f64,
    /// Percent distance of price from the 52-week high
    pub distance_from_high: f64,
    /// Percent distance of price from the 52-week low
    pub distance_from_low: f64,
}

/// Technical snapshot of one symbol at its latest bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorBundle {
    pub momentum: MomentumFactor,
    pub volatility: VolatilityFactor,
    pub trend: TrendFactor,
    pub volume: VolumeFactor,
    pub rsi: f64,
    pub macd: MacdFactor,
    pub bollinger: BollingerFactor,
    pub price_levels: PriceLevels,
}

impl FactorBundle {
    pub fn price(&self) -> f64 {
        self.price_levels.current
    }

    /// Every number in the bundle is finite
    pub fn is_finite(&self) -> bool {
        [
            self.momentum.one_month,
            self.momentum.three_month,
            self.momentum.score,
            self.volatility.twenty_day,
            self.volatility.score,
            self.trend.score,
            self.volume.surge,
            self.volume.score,
            self.rsi,
            self.macd.value,
            self.macd.signal,
            self.macd.histogram,
            self.bollinger.position,
            self.price_levels.current,
            self.price_levels.distance_from_high,
            self.price_levels.distance_from_low,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

/// Build the factor bundle. Needs at least [`MIN_FACTOR_BARS`] bars.
pub fn build_factors(series: &Series) -> Result<FactorBundle, InsufficientData> {
    InsufficientData::check(MIN_FACTOR_BARS, series.len())?;

    let bars = series.bars();
    let closes = series.closes();
    let short = InsufficientData {
        required: MIN_FACTOR_BARS,
        available: closes.len(),
    };
    let price = *closes.last().ok_or(short)?;

    // Momentum
    let one_month = momentum(&closes, 20).unwrap_or(0.0);
    let three_month = momentum(&closes, 60).unwrap_or(0.0);

    // Volatility
    let twenty_day = annualized_volatility(&closes, 20).ok_or(short)?;

    // Trend
    let ma10 = sma(&closes, 10).ok_or(short)?;
    let ma20 = sma(&closes, 20).ok_or(short)?;
    let ma50 = sma(&closes, 50).ok_or(short)?;
    let checks = [
        price > ma10,
        price > ma20,
        price > ma50,
        ma10 > ma20,
        ma20 > ma50,
    ];
    let passed = checks.iter().filter(|c| **c).count();
    let trend_score = passed as f64 / checks.len() as f64 * 100.0;

    // Volume
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();
    let avg_volume = sma(&volumes, VOLUME_WINDOW).unwrap_or(0.0);
    let recent_volume = volumes.last().copied().unwrap_or(0.0);
    let surge = if avg_volume > 0.0 {
        recent_volume / avg_volume
    } else {
        1.0
    };

    // MACD crossover compares against the histogram one bar back
    let macd_series = macd(&closes, 12, 26, 9);
    let n = closes.len();
    let value = macd_series.line[n - 1];
    let signal = macd_series.signal[n - 1];
    let histogram = macd_series.histogram[n - 1];
    let prev_histogram = macd_series.histogram[n - 2];
    let crossover = if value > signal && prev_histogram <= 0.0 {
        Direction::Bullish
    } else if value < signal && prev_histogram >= 0.0 {
        Direction::Bearish
    } else {
        Direction::Neutral
    };

    // Bollinger
    let bands = bollinger(&closes, BOLLINGER_PERIOD, BOLLINGER_WIDTH).ok_or(short)?;
    let band_width = bands.upper - bands.lower;
    let position = if band_width > 0.0 {
        (price - bands.lower) / band_width * 100.0
    } else {
        50.0
    };
    let band_signal = if position < 20.0 {
        BandSignal::Oversold
    } else if position > 80.0 {
        BandSignal::Overbought
    } else {
        BandSignal::Neutral
    };

    // Support/resistance
    let (high_52w, low_52w) = high_low(bars, TRADING_DAYS as usize).ok_or(short)?;

    Ok(FactorBundle {
        momentum: MomentumFactor {
            one_month,
            three_month,
            score: 50.0 + one_month * 100.0,
        },
        volatility: VolatilityFactor {
            twenty_day,
            score: (100.0 - twenty_day * 100.0).clamp(0.0, 100.0),
        },
        trend: TrendFactor {
            score: trend_score,
            ma10,
            ma20,
            ma50,
        },
        volume: VolumeFactor {
            surge,
            score: (50.0 + (surge - 1.0) * 50.0).clamp(0.0, 100.0),
        },
        rsi: rsi(&closes, RSI_PERIOD),
        macd: MacdFactor {
            value,
            signal,
            histogram,
            crossover,
        },
        bollinger: BollingerFactor {
            upper: bands.upper,
            middle: bands.middle,
            lower: bands.lower,
            position,
            signal: band_signal,
        },
        price_levels: PriceLevels {
            current: price,
            high_52w,
            low_52w,
            distance_from_high: percent_distance(price, high_52w),
            distance_from_low: percent_distance(price, low_52w),
        },
    })
}

fn percent_distance(price: f64, level: f64) -> f64 {
    if level == 0.0 {
        return 0.0;
    }
    (price - level) / level * 100.0
}

/// Weight of each sub-score in the composite
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorWeights {
    pub momentum: f64,
    pub volatility: f64,
    pub trend: f64,
    pub volume: f64,
}

impl Default for FactorWeights {
    fn default() -> Self {
        Self {
            momentum: 0.35,
            volatility: 0.20,
            trend: 0.30,
            volume: 0.15,
        }
    }
}

impl FactorWeights {
    pub fn with_overrides(&self, overrides: &WeightOverrides) -> Self {
        Self {
            momentum: overrides.momentum.unwrap_or(self.momentum),
            volatility: overrides.volatility.unwrap_or(self.volatility),
            trend: overrides.trend.unwrap_or(self.trend),
            volume: self.volume,
        }
    }

    fn all(&self) -> [f64; 4] {
        [self.momentum, self.volatility, self.trend, self.volume]
    }
}

/// Regime-specific replacements for the base weights. Volume is never overridden.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WeightOverrides {
    #[serde(default)]
    pub momentum: Option<f64>,
    #[serde(default)]
    pub volatility: Option<f64>,
    #[serde(default)]
    pub trend: Option<f64>,
}

impl WeightOverrides {
    fn all(&self) -> [Option<f64>; 3] {
        [self.momentum, self.volatility, self.trend]
    }
}

/// Base weights plus the bull and bear overrides
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightTable {
    pub base: FactorWeights,
    pub bull: WeightOverrides,
    pub bear: WeightOverrides,
}

impl Default for WeightTable {
    fn default() -> Self {
        Self {
            base: FactorWeights::default(),
            bull: WeightOverrides {
                momentum: Some(0.45),
                volatility: None,
                trend: Some(0.30),
            },
            bear: WeightOverrides {
                momentum: Some(0.20),
                volatility: Some(0.35),
                trend: None,
            },
        }
    }
}

impl WeightTable {
    /// Effective weights under `regime`
    pub fn for_regime(&self, regime: Regime) -> FactorWeights {
        if regime.is_bullish() {
            self.base.with_overrides(&self.bull)
        } else if regime.is_bearish() {
            self.base.with_overrides(&self.bear)
        } else {
            self.base
        }
    }

    /// Any negative or non-finite weight
    pub fn invalid_weight(&self) -> Option<f64> {
        self.base
            .all()
            .into_iter()
            .chain(self.bull.all().into_iter().flatten())
            .chain(self.bear.all().into_iter().flatten())
            .find(|w| !w.is_finite() || *w < 0.0)
    }
}

/// Regime-weighted blend of the four sub-scores
pub fn composite_score(factors: &FactorBundle, regime: Regime, weights: &WeightTable) -> f64 {
    let w = weights.for_regime(regime);
    factors.momentum.score * w.momentum
        + factors.volatility.score * w.volatility
        + factors.trend.score * w.trend
        + factors.volume.score * w.volume
}
