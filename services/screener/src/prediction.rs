//! Dampened multi-horizon price targets and the action call

use crate::error::InsufficientData;
use crate::factors::{BandSignal, Direction, FactorBundle};
use crate::indicators::atr;
use crate::regime::Regime;
use market_data::Series;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bars needed before targets are projected
pub const MIN_PREDICTION_BARS: usize = 60;

const ATR_PERIOD: usize = 14;
/// Share of the raw monthly momentum carried into projections
const MOMENTUM_DAMPING: f64 = 0.3;
/// Largest projected monthly move either way
const MAX_MONTHLY_MOVE: f64 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Buy => "BUY",
            Action::Sell => "SELL",
            Action::Hold => "HOLD",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// Intraday lean
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayBias {
    BullishBias,
    BearishBias,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TodayTarget {
    pub target_high: f64,
    pub target_low: f64,
    pub entry_zone: f64,
    pub recommendation: DayBias,
}

impl TodayTarget {
    fn from_atr(price: f64, atr: f64, momentum_1m: f64) -> Self {
        let intraday_range = atr * 0.5;
        if momentum_1m > 0.0 {
            Self {
                target_high: price + intraday_range,
                target_low: price - intraday_range * 0.3,
                entry_zone: price - intraday_range * 0.2,
                recommendation: DayBias::BullishBias,
            }
        } else {
            Self {
                target_high: price + intraday_range * 0.3,
                target_low: price - intraday_range,
                entry_zone: price + intraday_range * 0.2,
                recommendation: DayBias::BearishBias,
            }
        }
    }
}

/// Target with a volatility band around it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HorizonTarget {
    pub target: f64,
    pub range_high: f64,
    pub range_low: f64,
}

impl HorizonTarget {
    fn project(price: f64, momentum: f64, volatility: f64, spread: f64) -> Self {
        Self {
            target: price * (1.0 + momentum),
            range_high: price * (1.0 + momentum + volatility * spread),
            range_low: price * (1.0 + momentum - volatility * spread),
        }
    }

    /// Percent change of the target from `price`
    pub fn change_pct(&self, price: f64) -> f64 {
        (self.target - price) / price * 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Horizons {
    pub today: TodayTarget,
    pub tomorrow: HorizonTarget,
    pub week: HorizonTarget,
    pub month: HorizonTarget,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionSet {
    pub current_price: f64,
    pub atr: f64,
    pub dampened_momentum: f64,
    pub predictions: Horizons,
    pub action: Action,
    pub reasoning: String,
    pub confidence: Confidence,
    /// Presentation text walking through the numbers
    pub explanation: String,
}

/// Scale raw monthly momentum down and cap it to +/-15%
pub fn dampen_momentum(momentum_1m: f64) -> f64 {
    (momentum_1m * MOMENTUM_DAMPING).clamp(-MAX_MONTHLY_MOVE, MAX_MONTHLY_MOVE)
}

/// First matching rule wins
pub fn decide_action(factors: &FactorBundle) -> (Action, &'static str) {
    let rsi = factors.rsi;
    let momentum_1m = factors.momentum.one_month;
    let trend = factors.trend.score;

    if rsi < 30.0 && momentum_1m > -0.05 {
        (Action::Buy, "Oversold RSI with recovering momentum")
    } else if rsi > 70.0 && momentum_1m < 0.05 {
        (Action::Sell, "Overbought RSI with weakening momentum")
    } else if trend > 60.0 && momentum_1m > 0.02 {
        (Action::Buy, "Strong uptrend with positive momentum")
    } else if trend < 40.0 && momentum_1m < -0.02 {
        (Action::Sell, "Weak downtrend with negative momentum")
    } else {
        (Action::Hold, "Neutral signals, wait for clearer setup")
    }
}

fn reasoning(factors: &FactorBundle, action_clause: &str) -> String {
    let mut parts = vec![action_clause.to_string()];

    match factors.macd.crossover {
        Direction::Bullish => parts.push("MACD bullish crossover (momentum building)".to_string()),
        Direction::Bearish => parts.push("MACD bearish crossover (momentum fading)".to_string()),
        Direction::Neutral => {}
    }

    match factors.bollinger.signal {
        BandSignal::Oversold => parts.push(format!(
            "Near lower Bollinger Band (${:.2}) - potential bounce",
            factors.bollinger.lower
        )),
        BandSignal::Overbought => parts.push(format!(
            "Near upper Bollinger Band (${:.2}) - potential pullback",
            factors.bollinger.upper
        )),
        BandSignal::Neutral => {}
    }

    parts.join(" | ")
}

/// Project targets for today, tomorrow, one week and one month.
/// Needs at least [`MIN_PREDICTION_BARS`] bars.
pub fn predict(
    series: &Series,
    factors: &FactorBundle,
    regime: Regime,
) -> Result<PredictionSet, InsufficientData> {
    InsufficientData::check(MIN_PREDICTION_BARS, series.len())?;

    let short = InsufficientData {
        required: MIN_PREDICTION_BARS,
        available: series.len(),
    };
    let current_price = series.last().ok_or(short)?.close;
    let atr = atr(series.bars(), ATR_PERIOD).ok_or(short)?;
    let volatility = factors.volatility.twenty_day;
    let momentum_1m = factors.momentum.one_month;
    let dampened = dampen_momentum(momentum_1m);

    let predictions = Horizons {
        today: TodayTarget::from_atr(current_price, atr, momentum_1m),
        tomorrow: HorizonTarget::project(current_price, dampened * 0.05, volatility, 0.05),
        week: HorizonTarget::project(current_price, dampened * 0.25, volatility, 0.15),
        month: HorizonTarget::project(current_price, dampened, volatility, 0.25),
    };

    let (action, clause) = decide_action(factors);
    let confidence = if dampened.abs() > 0.05 {
        Confidence::Medium
    } else {
        Confidence::Low
    };

    let explanation = explain(&ExplanationInputs {
        current_price,
        momentum_1m,
        dampened,
        atr,
        volatility,
        regime,
        predictions: &predictions,
    });

    Ok(PredictionSet {
        current_price,
        atr,
        dampened_momentum: dampened,
        predictions,
        action,
        reasoning: reasoning(factors, clause),
        confidence,
        explanation,
    })
}

struct ExplanationInputs<'a> {
    current_price: f64,
    momentum_1m: f64,
    dampened: f64,
    atr: f64,
    volatility: f64,
    regime: Regime,
    predictions: &'a Horizons,
}

fn explain(input: &ExplanationInputs<'_>) -> String {
    let price = input.current_price;
    let today = &input.predictions.today;
    let week = &input.predictions.week;
    let month = &input.predictions.month;

    let mut lines = vec![
        "How the targets were calculated:".to_string(),
        format!("- Current price: ${:.2}", price),
        format!("- Recent momentum: {:.1}% (last month)", input.momentum_1m * 100.0),
        format!("- Dampened to: {:.1}% (conservative)", input.dampened * 100.0),
        format!("- ATR (daily range): ${:.2}", input.atr),
        format!("- Volatility: {:.1}%", input.volatility * 100.0),
        format!("- Market regime: {}", input.regime),
        String::new(),
    ];

    match today.recommendation {
        DayBias::BullishBias => {
            lines.push("TODAY: Bullish bias, watching for a dip to the entry zone".to_string());
            lines.push(format!("- Entry zone ${:.2}: best price to buy near support", today.entry_zone));
            lines.push(format!("- Low ${:.2}: support level", today.target_low));
            lines.push(format!("- High ${:.2}: resistance, could test today", today.target_high));
        }
        DayBias::BearishBias => {
            lines.push("TODAY: Bearish bias, wait for stabilization".to_string());
            lines.push(format!("- High ${:.2}: resistance", today.target_high));
            lines.push(format!("- Low ${:.2}: could drop here", today.target_low));
        }
    }
    lines.push(String::new());

    let week_change = week.change_pct(price);
    lines.push(format!("1 WEEK: Target ${:.2} ({:+.1}%)", week.target, week_change));
    lines.push(format!("- Based on {:.1}% weekly momentum", input.dampened * 0.25 * 100.0));
    lines.push(format!("- Range: ${:.2} - ${:.2}", week.range_low, week.range_high));
    lines.push(if week_change > 5.0 {
        format!("- Could reach ${:.2} by midweek if momentum holds", week.target)
    } else if week_change < -5.0 {
        format!("- May drop to ${:.2} by Thursday if selling continues", week.target)
    } else {
        format!("- Likely gradual move to ${:.2} through the week", week.target)
    });
    lines.push(String::new());

    let month_change = month.change_pct(price);
    lines.push(format!("1 MONTH: Target ${:.2} ({:+.1}%)", month.target, month_change));
    lines.push(format!("- Based on {:.1}% dampened monthly momentum", input.dampened * 100.0));
    lines.push("- Conservative estimate, capped at 15% either way".to_string());
    lines.push(if month_change > 8.0 {
        "- Strong setup, could reach target in 3-4 weeks".to_string()
    } else if month_change < -8.0 {
        "- Weak setup, may take the full month or longer".to_string()
    } else {
        "- Moderate setup, expect steady progress toward target".to_string()
    });

    lines.join("\n")
}
