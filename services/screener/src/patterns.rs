//! Three-candle formation detection

use crate::factors::Direction;
use market_data::{Bar, Series};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bars the detector looks at
pub const PATTERN_WINDOW: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatternKind {
    #[serde(rename = "Hammer")]
    Hammer,
    #[serde(rename = "Bullish Engulfing")]
    BullishEngulfing,
    #[serde(rename = "Morning Star")]
    MorningStar,
    #[serde(rename = "Shooting Star")]
    ShootingStar,
    #[serde(rename = "Bearish Engulfing")]
    BearishEngulfing,
    #[serde(rename = "Evening Star")]
    EveningStar,
    #[serde(rename = "Doji")]
    Doji,
}

impl PatternKind {
    pub fn name(&self) -> &'static str {
        match self {
            PatternKind::Hammer => "Hammer",
            PatternKind::BullishEngulfing => "Bullish Engulfing",
            PatternKind::MorningStar => "Morning Star",
            PatternKind::ShootingStar => "Shooting Star",
            PatternKind::BearishEngulfing => "Bearish Engulfing",
            PatternKind::EveningStar => "Evening Star",
            PatternKind::Doji => "Doji",
        }
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strength {
    Weak,
    Medium,
    Strong,
}

/// A detected formation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pattern {
    pub pattern: PatternKind,
    pub signal: Direction,
    pub strength: Strength,
}

impl Pattern {
    fn new(pattern: PatternKind, signal: Direction, strength: Strength) -> Self {
        Self {
            pattern,
            signal,
            strength,
        }
    }
}

/// Every formation present in the last three bars, in detection order.
/// Fewer than three bars yields nothing.
pub fn detect_patterns(series: &Series) -> Vec<Pattern> {
    let bars = series.bars();
    if bars.len() < PATTERN_WINDOW {
        return Vec::new();
    }

    let c0 = &bars[bars.len() - 1];
    let c1 = &bars[bars.len() - 2];
    let c2 = &bars[bars.len() - 3];

    let mut patterns = Vec::new();

    // Bullish
    if is_hammer(c0) {
        patterns.push(Pattern::new(PatternKind::Hammer, Direction::Bullish, Strength::Medium));
    }
    if is_bullish_engulfing(c1, c0) {
        patterns.push(Pattern::new(
            PatternKind::BullishEngulfing,
            Direction::Bullish,
            Strength::Strong,
        ));
    }
    if is_morning_star(c2, c1, c0) {
        patterns.push(Pattern::new(PatternKind::MorningStar, Direction::Bullish, Strength::Strong));
    }

    // Bearish
    if is_shooting_star(c0) {
        patterns.push(Pattern::new(
            PatternKind::ShootingStar,
            Direction::Bearish,
            Strength::Medium,
        ));
    }
    if is_bearish_engulfing(c1, c0) {
        patterns.push(Pattern::new(
            PatternKind::BearishEngulfing,
            Direction::Bearish,
            Strength::Strong,
        ));
    }
    if is_evening_star(c2, c1, c0) {
        patterns.push(Pattern::new(PatternKind::EveningStar, Direction::Bearish, Strength::Strong));
    }

    // Neutral
    if is_doji(c0) {
        patterns.push(Pattern::new(PatternKind::Doji, Direction::Neutral, Strength::Weak));
    }

    patterns
}

fn is_hammer(c: &Bar) -> bool {
    let body = c.body();
    c.lower_shadow() > body * 2.0 && c.upper_shadow() < body * 0.3 && c.is_green()
}

fn is_shooting_star(c: &Bar) -> bool {
    let body = c.body();
    c.upper_shadow() > body * 2.0 && c.lower_shadow() < body * 0.3 && c.is_red()
}

fn is_doji(c: &Bar) -> bool {
    let range = c.range();
    range > 0.0 && c.body() < range * 0.1
}

fn is_bullish_engulfing(prev: &Bar, curr: &Bar) -> bool {
    prev.is_red() && curr.is_green() && curr.open < prev.close && curr.close > prev.open
}

fn is_bearish_engulfing(prev: &Bar, curr: &Bar) -> bool {
    prev.is_green() && curr.is_red() && curr.open > prev.close && curr.close < prev.open
}

// The middle candle's body is measured against the first candle's range
fn is_morning_star(c2: &Bar, c1: &Bar, c0: &Bar) -> bool {
    c2.is_red()
        && c1.body() < c2.range() * 0.3
        && c0.is_green()
        && c0.close > (c2.open + c2.close) / 2.0
}

fn is_evening_star(c2: &Bar, c1: &Bar, c0: &Bar) -> bool {
    c2.is_green()
        && c1.body() < c2.range() * 0.3
        && c0.is_red()
        && c0.close < (c2.open + c2.close) / 2.0
}
