//! Position-sized recommendation derived from an analysis

use crate::error::SymbolError;
use crate::prediction::Action;
use crate::ranker::Analysis;
use crate::regime::Regime;
use crate::sentiment::Sentiment;
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Account parameters; percentages are whole numbers (10 means 10%)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountSettings {
    pub capital: Decimal,
    pub position_size_pct: Decimal,
    pub stop_loss_pct: Decimal,
    pub take_profit_pct: Decimal,
}

impl Default for AccountSettings {
    fn default() -> Self {
        Self {
            capital: Decimal::from(2400),
            position_size_pct: Decimal::from(10),
            stop_loss_pct: Decimal::from(5),
            take_profit_pct: Decimal::from(10),
        }
    }
}

impl AccountSettings {
    /// Capital committed to one position
    pub fn position_budget(&self) -> Decimal {
        self.capital * self.position_size_pct / Decimal::ONE_HUNDRED
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Targets {
    pub today_high: f64,
    pub today_low: f64,
    pub tomorrow: f64,
    pub week: f64,
    pub month: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub symbol: String,
    pub company: String,
    pub action: Action,
    pub current_price: Decimal,
    pub shares: u64,
    pub position_value: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    pub targets: Targets,
    pub score: f64,
    pub rsi: f64,
    pub momentum_1m: f64,
    pub patterns: Vec<String>,
    pub news_sentiment: Sentiment,
    pub reasoning: String,
    pub regime: Regime,
}

impl Recommendation {
    /// Size a position for `analysis` under `account`
    pub fn from_analysis(
        analysis: &Analysis,
        account: &AccountSettings,
    ) -> Result<Self, SymbolError> {
        let invalid_price = || SymbolError::Computation {
            symbol: analysis.symbol.clone(),
            reason: format!("cannot size a position at price {}", analysis.current_price),
        };

        let price = Decimal::from_f64(analysis.current_price)
            .filter(|p| p.is_sign_positive() && !p.is_zero())
            .ok_or_else(invalid_price)?;

        let shares = account
            .position_budget()
            .checked_div(price)
            .map(|s| s.floor())
            .and_then(|s| s.to_u64())
            .ok_or_else(invalid_price)?
            .max(1);

        let hundred = Decimal::ONE_HUNDRED;
        let stop_loss = price * (Decimal::ONE - account.stop_loss_pct / hundred);
        let take_profit = price * (Decimal::ONE + account.take_profit_pct / hundred);

        let predictions = &analysis.predictions.predictions;
        let patterns: Vec<String> = analysis
            .patterns
            .iter()
            .map(|p| p.pattern.name().to_string())
            .collect();

        Ok(Self {
            symbol: analysis.symbol.clone(),
            company: analysis.company_name.clone(),
            action: analysis.predictions.action,
            current_price: price,
            shares,
            position_value: (Decimal::from(shares) * price).round_dp(2),
            stop_loss: stop_loss.round_dp(2),
            take_profit: take_profit.round_dp(2),
            targets: Targets {
                today_high: predictions.today.target_high,
                today_low: predictions.today.target_low,
                tomorrow: predictions.tomorrow.target,
                week: predictions.week.target,
                month: predictions.month.target,
            },
            score: analysis.score,
            rsi: analysis.factors.rsi,
            momentum_1m: analysis.factors.momentum.one_month,
            reasoning: build_reasoning(analysis, &patterns),
            patterns,
            news_sentiment: analysis.news.sentiment,
            regime: analysis.regime,
        })
    }
}

fn build_reasoning(analysis: &Analysis, patterns: &[String]) -> String {
    let mut parts = vec![analysis.predictions.reasoning.clone()];

    if !patterns.is_empty() {
        parts.push(format!("Patterns: {}", patterns.join(", ")));
    }

    if analysis.news.sentiment != Sentiment::Neutral {
        parts.push(format!("News sentiment: {}", analysis.news.sentiment));
    }

    let levels = &analysis.factors.price_levels;
    parts.push(format!(
        "52w High: {:+.1}%, 52w Low: {:+.1}%",
        levels.distance_from_high, levels.distance_from_low
    ));

    parts.join(" | ")
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} - {}", self.symbol, self.company)?;
        writeln!(
            f,
            "   Action: {} | Score: {:.1} | RSI: {:.0}",
            self.action, self.score, self.rsi
        )?;
        writeln!(f, "   Price: ${:.2}", self.current_price)?;
        writeln!(
            f,
            "   Position: {} shares = ${:.2}",
            self.shares, self.position_value
        )?;
        writeln!(
            f,
            "   Stop Loss: ${:.2} | Take Profit: ${:.2}",
            self.stop_loss, self.take_profit
        )?;
        writeln!(
            f,
            "   Targets: Today ${:.2}, Week ${:.2}, Month ${:.2}",
            self.targets.today_high, self.targets.week, self.targets.month
        )?;
        write!(f, "   Reasoning: {}", self.reasoning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factors::{Direction, WeightTable};
    use crate::fixtures::flat_series;
    use crate::patterns::{Pattern, PatternKind, Strength};
    use crate::ranker::{analyze_series, SymbolData};
    use crate::sentiment::SentimentSummary;
    use market_data::CompanyInfo;
    use std::str::FromStr;

    fn analysis_at(price: f64) -> Analysis {
        let series = flat_series("ACME", 120, price);
        analyze_series(
            SymbolData {
                series: &series,
                info: &CompanyInfo::bare("ACME"),
                sector: "Industrials",
                news: SentimentSummary::neutral(),
            },
            Regime::Sideways,
            &WeightTable::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_position_sizing() {
        let rec = Recommendation::from_analysis(&analysis_at(37.0), &AccountSettings::default()).unwrap();
        // 2400 * 10% = 240 -> floor(240 / 37) = 6
        assert_eq!(rec.shares, 6);
        assert_eq!(rec.position_value, Decimal::from(222));
        assert_eq!(rec.stop_loss, Decimal::from_str("35.15").unwrap());
        assert_eq!(rec.take_profit, Decimal::from_str("40.70").unwrap());
        assert_eq!(rec.action, Action::Hold);
    }

    #[test]
    fn test_expensive_stock_buys_one_share() {
        let rec = Recommendation::from_analysis(&analysis_at(900.0), &AccountSettings::default()).unwrap();
        assert_eq!(rec.shares, 1);
        assert_eq!(rec.position_value, Decimal::from(900));
    }

    #[test]
    fn test_zero_price_is_rejected() {
        let mut analysis = analysis_at(10.0);
        analysis.current_price = 0.0;
        assert!(Recommendation::from_analysis(&analysis, &AccountSettings::default()).is_err());
    }

    #[test]
    fn test_reasoning_sections() {
        let mut analysis = analysis_at(50.0);
        assert_eq!(
            Recommendation::from_analysis(&analysis, &AccountSettings::default())
                .unwrap()
                .reasoning,
            "Neutral signals, wait for clearer setup | 52w High: +0.0%, 52w Low: +0.0%"
        );

        analysis.patterns = vec![
            Pattern {
                pattern: PatternKind::Hammer,
                signal: Direction::Bullish,
                strength: Strength::Medium,
            },
            Pattern {
                pattern: PatternKind::Doji,
                signal: Direction::Neutral,
                strength: Strength::Weak,
            },
        ];
        analysis.news.sentiment = Sentiment::Positive;
        analysis.factors.price_levels.distance_from_high = -12.34;
        analysis.factors.price_levels.distance_from_low = 45.0;

        let rec = Recommendation::from_analysis(&analysis, &AccountSettings::default()).unwrap();
        assert_eq!(
            rec.reasoning,
            "Neutral signals, wait for clearer setup | Patterns: Hammer, Doji | News sentiment: positive | 52w High: -12.3%, 52w Low: +45.0%"
        );
        assert_eq!(rec.patterns, vec!["Hammer", "Doji"]);
    }

    #[test]
    fn test_display_block() {
        let rec = Recommendation::from_analysis(&analysis_at(37.0), &AccountSettings::default()).unwrap();
        let text = rec.to_string();
        assert!(text.starts_with("ACME - ACME"));
        assert!(text.contains("Position: 6 shares = $222.00"));
        assert!(text.contains("Stop Loss: $35.15 | Take Profit: $40.70"));
    }
}
