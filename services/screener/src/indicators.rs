//! Technical indicator primitives over closing prices and bars
//!
//! Every function looks at the tail of its input, so the last element is
//! "today". Rolling standard deviations are sample deviations (n - 1) and
//! EMAs are seeded with the first value.

use market_data::Bar;

/// Trading sessions per year, used to annualize daily volatility
pub const TRADING_DAYS: f64 = 252.0;

/// Simple moving average of the last `period` values
pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let window = &values[values.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

/// Sample standard deviation
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(variance.sqrt())
}

/// Period-over-period fractional change; one element shorter than the input
pub fn pct_change(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| w[1] / w[0] - 1.0).collect()
}

/// Fractional return from `lookback` sessions ago (counting today as one)
pub fn momentum(closes: &[f64], lookback: usize) -> Option<f64> {
    if lookback == 0 || closes.len() < lookback {
        return None;
    }
    let price = *closes.last()?;
    Some(price / closes[closes.len() - lookback] - 1.0)
}

/// Standard deviation of the last `window` daily returns, annualized
pub fn annualized_volatility(closes: &[f64], window: usize) -> Option<f64> {
    let returns = pct_change(closes);
    if window < 2 || returns.len() < window {
        return None;
    }
    sample_std(&returns[returns.len() - window..]).map(|s| s * TRADING_DAYS.sqrt())
}

/// Recursive exponential moving average with alpha = 2 / (span + 1)
pub fn ema(values: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    for (i, value) in values.iter().enumerate() {
        if i == 0 {
            out.push(*value);
        } else {
            let prev = out[i - 1];
            out.push(alpha * value + (1.0 - alpha) * prev);
        }
    }
    out
}

/// RSI from simple averages of the last `period` gains and losses.
/// Falls back to the neutral 50 when it is undefined.
pub fn rsi(closes: &[f64], period: usize) -> f64 {
    if period == 0 || closes.len() < period + 1 {
        return 50.0;
    }

    let mut gains = 0.0;
    let mut losses = 0.0;
    for i in (closes.len() - period)..closes.len() {
        let change = closes[i] - closes[i - 1];
        if change > 0.0 {
            gains += change;
        } else {
            losses += change.abs();
        }
    }

    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;

    if avg_loss == 0.0 {
        return if avg_gain == 0.0 { 50.0 } else { 100.0 };
    }

    let rs = avg_gain / avg_loss;
    let value = 100.0 - (100.0 / (1.0 + rs));
    if value.is_finite() {
        value
    } else {
        50.0
    }
}

/// MACD line, signal line and histogram, aligned with the input
#[derive(Debug, Clone, PartialEq)]
pub struct MacdSeries {
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

pub fn macd(closes: &[f64], fast: usize, slow: usize, signal_span: usize) -> MacdSeries {
    let fast_ema = ema(closes, fast);
    let slow_ema = ema(closes, slow);
    let line: Vec<f64> = fast_ema
        .iter()
        .zip(slow_ema.iter())
        .map(|(f, s)| f - s)
        .collect();
    let signal = ema(&line, signal_span);
    let histogram = line.iter().zip(signal.iter()).map(|(l, s)| l - s).collect();

    MacdSeries {
        line,
        signal,
        histogram,
    }
}

/// Bollinger band levels for the most recent session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

pub fn bollinger(closes: &[f64], period: usize, width: f64) -> Option<Bands> {
    let middle = sma(closes, period)?;
    let std = sample_std(&closes[closes.len() - period..])?;
    Some(Bands {
        upper: middle + std * width,
        middle,
        lower: middle - std * width,
    })
}

/// True range per bar; the first bar has no previous close and uses high - low
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            let high_low = bar.high - bar.low;
            if i == 0 {
                return high_low;
            }
            let prev_close = bars[i - 1].close;
            high_low
                .max((bar.high - prev_close).abs())
                .max((bar.low - prev_close).abs())
        })
        .collect()
}

/// Average true range: mean of the last `period` true ranges
pub fn atr(bars: &[Bar], period: usize) -> Option<f64> {
    sma(&true_range(bars), period)
}

/// Highest high and lowest low over the last `period` bars, or all bars when fewer
pub fn high_low(bars: &[Bar], period: usize) -> Option<(f64, f64)> {
    let start = bars.len().saturating_sub(period);
    let window = &bars[start..];
    if window.is_empty() {
        return None;
    }
    let high = window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let low = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    Some((high, low))
}
