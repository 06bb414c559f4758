//! Synthetic bars for unit tests

use chrono::{Days, NaiveDate};
use market_data::{Bar, Series};

fn day(i: usize) -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 2)
        .unwrap()
        .checked_add_days(Days::new(i as u64))
        .unwrap()
}

/// Bars from (open, high, low, close) tuples with constant volume
pub fn bars_from(ohlc: &[(f64, f64, f64, f64)]) -> Vec<Bar> {
    ohlc.iter()
        .enumerate()
        .map(|(i, (open, high, low, close))| Bar {
            date: day(i),
            open: *open,
            high: *high,
            low: *low,
            close: *close,
            volume: 1_000_000.0,
        })
        .collect()
}

/// Series whose bars open and close at the given price with a 1% band around it
pub fn series_from_closes(symbol: &str, closes: &[f64]) -> Series {
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, close)| Bar {
            date: day(i),
            open: *close,
            high: close * 1.01,
            low: close * 0.99,
            close: *close,
            volume: 1_000_000.0,
        })
        .collect();
    Series::new(symbol, bars).unwrap()
}

/// Constant-price series with constant volume
pub fn flat_series(symbol: &str, len: usize, price: f64) -> Series {
    let bars = (0..len)
        .map(|i| Bar {
            date: day(i),
            open: price,
            high: price,
            low: price,
            close: price,
            volume: 1_000_000.0,
        })
        .collect();
    Series::new(symbol, bars).unwrap()
}

/// Geometric trend: each close is `growth` times the previous one
pub fn trending_closes(len: usize, start: f64, growth: f64) -> Vec<f64> {
    (0..len).map(|i| start * growth.powi(i as i32)).collect()
}
