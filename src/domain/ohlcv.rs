//! OHLCV kline representation.

use chrono::NaiveDateTime;

/// One price bar. Timestamps carry minute granularity because the series
/// this backtester consumes are exchange kline exports.
#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub date: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl OhlcvBar {
    /// High minus low.
    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}
