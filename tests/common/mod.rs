#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use gridtrader::domain::ohlcv::OhlcvBar;
use gridtrader::domain::strategy::DcaConfig;

pub fn ts(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2022, 1, day)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

pub fn make_bar(day: u32, open: f64, high: f64, low: f64, close: f64) -> OhlcvBar {
    OhlcvBar {
        date: ts(day, 0, 0),
        open,
        high,
        low,
        close,
        volume: 1_000.0,
    }
}

pub fn flat_bars(price: f64, count: u32) -> Vec<OhlcvBar> {
    (1..=count)
        .map(|day| make_bar(day, price, price, price, price))
        .collect()
}

/// A single-entry strategy: base order only, no ladder.
pub fn ladderless_config() -> DcaConfig {
    DcaConfig {
        take_profit_pct: 1.0,
        base_order_size: 100.0,
        safety_order_count: 0,
        first_safety_order_size: 0.0,
        safety_order_volume_scale: 0.0,
        safety_order_step_pct: 0.0,
        safety_order_step_scale: 0.0,
        long: true,
        extra_cost_pct: 0.0,
    }
}

/// The four-rung reference ladder used across the suite.
pub fn laddered_config() -> DcaConfig {
    DcaConfig {
        take_profit_pct: 1.0,
        base_order_size: 100.0,
        safety_order_count: 4,
        first_safety_order_size: 125.0,
        safety_order_volume_scale: 2.0,
        safety_order_step_pct: 2.5,
        safety_order_step_scale: 1.3,
        long: true,
        extra_cost_pct: 0.0,
    }
}
