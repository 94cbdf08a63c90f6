//! Entry-signal generators and timeframe resampling.
//!
//! A signal series is one boolean per base-timeframe bar; `true` marks bars
//! on which a flat strategy may open. Indicator-based signals are computed on
//! a resampled timeframe and projected back onto the base index of each
//! resampled bar's last constituent.

use super::ohlcv::OhlcvBar;

/// The ASAP signal: entry permitted on every bar.
pub fn asap_signal(len: usize) -> Vec<bool> {
    vec![true; len]
}

/// Aggregate `timeframe` consecutive bars into one, pairing each aggregate
/// with the base index of its last constituent bar. A short tail group is
/// kept as-is.
pub fn resample(bars: &[OhlcvBar], timeframe: usize) -> Vec<(usize, OhlcvBar)> {
    if timeframe == 0 {
        return Vec::new();
    }
    bars.chunks(timeframe)
        .enumerate()
        .filter_map(|(chunk_index, chunk)| {
            let first = chunk.first()?;
            let last = chunk.last()?;
            let aggregated = OhlcvBar {
                date: first.date,
                open: first.open,
                high: chunk.iter().map(|b| b.high).fold(f64::MIN, f64::max),
                low: chunk.iter().map(|b| b.low).fold(f64::MAX, f64::min),
                close: last.close,
                volume: chunk.iter().map(|b| b.volume).sum(),
            };
            Some((chunk_index * timeframe + chunk.len() - 1, aggregated))
        })
        .collect()
}

/// Rolling mean and population standard deviation over `window` values.
/// The first `window - 1` entries are `None` (warmup).
pub fn rolling_mean_std(values: &[f64], window: usize) -> Vec<Option<(f64, f64)>> {
    if window == 0 {
        return vec![None; values.len()];
    }
    values
        .iter()
        .enumerate()
        .map(|(i, _)| {
            if i + 1 < window {
                return None;
            }
            let slice = &values[i + 1 - window..=i];
            let mean = slice.iter().sum::<f64>() / window as f64;
            let variance = slice
                .iter()
                .map(|v| {
                    let diff = v - mean;
                    diff * diff
                })
                .sum::<f64>()
                / window as f64;
            Some((mean, variance.sqrt()))
        })
        .collect()
}

/// Bollinger lower-band re-entry signal.
///
/// Armed when a resampled close falls below the lower band, fires on the bar
/// where the close crosses back above it. The fired index is the base-series
/// index of the resampled bar's last constituent.
pub fn bollinger_reentry_signal(
    bars: &[OhlcvBar],
    timeframe: usize,
    ma_length: usize,
    stddev_mult: f64,
) -> Vec<bool> {
    let mut signal = vec![false; bars.len()];
    let resampled = resample(bars, timeframe);
    let closes: Vec<f64> = resampled.iter().map(|(_, b)| b.close).collect();
    let stats = rolling_mean_std(&closes, ma_length);

    let mut armed = false;
    for (pos, ((base_index, _), stat)) in resampled.iter().zip(&stats).enumerate() {
        let Some((mean, stddev)) = stat else {
            continue;
        };
        let lower = mean - stddev_mult * stddev;
        let close = closes[pos];
        if !armed && close < lower {
            armed = true;
        } else if armed && close > lower {
            signal[*base_index] = true;
            armed = false;
        }
    }
    signal
}

/// Wilder-smoothed RSI over a close series: the first average is a simple
/// mean of the first `period` changes, every later one folds in with
/// `alpha = 1/period`. The first `period` entries are `None`.
pub fn rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if period == 0 || closes.len() <= period {
        return out;
    }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for i in 1..=period {
        let change = closes[i] - closes[i - 1];
        avg_gain += change.max(0.0);
        avg_loss += (-change).max(0.0);
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;
    out[period] = Some(rsi_value(avg_gain, avg_loss));

    for i in period + 1..closes.len() {
        let change = closes[i] - closes[i - 1];
        avg_gain = (avg_gain * (period - 1) as f64 + change.max(0.0)) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + (-change).max(0.0)) / period as f64;
        out[i] = Some(rsi_value(avg_gain, avg_loss));
    }
    out
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

/// RSI oversold re-entry signal: armed when the resampled RSI drops below
/// `threshold`, fires on the bar where it crosses back above.
pub fn rsi_reentry_signal(
    bars: &[OhlcvBar],
    timeframe: usize,
    period: usize,
    threshold: f64,
) -> Vec<bool> {
    let mut signal = vec![false; bars.len()];
    let resampled = resample(bars, timeframe);
    let closes: Vec<f64> = resampled.iter().map(|(_, b)| b.close).collect();
    let rsi_series = rsi(&closes, period);

    let mut armed = false;
    for ((base_index, _), value) in resampled.iter().zip(&rsi_series) {
        let Some(rsi) = value else {
            continue;
        };
        if !armed && *rsi < threshold {
            armed = true;
        } else if armed && *rsi > threshold {
            signal[*base_index] = true;
            armed = false;
        }
    }
    signal
}
