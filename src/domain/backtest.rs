//! Backtest driver: steps one strategy bar-by-bar with an early stop on
//! excessive drawdown.

use super::error::GridtraderError;
use super::ohlcv::OhlcvBar;
use super::strategy::DcaStrategy;

/// Drawdown fraction below which a candidate's run is cut short.
pub const DEFAULT_DRAWDOWN_TOLERANCE: f64 = -0.35;

/// How a run ended. Early termination is a reported outcome, not an error;
/// the strategy keeps whatever position history accrued up to that bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    StoppedEarly { bar_index: usize },
}

/// Step `strategy` over the whole series, one bar at a time in index order.
///
/// The strategy carries all accumulated state, so each step sees exactly the
/// causally-available history. A signal series that does not match the price
/// series bar-for-bar is rejected before the first step.
pub fn run(
    strategy: &mut DcaStrategy,
    bars: &[OhlcvBar],
    signals: &[bool],
    drawdown_tolerance: f64,
) -> Result<RunOutcome, GridtraderError> {
    if signals.len() != bars.len() {
        return Err(GridtraderError::SignalLength {
            bars: bars.len(),
            signals: signals.len(),
        });
    }
    for (i, (bar, &signal)) in bars.iter().zip(signals).enumerate() {
        strategy.step(bar, signal)?;
        if let Some(drawdown) = strategy.current_drawdown() {
            if drawdown < drawdown_tolerance {
                return Ok(RunOutcome::StoppedEarly { bar_index: i });
            }
        }
    }
    Ok(RunOutcome::Completed)
}
