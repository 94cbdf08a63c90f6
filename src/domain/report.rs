//! Deal reports, per-strategy summaries, and the multi-candidate evaluator.

use chrono::{Duration, NaiveDateTime};
use rayon::prelude::*;

use super::backtest::{self, RunOutcome};
use super::error::GridtraderError;
use super::grid::Candidate;
use super::ohlcv::OhlcvBar;
use super::position::Position;
use super::strategy::DcaStrategy;

/// One row of the per-deal report: everything the summary needs plus the
/// ladder trace for manual inspection.
#[derive(Debug, Clone, PartialEq)]
pub struct DealRow {
    pub open_date: NaiveDateTime,
    pub close_date: NaiveDateTime,
    pub is_closed: bool,
    pub duration: Duration,
    pub order_count: usize,
    pub open_price: f64,
    pub close_price: f64,
    pub deal_size: f64,
    pub pnl_quote: f64,
    pub pnl_coin: f64,
    pub pnl_pct: f64,
    pub trigger_prices: Vec<f64>,
    pub trigger_dates: Vec<NaiveDateTime>,
    pub drawdown_date: Option<NaiveDateTime>,
    pub drawdown_price: f64,
    pub drawdown_pct: String,
    pub drawdown_pct_float: f64,
    pub best_try_progress: Vec<f64>,
    pub best_try_dates: Vec<NaiveDateTime>,
    /// Safety orders filled: order count minus base entry and close. The
    /// final row of a run gets one extra when its position never closed, so
    /// the aggregate reflects the pending state.
    pub safety_orders_used: i64,
}

/// One summary row per strategy, the unit the comparison table is built from.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategySummary {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub duration: Duration,
    pub leverage: f64,
    pub total_return_pct: f64,
    pub buy_hold_return_pct: f64,
    pub daily_return_pct: f64,
    pub max_drawdown_pct: f64,
    pub avg_drawdown_pct: f64,
    pub avg_safety_orders: f64,
    pub max_safety_orders: i64,
    pub num_deals: usize,
    pub avg_deal_duration_days: f64,
    pub max_deal_duration_days: f64,
}

fn round2(value: f64) -> f64 {
    (value * 1e2).round() / 1e2
}

fn round3(value: f64) -> f64 {
    (value * 1e3).round() / 1e3
}

fn round4(value: f64) -> f64 {
    (value * 1e4).round() / 1e4
}

/// Extract the deal table from a run's position history, in deal order.
pub fn make_report(positions: &[Position]) -> Vec<DealRow> {
    let mut rows: Vec<DealRow> = positions
        .iter()
        .filter_map(|pos| {
            let first = pos.orders().first()?;
            let last = pos.orders().last()?;
            let dd = pos.drawdown();
            Some(DealRow {
                open_date: first.date,
                close_date: last.date,
                is_closed: pos.is_closed(),
                duration: last.date - first.date,
                order_count: pos.orders().len(),
                open_price: first.price,
                close_price: round2(last.price),
                deal_size: pos.net_size().abs(),
                pnl_quote: pos.net_size().abs() * pos.weighted_price() * pos.take_profit_pct()
                    / 100.0,
                pnl_coin: pos.net_size().abs() * pos.take_profit_pct() / 100.0,
                pnl_pct: pos.take_profit_pct(),
                trigger_prices: pos.orders().iter().map(|o| round2(o.price)).collect(),
                trigger_dates: pos.orders().iter().map(|o| o.date).collect(),
                drawdown_date: dd.date,
                drawdown_price: dd.price,
                drawdown_pct: dd.pct.clone(),
                drawdown_pct_float: dd.pct_float,
                best_try_progress: pos.orders().iter().map(|o| o.best_try.progress).collect(),
                best_try_dates: pos.orders().iter().map(|o| o.best_try.date).collect(),
                safety_orders_used: pos.orders().len() as i64 - 2,
            })
        })
        .collect();

    if let Some(last_row) = rows.last_mut() {
        if !last_row.is_closed {
            last_row.safety_orders_used += 1;
        }
    }
    rows
}

/// Reduce a deal table to one summary row.
///
/// Total return is net P/L over the minimum required capital, independent of
/// the capital actually deployed. Drawdown aggregates pick the worst value by
/// magnitude so short candidates (positive adverse percentages) report
/// correctly.
pub fn summarize(
    report: &[DealRow],
    min_capital: f64,
    leverage: f64,
    candidate: &str,
) -> Result<StrategySummary, GridtraderError> {
    let (Some(first), Some(last)) = (report.first(), report.last()) else {
        return Err(GridtraderError::NoDeals {
            candidate: candidate.into(),
        });
    };

    let required_capital = min_capital / leverage;
    let span = last.close_date - first.open_date;
    let span_days = span.num_seconds() as f64 / 86_400.0;

    let total_return_pct =
        report.iter().map(|r| r.pnl_coin).sum::<f64>() / required_capital * 100.0;
    let daily_return_pct = if span_days > 0.0 {
        round4(total_return_pct / span_days)
    } else {
        0.0
    };
    let buy_hold_return_pct =
        round3((last.close_price / first.open_price - 1.0) * 100.0) * leverage;

    let drawdowns: Vec<f64> = report
        .iter()
        .map(|r| round2(r.drawdown_pct_float * 100.0))
        .collect();
    let max_drawdown_pct = drawdowns
        .iter()
        .copied()
        .fold(0.0, |worst: f64, dd| if dd.abs() > worst.abs() { dd } else { worst });
    let avg_drawdown_pct = round4(drawdowns.iter().sum::<f64>() / drawdowns.len() as f64);

    let avg_safety_orders = round2(
        report.iter().map(|r| r.safety_orders_used as f64).sum::<f64>() / report.len() as f64,
    );
    let max_safety_orders = report
        .iter()
        .map(|r| r.safety_orders_used)
        .max()
        .unwrap_or(0);

    let deal_days: Vec<f64> = report
        .iter()
        .map(|r| r.duration.num_seconds() as f64 / 86_400.0)
        .collect();
    let avg_deal_duration_days =
        round2(deal_days.iter().sum::<f64>() / deal_days.len() as f64);
    let max_deal_duration_days = round2(deal_days.iter().copied().fold(0.0, f64::max));

    Ok(StrategySummary {
        start: first.open_date,
        end: last.close_date,
        duration: span,
        leverage,
        total_return_pct: round4(total_return_pct),
        buy_hold_return_pct,
        daily_return_pct,
        max_drawdown_pct,
        avg_drawdown_pct,
        avg_safety_orders,
        max_safety_orders,
        num_deals: report.len(),
        avg_deal_duration_days,
        max_deal_duration_days,
    })
}

/// Everything one candidate's run produced.
#[derive(Debug, Clone)]
pub struct CandidateReport {
    pub id: String,
    pub outcome: RunOutcome,
    pub deals: Vec<DealRow>,
    pub summary: StrategySummary,
    pub params: Vec<(&'static str, String)>,
}

/// Run every candidate independently over the same series and collect its
/// deal table and summary.
///
/// Each candidate owns disjoint mutable state, so the fan-out is a pure
/// rayon `par_iter`; results come back in candidate order and the only join
/// is the final collect.
pub fn evaluate_candidates(
    candidates: &[Candidate],
    bars: &[OhlcvBar],
    signals: &[bool],
    drawdown_tolerance: f64,
    leverage: f64,
) -> Result<Vec<CandidateReport>, GridtraderError> {
    candidates
        .par_iter()
        .map(|candidate| {
            let mut strategy = DcaStrategy::new(candidate.config.clone())?;
            let outcome = backtest::run(&mut strategy, bars, signals, drawdown_tolerance)?;
            let deals = make_report(strategy.positions());
            let summary = summarize(
                &deals,
                strategy.compute_min_capital(),
                leverage,
                &candidate.id,
            )?;
            Ok(CandidateReport {
                id: candidate.id.clone(),
                outcome,
                deals,
                summary,
                params: candidate.config.params(),
            })
        })
        .collect()
}

/// The final artifact: metric rows first, one column per candidate id, the
/// nine parameter rows appended for traceability.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonTable {
    pub columns: Vec<String>,
    pub rows: Vec<(String, Vec<String>)>,
}

pub fn comparison_table(reports: &[CandidateReport]) -> ComparisonTable {
    let columns: Vec<String> = reports.iter().map(|r| r.id.clone()).collect();

    let mut rows: Vec<(String, Vec<String>)> = Vec::new();
    let mut push = |label: &str, cell: fn(&StrategySummary) -> String| {
        let cells = reports.iter().map(|r| cell(&r.summary)).collect();
        rows.push((label.to_string(), cells));
    };

    push("start", |s| format_datetime(s.start));
    push("end", |s| format_datetime(s.end));
    push("duration", |s| format_duration(s.duration));
    push("leverage", |s| s.leverage.to_string());
    push("pl_ret", |s| s.total_return_pct.to_string());
    push("bh_ret", |s| s.buy_hold_return_pct.to_string());
    push("daily_pl_ret", |s| s.daily_return_pct.to_string());
    push("max_drawdown", |s| s.max_drawdown_pct.to_string());
    push("avg_drawdown", |s| s.avg_drawdown_pct.to_string());
    push("avg_so", |s| s.avg_safety_orders.to_string());
    push("max_so", |s| s.max_safety_orders.to_string());
    push("num_deals", |s| s.num_deals.to_string());
    push("avg_deal_duration", |s| s.avg_deal_duration_days.to_string());
    push("max_deal_duration", |s| s.max_deal_duration_days.to_string());

    if let Some(first) = reports.first() {
        for (j, (name, _)) in first.params.iter().enumerate() {
            let cells = reports
                .iter()
                .map(|r| r.params[j].1.clone())
                .collect();
            rows.push((name.to_string(), cells));
        }
    }

    ComparisonTable { columns, rows }
}

fn format_datetime(dt: NaiveDateTime) -> String {
    dt.format("%Y-%m-%d %H:%M").to_string()
}

fn format_duration(duration: Duration) -> String {
    let minutes = duration.num_minutes();
    format!(
        "{}d {:02}:{:02}",
        minutes / (24 * 60),
        minutes / 60 % 24,
        minutes % 60
    )
}
