//! End-to-end pipeline tests: config and klines in from disk, comparison
//! table out through the report adapter.

mod common;

use common::*;
use gridtrader::adapters::csv_adapter::CsvKlineAdapter;
use gridtrader::adapters::csv_report_adapter::CsvReportAdapter;
use gridtrader::adapters::file_config_adapter::FileConfigAdapter;
use gridtrader::domain::backtest::{self, RunOutcome, DEFAULT_DRAWDOWN_TOLERANCE};
use gridtrader::domain::error::GridtraderError;
use gridtrader::domain::grid::{spawn_candidates, ParameterGrid};
use gridtrader::domain::report::{comparison_table, evaluate_candidates, make_report};
use gridtrader::domain::signal::asap_signal;
use gridtrader::domain::strategy::DcaStrategy;
use gridtrader::ports::data_port::DataPort;
use gridtrader::ports::report_port::ReportPort;
use std::fs;
use tempfile::TempDir;

const RUN_CONFIG: &str = "
[data]
file = klines.csv

[backtest]
drawdown_tolerance = -0.35
leverage = 1

[signal]
kind = asap

[grid]
TP = 1.0
bo_size = 100
so_qty = 0, 2
size_1st_so = 125
so_vol_scale = 2.0
so_step = 2.5
so_step_scale = 1.3
long = true
EC = 0.0
";

fn kline_csv(bars: &[(u32, f64, f64, f64, f64)]) -> String {
    let mut content = String::from("open_time,open,high,low,close,volume\n");
    for (day, open, high, low, close) in bars {
        content.push_str(&format!(
            "2022-01-{day:02} 00:00:00,{open},{high},{low},{close},1000\n"
        ));
    }
    content
}

mod full_pipeline {
    use super::*;

    #[test]
    fn config_and_data_to_written_report() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("run.ini");
        let data_path = dir.path().join("klines.csv");
        let report_path = dir.path().join("report.csv");

        fs::write(&config_path, RUN_CONFIG).unwrap();
        fs::write(
            &data_path,
            kline_csv(&[
                (1, 100.0, 100.5, 99.5, 100.0),
                (2, 100.0, 100.4, 96.0, 97.0),
                (3, 97.0, 102.0, 96.5, 101.5),
                (4, 101.5, 101.8, 101.0, 101.2),
            ]),
        )
        .unwrap();

        let config = FileConfigAdapter::from_file(&config_path).unwrap();
        let grid = ParameterGrid::from_config(&config).unwrap();
        let candidates = spawn_candidates(&grid).unwrap();
        assert_eq!(candidates.len(), 2);

        let bars = CsvKlineAdapter::new(&data_path)
            .fetch_klines(None, None)
            .unwrap();
        assert_eq!(bars.len(), 4);

        let signals = asap_signal(bars.len());
        let reports =
            evaluate_candidates(&candidates, &bars, &signals, -0.35, 1.0).unwrap();
        let table = comparison_table(&reports);

        let adapter = CsvReportAdapter::default();
        adapter
            .write(&table, report_path.to_str().unwrap())
            .unwrap();

        let written = fs::read_to_string(&report_path).unwrap();
        let mut lines = written.lines();
        assert_eq!(lines.next(), Some("metric,A0,A1"));
        assert!(written.contains("\nnum_deals,"));
        // the nine parameter rows are appended for traceability
        assert!(written.contains("\nso_qty,0,2\n"));
        assert!(written.contains("\nEC,0,0\n"));
    }

    #[test]
    fn report_runs_are_byte_identical() {
        let bars = vec![
            make_bar(1, 100.0, 100.5, 99.5, 100.0),
            make_bar(2, 100.0, 100.4, 96.0, 97.0),
            make_bar(3, 97.0, 102.0, 96.5, 101.5),
            make_bar(4, 101.5, 103.0, 101.0, 102.5),
            make_bar(5, 102.5, 104.0, 102.0, 103.8),
        ];
        let signals = asap_signal(bars.len());
        let grid = ParameterGrid {
            take_profit_pct: vec![0.5, 1.0],
            base_order_size: vec![100.0],
            safety_order_count: vec![0, 2],
            first_safety_order_size: vec![125.0],
            safety_order_volume_scale: vec![2.0],
            safety_order_step_pct: vec![2.5],
            safety_order_step_scale: vec![1.3],
            long: vec![true],
            extra_cost_pct: vec![0.0, 0.1],
        };
        let candidates = spawn_candidates(&grid).unwrap();
        assert_eq!(candidates.len(), 8);

        let adapter = CsvReportAdapter::default();
        let first = adapter
            .render(&comparison_table(
                &evaluate_candidates(&candidates, &bars, &signals, -0.35, 1.0).unwrap(),
            ))
            .unwrap();
        let second = adapter
            .render(&comparison_table(
                &evaluate_candidates(&candidates, &bars, &signals, -0.35, 1.0).unwrap(),
            ))
            .unwrap();
        assert_eq!(first, second);
    }
}

mod driver_scenarios {
    use super::*;

    #[test]
    fn flat_series_leaves_single_open_deal() {
        let mut strategy = DcaStrategy::new(ladderless_config()).unwrap();
        let bars = flat_bars(100.0, 5);
        let signals = [true, false, false, false, false];

        let outcome =
            backtest::run(&mut strategy, &bars, &signals, DEFAULT_DRAWDOWN_TOLERANCE).unwrap();
        assert_eq!(outcome, RunOutcome::Completed);

        let positions = strategy.positions();
        assert_eq!(positions.len(), 1);
        assert!(!positions[0].is_closed());
        assert_eq!(positions[0].orders()[0].price, 100.0);
        assert_eq!(positions[0].take_profit_price(), 101.0);

        let report = make_report(positions);
        assert_eq!(report.len(), 1);
        assert!(!report[0].is_closed);
    }

    #[test]
    fn num_deals_matches_closed_positions_on_full_run() {
        // two complete cycles: dip-free entries that hit take-profit fast
        let bars = vec![
            make_bar(1, 100.0, 100.2, 99.9, 100.0),
            make_bar(2, 100.0, 102.0, 99.8, 101.5),
            make_bar(3, 101.5, 101.6, 101.2, 101.4),
            make_bar(4, 101.4, 103.5, 101.2, 103.0),
        ];
        let signals = vec![true, false, true, false];
        let mut strategy = DcaStrategy::new(ladderless_config()).unwrap();
        let outcome =
            backtest::run(&mut strategy, &bars, &signals, DEFAULT_DRAWDOWN_TOLERANCE).unwrap();
        assert_eq!(outcome, RunOutcome::Completed);

        let closed = strategy
            .positions()
            .iter()
            .filter(|p| p.is_closed())
            .count();
        assert_eq!(closed, 2);

        let report = make_report(strategy.positions());
        assert_eq!(report.len(), closed);
        assert!(report.iter().all(|row| row.is_closed));
    }

    #[test]
    fn signal_mismatch_fails_before_any_step() {
        let mut strategy = DcaStrategy::new(ladderless_config()).unwrap();
        let bars = flat_bars(100.0, 5);
        let err = backtest::run(&mut strategy, &bars, &[true; 3], -0.35).unwrap_err();
        assert!(matches!(err, GridtraderError::SignalLength { .. }));
        assert!(strategy.positions().is_empty());
    }

    #[test]
    fn drawdown_breach_reports_partial_history() {
        let bars = vec![
            make_bar(1, 100.0, 100.2, 99.9, 100.0),
            make_bar(2, 100.0, 100.1, 55.0, 56.0),
            make_bar(3, 56.0, 57.0, 55.0, 56.5),
        ];
        let signals = vec![true, false, false];
        let mut strategy = DcaStrategy::new(ladderless_config()).unwrap();
        let outcome = backtest::run(&mut strategy, &bars, &signals, -0.35).unwrap();
        assert_eq!(outcome, RunOutcome::StoppedEarly { bar_index: 1 });

        let report = make_report(strategy.positions());
        assert_eq!(report.len(), 1);
        assert!(!report[0].is_closed);
        assert_eq!(report[0].drawdown_pct, "-45.00%");
    }
}

mod capital_and_ladder {
    use super::*;

    #[test]
    fn min_capital_covers_full_ladder_fill() {
        let strategy = DcaStrategy::new(laddered_config()).unwrap();
        // 100 + (125 + 250 + 500 + 1000)
        assert_eq!(strategy.compute_min_capital(), 1975.0);
    }

    #[test]
    fn worst_case_series_fills_every_rung() {
        let mut strategy = DcaStrategy::new(laddered_config()).unwrap();
        let bars = vec![
            make_bar(1, 100.0, 100.1, 99.9, 100.0),
            make_bar(2, 100.0, 100.0, 50.0, 51.0),
        ];
        let signals = vec![true, false];
        // a 50% crash fills all four rungs and trips the default tolerance
        let outcome =
            backtest::run(&mut strategy, &bars, &signals, DEFAULT_DRAWDOWN_TOLERANCE).unwrap();
        assert_eq!(outcome, RunOutcome::StoppedEarly { bar_index: 1 });

        let position = &strategy.positions()[0];
        assert_eq!(position.orders().len(), 5);
        assert!(strategy.pending_safety_orders().is_empty());
        let committed: f64 = position.orders().iter().map(|o| o.size).sum();
        assert_eq!(committed, strategy.compute_min_capital());
    }
}
