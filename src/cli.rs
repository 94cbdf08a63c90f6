//! CLI definition and dispatch.

use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvKlineAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{DEFAULT_DRAWDOWN_TOLERANCE, RunOutcome};
use crate::domain::error::GridtraderError;
use crate::domain::grid::{ParameterGrid, spawn_candidates};
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::order::build_ladder;
use crate::domain::report::{comparison_table, evaluate_candidates};
use crate::domain::signal;
use crate::domain::strategy::DcaStrategy;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Parser, Debug)]
#[command(name = "gridtrader", about = "DCA grid-strategy backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the parameter-grid backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Kline CSV file, overriding `[data] file` from the config
        #[arg(short, long)]
        data: Option<PathBuf>,
        /// Write the comparison table here instead of printing it
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the safety-order ladder for one parameter set
    Ladder {
        #[arg(long)]
        count: usize,
        #[arg(long)]
        anchor_price: f64,
        #[arg(long)]
        first_size: f64,
        #[arg(long, default_value_t = 1.0)]
        size_scale: f64,
        #[arg(long)]
        price_step: f64,
        #[arg(long, default_value_t = 1.0)]
        step_scale: f64,
        /// Build an ascending short ladder instead of a descending long one
        #[arg(long)]
        short: bool,
    },
    /// Validate a configuration and show the candidate count
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show the date range of a kline data file
    Info {
        #[arg(short, long)]
        data: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Backtest {
            config,
            data,
            output,
        } => run_backtest(&config, data.as_ref(), output.as_ref()),
        Command::Ladder {
            count,
            anchor_price,
            first_size,
            size_scale,
            price_step,
            step_scale,
            short,
        } => run_ladder(
            count,
            anchor_price,
            first_size,
            size_scale,
            price_step,
            step_scale,
            short,
        ),
        Command::Validate { config } => run_validate(&config),
        Command::Info { data } => run_info(&data),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            (&err).into()
        }
    }
}

fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, GridtraderError> {
    FileConfigAdapter::from_file(path).map_err(|e| GridtraderError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn run_backtest(
    config_path: &PathBuf,
    data_override: Option<&PathBuf>,
    output: Option<&PathBuf>,
) -> Result<(), GridtraderError> {
    eprintln!("Loading config from {}", config_path.display());
    let config = load_config(config_path)?;

    let data_path = match data_override {
        Some(path) => path.clone(),
        None => PathBuf::from(config.get_string("data", "file").ok_or_else(|| {
            GridtraderError::ConfigMissing {
                section: "data".into(),
                key: "file".into(),
            }
        })?),
    };

    let start = parse_optional_datetime(&config, "backtest", "start")?;
    let end = parse_optional_datetime(&config, "backtest", "end")?;
    let bars = CsvKlineAdapter::new(&data_path).fetch_klines(start, end)?;
    if bars.is_empty() {
        return Err(GridtraderError::NoData {
            path: data_path.display().to_string(),
        });
    }
    eprintln!("Loaded {} bars from {}", bars.len(), data_path.display());

    let grid = ParameterGrid::from_config(&config)?;
    let candidates = spawn_candidates(&grid)?;
    if candidates.is_empty() {
        return Err(GridtraderError::ConfigInvalid {
            section: "grid".into(),
            key: "*".into(),
            reason: "grid expands to zero candidates".into(),
        });
    }
    eprintln!("Evaluating {} candidates", candidates.len());

    let signals = build_signal(&config, &bars)?;
    let tolerance = config.get_double(
        "backtest",
        "drawdown_tolerance",
        DEFAULT_DRAWDOWN_TOLERANCE,
    );
    let leverage = config.get_double("backtest", "leverage", 1.0);

    let reports = evaluate_candidates(&candidates, &bars, &signals, tolerance, leverage)?;
    for report in &reports {
        if let RunOutcome::StoppedEarly { bar_index } = report.outcome {
            eprintln!(
                "candidate {} stopped early at bar {bar_index}: drawdown tolerance breached",
                report.id
            );
        }
    }

    let table = comparison_table(&reports);
    let adapter = CsvReportAdapter::default();
    match output {
        Some(path) => {
            adapter.write(&table, &path.display().to_string())?;
            eprintln!("Report written to {}", path.display());
        }
        None => print!("{}", adapter.render(&table)?),
    }
    Ok(())
}

fn run_ladder(
    count: usize,
    anchor_price: f64,
    first_size: f64,
    size_scale: f64,
    price_step: f64,
    step_scale: f64,
    short: bool,
) -> Result<(), GridtraderError> {
    let ladder = build_ladder(
        count,
        anchor_price,
        NaiveDateTime::default(),
        first_size,
        size_scale,
        price_step,
        step_scale,
        !short,
    );
    println!("{:>4} {:>14} {:>14}", "rung", "size", "trigger");
    for (i, order) in ladder.iter().enumerate() {
        println!("{:>4} {:>14.4} {:>14.7}", i, order.size, order.price);
    }
    Ok(())
}

fn run_validate(config_path: &PathBuf) -> Result<(), GridtraderError> {
    let config = load_config(config_path)?;
    let grid = ParameterGrid::from_config(&config)?;
    let candidates = spawn_candidates(&grid)?;
    build_signal(&config, &[])?;
    parse_optional_datetime(&config, "backtest", "start")?;
    parse_optional_datetime(&config, "backtest", "end")?;

    let mut capitals: Vec<f64> = Vec::with_capacity(candidates.len());
    for candidate in &candidates {
        let strategy = DcaStrategy::new(candidate.config.clone())?;
        capitals.push(strategy.compute_min_capital());
    }
    let min = capitals.iter().copied().fold(f64::INFINITY, f64::min);
    let max = capitals.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    println!("config OK: {} candidates", candidates.len());
    if !capitals.is_empty() {
        println!("required capital: {min} .. {max}");
    }
    Ok(())
}

fn run_info(data_path: &PathBuf) -> Result<(), GridtraderError> {
    let bars = CsvKlineAdapter::new(data_path).fetch_klines(None, None)?;
    let (Some(first), Some(last)) = (bars.first(), bars.last()) else {
        return Err(GridtraderError::NoData {
            path: data_path.display().to_string(),
        });
    };
    println!("{}: {} bars", data_path.display(), bars.len());
    println!("first: {}", first.date.format(DATETIME_FORMAT));
    println!("last:  {}", last.date.format(DATETIME_FORMAT));
    Ok(())
}

fn parse_optional_datetime(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<NaiveDateTime>, GridtraderError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => NaiveDateTime::parse_from_str(raw.trim(), DATETIME_FORMAT)
            .map(Some)
            .map_err(|_| GridtraderError::ConfigInvalid {
                section: section.into(),
                key: key.into(),
                reason: format!("invalid datetime (expected {DATETIME_FORMAT}): {raw}"),
            }),
    }
}

fn build_signal(
    config: &dyn ConfigPort,
    bars: &[OhlcvBar],
) -> Result<Vec<bool>, GridtraderError> {
    let kind = config
        .get_string("signal", "kind")
        .unwrap_or_else(|| "asap".to_string());
    match kind.as_str() {
        "asap" => Ok(signal::asap_signal(bars.len())),
        "bollinger" => {
            let timeframe = config.get_int("signal", "timeframe", 1).max(1) as usize;
            let ma_length = config.get_int("signal", "ma_length", 20).max(1) as usize;
            let stddev_mult = config.get_double("signal", "std_dev", 2.0);
            Ok(signal::bollinger_reentry_signal(
                bars, timeframe, ma_length, stddev_mult,
            ))
        }
        "rsi" => {
            let timeframe = config.get_int("signal", "timeframe", 1).max(1) as usize;
            let period = config.get_int("signal", "rsi_length", 14).max(1) as usize;
            let threshold = config.get_double("signal", "rsi_threshold", 30.0);
            Ok(signal::rsi_reentry_signal(bars, timeframe, period, threshold))
        }
        other => Err(GridtraderError::ConfigInvalid {
            section: "signal".into(),
            key: "kind".into(),
            reason: format!("unknown signal kind: {other}"),
        }),
    }
}
