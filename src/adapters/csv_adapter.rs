//! CSV kline file adapter implementing [`DataPort`].
//!
//! Reads exchange kline exports with an `open_time` column plus OHLCV
//! columns, located by header name rather than position.

use crate::domain::error::GridtraderError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::data_port::DataPort;
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct CsvKlineAdapter {
    path: PathBuf,
}

impl CsvKlineAdapter {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Result<usize, GridtraderError> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
        .ok_or_else(|| GridtraderError::Data {
            reason: format!("missing column: {name}"),
        })
}

fn parse_field(record: &csv::StringRecord, index: usize, name: &str) -> Result<f64, GridtraderError> {
    let raw = record.get(index).ok_or_else(|| GridtraderError::Data {
        reason: format!("short record, no {name} field"),
    })?;
    raw.trim().parse().map_err(|_| GridtraderError::Data {
        reason: format!("invalid {name} value: {raw}"),
    })
}

impl DataPort for CsvKlineAdapter {
    fn fetch_klines(
        &self,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<Vec<OhlcvBar>, GridtraderError> {
        let mut reader =
            csv::Reader::from_path(&self.path).map_err(|e| GridtraderError::Data {
                reason: format!("failed to open {}: {e}", self.path.display()),
            })?;

        let headers = reader
            .headers()
            .map_err(|e| GridtraderError::Data {
                reason: format!("CSV header error: {e}"),
            })?
            .clone();
        let time_col = column_index(&headers, "open_time")?;
        let open_col = column_index(&headers, "open")?;
        let high_col = column_index(&headers, "high")?;
        let low_col = column_index(&headers, "low")?;
        let close_col = column_index(&headers, "close")?;
        let volume_col = column_index(&headers, "volume")?;

        let mut bars = Vec::new();
        for result in reader.records() {
            let record = result.map_err(|e| GridtraderError::Data {
                reason: format!("CSV parse error: {e}"),
            })?;

            let raw_date = record.get(time_col).ok_or_else(|| GridtraderError::Data {
                reason: "short record, no open_time field".into(),
            })?;
            let date = NaiveDateTime::parse_from_str(raw_date.trim(), TIMESTAMP_FORMAT)
                .map_err(|e| GridtraderError::Data {
                    reason: format!("invalid open_time {raw_date}: {e}"),
                })?;

            if start.is_some_and(|s| date < s) || end.is_some_and(|e| date > e) {
                continue;
            }

            bars.push(OhlcvBar {
                date,
                open: parse_field(&record, open_col, "open")?,
                high: parse_field(&record, high_col, "high")?,
                low: parse_field(&record, low_col, "low")?,
                close: parse_field(&record, close_col, "close")?,
                volume: parse_field(&record, volume_col, "volume")?,
            });
        }

        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }
}
