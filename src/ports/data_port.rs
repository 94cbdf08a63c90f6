//! Price-series access port trait.

use crate::domain::error::GridtraderError;
use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDateTime;

/// Source of one kline series, sorted by strictly increasing timestamp.
/// `start`/`end` bound the series inclusively when given.
pub trait DataPort {
    fn fetch_klines(
        &self,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<Vec<OhlcvBar>, GridtraderError>;
}
