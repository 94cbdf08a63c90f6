//! Position lifecycle: entry ladder through exit.

use chrono::NaiveDateTime;

use super::error::GridtraderError;
use super::ohlcv::OhlcvBar;
use super::order::{round7, Order};

/// Worst adverse price excursion over a position's lifetime, measured against
/// the first entry's price (not the weighted price).
#[derive(Debug, Clone, PartialEq)]
pub struct Drawdown {
    pub price: f64,
    pub date: Option<NaiveDateTime>,
    pub pct: String,
    pub pct_float: f64,
}

impl Drawdown {
    fn unset() -> Self {
        Drawdown {
            price: 0.0,
            date: None,
            pct: String::new(),
            pct_float: 0.0,
        }
    }
}

/// One trade cycle: a base entry, zero or more safety-order fills, and at
/// most one closing order.
#[derive(Debug, Clone)]
pub struct Position {
    net_size: f64,
    weighted_price: f64,
    orders: Vec<Order>,
    closed: bool,
    take_profit_pct: f64,
    take_profit_price: f64,
    drawdown: Drawdown,
}

impl Position {
    /// Rejecting a non-positive take-profit here keeps every later progress
    /// computation away from a zero-width target.
    pub fn new(take_profit_pct: f64) -> Result<Self, GridtraderError> {
        if take_profit_pct <= 0.0 {
            return Err(GridtraderError::InvalidParameter {
                name: "TP".into(),
                reason: format!("take-profit must be positive, got {take_profit_pct}"),
            });
        }
        Ok(Position {
            net_size: 0.0,
            weighted_price: 0.0,
            orders: Vec::new(),
            closed: false,
            take_profit_pct,
            take_profit_price: 0.0,
            drawdown: Drawdown::unset(),
        })
    }

    /// Append a filled entry order and fold it into the weighted price.
    ///
    /// The take-profit price is recomputed from the new weighted price on
    /// every entry. The first entry also seeds the drawdown anchor.
    pub fn new_entry(
        &mut self,
        size: f64,
        price: f64,
        date: NaiveDateTime,
    ) -> Result<(), GridtraderError> {
        if self.closed {
            return Err(GridtraderError::PositionClosed);
        }
        let new_net = self.net_size + size;
        if new_net == 0.0 {
            return Err(GridtraderError::FlatPosition);
        }

        self.weighted_price = (self.net_size * self.weighted_price + size * price) / new_net;
        let tp_factor = if new_net > 0.0 {
            1.0 + self.take_profit_pct / 100.0
        } else {
            1.0 - self.take_profit_pct / 100.0
        };
        self.take_profit_price = round7(self.weighted_price * tp_factor);
        self.net_size = new_net;

        let mut order = Order::pending(size, price, date);
        order.filled = true;
        self.orders.push(order);

        if self.orders.len() == 1 {
            self.drawdown.price = self.weighted_price;
        }
        Ok(())
    }

    /// Close the whole position with an order that exactly offsets the net
    /// size. A second close is an error, not a silent double-close.
    pub fn close_entry(&mut self, price: f64, date: NaiveDateTime) -> Result<(), GridtraderError> {
        if self.closed {
            return Err(GridtraderError::PositionClosed);
        }
        let mut order = Order::pending(-self.net_size, price, date);
        order.filled = true;
        self.orders.push(order);
        self.closed = true;
        Ok(())
    }

    /// Track the lowest low (long) / highest high (short) seen so far.
    ///
    /// The recorded percentage is relative to the first order's price and can
    /// only widen over the position's lifetime.
    pub fn update_adverse_excursion(&mut self, bar: &OhlcvBar) {
        let Some(first_price) = self.orders.first().map(|o| o.price) else {
            return;
        };
        let extended = if self.is_long() {
            self.drawdown.price > bar.low
        } else {
            self.drawdown.price < bar.high
        };
        if !extended {
            return;
        }
        self.drawdown.price = if self.is_long() { bar.low } else { bar.high };
        self.drawdown.date = Some(bar.date);
        let pct = self.drawdown.price / first_price - 1.0;
        self.drawdown.pct = format!("{:.2}%", pct * 100.0);
        self.drawdown.pct_float = pct;
    }

    /// Track the best try of the most recently added order only; the best-try
    /// history of earlier orders freezes when a later order fills.
    ///
    /// Longs cap the best price at the take-profit price and record a
    /// normalized progress index; shorts mirror with the bar low. A zero
    /// best-try price counts as unseeded for shorts, where every real price
    /// sits above it.
    pub fn update_favorable_excursion(&mut self, bar: &OhlcvBar) {
        let tp_price = self.take_profit_price;
        let long = self.is_long();
        let Some(last) = self.orders.last_mut() else {
            return;
        };
        if long {
            if last.best_try.price < bar.high {
                let best = bar.high.min(tp_price);
                last.best_try.price = best;
                if tp_price != last.price {
                    last.best_try.progress =
                        round7((best - last.price) / (tp_price - last.price));
                }
                last.best_try.date = bar.date;
            }
        } else if last.best_try.price == 0.0 || last.best_try.price > bar.low {
            let best = bar.low.max(tp_price);
            last.best_try.price = best;
            if tp_price != last.price {
                last.best_try.progress = round7((last.price - best) / (last.price - tp_price));
            }
            last.best_try.date = bar.date;
        }
    }

    /// Net entry size. Closing does not zero this out; the closing order's
    /// size is its exact negation.
    pub fn net_size(&self) -> f64 {
        self.net_size
    }

    pub fn weighted_price(&self) -> f64 {
        self.weighted_price
    }

    pub fn take_profit_pct(&self) -> f64 {
        self.take_profit_pct
    }

    pub fn take_profit_price(&self) -> f64 {
        self.take_profit_price
    }

    pub fn is_long(&self) -> bool {
        self.net_size > 0.0
    }

    pub fn is_short(&self) -> bool {
        self.net_size < 0.0
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn drawdown(&self) -> &Drawdown {
        &self.drawdown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{NaiveDate, NaiveDateTime};

    fn ts(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2022, 1, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn bar(day: u32, open: f64, high: f64, low: f64, close: f64) -> OhlcvBar {
        OhlcvBar {
            date: ts(day, 0),
            open,
            high,
            low,
            close,
            volume: 1_000.0,
        }
    }

    fn open_long() -> Position {
        let mut pos = Position::new(1.0).unwrap();
        pos.new_entry(100.0, 10.0, ts(1, 0)).unwrap();
        pos
    }

    #[test]
    fn rejects_non_positive_take_profit() {
        assert!(Position::new(0.0).is_err());
        assert!(Position::new(-1.0).is_err());
    }

    #[test]
    fn weighted_price_folds_entries() {
        let mut pos = open_long();
        pos.new_entry(50.0, 8.0, ts(2, 0)).unwrap();
        // (100*10 + 50*8) / 150
        assert_relative_eq!(pos.weighted_price(), 9.333333333333334, max_relative = 1e-12);
        assert_relative_eq!(pos.net_size(), 150.0);
    }

    #[test]
    fn take_profit_price_tracks_weighted_price() {
        let mut pos = Position::new(1.0).unwrap();
        pos.new_entry(100.0, 100.0, ts(1, 0)).unwrap();
        assert_eq!(pos.take_profit_price(), 101.0);
        pos.new_entry(100.0, 90.0, ts(2, 0)).unwrap();
        // weighted 95, +1%
        assert_eq!(pos.take_profit_price(), round7(95.0 * 1.01));
    }

    #[test]
    fn short_take_profit_sits_below_weighted_price() {
        let mut pos = Position::new(2.0).unwrap();
        pos.new_entry(-100.0, 50.0, ts(1, 0)).unwrap();
        assert!(pos.is_short());
        assert_eq!(pos.take_profit_price(), 49.0);
    }

    #[test]
    fn first_entry_seeds_drawdown_anchor() {
        let pos = open_long();
        assert_eq!(pos.drawdown().price, 10.0);
        assert!(pos.drawdown().date.is_none());
    }

    #[test]
    fn entry_on_flat_position_errors() {
        let mut pos = open_long();
        assert!(matches!(
            pos.new_entry(-100.0, 9.0, ts(2, 0)),
            Err(GridtraderError::FlatPosition)
        ));
    }

    #[test]
    fn close_offsets_net_size_exactly() {
        let mut pos = open_long();
        pos.close_entry(10.1, ts(3, 0)).unwrap();
        assert!(pos.is_closed());
        let closing = pos.orders().last().unwrap();
        assert_eq!(closing.size, -100.0);
        assert_eq!(closing.price, 10.1);
    }

    #[test]
    fn double_close_errors() {
        let mut pos = open_long();
        pos.close_entry(10.1, ts(3, 0)).unwrap();
        assert!(matches!(
            pos.close_entry(10.2, ts(4, 0)),
            Err(GridtraderError::PositionClosed)
        ));
        assert_eq!(pos.orders().len(), 2);
    }

    #[test]
    fn entry_after_close_errors() {
        let mut pos = open_long();
        pos.close_entry(10.1, ts(3, 0)).unwrap();
        assert!(matches!(
            pos.new_entry(10.0, 9.0, ts(4, 0)),
            Err(GridtraderError::PositionClosed)
        ));
    }

    #[test]
    fn long_drawdown_only_widens() {
        let mut pos = open_long();
        pos.update_adverse_excursion(&bar(2, 10.0, 10.5, 9.0, 9.5));
        assert_eq!(pos.drawdown().price, 9.0);
        assert_relative_eq!(pos.drawdown().pct_float, -0.1, max_relative = 1e-12);
        assert_eq!(pos.drawdown().pct, "-10.00%");

        // a shallower bar never heals the record
        pos.update_adverse_excursion(&bar(3, 9.5, 10.8, 9.4, 10.0));
        assert_eq!(pos.drawdown().price, 9.0);
        assert_eq!(pos.drawdown().date, Some(ts(2, 0)));

        pos.update_adverse_excursion(&bar(4, 9.0, 9.2, 8.0, 8.1));
        assert_relative_eq!(pos.drawdown().pct_float, -0.2, max_relative = 1e-12);
    }

    #[test]
    fn short_drawdown_tracks_highest_high() {
        let mut pos = Position::new(1.0).unwrap();
        pos.new_entry(-100.0, 10.0, ts(1, 0)).unwrap();
        pos.update_adverse_excursion(&bar(2, 10.0, 11.0, 9.8, 10.5));
        assert_eq!(pos.drawdown().price, 11.0);
        assert!(pos.drawdown().pct_float > 0.0);
        assert_eq!(pos.drawdown().pct, "10.00%");
    }

    #[test]
    fn favorable_excursion_caps_at_take_profit() {
        let mut pos = Position::new(1.0).unwrap();
        pos.new_entry(100.0, 100.0, ts(1, 0)).unwrap();
        pos.update_favorable_excursion(&bar(2, 100.0, 105.0, 99.0, 104.0));
        let last = pos.orders().last().unwrap();
        assert_eq!(last.best_try.price, 101.0);
        assert_eq!(last.best_try.progress, 1.0);
        assert_eq!(last.best_try.date, ts(2, 0));
    }

    #[test]
    fn favorable_excursion_progress_is_normalized() {
        let mut pos = Position::new(1.0).unwrap();
        pos.new_entry(100.0, 100.0, ts(1, 0)).unwrap();
        pos.update_favorable_excursion(&bar(2, 100.0, 100.5, 99.0, 100.2));
        let last = pos.orders().last().unwrap();
        assert_eq!(last.best_try.price, 100.5);
        assert_eq!(last.best_try.progress, 0.5);
    }

    #[test]
    fn favorable_excursion_never_regresses() {
        let mut pos = Position::new(1.0).unwrap();
        pos.new_entry(100.0, 100.0, ts(1, 0)).unwrap();
        pos.update_favorable_excursion(&bar(2, 100.0, 100.8, 99.0, 100.2));
        pos.update_favorable_excursion(&bar(3, 100.2, 100.3, 99.5, 99.8));
        let last = pos.orders().last().unwrap();
        assert_eq!(last.best_try.price, 100.8);
        assert_eq!(last.best_try.date, ts(2, 0));
    }

    #[test]
    fn earlier_orders_freeze_when_later_order_fills() {
        let mut pos = Position::new(1.0).unwrap();
        pos.new_entry(100.0, 100.0, ts(1, 0)).unwrap();
        pos.update_favorable_excursion(&bar(2, 100.0, 100.4, 99.0, 100.0));
        let frozen = pos.orders()[0].best_try.clone();

        pos.new_entry(200.0, 98.0, ts(3, 0)).unwrap();
        pos.update_favorable_excursion(&bar(4, 98.0, 100.9, 97.5, 100.5));

        assert_eq!(pos.orders()[0].best_try, frozen);
        assert!(pos.orders()[1].best_try.price > 0.0);
    }

    #[test]
    fn short_favorable_excursion_seeds_then_caps() {
        let mut pos = Position::new(2.0).unwrap();
        pos.new_entry(-100.0, 50.0, ts(1, 0)).unwrap();
        // tp price = 49
        pos.update_favorable_excursion(&bar(2, 50.0, 50.5, 49.5, 49.7));
        let last = pos.orders().last().unwrap();
        assert_eq!(last.best_try.price, 49.5);
        assert_eq!(last.best_try.progress, 0.5);

        let mut pos2 = Position::new(2.0).unwrap();
        pos2.new_entry(-100.0, 50.0, ts(1, 0)).unwrap();
        pos2.update_favorable_excursion(&bar(2, 50.0, 50.5, 48.0, 48.5));
        assert_eq!(pos2.orders().last().unwrap().best_try.price, 49.0);
        assert_eq!(pos2.orders().last().unwrap().best_try.progress, 1.0);
    }
}
