//! DCA strategy configuration and per-bar state machine.

use super::error::GridtraderError;
use super::ohlcv::OhlcvBar;
use super::order::{build_ladder, Order};
use super::position::Position;

/// The nine recognized DCA parameters, strongly typed. Construction of a
/// [`DcaStrategy`] validates the whole set up front so the per-bar loop never
/// has to guard a division.
#[derive(Debug, Clone, PartialEq)]
pub struct DcaConfig {
    /// Take-profit percentage over the weighted entry price (`TP`).
    pub take_profit_pct: f64,
    /// Base-order size (`bo_size`).
    pub base_order_size: f64,
    /// Number of safety orders in the ladder (`so_qty`).
    pub safety_order_count: usize,
    /// Size of the first safety order (`size_1st_so`).
    pub first_safety_order_size: f64,
    /// Geometric size multiplier between successive safety orders
    /// (`so_vol_scale`).
    pub safety_order_volume_scale: f64,
    /// Price step between rungs, in percent (`so_step`).
    pub safety_order_step_pct: f64,
    /// Geometric multiplier applied to the price step per rung
    /// (`so_step_scale`).
    pub safety_order_step_scale: f64,
    /// Trade direction.
    pub long: bool,
    /// Extra cost percentage added to the take-profit trigger, modeling
    /// exchange fee and slippage (`EC`).
    pub extra_cost_pct: f64,
}

impl DcaConfig {
    pub fn validate(&self) -> Result<(), GridtraderError> {
        let positive = [
            ("TP", self.take_profit_pct),
            ("bo_size", self.base_order_size),
        ];
        for (name, value) in positive {
            if value <= 0.0 {
                return Err(GridtraderError::InvalidParameter {
                    name: name.into(),
                    reason: format!("must be positive, got {value}"),
                });
            }
        }
        if self.safety_order_count > 0 {
            let positive = [
                ("size_1st_so", self.first_safety_order_size),
                ("so_vol_scale", self.safety_order_volume_scale),
                ("so_step", self.safety_order_step_pct),
                ("so_step_scale", self.safety_order_step_scale),
            ];
            for (name, value) in positive {
                if value <= 0.0 {
                    return Err(GridtraderError::InvalidParameter {
                        name: name.into(),
                        reason: format!("must be positive, got {value}"),
                    });
                }
            }
        }
        if self.extra_cost_pct < 0.0 {
            return Err(GridtraderError::InvalidParameter {
                name: "EC".into(),
                reason: format!("must be non-negative, got {}", self.extra_cost_pct),
            });
        }
        Ok(())
    }

    /// Parameter rows appended to the comparison table for traceability.
    pub fn params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("TP", self.take_profit_pct.to_string()),
            ("bo_size", self.base_order_size.to_string()),
            ("long", self.long.to_string()),
            ("size_1st_so", self.first_safety_order_size.to_string()),
            ("so_qty", self.safety_order_count.to_string()),
            ("so_step", self.safety_order_step_pct.to_string()),
            ("so_step_scale", self.safety_order_step_scale.to_string()),
            ("so_vol_scale", self.safety_order_volume_scale.to_string()),
            ("EC", self.extra_cost_pct.to_string()),
        ]
    }

    fn direction_sign(&self) -> f64 {
        if self.long {
            1.0
        } else {
            -1.0
        }
    }
}

/// One parameter configuration stepped over a price series.
///
/// Owns the ordered history of positions (at most the last one open) and the
/// magazine of pending safety orders for the open position.
#[derive(Debug, Clone)]
pub struct DcaStrategy {
    config: DcaConfig,
    positions: Vec<Position>,
    magazine: Vec<Order>,
}

impl DcaStrategy {
    pub fn new(config: DcaConfig) -> Result<Self, GridtraderError> {
        config.validate()?;
        Ok(DcaStrategy {
            config,
            positions: Vec::new(),
            magazine: Vec::new(),
        })
    }

    pub fn config(&self) -> &DcaConfig {
        &self.config
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn into_positions(self) -> Vec<Position> {
        self.positions
    }

    pub fn pending_safety_orders(&self) -> &[Order] {
        &self.magazine
    }

    /// Worst-case capital commitment if every ladder rung fills: base order
    /// plus the sum of all safety-order magnitudes at the configured scale.
    pub fn compute_min_capital(&self) -> f64 {
        let c = &self.config;
        let ladder: f64 = (0..c.safety_order_count)
            .map(|i| c.first_safety_order_size * c.safety_order_volume_scale.powi(i as i32))
            .sum();
        c.base_order_size + ladder
    }

    /// Drawdown fraction of the currently tracked position, if any.
    pub fn current_drawdown(&self) -> Option<f64> {
        self.positions.last().map(|p| p.drawdown().pct_float)
    }

    /// Advance the state machine by one bar.
    ///
    /// With an open position: close at the take-profit trigger if the bar's
    /// favorable extreme crossed it, otherwise fill whichever safety orders
    /// the bar's adverse extreme crossed. When flat and the entry signal is
    /// set: open at the bar's open, stage a fresh ladder, and evaluate fills
    /// within the same bar. Excursion trackers run unconditionally at the end
    /// of every bar, on the open or just-closed position.
    pub fn step(&mut self, bar: &OhlcvBar, signal: bool) -> Result<(), GridtraderError> {
        let tp_total = (self.config.take_profit_pct + self.config.extra_cost_pct) / 100.0;
        let open_trigger = match self.positions.last() {
            Some(pos) if !pos.is_closed() => {
                Some(pos.weighted_price() * (1.0 + self.config.direction_sign() * tp_total))
            }
            _ => None,
        };
        if let Some(trigger) = open_trigger {
            let crossed = if self.config.long {
                bar.high > trigger
            } else {
                bar.low < trigger
            };
            if crossed {
                self.track_best_try(bar);
                if let Some(pos) = self.positions.last_mut() {
                    pos.close_entry(trigger, bar.date)?;
                }
                self.magazine.clear();
            } else {
                self.fill_safety_orders(bar)?;
            }
        } else if signal {
            self.open_position(bar)?;
            self.magazine = self.stage_ladder(bar);
            // a rung can fill on the very bar that created it
            self.fill_safety_orders(bar)?;
        }

        self.track_drawdown(bar);
        self.track_best_try(bar);
        Ok(())
    }

    fn open_position(&mut self, bar: &OhlcvBar) -> Result<(), GridtraderError> {
        let mut pos = Position::new(self.config.take_profit_pct)?;
        let size = self.config.direction_sign() * self.config.base_order_size;
        pos.new_entry(size, bar.open, bar.date)?;
        self.positions.push(pos);
        Ok(())
    }

    fn stage_ladder(&self, bar: &OhlcvBar) -> Vec<Order> {
        let c = &self.config;
        let mut ladder = build_ladder(
            c.safety_order_count,
            bar.open,
            bar.date,
            c.first_safety_order_size,
            c.safety_order_volume_scale,
            c.safety_order_step_pct,
            c.safety_order_step_scale,
            c.long,
        );
        if !c.long {
            for order in &mut ladder {
                order.size = -order.size;
            }
        }
        ladder
    }

    /// Fill every pending safety order the bar's range crossed, in rung
    /// order, then drop filled orders from the magazine keeping the rest in
    /// place.
    fn fill_safety_orders(&mut self, bar: &OhlcvBar) -> Result<(), GridtraderError> {
        let long = self.config.long;
        let mut magazine = std::mem::take(&mut self.magazine);
        for order in &mut magazine {
            let crossed = if long {
                bar.low < order.price
            } else {
                bar.high > order.price
            };
            if !crossed {
                continue;
            }
            order.filled = true;
            // the previous last order's best try freezes with this bar
            self.track_best_try(bar);
            if let Some(pos) = self.positions.last_mut() {
                pos.new_entry(order.size, order.price, bar.date)?;
            }
        }
        magazine.retain(|o| !o.filled);
        self.magazine = magazine;
        Ok(())
    }

    fn track_drawdown(&mut self, bar: &OhlcvBar) {
        if let Some(pos) = self.positions.last_mut() {
            pos.update_adverse_excursion(bar);
        }
    }

    fn track_best_try(&mut self, bar: &OhlcvBar) {
        if let Some(pos) = self.positions.last_mut() {
            pos.update_favorable_excursion(bar);
        }
    }
}
