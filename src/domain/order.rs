//! Orders and the safety-order ladder builder.

use chrono::NaiveDateTime;

/// Most favorable price an order's position reached toward its take-profit
/// target while this order was the most recent one in its position.
///
/// `progress` normalizes the excursion into [0, 1]: 0 at the order's own
/// price, 1 at the take-profit price.
#[derive(Debug, Clone, PartialEq)]
pub struct BestTry {
    pub price: f64,
    pub progress: f64,
    pub date: NaiveDateTime,
}

/// One fill event or pending limit order.
///
/// Size is signed: positive sizes increase a long position, negative sizes
/// open short exposure or offset an existing position. Once filled, only the
/// best-try record is ever updated, and only by the owning position.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub size: f64,
    pub price: f64,
    pub date: NaiveDateTime,
    pub filled: bool,
    pub best_try: BestTry,
}

impl Order {
    pub fn pending(size: f64, price: f64, date: NaiveDateTime) -> Self {
        Order {
            size,
            price,
            date,
            filled: false,
            best_try: BestTry {
                price: 0.0,
                progress: 0.0,
                date,
            },
        }
    }

    pub fn is_long(&self) -> bool {
        self.size > 0.0
    }

    pub fn is_short(&self) -> bool {
        self.size < 0.0
    }
}

/// Round to the 7 decimal places carried by trigger and take-profit prices.
pub fn round7(value: f64) -> f64 {
    (value * 1e7).round() / 1e7
}

/// Build the pending safety-order ladder for one position.
///
/// Order `i` (0-indexed) has size `first_size * size_scale^i`, always a
/// positive magnitude; the caller applies the direction sign. Trigger prices
/// compound: the multiplier for order `i` is the running product of
/// `1 - sign * price_step/100 * step_scale^j` for `j = 0..=i`, so each rung is
/// anchored to the drift of all previous steps rather than to the anchor
/// price alone. The ladder descends for longs and ascends for shorts.
pub fn build_ladder(
    count: usize,
    anchor_price: f64,
    anchor_date: NaiveDateTime,
    first_size: f64,
    size_scale: f64,
    price_step: f64,
    step_scale: f64,
    is_long: bool,
) -> Vec<Order> {
    let sign = if is_long { 1.0 } else { -1.0 };
    let mut orders = Vec::with_capacity(count);
    let mut cumulative = 1.0;
    for i in 0..count {
        let size = first_size * size_scale.powi(i as i32);
        cumulative *= 1.0 - sign * price_step / 100.0 * step_scale.powi(i as i32);
        orders.push(Order::pending(
            size,
            round7(anchor_price * cumulative),
            anchor_date,
        ));
    }
    orders
}
