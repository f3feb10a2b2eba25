//! Matching simulator
//!
//! Computes non-mutating execution plans against the mirror, minus whatever
//! is already reserved. A plan is a proposal, never a trade: the caller
//! decides whether to lock it, and the settlement ledger decides whether it
//! executes.
//!
//! Both walks must replicate the ledger's own matching pass exactly. In
//! particular the price-bound early exit is a correctness condition, not an
//! optimization: asks are price-ascending, so the first ask above the bound
//! proves no further ask can qualify (mirrored for bids below the bound).
//!
//! Fee asymmetry, kept on purpose: the buy path folds the trading fee into
//! the simulated cost because the caller must fund cost-plus-fee at
//! settlement, while the sell path reports raw base quantity — the ledger
//! charges its fee against the buyer's cost and computes sell proceeds
//! itself at settlement time. Do not "fix" this; it mirrors the settlement
//! function's real fee model.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::ids::{InstrumentId, OrderId};
use types::numeric::{Price, Quantity};
use types::order::Side;

use crate::error::ReplicaError;
use crate::mirror::InstrumentBook;
use crate::reserve::ReservationLedger;

/// Basis-point denominator for fee math.
const BPS_SCALE: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);

/// One (order, quantity) pair of an execution plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanFill {
    pub order_id: OrderId,
    pub quantity: Quantity,
}

/// A proposed, non-binding set of fills satisfying a requested trade under a
/// price bound. Never stored; on acceptance it seeds a reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub instrument: InstrumentId,
    /// Taker side of the request.
    pub side: Side,
    /// Fills in matching precedence order.
    pub fills: Vec<PlanFill>,
    /// Buy: aggregate quote-currency cost, fee-inclusive.
    /// Sell: aggregate base-asset quantity, no fee applied (see module docs).
    pub aggregate: Decimal,
}

impl ExecutionPlan {
    /// Total base quantity across all fills.
    pub fn total_quantity(&self) -> Quantity {
        self.fills
            .iter()
            .fold(Quantity::ZERO, |acc, f| {
                acc.checked_add(f.quantity).unwrap_or(acc)
            })
    }
}

/// An order's quantity available to new plans: `total - filled - reserved`.
///
/// This is the single derived quantity the whole engine is built around; it
/// is always computed from its three inputs, never cached.
pub fn available(
    book: &InstrumentBook,
    reservations: &ReservationLedger,
    order_id: OrderId,
) -> Quantity {
    book.get(order_id)
        .map(|o| o.remaining().saturating_sub(reservations.reserved(order_id)))
        .unwrap_or(Quantity::ZERO)
}

/// Simulate buying `quantity` base units at up to `max_price`.
///
/// Walks asks in matching precedence order, taking from each order's
/// available quantity until the request is satisfied or the bound/book is
/// exhausted. Returns `Ok(None)` when zero orders qualify — distinct from a
/// valid plan, and never an error.
pub fn simulate_buy(
    book: &InstrumentBook,
    reservations: &ReservationLedger,
    fee_bps: u32,
    base_decimals: u32,
    quantity: Quantity,
    max_price: Price,
) -> Result<Option<ExecutionPlan>, ReplicaError> {
    if quantity.is_zero() {
        return Ok(None);
    }

    let mut wanted = quantity;
    let mut fills = Vec::new();
    let mut cost = Decimal::ZERO;

    for order in book.asks() {
        // Asks are price-ascending: past the bound, nothing else qualifies.
        if order.price > max_price {
            break;
        }
        let open = order
            .remaining()
            .saturating_sub(reservations.reserved(order.order_id));
        if open.is_zero() {
            continue;
        }

        let fill = wanted.min(open);
        cost = cost
            .checked_add(quote_cost(order.price, fill, base_decimals).ok_or(
                ReplicaError::NumericOverflow {
                    order_id: order.order_id,
                },
            )?)
            .ok_or(ReplicaError::NumericOverflow {
                order_id: order.order_id,
            })?;
        fills.push(PlanFill {
            order_id: order.order_id,
            quantity: fill,
        });

        wanted = wanted.saturating_sub(fill);
        if wanted.is_zero() {
            break;
        }
    }

    if fills.is_empty() {
        return Ok(None);
    }

    // The caller must supply cost-plus-fee to the ledger, so the buy-side
    // aggregate is fee-inclusive.
    let aggregate = apply_fee(cost, fee_bps);

    Ok(Some(ExecutionPlan {
        instrument: book.instrument().clone(),
        side: Side::Buy,
        fills,
        aggregate,
    }))
}

/// Simulate selling `quantity` base units at no less than `min_price`.
///
/// Mirror of the buy path over bids, except the aggregate is base-asset
/// quantity: sell proceeds are computed by the ledger itself at settlement
/// and carry no pre-computed fee here (see module docs).
pub fn simulate_sell(
    book: &InstrumentBook,
    reservations: &ReservationLedger,
    quantity: Quantity,
    min_price: Price,
) -> Result<Option<ExecutionPlan>, ReplicaError> {
    if quantity.is_zero() {
        return Ok(None);
    }

    let mut wanted = quantity;
    let mut fills = Vec::new();
    let mut total = Quantity::ZERO;

    for order in book.bids() {
        // Bids are price-descending: below the bound, nothing else qualifies.
        if order.price < min_price {
            break;
        }
        let open = order
            .remaining()
            .saturating_sub(reservations.reserved(order.order_id));
        if open.is_zero() {
            continue;
        }

        let fill = wanted.min(open);
        total = total
            .checked_add(fill)
            .ok_or(ReplicaError::NumericOverflow {
                order_id: order.order_id,
            })?;
        fills.push(PlanFill {
            order_id: order.order_id,
            quantity: fill,
        });

        wanted = wanted.saturating_sub(fill);
        if wanted.is_zero() {
            break;
        }
    }

    if fills.is_empty() {
        return Ok(None);
    }

    Ok(Some(ExecutionPlan {
        instrument: book.instrument().clone(),
        side: Side::Sell,
        fills,
        aggregate: total.as_decimal(),
    }))
}

/// Quote-currency cost of `fill` base units at `price`, truncating the way
/// the ledger's integer division does: `fill * price / 10^base_decimals`.
fn quote_cost(price: Price, fill: Quantity, base_decimals: u32) -> Option<Decimal> {
    let scale = Decimal::try_from_i128_with_scale(10i128.checked_pow(base_decimals)?, 0).ok()?;
    fill.as_decimal()
        .checked_mul(price.as_decimal())?
        .checked_div(scale)
        .map(|c| c.trunc())
}

/// Add the trading fee (basis points) to a cost, truncating like the ledger.
fn apply_fee(cost: Decimal, fee_bps: u32) -> Decimal {
    let fee = (cost * Decimal::from(fee_bps) / BPS_SCALE).trunc();
    cost + fee
}
