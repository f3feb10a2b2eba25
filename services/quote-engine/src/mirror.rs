//! In-memory order book mirror
//!
//! One `InstrumentBook` per trading pair: an id-keyed map of live orders for
//! O(1) lookup plus two price-time-sorted side sequences. The side ordering
//! reproduces the settlement ledger's own matching precedence exactly —
//! bids `(price desc, timestamp asc)`, asks `(price asc, timestamp asc)` —
//! which is what makes simulated plans valid against the real settlement
//! path. Equal timestamps break by ascending order id (ledger-monotonic).
//!
//! Orders are exclusively owned by the mirror and mutated only through
//! reconciliation; the simulator reads and never writes.

use std::cmp::Reverse;
use std::collections::HashMap;

use types::ids::{InstrumentId, MakerId, OrderId};
use types::numeric::{Price, Quantity};
use types::order::Side;

/// A live order mirrored from the settlement ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub order_id: OrderId,
    pub maker: MakerId,
    pub instrument: InstrumentId,
    pub side: Side,
    pub price: Price,
    /// Total quantity at creation. Never changes.
    pub quantity: Quantity,
    /// Cumulative filled quantity. Monotonically non-decreasing, <= quantity.
    pub filled: Quantity,
    /// Sequence of the last applied fill event. Fills at or below it are
    /// re-deliveries and must not be applied again.
    pub last_fill_sequence: u64,
    /// Ledger creation timestamp (unix nanos), tie-break only.
    pub created_at: i64,
}

impl Order {
    /// True remaining liquidity on the ledger, before reservations.
    pub fn remaining(&self) -> Quantity {
        self.quantity.saturating_sub(self.filled)
    }

    /// Whether the order is completely executed.
    pub fn is_filled(&self) -> bool {
        self.filled >= self.quantity
    }
}

/// Price-time-sorted mirror of one instrument's book.
#[derive(Debug, Clone)]
pub struct InstrumentBook {
    instrument: InstrumentId,
    /// Live orders keyed by id (O(1) lookup).
    orders: HashMap<OrderId, Order>,
    /// Bid ids ordered (price desc, timestamp asc, id asc).
    bids: Vec<OrderId>,
    /// Ask ids ordered (price asc, timestamp asc, id asc).
    asks: Vec<OrderId>,
}

impl InstrumentBook {
    /// Create an empty book for the given instrument.
    pub fn new(instrument: InstrumentId) -> Self {
        Self {
            instrument,
            orders: HashMap::new(),
            bids: Vec::new(),
            asks: Vec::new(),
        }
    }

    /// The instrument this book mirrors.
    pub fn instrument(&self) -> &InstrumentId {
        &self.instrument
    }

    /// Insert a live order at its price-time position.
    ///
    /// Returns false (leaving the book untouched) if the id is already
    /// present, which makes re-delivered `Created` events idempotent.
    /// Insertion is O(n) in the side length; the mirrored on-chain book is
    /// already bounded, so linear sides beat the bookkeeping of anything
    /// fancier.
    pub fn insert(&mut self, order: Order) -> bool {
        if self.orders.contains_key(&order.order_id) {
            return false;
        }

        let orders = &self.orders;
        match order.side {
            Side::Buy => {
                let pos = self.bids.partition_point(|id| {
                    let resting = &orders[id];
                    (Reverse(resting.price), resting.created_at, resting.order_id)
                        < (Reverse(order.price), order.created_at, order.order_id)
                });
                self.bids.insert(pos, order.order_id);
            }
            Side::Sell => {
                let pos = self.asks.partition_point(|id| {
                    let resting = &orders[id];
                    (resting.price, resting.created_at, resting.order_id)
                        < (order.price, order.created_at, order.order_id)
                });
                self.asks.insert(pos, order.order_id);
            }
        }

        self.orders.insert(order.order_id, order);
        true
    }

    /// Remove an order from its side. No-op (None) if absent.
    pub fn remove(&mut self, order_id: OrderId) -> Option<Order> {
        let order = self.orders.remove(&order_id)?;
        let side_ids = match order.side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        side_ids.retain(|id| *id != order_id);
        Some(order)
    }

    /// O(1) lookup by id.
    pub fn get(&self, order_id: OrderId) -> Option<&Order> {
        self.orders.get(&order_id)
    }

    /// Mutable lookup, for reconciliation only.
    pub(crate) fn get_mut(&mut self, order_id: OrderId) -> Option<&mut Order> {
        self.orders.get_mut(&order_id)
    }

    /// Whether an order is live on this book.
    pub fn contains(&self, order_id: OrderId) -> bool {
        self.orders.contains_key(&order_id)
    }

    /// Bids in matching precedence order (best price first).
    pub fn bids(&self) -> impl Iterator<Item = &Order> {
        self.bids.iter().map(|id| &self.orders[id])
    }

    /// Asks in matching precedence order (best price first).
    pub fn asks(&self) -> impl Iterator<Item = &Order> {
        self.asks.iter().map(|id| &self.orders[id])
    }

    /// Number of live orders.
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    /// Whether the book holds no live orders.
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Verify both side orderings. Test support.
    #[cfg(test)]
    pub(crate) fn sides_sorted(&self) -> bool {
        let bids_ok = self.bids.windows(2).all(|w| {
            let a = &self.orders[&w[0]];
            let b = &self.orders[&w[1]];
            (Reverse(a.price), a.created_at, a.order_id)
                < (Reverse(b.price), b.created_at, b.order_id)
        });
        let asks_ok = self.asks.windows(2).all(|w| {
            let a = &self.orders[&w[0]];
            let b = &self.orders[&w[1]];
            (a.price, a.created_at, a.order_id) < (b.price, b.created_at, b.order_id)
        });
        bids_ok && asks_ok
    }
}
