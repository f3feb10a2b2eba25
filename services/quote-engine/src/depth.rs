//! Depth projection for external display
//!
//! Aggregates live orders into price levels of *available* quantity
//! (`total - filled - reserved`). Derived fresh on every read; this view is
//! display-only and never a source of truth for matching.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::ids::InstrumentId;
use types::numeric::{Price, Quantity};

use crate::mirror::InstrumentBook;
use crate::reserve::ReservationLedger;

/// A single displayed price level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Price,
    /// Summed available quantity at this price. Always positive — empty
    /// levels are dropped from the projection.
    pub size: Quantity,
}

/// Externally-visible depth of one instrument's book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookDepth {
    pub instrument: InstrumentId,
    /// Descending price order (best bid first).
    pub bids: Vec<PriceLevel>,
    /// Ascending price order (best ask first).
    pub asks: Vec<PriceLevel>,
}

/// Project the book into displayed depth, net of active reservations.
pub fn project(book: &InstrumentBook, reservations: &ReservationLedger) -> BookDepth {
    let mut bid_levels: BTreeMap<Price, Decimal> = BTreeMap::new();
    let mut ask_levels: BTreeMap<Price, Decimal> = BTreeMap::new();

    for order in book.bids() {
        let open = order
            .remaining()
            .saturating_sub(reservations.reserved(order.order_id));
        if !open.is_zero() {
            *bid_levels.entry(order.price).or_insert(Decimal::ZERO) += open.as_decimal();
        }
    }
    for order in book.asks() {
        let open = order
            .remaining()
            .saturating_sub(reservations.reserved(order.order_id));
        if !open.is_zero() {
            *ask_levels.entry(order.price).or_insert(Decimal::ZERO) += open.as_decimal();
        }
    }

    let to_level = |(price, size): (Price, Decimal)| PriceLevel {
        price,
        // Sizes are sums of non-negative quantities.
        size: Quantity::try_new(size).unwrap_or(Quantity::ZERO),
    };

    BookDepth {
        instrument: book.instrument().clone(),
        bids: bid_levels.into_iter().rev().map(to_level).collect(),
        asks: ask_levels.into_iter().map(to_level).collect(),
    }
}

impl BookDepth {
    /// Total displayed ask size, summed across levels.
    pub fn ask_size(&self) -> Decimal {
        self.asks.iter().map(|l| l.size.as_decimal()).sum()
    }

    /// Total displayed bid size, summed across levels.
    pub fn bid_size(&self) -> Decimal {
        self.bids.iter().map(|l| l.size.as_decimal()).sum()
    }
}
