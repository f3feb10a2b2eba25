//! Ledger event definitions for the quote engine
//!
//! The settlement ledger emits three lifecycle event kinds per instrument,
//! delivered at-least-once and in emission order. Numeric fields travel as
//! decimal strings because raw ledger values exceed 53-bit integers.
//!
//! Events are a tagged union with exhaustive handling — no dynamically-keyed
//! dispatch.

use serde::{Deserialize, Serialize};
use types::ids::{InstrumentId, MakerId, OrderId};
use types::numeric::{Price, Quantity};
use types::order::Side;

/// A lifecycle event emitted by the settlement ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum LedgerEvent {
    /// A new order was placed on the ledger book.
    Created {
        order_id: OrderId,
        maker: MakerId,
        instrument: InstrumentId,
        side: Side,
        price: Price,
        quantity: Quantity,
        /// Ledger timestamp in unix nanoseconds. Tie-break only, never
        /// wall-clock-authoritative.
        timestamp: i64,
    },

    /// An order was (partially) executed on the ledger.
    Filled {
        order_id: OrderId,
        instrument: InstrumentId,
        /// Ledger-assigned execution sequence, strictly increasing per
        /// order. A re-delivered event carries the same sequence, which is
        /// what lets reconciliation drop duplicates of a partial fill.
        sequence: u64,
        /// The incremental fill amount, not the cumulative total.
        fill_quantity: Quantity,
    },

    /// An order was cancelled on the ledger.
    Cancelled {
        order_id: OrderId,
        instrument: InstrumentId,
    },
}

impl LedgerEvent {
    /// The order this event refers to.
    pub fn order_id(&self) -> OrderId {
        match self {
            LedgerEvent::Created { order_id, .. } => *order_id,
            LedgerEvent::Filled { order_id, .. } => *order_id,
            LedgerEvent::Cancelled { order_id, .. } => *order_id,
        }
    }

    /// The instrument whose book this event mutates.
    pub fn instrument(&self) -> &InstrumentId {
        match self {
            LedgerEvent::Created { instrument, .. } => instrument,
            LedgerEvent::Filled { instrument, .. } => instrument,
            LedgerEvent::Cancelled { instrument, .. } => instrument,
        }
    }

    /// Event kind as a string label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            LedgerEvent::Created { .. } => "Created",
            LedgerEvent::Filled { .. } => "Filled",
            LedgerEvent::Cancelled { .. } => "Cancelled",
        }
    }
}

/// One live order row from the ledger's snapshot query.
///
/// Snapshot rows carry the already-accumulated fill, so replaying a snapshot
/// is equivalent to replaying a synthetic `Created` plus its fills.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_id: OrderId,
    pub maker: MakerId,
    pub instrument: InstrumentId,
    pub side: Side,
    pub price: Price,
    pub quantity: Quantity,
    pub filled: Quantity,
    pub timestamp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created(id: u64) -> LedgerEvent {
        LedgerEvent::Created {
            order_id: OrderId::from_u64(id),
            maker: MakerId::new("0xmaker"),
            instrument: InstrumentId::new("BTC/USDT"),
            side: Side::Sell,
            price: Price::from_u64(100),
            quantity: Quantity::from_u64(10),
            timestamp: 1_708_123_456_789_000_000,
        }
    }

    #[test]
    fn test_event_accessors() {
        let e = created(7);
        assert_eq!(e.order_id(), OrderId::from_u64(7));
        assert_eq!(e.instrument().as_str(), "BTC/USDT");
        assert_eq!(e.label(), "Created");
    }

    #[test]
    fn test_tagged_serialization() {
        let e = created(7);
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("\"event_type\":\"Created\""));

        let back: LedgerEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(e, back);
    }

    #[test]
    fn test_numeric_fields_are_strings_on_the_wire() {
        let e = LedgerEvent::Filled {
            order_id: OrderId::from_u64(1),
            instrument: InstrumentId::new("BTC/USDT"),
            sequence: 1,
            fill_quantity: Quantity::from_str("123456789012345678901234567").unwrap(),
        };
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("\"123456789012345678901234567\""));

        let back: LedgerEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(e, back);
    }

    #[test]
    fn test_order_record_roundtrip() {
        let record = OrderRecord {
            order_id: OrderId::from_u64(3),
            maker: MakerId::new("0xmaker"),
            instrument: InstrumentId::new("ETH/USDC"),
            side: Side::Buy,
            price: Price::from_u64(2000),
            quantity: Quantity::from_u64(5),
            filled: Quantity::from_u64(2),
            timestamp: 1_708_123_456_789_000_000,
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: OrderRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, back);
    }
}
