//! Error taxonomy for the quote engine
//!
//! Ledger desync (an event naming an order the mirror does not hold) is not
//! an error at all — it legitimately occurs at snapshot boundaries and is
//! absorbed as a no-op during reconciliation. The variants here cover what
//! callers can actually get back.

use thiserror::Error;
use types::ids::{InstrumentId, OrderId};
use types::numeric::Quantity;

/// Errors surfaced by the quote engine service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplicaError {
    /// A request named an instrument with no book. Client error, not retried.
    #[error("unknown instrument: {instrument}")]
    UnknownInstrument { instrument: InstrumentId },

    /// A reservation would exceed an order's remaining liquidity.
    ///
    /// Cannot happen when simulation and reservation run under the same
    /// instrument lock; if it does, it is a correctness bug, not a
    /// recoverable condition.
    #[error(
        "reservation overrun on order {order_id}: requested {requested}, available {available}"
    )]
    ReservationOverrun {
        order_id: OrderId,
        requested: Quantity,
        available: Quantity,
    },

    /// Decimal arithmetic overflowed while computing a plan aggregate.
    #[error("numeric overflow computing aggregate for order {order_id}")]
    NumericOverflow { order_id: OrderId },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_instrument_display() {
        let err = ReplicaError::UnknownInstrument {
            instrument: InstrumentId::new("BTC/USDT"),
        };
        assert_eq!(err.to_string(), "unknown instrument: BTC/USDT");
    }

    #[test]
    fn test_overrun_display_carries_amounts() {
        let err = ReplicaError::ReservationOverrun {
            order_id: OrderId::from_u64(9),
            requested: Quantity::from_u64(10),
            available: Quantity::from_u64(4),
        };
        let msg = err.to_string();
        assert!(msg.contains("order 9"));
        assert!(msg.contains("requested 10"));
        assert!(msg.contains("available 4"));
    }
}
