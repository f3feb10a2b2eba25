//! Reconciliation of ledger events into the replica
//!
//! Applies lifecycle events to one instrument's mirror and reservation
//! state, strictly in ledger emission order, idempotently. An event naming
//! an order the mirror does not hold is a recoverable no-op: it legitimately
//! happens at snapshot boundaries and when at-least-once delivery re-sends
//! an event whose effects already landed.

use tracing::{debug, info};

use types::ids::{InstrumentId, OrderId};
use types::numeric::Quantity;

use crate::events::{LedgerEvent, OrderRecord};
use crate::mirror::{InstrumentBook, Order};
use crate::reserve::ReservationLedger;

/// The full replica state for one instrument: the book mirror plus the
/// soft-lock ledger against it. Everything that mutates either goes through
/// the owning service's per-instrument lock.
#[derive(Debug, Clone)]
pub struct InstrumentState {
    pub book: InstrumentBook,
    pub reservations: ReservationLedger,
    /// Monotonic publication counter, bumped once per published depth
    /// change. Lets notification consumers detect ordering and gaps.
    pub version: u64,
}

impl InstrumentState {
    pub fn new(instrument: InstrumentId) -> Self {
        Self {
            book: InstrumentBook::new(instrument),
            reservations: ReservationLedger::new(),
            version: 0,
        }
    }
}

/// Apply one ledger event. Returns whether any state changed (and hence
/// whether displayed depth needs republishing).
pub fn apply_event(state: &mut InstrumentState, event: &LedgerEvent) -> bool {
    match event {
        LedgerEvent::Created {
            order_id,
            maker,
            instrument,
            side,
            price,
            quantity,
            timestamp,
        } => {
            let inserted = state.book.insert(Order {
                order_id: *order_id,
                maker: maker.clone(),
                instrument: instrument.clone(),
                side: *side,
                price: *price,
                quantity: *quantity,
                filled: Quantity::zero(),
                last_fill_sequence: 0,
                created_at: *timestamp,
            });
            if !inserted {
                debug!(%order_id, "Duplicate Created ignored");
            }
            inserted
        }

        LedgerEvent::Filled {
            order_id,
            sequence,
            fill_quantity,
            ..
        } => apply_fill(state, *order_id, *sequence, *fill_quantity),

        LedgerEvent::Cancelled { order_id, .. } => {
            let had_reservation = state.reservations.discard(*order_id);
            let removed = state.book.remove(*order_id).is_some();
            if !removed {
                debug!(%order_id, "Cancelled for absent order, no-op");
            }
            removed || had_reservation
        }
    }
}

fn apply_fill(
    state: &mut InstrumentState,
    order_id: OrderId,
    sequence: u64,
    fill_quantity: Quantity,
) -> bool {
    let Some(order) = state.book.get_mut(order_id) else {
        // Already evicted by a prior full fill, or the snapshot predates it.
        debug!(%order_id, "Filled for absent order, no-op");
        return false;
    };

    // At-least-once delivery re-sends fills with their original sequence;
    // anything at or below the last applied one has already landed.
    if sequence <= order.last_fill_sequence {
        debug!(%order_id, sequence, "Duplicate Filled ignored");
        return false;
    }
    order.last_fill_sequence = sequence;

    // Filled is monotonic and capped at total.
    let new_filled = order
        .filled
        .checked_add(fill_quantity)
        .unwrap_or(order.quantity)
        .min(order.quantity);
    order.filled = new_filled;
    let fully_filled = order.is_filled();

    // The fill is the on-ledger consequence of a previously reserved plan,
    // so release the matching holds (floored at zero for unreserved fills).
    state.reservations.consume_fill(order_id, fill_quantity);

    if fully_filled {
        state.reservations.discard(order_id);
        state.book.remove(order_id);
        debug!(%order_id, "Order fully filled, evicted");
    }
    true
}

/// Replace the instrument's state with a ledger snapshot.
///
/// Clears everything (including reservations — holds taken against a
/// pre-snapshot book are meaningless) and replays each row as a synthetic
/// create carrying its already-accumulated fill. Must complete before the
/// first live event for the instrument is applied, or mutations are lost.
pub fn load_snapshot(state: &mut InstrumentState, records: Vec<OrderRecord>) {
    let instrument = state.book.instrument().clone();
    state.book = InstrumentBook::new(instrument.clone());
    state.reservations.clear();

    let mut live = 0usize;
    for record in records {
        if record.filled >= record.quantity {
            // Terminal on the ledger already; never enters the mirror.
            continue;
        }
        state.book.insert(Order {
            order_id: record.order_id,
            maker: record.maker,
            instrument: record.instrument,
            side: record.side,
            price: record.price,
            quantity: record.quantity,
            filled: record.filled,
            // Snapshot rows carry the accumulated fill; the live stream
            // resumes past the snapshot point, so sequences restart clean.
            last_fill_sequence: 0,
            created_at: record.timestamp,
        });
        live += 1;
    }

    info!(instrument = %instrument, live_orders = live, "Snapshot loaded");
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::ids::{MakerId, OrderId};
    use types::numeric::Price;
    use types::order::Side;

    fn state() -> InstrumentState {
        InstrumentState::new(InstrumentId::new("BTC/USDT"))
    }

    fn created(id: u64, side: Side, price: u64, qty: u64, ts: i64) -> LedgerEvent {
        LedgerEvent::Created {
            order_id: OrderId::from_u64(id),
            maker: MakerId::new("0xmaker"),
            instrument: InstrumentId::new("BTC/USDT"),
            side,
            price: Price::from_u64(price),
            quantity: Quantity::from_u64(qty),
            timestamp: ts,
        }
    }

    fn filled(id: u64, qty: u64, seq: u64) -> LedgerEvent {
        LedgerEvent::Filled {
            order_id: OrderId::from_u64(id),
            instrument: InstrumentId::new("BTC/USDT"),
            sequence: seq,
            fill_quantity: Quantity::from_u64(qty),
        }
    }

    fn cancelled(id: u64) -> LedgerEvent {
        LedgerEvent::Cancelled {
            order_id: OrderId::from_u64(id),
            instrument: InstrumentId::new("BTC/USDT"),
        }
    }

    #[test]
    fn test_created_inserts_once() {
        let mut s = state();
        assert!(apply_event(&mut s, &created(1, Side::Sell, 100, 10, 1)));
        // Idempotent re-delivery
        assert!(!apply_event(&mut s, &created(1, Side::Sell, 100, 10, 1)));
        assert_eq!(s.book.len(), 1);
    }

    #[test]
    fn test_partial_fill_updates_filled() {
        let mut s = state();
        apply_event(&mut s, &created(1, Side::Sell, 100, 10, 1));
        assert!(apply_event(&mut s, &filled(1, 4, 1)));

        let order = s.book.get(OrderId::from_u64(1)).unwrap();
        assert_eq!(order.filled, Quantity::from_u64(4));
        assert_eq!(order.remaining(), Quantity::from_u64(6));
    }

    #[test]
    fn test_redelivered_partial_fill_not_double_counted() {
        let mut s = state();
        apply_event(&mut s, &created(1, Side::Sell, 100, 10, 1));
        assert!(apply_event(&mut s, &filled(1, 4, 1)));
        // Same sequence again: already applied, no state change
        assert!(!apply_event(&mut s, &filled(1, 4, 1)));

        let order = s.book.get(OrderId::from_u64(1)).unwrap();
        assert_eq!(order.filled, Quantity::from_u64(4));

        // The next real fill carries the next sequence and lands normally
        assert!(apply_event(&mut s, &filled(1, 2, 2)));
        let order = s.book.get(OrderId::from_u64(1)).unwrap();
        assert_eq!(order.filled, Quantity::from_u64(6));
    }

    #[test]
    fn test_full_fill_evicts_order_and_reservation() {
        let mut s = state();
        apply_event(&mut s, &created(1, Side::Sell, 100, 10, 1));
        s.reservations
            .reserve(
                OrderId::from_u64(1),
                Quantity::from_u64(10),
                i64::MAX,
                Quantity::from_u64(10),
            )
            .unwrap();

        apply_event(&mut s, &filled(1, 10, 1));
        assert!(s.book.is_empty());
        assert!(s.reservations.is_empty());
    }

    #[test]
    fn test_fill_releases_matching_reservation() {
        let mut s = state();
        apply_event(&mut s, &created(1, Side::Sell, 100, 10, 1));
        s.reservations
            .reserve(
                OrderId::from_u64(1),
                Quantity::from_u64(5),
                i64::MAX,
                Quantity::from_u64(10),
            )
            .unwrap();

        apply_event(&mut s, &filled(1, 5, 1));
        let order = s.book.get(OrderId::from_u64(1)).unwrap();
        assert_eq!(order.filled, Quantity::from_u64(5));
        assert_eq!(s.reservations.reserved(OrderId::from_u64(1)), Quantity::ZERO);
    }

    #[test]
    fn test_fill_for_absent_order_is_noop() {
        let mut s = state();
        assert!(!apply_event(&mut s, &filled(99, 5, 1)));
        assert!(s.book.is_empty());
    }

    #[test]
    fn test_fill_beyond_total_caps() {
        let mut s = state();
        apply_event(&mut s, &created(1, Side::Sell, 100, 10, 1));
        apply_event(&mut s, &filled(1, 7, 1));
        // Over-delivery caps at total and evicts
        apply_event(&mut s, &filled(1, 7, 2));
        assert!(s.book.is_empty());
    }

    #[test]
    fn test_cancelled_removes_order_and_reservation() {
        let mut s = state();
        apply_event(&mut s, &created(1, Side::Buy, 100, 10, 1));
        s.reservations
            .reserve(
                OrderId::from_u64(1),
                Quantity::from_u64(3),
                i64::MAX,
                Quantity::from_u64(10),
            )
            .unwrap();

        assert!(apply_event(&mut s, &cancelled(1)));
        assert!(s.book.is_empty());
        assert!(s.reservations.is_empty());

        // Idempotent re-delivery
        assert!(!apply_event(&mut s, &cancelled(1)));
    }

    #[test]
    fn test_event_idempotence_yields_same_state() {
        let mut once = state();
        let mut twice = state();
        let events = [
            created(1, Side::Sell, 100, 10, 1),
            filled(1, 10, 1),
            created(2, Side::Buy, 90, 5, 2),
            cancelled(2),
        ];

        for e in &events {
            apply_event(&mut once, e);
        }
        for e in &events {
            apply_event(&mut twice, e);
            apply_event(&mut twice, e);
        }

        assert_eq!(once.book.len(), twice.book.len());
        assert!(once.book.is_empty() && twice.book.is_empty());
    }

    #[test]
    fn test_snapshot_replaces_state() {
        let mut s = state();
        apply_event(&mut s, &created(1, Side::Sell, 100, 10, 1));
        s.reservations
            .reserve(
                OrderId::from_u64(1),
                Quantity::from_u64(5),
                i64::MAX,
                Quantity::from_u64(10),
            )
            .unwrap();

        let records = vec![
            OrderRecord {
                order_id: OrderId::from_u64(7),
                maker: MakerId::new("0xmaker"),
                instrument: InstrumentId::new("BTC/USDT"),
                side: Side::Sell,
                price: Price::from_u64(110),
                quantity: Quantity::from_u64(8),
                filled: Quantity::from_u64(3),
                timestamp: 5,
            },
            // Terminal row: never enters the mirror
            OrderRecord {
                order_id: OrderId::from_u64(8),
                maker: MakerId::new("0xmaker"),
                instrument: InstrumentId::new("BTC/USDT"),
                side: Side::Sell,
                price: Price::from_u64(120),
                quantity: Quantity::from_u64(4),
                filled: Quantity::from_u64(4),
                timestamp: 6,
            },
        ];
        load_snapshot(&mut s, records);

        assert_eq!(s.book.len(), 1);
        assert!(s.reservations.is_empty());
        let order = s.book.get(OrderId::from_u64(7)).unwrap();
        assert_eq!(order.remaining(), Quantity::from_u64(5));
    }
}
