//! Soft-lock ledger for matched liquidity
//!
//! A reservation is a time-bounded hold on part of an order's remaining
//! liquidity so two concurrent match requests are never quoted the same
//! units. Holds are consumed when the corresponding ledger fill reconciles,
//! and swept away when their expiry passes unconsumed — an abandoned plan
//! must not lock liquidity forever.
//!
//! Invariant at all times: `0 <= total reserved <= total - filled`.

use std::collections::HashMap;

use tracing::{debug, error};
use types::ids::OrderId;
use types::numeric::Quantity;

use crate::error::ReplicaError;

/// One soft-lock entry. Independent of any other hold on the same order.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Hold {
    quantity: Quantity,
    /// Unix nanoseconds. The hold contributes to total reserved strictly
    /// before this instant.
    expires_at: i64,
}

/// All active holds against one order.
#[derive(Debug, Clone, Default)]
struct Reservation {
    /// Oldest hold first. Fills consume from the front.
    entries: Vec<Hold>,
    /// Running sum of entry quantities.
    total: Quantity,
}

/// Per-order soft-lock ledger for one instrument.
#[derive(Debug, Clone, Default)]
pub struct ReservationLedger {
    holds: HashMap<OrderId, Reservation>,
}

impl ReservationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total quantity currently reserved against an order.
    pub fn reserved(&self, order_id: OrderId) -> Quantity {
        self.holds
            .get(&order_id)
            .map(|r| r.total)
            .unwrap_or(Quantity::ZERO)
    }

    /// Place a new hold. Multiple holds against the same order coexist and
    /// their quantities sum.
    ///
    /// `remaining` is the order's true remaining liquidity
    /// (`total - filled`); the new hold plus existing holds must fit inside
    /// it, otherwise the caller computed availability wrong and we refuse.
    pub fn reserve(
        &mut self,
        order_id: OrderId,
        quantity: Quantity,
        expires_at: i64,
        remaining: Quantity,
    ) -> Result<(), ReplicaError> {
        let reservation = self.holds.entry(order_id).or_default();

        let requested_total = reservation
            .total
            .checked_add(quantity)
            .ok_or(ReplicaError::NumericOverflow { order_id })?;
        if requested_total > remaining {
            error!(
                %order_id,
                requested = %quantity,
                already_reserved = %reservation.total,
                remaining = %remaining,
                "Reservation overrun refused"
            );
            let available = remaining.saturating_sub(reservation.total);
            if reservation.entries.is_empty() {
                // Undo the or_default entry so a refused first hold leaves
                // no trace.
                self.holds.remove(&order_id);
            }
            return Err(ReplicaError::ReservationOverrun {
                order_id,
                requested: quantity,
                available,
            });
        }

        reservation.entries.push(Hold {
            quantity,
            expires_at,
        });
        reservation.total = requested_total;

        debug!(
            %order_id,
            quantity = %quantity,
            expires_at,
            total_reserved = %reservation.total,
            "Hold placed"
        );
        Ok(())
    }

    /// Consume holds after a reconciled fill, oldest first.
    ///
    /// A fill is assumed to be the on-ledger consequence of a previously
    /// reserved plan; a fill for an amount never reserved is valid too, so
    /// the decrement floors at zero and never goes negative.
    pub fn consume_fill(&mut self, order_id: OrderId, fill_quantity: Quantity) {
        let Some(reservation) = self.holds.get_mut(&order_id) else {
            return;
        };

        let mut to_consume = fill_quantity;
        reservation.entries.retain_mut(|hold| {
            if to_consume.is_zero() {
                return true;
            }
            let consumed = hold.quantity.min(to_consume);
            hold.quantity = hold.quantity.saturating_sub(consumed);
            to_consume = to_consume.saturating_sub(consumed);
            !hold.quantity.is_zero()
        });
        reservation.total = reservation.total.saturating_sub(fill_quantity);

        if reservation.entries.is_empty() {
            self.holds.remove(&order_id);
        }
    }

    /// Remove the newest hold matching exactly `(quantity, expires_at)`.
    ///
    /// Undo support for a partially placed plan: only the named hold is
    /// taken back, never holds belonging to other plans on the same order.
    pub fn retract(&mut self, order_id: OrderId, quantity: Quantity, expires_at: i64) {
        let Some(reservation) = self.holds.get_mut(&order_id) else {
            return;
        };
        let Some(pos) = reservation
            .entries
            .iter()
            .rposition(|h| h.quantity == quantity && h.expires_at == expires_at)
        else {
            return;
        };

        reservation.entries.remove(pos);
        reservation.total = reservation.total.saturating_sub(quantity);
        if reservation.entries.is_empty() {
            self.holds.remove(&order_id);
        }
        debug!(%order_id, quantity = %quantity, "Hold retracted");
    }

    /// Drop every hold against an order (full fill or cancel).
    pub fn discard(&mut self, order_id: OrderId) -> bool {
        self.holds.remove(&order_id).is_some()
    }

    /// Drop all holds whose expiry has passed. Returns the number of
    /// expired entries, so the caller knows whether displayed depth changed.
    pub fn sweep(&mut self, now: i64) -> usize {
        let mut expired = 0;
        self.holds.retain(|order_id, reservation| {
            let before = reservation.entries.len();
            reservation.entries.retain(|hold| hold.expires_at > now);
            let dropped = before - reservation.entries.len();
            if dropped > 0 {
                expired += dropped;
                reservation.total = reservation
                    .entries
                    .iter()
                    .fold(Quantity::ZERO, |acc, h| {
                        acc.checked_add(h.quantity).unwrap_or(acc)
                    });
                debug!(
                    %order_id,
                    dropped,
                    total_reserved = %reservation.total,
                    "Expired holds swept"
                );
            }
            !reservation.entries.is_empty()
        });
        expired
    }

    /// Number of orders with at least one active hold.
    pub fn len(&self) -> usize {
        self.holds.len()
    }

    /// Whether no holds exist.
    pub fn is_empty(&self) -> bool {
        self.holds.is_empty()
    }

    /// Drop all holds. Snapshot reload support.
    pub fn clear(&mut self) {
        self.holds.clear();
    }
}
