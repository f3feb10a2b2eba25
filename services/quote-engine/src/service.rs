//! Service facade for the order book replica
//!
//! One `QuoteService` instance owns all replica state, constructed at
//! startup (snapshot first, live events after) and torn down at shutdown —
//! no process-wide singletons. State is sharded by instrument: mutations to
//! one instrument's book never interact with another's, so each instrument
//! gets its own lock and reconciliation, matching, reservation and sweeping
//! are serialized within it. Simulate-then-reserve runs under a single lock
//! acquisition, which is what makes the reservation overrun impossible by
//! construction.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use types::ids::{InstrumentId, OrderId};
use types::numeric::{Price, Quantity};
use types::order::Side;

use crate::config::QuoteConfig;
use crate::depth::{self, BookDepth};
use crate::error::ReplicaError;
use crate::events::{LedgerEvent, OrderRecord};
use crate::metrics::ServiceMetrics;
use crate::reconcile::{self, InstrumentState};
use crate::simulate;

/// Pushed to subscribers whenever an instrument's displayed depth changes:
/// on every reconciled event, every successful reservation, and every sweep
/// that released liquidity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookUpdate {
    pub instrument: InstrumentId,
    /// Per-instrument monotonic publication counter. Strictly increasing
    /// with no reuse, so consumers can order updates and detect gaps after
    /// a lagged receiver drops messages.
    pub version: u64,
    pub book: BookDepth,
}

/// An accepted, reserved execution plan, valid until `expires_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Matched orders in execution order.
    pub order_ids: Vec<OrderId>,
    /// Per-order fill quantities, parallel to `order_ids`.
    pub amounts: Vec<Quantity>,
    /// Buy: fee-inclusive quote cost. Sell: total base quantity.
    pub aggregate: Decimal,
    /// Unix nanoseconds. The reservation releases itself at this instant if
    /// the caller never settles.
    pub expires_at: i64,
}

/// The order book replica service: mirror, simulator, reservations, depth.
pub struct QuoteService {
    config: QuoteConfig,
    instruments: DashMap<InstrumentId, Mutex<InstrumentState>>,
    updates: broadcast::Sender<BookUpdate>,
    metrics: ServiceMetrics,
}

impl QuoteService {
    /// Create a service with one empty book per configured instrument.
    pub fn new(config: QuoteConfig) -> Arc<Self> {
        let instruments = DashMap::new();
        for instrument in config.instruments.keys() {
            instruments.insert(
                instrument.clone(),
                Mutex::new(InstrumentState::new(instrument.clone())),
            );
        }

        let (updates, _) = broadcast::channel(256);
        info!(
            instruments = config.instruments.len(),
            fee_bps = config.fee_bps,
            ttl_ms = config.reservation_ttl_ms,
            "QuoteService initialized"
        );

        Arc::new(Self {
            config,
            instruments,
            updates,
            metrics: ServiceMetrics::new(),
        })
    }

    /// Subscribe to book-changed notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<BookUpdate> {
        self.updates.subscribe()
    }

    /// Service counters.
    pub fn metrics(&self) -> &ServiceMetrics {
        &self.metrics
    }

    /// Replace an instrument's state with a ledger snapshot. Must complete
    /// before live events for that instrument are applied.
    pub fn load_snapshot(
        &self,
        instrument: &InstrumentId,
        records: Vec<OrderRecord>,
    ) -> Result<(), ReplicaError> {
        let entry = self.state_entry(instrument)?;
        let mut state = lock_state(&entry);
        reconcile::load_snapshot(&mut state, records);
        self.publish(instrument, &mut state);
        Ok(())
    }

    /// Apply one ledger lifecycle event, in delivery order.
    ///
    /// Events for instruments outside the static configuration are dropped:
    /// without decimal-scale metadata the replica cannot serve them anyway.
    pub fn apply_event(&self, event: &LedgerEvent) {
        let instrument = event.instrument();
        let Some(entry) = self.instruments.get(instrument) else {
            warn!(
                instrument = %instrument,
                event = event.label(),
                "Event for unconfigured instrument dropped"
            );
            ServiceMetrics::incr(&self.metrics.events_ignored);
            return;
        };

        let mut state = lock_state(&entry);
        if reconcile::apply_event(&mut state, event) {
            ServiceMetrics::incr(&self.metrics.events_applied);
            self.publish(instrument, &mut state);
        } else {
            ServiceMetrics::incr(&self.metrics.events_ignored);
        }
    }

    /// Current displayed depth for an instrument.
    pub fn get_book(&self, instrument: &InstrumentId) -> Result<BookDepth, ReplicaError> {
        let entry = self.state_entry(instrument)?;
        let state = lock_state(&entry);
        Ok(depth::project(&state.book, &state.reservations))
    }

    /// Find an executable plan and soft-lock its liquidity.
    ///
    /// Simulation and reservation run under one instrument lock, so the
    /// quoted liquidity cannot be handed to a concurrent caller in between.
    /// Returns `Ok(None)` when no order qualifies under the price bound.
    pub fn find_match(
        &self,
        instrument: &InstrumentId,
        side: Side,
        quantity: Quantity,
        limit_price: Price,
    ) -> Result<Option<MatchResult>, ReplicaError> {
        let spec = self
            .config
            .instruments
            .get(instrument)
            .ok_or_else(|| ReplicaError::UnknownInstrument {
                instrument: instrument.clone(),
            })?;
        let entry = self.state_entry(instrument)?;
        let mut state = lock_state(&entry);

        let plan = match side {
            Side::Buy => simulate::simulate_buy(
                &state.book,
                &state.reservations,
                self.config.fee_bps,
                spec.base_decimals,
                quantity,
                limit_price,
            )?,
            Side::Sell => {
                simulate::simulate_sell(&state.book, &state.reservations, quantity, limit_price)?
            }
        };

        let Some(plan) = plan else {
            debug!(
                instrument = %instrument,
                ?side,
                quantity = %quantity,
                limit = %limit_price,
                "No match under price bound"
            );
            ServiceMetrics::incr(&self.metrics.quotes_no_match);
            return Ok(None);
        };

        let expires_at = now_nanos() + self.config.reservation_ttl_nanos();
        for (placed, fill) in plan.fills.iter().enumerate() {
            let remaining = state
                .book
                .get(fill.order_id)
                .map(|o| o.remaining())
                .unwrap_or(Quantity::ZERO);
            if let Err(err) =
                state
                    .reservations
                    .reserve(fill.order_id, fill.quantity, expires_at, remaining)
            {
                // Unreachable when simulation and reservation share this
                // lock, but an invariant breach must not leave the earlier
                // holds of the plan in place.
                for undone in &plan.fills[..placed] {
                    state
                        .reservations
                        .retract(undone.order_id, undone.quantity, expires_at);
                }
                return Err(err);
            }
            ServiceMetrics::incr(&self.metrics.holds_placed);
        }

        ServiceMetrics::incr(&self.metrics.quotes_matched);
        info!(
            instrument = %instrument,
            ?side,
            orders = plan.fills.len(),
            aggregate = %plan.aggregate,
            expires_at,
            "Plan reserved"
        );
        self.publish(instrument, &mut state);

        Ok(Some(MatchResult {
            order_ids: plan.fills.iter().map(|f| f.order_id).collect(),
            amounts: plan.fills.iter().map(|f| f.quantity).collect(),
            aggregate: plan.aggregate,
            expires_at,
        }))
    }

    /// Drop expired holds across all instruments, returning those whose
    /// displayed depth changed. Runs under the same per-instrument locks as
    /// every other mutation.
    pub fn sweep_at(&self, now: i64) -> Vec<InstrumentId> {
        let mut changed = Vec::new();
        for entry in self.instruments.iter() {
            let mut state = lock_state(entry.value());
            let expired = state.reservations.sweep(now);
            if expired > 0 {
                ServiceMetrics::add(&self.metrics.holds_expired, expired as u64);
                self.publish(entry.key(), &mut state);
                changed.push(entry.key().clone());
            }
        }
        ServiceMetrics::incr(&self.metrics.sweeps_run);
        if !changed.is_empty() {
            debug!(instruments = changed.len(), "Sweep released liquidity");
        }
        changed
    }

    /// Spawn the recurring expiry sweep, independent of request traffic. An
    /// abandoned plan must never lock liquidity past its TTL.
    pub fn run_sweeper(self: Arc<Self>) -> JoinHandle<()> {
        let service = self;
        let mut interval = tokio::time::interval(service.config.sweep_interval());
        tokio::spawn(async move {
            loop {
                interval.tick().await;
                service.sweep_at(now_nanos());
            }
        })
    }

    fn state_entry(
        &self,
        instrument: &InstrumentId,
    ) -> Result<dashmap::mapref::one::Ref<'_, InstrumentId, Mutex<InstrumentState>>, ReplicaError>
    {
        self.instruments
            .get(instrument)
            .ok_or_else(|| ReplicaError::UnknownInstrument {
                instrument: instrument.clone(),
            })
    }

    fn publish(&self, instrument: &InstrumentId, state: &mut InstrumentState) {
        state.version += 1;
        let update = BookUpdate {
            instrument: instrument.clone(),
            version: state.version,
            book: depth::project(&state.book, &state.reservations),
        };
        // No receivers is fine; depth is re-derivable on subscribe.
        let _ = self.updates.send(update);
    }
}

/// Lock an instrument's state, recovering from a poisoned mutex — the
/// guarded state is valid after any partial mutation because every write
/// path re-establishes its invariants before touching shared totals.
fn lock_state(entry: &Mutex<InstrumentState>) -> MutexGuard<'_, InstrumentState> {
    match entry.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Current wall clock in unix nanoseconds.
fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::ids::MakerId;

    fn btc() -> InstrumentId {
        InstrumentId::new("BTC/USDT")
    }

    fn service() -> Arc<QuoteService> {
        let config = QuoteConfig {
            fee_bps: 0,
            ..QuoteConfig::default()
        }
        .with_instrument(btc(), 0);
        QuoteService::new(config)
    }

    fn created(id: u64, side: Side, price: u64, qty: u64, ts: i64) -> LedgerEvent {
        LedgerEvent::Created {
            order_id: OrderId::from_u64(id),
            maker: MakerId::new("0xmaker"),
            instrument: btc(),
            side,
            price: Price::from_u64(price),
            quantity: Quantity::from_u64(qty),
            timestamp: ts,
        }
    }

    #[test]
    fn test_unknown_instrument_is_client_error() {
        let svc = service();
        let eth = InstrumentId::new("ETH/USDC");
        assert_eq!(
            svc.get_book(&eth).unwrap_err(),
            ReplicaError::UnknownInstrument {
                instrument: eth.clone()
            }
        );
        assert!(svc
            .find_match(&eth, Side::Buy, Quantity::from_u64(1), Price::from_u64(1))
            .is_err());
    }

    #[test]
    fn test_find_match_reserves_liquidity() {
        let svc = service();
        svc.apply_event(&created(1, Side::Sell, 100, 10, 1));

        let result = svc
            .find_match(
                &btc(),
                Side::Buy,
                Quantity::from_u64(5),
                Price::from_u64(100),
            )
            .unwrap()
            .unwrap();
        assert_eq!(result.order_ids, vec![OrderId::from_u64(1)]);
        assert_eq!(result.amounts, vec![Quantity::from_u64(5)]);
        assert_eq!(result.aggregate, Decimal::from(500));
        assert!(result.expires_at > now_nanos());

        // The held units are gone from display and from later matches
        let book = svc.get_book(&btc()).unwrap();
        assert_eq!(book.asks[0].size, Quantity::from_u64(5));

        let second = svc
            .find_match(
                &btc(),
                Side::Buy,
                Quantity::from_u64(10),
                Price::from_u64(100),
            )
            .unwrap()
            .unwrap();
        assert_eq!(second.amounts, vec![Quantity::from_u64(5)]);
    }

    #[test]
    fn test_no_match_returns_none() {
        let svc = service();
        svc.apply_event(&created(1, Side::Sell, 200, 10, 1));

        let result = svc
            .find_match(
                &btc(),
                Side::Buy,
                Quantity::from_u64(5),
                Price::from_u64(100),
            )
            .unwrap();
        assert!(result.is_none());
        assert_eq!(svc.metrics().snapshot().quotes_no_match, 1);
    }

    #[test]
    fn test_sweep_restores_depth() {
        let svc = service();
        svc.apply_event(&created(1, Side::Sell, 100, 10, 1));

        let result = svc
            .find_match(
                &btc(),
                Side::Buy,
                Quantity::from_u64(4),
                Price::from_u64(100),
            )
            .unwrap()
            .unwrap();
        assert_eq!(svc.get_book(&btc()).unwrap().asks[0].size, Quantity::from_u64(6));

        let changed = svc.sweep_at(result.expires_at);
        assert_eq!(changed, vec![btc()]);
        assert_eq!(
            svc.get_book(&btc()).unwrap().asks[0].size,
            Quantity::from_u64(10)
        );

        // A second sweep changes nothing
        assert!(svc.sweep_at(result.expires_at).is_empty());
    }

    #[tokio::test]
    async fn test_notifications_published() {
        let svc = service();
        let mut updates = svc.subscribe();

        svc.apply_event(&created(1, Side::Sell, 100, 10, 1));
        let update = updates.recv().await.unwrap();
        assert_eq!(update.instrument, btc());
        assert_eq!(update.book.asks[0].size, Quantity::from_u64(10));

        svc.find_match(
            &btc(),
            Side::Buy,
            Quantity::from_u64(5),
            Price::from_u64(100),
        )
        .unwrap()
        .unwrap();
        let update = updates.recv().await.unwrap();
        assert_eq!(update.book.asks[0].size, Quantity::from_u64(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_task_ticks() {
        let svc = service();
        let handle = Arc::clone(&svc).run_sweeper();

        tokio::time::advance(svc.config.sweep_interval()).await;
        tokio::task::yield_now().await;

        assert!(svc.metrics().snapshot().sweeps_run >= 1);
        handle.abort();
    }

    #[test]
    fn test_snapshot_then_events() {
        let svc = service();
        let records = vec![OrderRecord {
            order_id: OrderId::from_u64(1),
            maker: MakerId::new("0xmaker"),
            instrument: btc(),
            side: Side::Sell,
            price: Price::from_u64(100),
            quantity: Quantity::from_u64(10),
            filled: Quantity::from_u64(2),
            timestamp: 1,
        }];
        svc.load_snapshot(&btc(), records).unwrap();
        assert_eq!(
            svc.get_book(&btc()).unwrap().asks[0].size,
            Quantity::from_u64(8)
        );

        svc.apply_event(&LedgerEvent::Filled {
            order_id: OrderId::from_u64(1),
            instrument: btc(),
            sequence: 1,
            fill_quantity: Quantity::from_u64(8),
        });
        assert!(svc.get_book(&btc()).unwrap().asks.is_empty());
    }

    #[test]
    fn test_event_for_unconfigured_instrument_dropped() {
        let svc = service();
        svc.apply_event(&LedgerEvent::Cancelled {
            order_id: OrderId::from_u64(1),
            instrument: InstrumentId::new("DOGE/USDT"),
        });
        assert_eq!(svc.metrics().snapshot().events_ignored, 1);
    }
}
