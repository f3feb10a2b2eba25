//! Configuration for the quote engine
//!
//! Fee and per-instrument decimal-scale metadata come from static
//! configuration, not dynamic discovery. Loading the configuration from disk
//! or environment belongs to the process bootstrap, outside this crate.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use types::ids::InstrumentId;

/// Static metadata for one tradable instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct InstrumentSpec {
    /// Decimal scale of the base asset; quote cost conversion divides by
    /// `10^base_decimals`.
    pub base_decimals: u32,
}

/// Quote engine configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QuoteConfig {
    /// Trading fee in basis points (100 = 1%), applied to buy-side cost.
    pub fee_bps: u32,
    /// How long a reservation holds liquidity before expiring unconsumed.
    pub reservation_ttl_ms: u64,
    /// Interval of the background expiry sweep.
    pub sweep_interval_ms: u64,
    /// Instruments served by this replica.
    pub instruments: HashMap<InstrumentId, InstrumentSpec>,
}

impl Default for QuoteConfig {
    fn default() -> Self {
        Self {
            fee_bps: 100,
            reservation_ttl_ms: 30_000,
            sweep_interval_ms: 1_000,
            instruments: HashMap::new(),
        }
    }
}

impl QuoteConfig {
    /// Register an instrument. Builder-style, mostly for tests and wiring.
    pub fn with_instrument(mut self, instrument: InstrumentId, base_decimals: u32) -> Self {
        self.instruments
            .insert(instrument, InstrumentSpec { base_decimals });
        self
    }

    /// Reservation time-to-live in nanoseconds (timestamps are unix nanos).
    pub fn reservation_ttl_nanos(&self) -> i64 {
        self.reservation_ttl_ms as i64 * 1_000_000
    }

    /// Sweep cadence as a `Duration`.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}
