//! Quote Engine Service
//!
//! Mirrors the settlement ledger's order book into a fast in-memory replica
//! and layers an optimistic matching and reservation engine on top:
//! - Per-instrument price-time-priority book mirrors fed by ledger events
//! - Non-mutating execution-plan simulation under a price bound
//! - Short-lived soft locks on matched liquidity with timed expiry
//! - Aggregated depth projection for external display
//!
//! The replica is never the source of truth: it moves no funds and finalizes
//! no trades. It exists so a caller can discover an executable plan and hold
//! the liquidity long enough to submit the plan to the ledger.
//!
//! # Architecture
//!
//! ```text
//! Ledger snapshot + event stream
//!        │
//!    ┌───▼──────┐
//!    │Reconcile │  ← Ordered, idempotent event application
//!    └───┬──────┘
//!        │
//!   ┌────▼─────────────────────┐
//!   │ Mirror  +  Reservations  │  ← One lock per instrument
//!   └────┬───────────┬─────────┘
//!        │           │
//!  ┌─────▼────┐  ┌───▼─────┐
//!  │Simulator │  │  Depth  │
//!  └─────┬────┘  └───┬─────┘
//!        │           │
//! ┌──────▼───────────▼────────┐
//! │  Book-changed broadcast   │
//! └───────────────────────────┘
//! ```

pub mod config;
pub mod depth;
pub mod error;
pub mod events;
pub mod metrics;
pub mod mirror;
pub mod reconcile;
pub mod reserve;
pub mod service;
pub mod simulate;

// Library version
pub const SERVICE_VERSION: &str = "0.1.0";
