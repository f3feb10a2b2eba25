//! Types library for the order book replica
//!
//! This library provides the core type definitions shared by the replica
//! services, ensuring type safety and deterministic numeric behavior.
//!
//! # Modules
//! - `ids`: Unique identifiers (OrderId, InstrumentId)
//! - `numeric`: Fixed-point decimal types (Price, Quantity)
//! - `order`: Order side types

// Public modules
pub mod ids;
pub mod numeric;
pub mod order;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::ids::*;
    pub use crate::numeric::*;
    pub use crate::order::*;
}
