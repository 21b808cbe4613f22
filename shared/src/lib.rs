//! Shared types and domain rules for the Production Lot Engine
//!
//! This crate holds the I/O-free core shared between the backend server and
//! the planning UI (via WASM): status machines, the severity ladder, the
//! cost rollup and selection validation.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
