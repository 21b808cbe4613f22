//! External collaborators

pub mod retry;
pub mod stock;

pub use stock::{StockError, StockLookup};
