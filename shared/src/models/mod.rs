//! Domain models for production lots, linkage, alerts and procurement

mod alert;
mod lot;
mod procurement;
mod rollup;
mod selection;
mod subprocess;

pub use alert::*;
pub use lot::*;
pub use procurement::*;
pub use rollup::*;
pub use selection::*;
pub use subprocess::*;
