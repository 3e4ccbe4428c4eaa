//! Access to the source segments and the merged destination table.

mod base;
pub mod memory;
pub mod postgres;

pub use base::RiverStore;
