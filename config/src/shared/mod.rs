mod base;
mod connection;
mod merge;
mod merger;

pub use base::*;
pub use connection::*;
pub use merge::*;
pub use merger::*;
