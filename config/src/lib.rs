//! Configuration for the river merge pipeline.
//!
//! Holds the connection and merge settings shared by the `rivers` library and the
//! `merge-rivers` binary, plus the hierarchical loader that reads them from
//! `configuration/` files and `APP_`-prefixed environment variables.

mod environment;
mod load;
pub mod shared;

pub use environment::Environment;
pub use load::{Config, LoadConfigError, load_config, load_config_from};
