//! `merge-rivers` binary.
//!
//! Rebuilds the merged rivers table from the NHDPlus flowline segments. Exits with
//! a non-zero status on the first fatal error. Keys skipped after repeated
//! transient failures are logged but do not fail the run.

use telemetry::tracing::init_tracing;

use crate::core::start_merger;

mod config;
mod core;

fn main() -> anyhow::Result<()> {
    init_tracing(env!("CARGO_BIN_NAME"))?;

    // Inserts are strictly sequential, a single threaded runtime is enough.
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(start_merger())
}
