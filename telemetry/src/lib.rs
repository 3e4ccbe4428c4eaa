//! Logging setup for the river merge pipeline.

pub mod tracing;
