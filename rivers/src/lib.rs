//! Merging of river flowline segments into one geometry per river.
//!
//! Hydrography datasets such as NHDPlus split every river into many small line
//! segments, one row each, which makes spatial queries and tile generation slow.
//! This crate rebuilds a destination table in which segments are merged:
//!
//! - segments sharing an identity key (GNIS id) are merged per flow-order class;
//! - the remaining segments are merged per watershed code (HUC8) and class.
//!
//! Each grouped insert is retried a bounded number of times on a known transient
//! geometry union failure, after which the group is skipped. Any other failure
//! aborts the run. The [`pipeline::run_pipeline`] entry point sequences the whole
//! merge over any [`store::RiverStore`].

pub mod error;
pub mod finalize;
pub mod geometry;
mod macros;
pub mod merge;
pub mod pipeline;
pub mod progress;
pub mod retry;
pub mod schema;
pub mod store;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
