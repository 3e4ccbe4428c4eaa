use std::future::Future;

use crate::error::RiversResult;

/// Data store holding the source segments and the merged destination table.
///
/// [`RiverStore`] implementations run the grouped aggregations themselves: the
/// pipeline only decides which grouping keys to process, in which order, and how
/// failures are handled. Every insert must be durable once its future resolves,
/// because the finalizer runs outside of any transaction afterwards.
pub trait RiverStore {
    /// Drops the destination table if it exists and creates it empty.
    fn recreate_destination(&self) -> impl Future<Output = RiversResult<()>> + Send;

    /// Returns the distinct non-null identity keys of the source segments.
    fn identity_keys(&self) -> impl Future<Output = RiversResult<Vec<String>>> + Send;

    /// Returns the distinct watershed codes of source segments without identity key.
    fn fallback_watershed_codes(&self) -> impl Future<Output = RiversResult<Vec<String>>> + Send;

    /// Inserts one merged row per flow-order class for the segments with
    /// `identity_key`, keeping the minimum watershed code.
    ///
    /// Returns the number of rows inserted.
    fn insert_identity_group(
        &self,
        identity_key: &str,
    ) -> impl Future<Output = RiversResult<u64>> + Send;

    /// Inserts one merged row per flow-order class for the segments without
    /// identity key in `watershed_code`, keeping the maximum watershed code and a
    /// null identity key.
    ///
    /// Returns the number of rows inserted.
    fn insert_fallback_group(
        &self,
        watershed_code: &str,
    ) -> impl Future<Output = RiversResult<u64>> + Send;

    /// Creates the spatial index and the flow-order class index on the destination.
    fn create_indexes(&self) -> impl Future<Output = RiversResult<()>> + Send;

    /// Refreshes planner statistics and compacts the destination table.
    ///
    /// Must not be called within a transaction.
    fn refresh_statistics(&self) -> impl Future<Output = RiversResult<()>> + Send;
}
