use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{ErrorKind, RiversError, RiversResult};
use crate::geometry::{line_merge, union_lines};
use crate::rivers_error;
use crate::store::base::RiverStore;
use crate::types::{FlowOrderClass, GroupingKey, MergedRiver, Segment};

/// Which aggregate picks the watershed code of a merged row.
#[derive(Debug, Clone, Copy)]
enum WatershedAggregate {
    Min,
    Max,
}

/// Store operations outside of the grouped inserts that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreStep {
    RecreateDestination,
    CreateIndexes,
    RefreshStatistics,
}

#[derive(Debug, Default)]
struct Inner {
    /// Source segments, never mutated by the pipeline.
    segments: Vec<Segment>,
    /// Destination rows, `None` while the destination table does not exist.
    merged: Option<Vec<MergedRiver>>,
    /// Failures returned by the next inserts for a grouping key, in order.
    injected_failures: HashMap<String, VecDeque<RiversError>>,
    /// Failures returned by the next calls of a store step, in order.
    injected_step_failures: HashMap<StoreStep, VecDeque<RiversError>>,
    /// Number of insert calls per grouping key, failed ones included.
    insert_attempts: HashMap<String, u32>,
    indexes_created: bool,
    statistics_refreshed: bool,
}

/// In-memory [`RiverStore`] for tests and dry runs.
///
/// Applies the same grouping and aggregation rules as the PostGIS queries, with
/// geometry handled by [`crate::geometry`]. Failures can be queued per grouping
/// key to exercise the retry behavior of the pipeline.
#[derive(Debug, Clone, Default)]
pub struct MemoryRiverStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryRiverStore {
    /// Creates a store over the given source segments.
    pub fn new(segments: Vec<Segment>) -> Self {
        let inner = Inner {
            segments,
            ..Default::default()
        };

        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Queues errors returned, in order, by the next inserts for `key`.
    ///
    /// `key` is an identity key or a watershed code, depending on the merge pass
    /// that is expected to process it.
    pub async fn inject_insert_failures<I>(&self, key: &str, errors: I)
    where
        I: IntoIterator<Item = RiversError>,
    {
        let mut inner = self.inner.lock().await;
        inner
            .injected_failures
            .entry(key.to_owned())
            .or_default()
            .extend(errors);
    }

    /// Queues errors returned, in order, by the next calls of `step`.
    pub async fn inject_step_failures<I>(&self, step: StoreStep, errors: I)
    where
        I: IntoIterator<Item = RiversError>,
    {
        let mut inner = self.inner.lock().await;
        inner
            .injected_step_failures
            .entry(step)
            .or_default()
            .extend(errors);
    }

    /// Returns the rows of the destination table, empty if it does not exist.
    pub async fn merged_rivers(&self) -> Vec<MergedRiver> {
        let inner = self.inner.lock().await;
        inner.merged.clone().unwrap_or_default()
    }

    /// Returns how many inserts were attempted for `key`.
    pub async fn insert_attempts(&self, key: &str) -> u32 {
        let inner = self.inner.lock().await;
        inner.insert_attempts.get(key).copied().unwrap_or(0)
    }

    /// Returns whether the destination indexes were created.
    pub async fn indexes_created(&self) -> bool {
        self.inner.lock().await.indexes_created
    }

    /// Returns whether statistics were refreshed on the destination.
    pub async fn statistics_refreshed(&self) -> bool {
        self.inner.lock().await.statistics_refreshed
    }

    async fn insert_group<F>(
        &self,
        key: &str,
        belongs_to_group: F,
        watershed_aggregate: WatershedAggregate,
    ) -> RiversResult<u64>
    where
        F: Fn(&Segment) -> bool,
    {
        let mut inner = self.inner.lock().await;

        *inner.insert_attempts.entry(key.to_owned()).or_default() += 1;

        if let Some(err) = inner
            .injected_failures
            .get_mut(key)
            .and_then(VecDeque::pop_front)
        {
            return Err(err);
        }

        let mut groups: BTreeMap<FlowOrderClass, Vec<&Segment>> = BTreeMap::new();
        for segment in inner.segments.iter().filter(|s| belongs_to_group(s)) {
            groups
                .entry(segment.flow_order_class)
                .or_default()
                .push(segment);
        }

        let rows: Vec<MergedRiver> = groups
            .into_iter()
            .map(|(flow_order_class, members)| {
                aggregate_group(flow_order_class, &members, watershed_aggregate)
            })
            .collect();
        let inserted = rows.len() as u64;

        let Some(merged) = inner.merged.as_mut() else {
            return Err(rivers_error!(
                ErrorKind::DestinationTableMissing,
                "The merged rivers table does not exist"
            ));
        };
        merged.extend(rows);

        debug!(key, inserted, "inserted merged rivers");

        Ok(inserted)
    }
}

impl Inner {
    fn take_step_failure(&mut self, step: StoreStep) -> RiversResult<()> {
        match self
            .injected_step_failures
            .get_mut(&step)
            .and_then(VecDeque::pop_front)
        {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Builds the merged row of one (key, flow-order class) group.
fn aggregate_group(
    flow_order_class: FlowOrderClass,
    members: &[&Segment],
    watershed_aggregate: WatershedAggregate,
) -> MergedRiver {
    let identity_key = members
        .iter()
        .filter_map(|s| s.identity_key.as_ref())
        .max()
        .cloned();
    let display_name = members
        .iter()
        .filter_map(|s| s.display_name.as_ref())
        .max()
        .cloned();
    let watershed_codes = members.iter().map(|s| &s.watershed_code);
    let watershed_code = match watershed_aggregate {
        WatershedAggregate::Min => watershed_codes.min(),
        WatershedAggregate::Max => watershed_codes.max(),
    }
    .cloned();
    let geometry = line_merge(&union_lines(members.iter().map(|s| &s.geometry)));

    MergedRiver {
        identity_key,
        display_name,
        watershed_code,
        flow_order_class,
        geometry,
    }
}

impl RiverStore for MemoryRiverStore {
    async fn recreate_destination(&self) -> RiversResult<()> {
        let mut inner = self.inner.lock().await;
        inner.take_step_failure(StoreStep::RecreateDestination)?;
        inner.merged = Some(Vec::new());
        inner.indexes_created = false;
        inner.statistics_refreshed = false;

        Ok(())
    }

    async fn identity_keys(&self) -> RiversResult<Vec<String>> {
        let inner = self.inner.lock().await;
        let keys: BTreeSet<&str> = inner
            .segments
            .iter()
            .filter_map(|s| match s.grouping_key() {
                GroupingKey::Identity(key) => Some(key),
                GroupingKey::Watershed(_) => None,
            })
            .collect();

        Ok(keys.into_iter().map(str::to_owned).collect())
    }

    async fn fallback_watershed_codes(&self) -> RiversResult<Vec<String>> {
        let inner = self.inner.lock().await;
        let codes: BTreeSet<&str> = inner
            .segments
            .iter()
            .filter_map(|s| match s.grouping_key() {
                GroupingKey::Watershed(code) => Some(code),
                GroupingKey::Identity(_) => None,
            })
            .collect();

        Ok(codes.into_iter().map(str::to_owned).collect())
    }

    async fn insert_identity_group(&self, identity_key: &str) -> RiversResult<u64> {
        self.insert_group(
            identity_key,
            |s| s.grouping_key() == GroupingKey::Identity(identity_key),
            WatershedAggregate::Min,
        )
        .await
    }

    async fn insert_fallback_group(&self, watershed_code: &str) -> RiversResult<u64> {
        self.insert_group(
            watershed_code,
            |s| s.grouping_key() == GroupingKey::Watershed(watershed_code),
            WatershedAggregate::Max,
        )
        .await
    }

    async fn create_indexes(&self) -> RiversResult<()> {
        let mut inner = self.inner.lock().await;
        inner.take_step_failure(StoreStep::CreateIndexes)?;
        if inner.merged.is_none() {
            return Err(rivers_error!(
                ErrorKind::DestinationTableMissing,
                "Cannot index a missing merged rivers table"
            ));
        }
        inner.indexes_created = true;

        Ok(())
    }

    async fn refresh_statistics(&self) -> RiversResult<()> {
        let mut inner = self.inner.lock().await;
        inner.take_step_failure(StoreStep::RefreshStatistics)?;
        if inner.merged.is_none() {
            return Err(rivers_error!(
                ErrorKind::DestinationTableMissing,
                "Cannot vacuum a missing merged rivers table"
            ));
        }
        inner.statistics_refreshed = true;

        Ok(())
    }
}
