//! Builders for segments, errors and configuration used by tests.
//!
//! Segment builders lay out unit-length horizontal lines along the x axis: a
//! segment built at `x` runs from `(x, 0)` to `(x + 1, 0)`, so segments at
//! consecutive offsets touch and are fused by the line merge.

use config::shared::MergeConfig;
use geo_types::{LineString, line_string};

use crate::error::{ErrorKind, RiversError};
use crate::rivers_error;
use crate::types::{FlowOrderClass, Segment};

/// Returns a unit-length horizontal line starting at `(x, 0)`.
pub fn unit_line(x: f64) -> LineString<f64> {
    line_string![(x: x, y: 0.0), (x: x + 1.0, y: 0.0)]
}

/// Creates a segment carrying an identity key.
pub fn identity_segment(
    identity_key: &str,
    watershed_code: &str,
    display_name: Option<&str>,
    flow_order_class: FlowOrderClass,
    x: f64,
) -> Segment {
    Segment::new(
        Some(identity_key),
        watershed_code,
        display_name,
        flow_order_class,
        unit_line(x),
    )
}

/// Creates a segment without identity key or name.
pub fn watershed_segment(watershed_code: &str, flow_order_class: FlowOrderClass, x: f64) -> Segment {
    Segment::new(None, watershed_code, None, flow_order_class, unit_line(x))
}

/// Returns the error PostGIS reports when `ST_Union` hits the transient defect.
pub fn transient_union_error() -> RiversError {
    rivers_error!(
        ErrorKind::DestinationQueryFailed,
        "Failed to merge rivers",
        "GEOSUnaryUnion: TopologyException: Invalid argument\n"
    )
    .with_sql_state("XX000")
}

/// Returns a query error that is never retried.
pub fn fatal_query_error() -> RiversError {
    rivers_error!(
        ErrorKind::DestinationQueryFailed,
        "Failed to merge rivers",
        "relation \"rivers\" does not exist"
    )
    .with_sql_state("42P01")
}

/// Returns the default merge configuration with progress lines on every key.
pub fn test_merge_config() -> MergeConfig {
    MergeConfig {
        identity_progress_interval: 1,
        fallback_progress_interval: 1,
        ..MergeConfig::default()
    }
}
