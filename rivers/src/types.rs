use std::fmt;

use geo_types::{LineString, MultiLineString};

/// Strahler order of a flowline segment.
///
/// Segments of different flow-order classes are never merged together.
pub type FlowOrderClass = i16;

/// One fragment of a river's path, as stored in the source table.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Stable identifier shared by every segment of a named river (GNIS id).
    pub identity_key: Option<String>,
    /// Coarse geographic grouping code (HUC8).
    pub watershed_code: String,
    /// Human readable name of the river.
    pub display_name: Option<String>,
    /// Position of the segment in the stream network.
    pub flow_order_class: FlowOrderClass,
    /// Path of the segment.
    pub geometry: MultiLineString<f64>,
}

impl Segment {
    /// Creates a segment from a single line.
    pub fn new(
        identity_key: Option<&str>,
        watershed_code: &str,
        display_name: Option<&str>,
        flow_order_class: FlowOrderClass,
        line: LineString<f64>,
    ) -> Self {
        Self {
            identity_key: identity_key.map(str::to_owned),
            watershed_code: watershed_code.to_owned(),
            display_name: display_name.map(str::to_owned),
            flow_order_class,
            geometry: MultiLineString::new(vec![line]),
        }
    }

    /// Returns the key under which this segment is merged.
    ///
    /// Segments with an identity key are grouped by it, every other segment falls
    /// back to its watershed code.
    pub fn grouping_key(&self) -> GroupingKey<'_> {
        match &self.identity_key {
            Some(identity_key) => GroupingKey::Identity(identity_key),
            None => GroupingKey::Watershed(&self.watershed_code),
        }
    }
}

/// Key a segment is grouped under, tagged with the merge pass that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupingKey<'a> {
    Identity(&'a str),
    Watershed(&'a str),
}

/// One merged row of the destination table.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRiver {
    /// Identity key of the group, `None` for rows built from watershed groups.
    pub identity_key: Option<String>,
    /// Maximum non-null name found in the group.
    pub display_name: Option<String>,
    /// Minimum code for identity groups, maximum code for watershed groups.
    pub watershed_code: Option<String>,
    pub flow_order_class: FlowOrderClass,
    /// Union of the member geometries, line-merged.
    pub geometry: MultiLineString<f64>,
}

/// The two merge passes of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePass {
    /// Groups segments carrying an identity key by that key.
    Identity,
    /// Groups segments without identity key by watershed code.
    Fallback,
}

impl MergePass {
    /// Name of the grouping key as used in progress lines.
    pub fn key_label(&self) -> &'static str {
        match self {
            MergePass::Identity => "gnis_id",
            MergePass::Fallback => "HUC8",
        }
    }
}

impl fmt::Display for MergePass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergePass::Identity => f.write_str("identity"),
            MergePass::Fallback => f.write_str("fallback"),
        }
    }
}

#[cfg(test)]
mod tests {
    use geo_types::line_string;

    use super::*;

    #[test]
    fn grouping_key_prefers_identity_key() {
        let line = line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)];
        let named = Segment::new(Some("756422"), "10300101", None, 5, line.clone());
        let unnamed = Segment::new(None, "10300101", None, 2, line);

        assert_eq!(named.grouping_key(), GroupingKey::Identity("756422"));
        assert_eq!(unnamed.grouping_key(), GroupingKey::Watershed("10300101"));
    }
}
