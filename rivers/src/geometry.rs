//! In-process counterparts of `ST_Union` and `ST_LineMerge` for line geometries.
//!
//! Used by the in-memory store. The union collects every line piece of the inputs
//! and drops pieces that repeat an earlier one (in either direction). The line merge
//! then fuses pieces end to end wherever exactly two piece ends meet at a node, the
//! same rule PostGIS applies: a node touched by one or by three or more piece ends
//! terminates strands. No coordinate is created and none is removed except the
//! duplicated endpoint of two fused pieces.

use std::collections::HashMap;

use geo_types::{Coord, LineString, MultiLineString};

/// Bit-exact node identity of a coordinate.
type NodeKey = (u64, u64);

fn node_key(coord: &Coord<f64>) -> NodeKey {
    // Normalize -0.0 so that both zero representations share a node.
    let x = if coord.x == 0.0 { 0.0 } else { coord.x };
    let y = if coord.y == 0.0 { 0.0 } else { coord.y };
    (x.to_bits(), y.to_bits())
}

/// Returns the union of line geometries as a flat collection of distinct pieces.
pub fn union_lines<'a, I>(geometries: I) -> MultiLineString<f64>
where
    I: IntoIterator<Item = &'a MultiLineString<f64>>,
{
    let mut pieces: Vec<LineString<f64>> = Vec::new();

    for geometry in geometries {
        for line in geometry.iter() {
            if line.0.len() < 2 {
                continue;
            }

            let duplicate = pieces
                .iter()
                .any(|piece| piece == line || piece.0.iter().eq(line.0.iter().rev()));
            if !duplicate {
                pieces.push(line.clone());
            }
        }
    }

    MultiLineString::new(pieces)
}

/// Fuses touching line pieces into maximal continuous strands.
pub fn line_merge(geometry: &MultiLineString<f64>) -> MultiLineString<f64> {
    let pieces: Vec<&LineString<f64>> = geometry
        .iter()
        .filter(|line| line.0.len() >= 2)
        .collect();

    // Every piece end registered at its node, as (piece index, is start).
    let mut nodes: HashMap<NodeKey, Vec<(usize, bool)>> = HashMap::new();
    for (index, piece) in pieces.iter().enumerate() {
        nodes.entry(node_key(&piece.0[0])).or_default().push((index, true));
        nodes
            .entry(node_key(&piece.0[piece.0.len() - 1]))
            .or_default()
            .push((index, false));
    }

    let degree = |coord: &Coord<f64>| nodes.get(&node_key(coord)).map_or(0, Vec::len);

    let mut used = vec![false; pieces.len()];
    let mut strands = Vec::new();

    // Open strands start at a node where pieces cannot be fused.
    for index in 0..pieces.len() {
        if used[index] {
            continue;
        }

        let piece = pieces[index];
        let first = &piece.0[0];
        let last = &piece.0[piece.0.len() - 1];
        if degree(first) != 2 {
            strands.push(walk_strand(&pieces, &nodes, &mut used, index, true));
        } else if degree(last) != 2 {
            strands.push(walk_strand(&pieces, &nodes, &mut used, index, false));
        }
    }

    // Whatever is left forms closed rings where every node joins two pieces.
    for index in 0..pieces.len() {
        if !used[index] {
            strands.push(walk_strand(&pieces, &nodes, &mut used, index, true));
        }
    }

    MultiLineString::new(strands)
}

/// Follows pieces from `start` through degree-two nodes and returns the fused strand.
///
/// `forward` tells whether the strand leaves `start` through its first coordinate.
fn walk_strand(
    pieces: &[&LineString<f64>],
    nodes: &HashMap<NodeKey, Vec<(usize, bool)>>,
    used: &mut [bool],
    start: usize,
    forward: bool,
) -> LineString<f64> {
    let mut coords: Vec<Coord<f64>> = oriented(pieces[start], forward);
    used[start] = true;

    let mut current = start;
    loop {
        let Some(tail) = coords.last() else {
            break;
        };
        let Some(ends) = nodes.get(&node_key(tail)) else {
            break;
        };
        if ends.len() != 2 {
            break;
        }

        let next = ends
            .iter()
            .find(|(index, _)| *index != current && !used[*index]);
        let Some(&(next_index, enters_at_start)) = next else {
            break;
        };

        used[next_index] = true;
        coords.extend(oriented(pieces[next_index], enters_at_start).into_iter().skip(1));
        current = next_index;
    }

    LineString::new(coords)
}

fn oriented(piece: &LineString<f64>, forward: bool) -> Vec<Coord<f64>> {
    if forward {
        piece.0.clone()
    } else {
        piece.0.iter().rev().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use geo_types::line_string;

    use super::*;

    fn multi(lines: Vec<LineString<f64>>) -> MultiLineString<f64> {
        MultiLineString::new(lines)
    }

    fn coordinate_set(geometry: &MultiLineString<f64>) -> HashSet<NodeKey> {
        geometry
            .iter()
            .flat_map(|line| line.0.iter())
            .map(node_key)
            .collect()
    }

    #[test]
    fn touching_pieces_are_fused() {
        let a = multi(vec![line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)]]);
        let b = multi(vec![line_string![(x: 1.0, y: 0.0), (x: 2.0, y: 1.0)]]);

        let merged = line_merge(&union_lines([&a, &b]));

        assert_eq!(
            merged,
            multi(vec![line_string![
                (x: 0.0, y: 0.0),
                (x: 1.0, y: 0.0),
                (x: 2.0, y: 1.0)
            ]])
        );
    }

    #[test]
    fn reversed_pieces_are_fused_in_walking_direction() {
        let a = multi(vec![line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)]]);
        let b = multi(vec![line_string![(x: 2.0, y: 0.0), (x: 1.0, y: 0.0)]]);

        let merged = line_merge(&union_lines([&a, &b]));

        assert_eq!(merged.0.len(), 1);
        assert_eq!(merged.0[0].0.len(), 3);
        assert_eq!(merged.0[0].0[1], Coord { x: 1.0, y: 0.0 });
    }

    #[test]
    fn disjoint_pieces_stay_separate() {
        let a = multi(vec![line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)]]);
        let b = multi(vec![line_string![(x: 5.0, y: 5.0), (x: 6.0, y: 5.0)]]);

        let merged = line_merge(&union_lines([&a, &b]));

        assert_eq!(merged.0.len(), 2);
        assert_eq!(coordinate_set(&merged), coordinate_set(&union_lines([&a, &b])));
    }

    #[test]
    fn confluence_terminates_strands() {
        // Three pieces meeting at (1, 0) cannot be fused into one strand.
        let a = multi(vec![line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)]]);
        let b = multi(vec![line_string![(x: 1.0, y: 0.0), (x: 2.0, y: 0.0)]]);
        let c = multi(vec![line_string![(x: 1.0, y: 0.0), (x: 1.0, y: 1.0)]]);

        let merged = line_merge(&union_lines([&a, &b, &c]));

        assert_eq!(merged.0.len(), 3);
    }

    #[test]
    fn ring_is_merged_into_one_closed_strand() {
        let a = multi(vec![line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)]]);
        let b = multi(vec![line_string![(x: 1.0, y: 0.0), (x: 1.0, y: 1.0)]]);
        let c = multi(vec![line_string![(x: 1.0, y: 1.0), (x: 0.0, y: 0.0)]]);

        let merged = line_merge(&union_lines([&a, &b, &c]));

        assert_eq!(merged.0.len(), 1);
        let ring = &merged.0[0];
        assert_eq!(ring.0.len(), 4);
        assert_eq!(ring.0.first(), ring.0.last());
    }

    #[test]
    fn duplicate_pieces_are_unioned_away() {
        let a = multi(vec![line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)]]);
        let reversed = multi(vec![line_string![(x: 1.0, y: 0.0), (x: 0.0, y: 0.0)]]);

        let union = union_lines([&a, &a, &reversed]);

        assert_eq!(union, a);
    }

    #[test]
    fn single_geometry_is_unchanged() {
        let d = multi(vec![line_string![
            (x: -96.1, y: 41.2),
            (x: -96.0, y: 41.3),
            (x: -95.9, y: 41.3)
        ]]);

        assert_eq!(line_merge(&union_lines([&d])), d);
    }
}
