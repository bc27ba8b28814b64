//! Label boundaries on a labeled surface.
//!
//! A label boundary is the set of vertices where adjacent vertices disagree
//! on their label. Boundaries are further broken into segments keyed by an
//! ordered label pair `(a, b)`: the vertices labeled `a` that touch a
//! neighbor labeled `b`. Segment order is deterministic (lexicographic by
//! pair) so a segment's position can serve as a column index during
//! realignment.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::error::Result;
use crate::mesh::{MeshGraph, Surface};

/// Vertices of every face whose corners do not all share one label.
///
/// A single pass over the faces; the result is sorted and unique.
pub fn find_label_boundaries(surface: &Surface, labels: &[i32]) -> Result<Vec<usize>> {
    surface.check_labels(labels)?;

    let mut on_boundary = vec![false; surface.num_vertices()];
    for face in surface.faces() {
        let [a, b, c] = *face;
        if labels[a] != labels[b] || labels[b] != labels[c] {
            on_boundary[a] = true;
            on_boundary[b] = true;
            on_boundary[c] = true;
        }
    }

    Ok((0..surface.num_vertices())
        .filter(|&v| on_boundary[v])
        .collect())
}

/// One boundary segment: the vertices labeled `pair.0` that touch a
/// neighbor labeled `pair.1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundarySegment {
    /// Ordered label pair; `(a, b)` and `(b, a)` are distinct segments on
    /// the two sides of the same boundary.
    pub pair: (i32, i32),

    /// Member vertices, ascending.
    pub vertices: Vec<usize>,
}

/// All boundary segments of a labeling, lexicographically ordered by label
/// pair. A segment's index doubles as its realignment column.
#[derive(Debug, Clone)]
pub struct BoundarySegments {
    segments: Vec<BoundarySegment>,
}

impl BoundarySegments {
    /// Number of segments.
    #[inline]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether there are no segments.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Segment at index `i`.
    #[inline]
    pub fn segment(&self, i: usize) -> &BoundarySegment {
        &self.segments[i]
    }

    /// All segments in order.
    #[inline]
    pub fn segments(&self) -> &[BoundarySegment] {
        &self.segments
    }

    /// Index of the segment with this exact ordered pair.
    pub fn index_of(&self, pair: (i32, i32)) -> Option<usize> {
        self.segments
            .binary_search_by(|s| s.pair.cmp(&pair))
            .ok()
    }

    /// Index of the segment on the other side of the same boundary.
    pub fn co_segment(&self, i: usize) -> Option<usize> {
        let (a, b) = self.segments[i].pair;
        self.index_of((b, a))
    }

    /// Whether two vertices lie on the same segment.
    pub fn same_segment(&self, v: usize, w: usize) -> bool {
        self.segments.iter().any(|s| {
            s.vertices.binary_search(&v).is_ok() && s.vertices.binary_search(&w).is_ok()
        })
    }
}

/// Break the label boundary into per-label-pair segments.
///
/// Empty segments never appear; the result is ordered lexicographically by
/// label pair.
pub fn find_label_boundary_segments(
    surface: &Surface,
    graph: &MeshGraph,
    labels: &[i32],
) -> Result<BoundarySegments> {
    let boundary = find_label_boundaries(surface, labels)?;

    let mut segments: Vec<BoundarySegment> = Vec::new();
    for &v in &boundary {
        let own = labels[v];
        let mut neighbor_labels: Vec<i32> = graph
            .neighbors(v)
            .iter()
            .map(|&w| labels[w])
            .filter(|&l| l != own)
            .collect();
        neighbor_labels.sort_unstable();
        neighbor_labels.dedup();

        for other in neighbor_labels {
            let pair = (own, other);
            match segments.binary_search_by(|s| s.pair.cmp(&pair)) {
                Ok(i) => segments[i].vertices.push(v),
                Err(i) => segments.insert(
                    i,
                    BoundarySegment {
                        pair,
                        vertices: vec![v],
                    },
                ),
            }
        }
    }

    // Boundary vertices were visited in ascending order, so each segment's
    // vertex list is already sorted.
    debug!(segments = segments.len(), "label boundary segmented");
    Ok(BoundarySegments { segments })
}

/// Vertices of faces touching a curve, minus the curve itself.
pub fn find_polyline_flanks(surface: &Surface, curve: &[usize]) -> Vec<usize> {
    let on_curve: HashSet<usize> = curve.iter().copied().collect();
    let mut flank = vec![false; surface.num_vertices()];

    for face in surface.faces() {
        if face.iter().any(|v| on_curve.contains(v)) {
            for &v in face {
                flank[v] = true;
            }
        }
    }
    for &v in curve {
        flank[v] = false;
    }

    (0..surface.num_vertices()).filter(|&v| flank[v]).collect()
}

/// Hop cap on boundary-restricted and ring-expansion searches; past this
/// the search is considered lost and gives up.
const MAX_SEARCH_HOPS: usize = 500;

/// From each endpoint of a boundary segment, walk along the segment until a
/// curve vertex is met.
///
/// Returns the first curve vertex reached from each endpoint, or `None` for
/// an endpoint whose walk exhausts the segment or the hop cap.
pub fn find_intersections(
    graph: &MeshGraph,
    segment: &[usize],
    endpoints: (usize, usize),
    curve: &[usize],
) -> [Option<usize>; 2] {
    let on_segment: HashSet<usize> = segment.iter().copied().collect();
    let on_curve: HashSet<usize> = curve.iter().copied().collect();

    let walk = |start: usize| -> Option<usize> {
        let mut visited: HashSet<usize> = HashSet::new();
        visited.insert(start);
        let mut fringe = vec![start];

        for _ in 0..MAX_SEARCH_HOPS {
            for &v in &fringe {
                if on_curve.contains(&v) {
                    return Some(v);
                }
            }
            let mut next = Vec::new();
            for &v in &fringe {
                for &w in graph.neighbors(v) {
                    if on_segment.contains(&w) && visited.insert(w) {
                        next.push(w);
                    }
                }
            }
            if next.is_empty() {
                return None;
            }
            fringe = next;
        }
        warn!(start, "intersection walk hit hop cap");
        None
    };

    [walk(endpoints.0), walk(endpoints.1)]
}

/// The two nearest distinct positive labels around a vertex.
///
/// Expands ring by ring from `v` (the vertex's own label counts at hop 0)
/// until two distinct labels are seen. Returns `(label, hops)` pairs with
/// the smaller label first, or `None` when the component or the hop cap is
/// exhausted first.
pub fn nearest_label_pair(
    graph: &MeshGraph,
    labels: &[i32],
    v: usize,
) -> Option<[(i32, usize); 2]> {
    let mut found: Vec<(i32, usize)> = Vec::new();
    let mut visited = vec![false; graph.num_vertices()];
    let mut fringe = vec![v];
    visited[v] = true;

    for ring in 0..=MAX_SEARCH_HOPS {
        for &u in &fringe {
            let l = labels[u];
            if l > 0 && !found.iter().any(|&(f, _)| f == l) {
                found.push((l, ring));
                if found.len() == 2 {
                    let mut pair = [found[0], found[1]];
                    if pair[0].0 > pair[1].0 {
                        pair.swap(0, 1);
                    }
                    return Some(pair);
                }
            }
        }
        let mut next = Vec::new();
        for &u in &fringe {
            for &w in graph.neighbors(u) {
                if !visited[w] {
                    visited[w] = true;
                    next.push(w);
                }
            }
        }
        if next.is_empty() {
            return None;
        }
        fringe = next;
    }

    warn!(vertex = v, "nearest-label search hit hop cap");
    None
}

/// Nearest label pair for every curve vertex, normalized smaller label
/// first; `None` where the search came up short.
pub fn segment_curve_by_labels(
    graph: &MeshGraph,
    labels: &[i32],
    curve: &[usize],
) -> Vec<Option<(i32, i32)>> {
    curve
        .iter()
        .map(|&v| nearest_label_pair(graph, labels, v).map(|[(a, _), (b, _)]| (a, b)))
        .collect()
}
