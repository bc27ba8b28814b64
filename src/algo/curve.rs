//! Connecting anchors into fundus curves.
//!
//! Anchors within one fold are joined by cheapest paths through the fold,
//! where stepping onto a vertex costs one minus its likelihood, so paths
//! hug the high-likelihood trough. A minimum spanning tree over the
//! anchor-to-anchor path costs picks which pairs to join, and the curve is
//! the union of the tree's paths. Anchors separated from the rest of the
//! fold are logged and left out rather than failing the fold.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::error::Result;
use crate::mesh::MeshGraph;

/// Options for [`connect_anchors`].
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Run the per-anchor searches in parallel.
    pub parallel: bool,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self { parallel: true }
    }
}

impl ConnectOptions {
    /// Force sequential execution.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }
}

/// A fundus curve: the union of cheapest paths joining a fold's anchors.
#[derive(Debug, Clone)]
pub struct FundusCurve {
    vertices: Vec<usize>,
    anchors: Vec<usize>,
}

impl FundusCurve {
    /// Curve vertices in ascending order (anchors included).
    #[inline]
    pub fn vertices(&self) -> &[usize] {
        &self.vertices
    }

    /// The anchors this curve was grown from.
    #[inline]
    pub fn anchors(&self) -> &[usize] {
        &self.anchors
    }

    /// Whether the curve has no vertices.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub(crate) fn empty() -> Self {
        Self {
            vertices: Vec::new(),
            anchors: Vec::new(),
        }
    }
}

/// Queue entry ordered so that `BinaryHeap` pops the cheapest vertex first.
#[derive(Copy, Clone, PartialEq)]
struct QueueEntry {
    cost: f64,
    vertex: usize,
}

impl Eq for QueueEntry {}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.vertex.cmp(&self.vertex))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Cheapest-path tree from one source, restricted to in-scope vertices.
struct SearchResult {
    cost: Vec<f64>,
    predecessor: Vec<usize>,
}

const NO_PREDECESSOR: usize = usize::MAX;

fn search(
    graph: &MeshGraph,
    likelihoods: &[f64],
    in_scope: &[bool],
    source: usize,
) -> SearchResult {
    let n = graph.num_vertices();
    let mut cost = vec![f64::INFINITY; n];
    let mut predecessor = vec![NO_PREDECESSOR; n];
    let mut settled = vec![false; n];
    let mut heap = BinaryHeap::new();

    cost[source] = 0.0;
    heap.push(QueueEntry {
        cost: 0.0,
        vertex: source,
    });

    while let Some(entry) = heap.pop() {
        if settled[entry.vertex] {
            continue;
        }
        settled[entry.vertex] = true;

        for &w in graph.neighbors(entry.vertex) {
            if !in_scope[w] || settled[w] {
                continue;
            }
            // Stepping onto a vertex costs one minus its likelihood, so the
            // search prefers the high-likelihood trough.
            let step = (1.0 - likelihoods[w]).max(0.0);
            let candidate = entry.cost + step;
            if candidate < cost[w] {
                cost[w] = candidate;
                predecessor[w] = entry.vertex;
                heap.push(QueueEntry {
                    cost: candidate,
                    vertex: w,
                });
            }
        }
    }

    SearchResult { cost, predecessor }
}

fn walk_back(result: &SearchResult, mut v: usize) -> Vec<usize> {
    let mut path = vec![v];
    while result.predecessor[v] != NO_PREDECESSOR {
        v = result.predecessor[v];
        path.push(v);
    }
    path.reverse();
    path
}

/// Join a fold's anchors into a single [`FundusCurve`].
///
/// Runs a cheapest-path search from every anchor (restricted to the fold),
/// spans the anchors with a minimum spanning tree over pairwise path costs,
/// and returns the union of the tree's paths. Anchors unreachable from the
/// rest are skipped with a warning, so the result may be a forest.
pub fn connect_anchors(
    graph: &MeshGraph,
    likelihoods: &[f64],
    fold: &[usize],
    anchors: &[usize],
    options: &ConnectOptions,
) -> Result<FundusCurve> {
    if anchors.is_empty() {
        return Ok(FundusCurve::empty());
    }
    if anchors.len() == 1 {
        return Ok(FundusCurve {
            vertices: anchors.to_vec(),
            anchors: anchors.to_vec(),
        });
    }

    let mut in_scope = vec![false; graph.num_vertices()];
    for &v in fold {
        in_scope[v] = true;
    }

    let searches: Vec<SearchResult> = if options.parallel {
        anchors
            .par_iter()
            .map(|&a| search(graph, likelihoods, &in_scope, a))
            .collect()
    } else {
        anchors
            .iter()
            .map(|&a| search(graph, likelihoods, &in_scope, a))
            .collect()
    };

    // Prim over the anchor-to-anchor costs; unreachable anchors start new
    // components instead of aborting the fold.
    let k = anchors.len();
    let mut in_tree = vec![false; k];
    in_tree[0] = true;
    let mut curve_vertices = vec![anchors[0]];

    for _ in 1..k {
        let mut best: Option<(f64, usize, usize)> = None;
        for (a, _) in in_tree.iter().enumerate().filter(|&(_, &t)| t) {
            for (b, _) in in_tree.iter().enumerate().filter(|&(_, &t)| !t) {
                let c = searches[a].cost[anchors[b]];
                if c.is_finite() && best.map_or(true, |(bc, _, _)| c < bc) {
                    best = Some((c, a, b));
                }
            }
        }
        match best {
            Some((_, a, b)) => {
                in_tree[b] = true;
                curve_vertices.extend(walk_back(&searches[a], anchors[b]));
            }
            None => {
                // Remaining anchors are cut off from the tree built so far.
                let b = in_tree
                    .iter()
                    .position(|&t| !t)
                    .unwrap_or(0);
                warn!(
                    anchor = anchors[b],
                    "anchor unreachable within fold, starting new curve component"
                );
                in_tree[b] = true;
                curve_vertices.push(anchors[b]);
            }
        }
    }

    curve_vertices.sort_unstable();
    curve_vertices.dedup();
    debug!(
        anchors = anchors.len(),
        vertices = curve_vertices.len(),
        "anchors connected"
    );
    Ok(FundusCurve {
        vertices: curve_vertices,
        anchors: anchors.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Strip of triangles over vertices 0..n laid out as two rows:
    /// bottom row 0..n/2, top row n/2..n.
    fn strip(cols: usize) -> MeshGraph {
        let mut faces = Vec::new();
        for i in 0..cols - 1 {
            let (a, b) = (i, i + 1);
            let (c, d) = (cols + i, cols + i + 1);
            faces.push([a, b, c]);
            faces.push([b, d, c]);
        }
        MeshGraph::from_faces(2 * cols, &faces).unwrap()
    }

    #[test]
    fn test_no_anchors_empty_curve() {
        let graph = strip(4);
        let fold: Vec<usize> = (0..8).collect();
        let curve =
            connect_anchors(&graph, &[0.5; 8], &fold, &[], &ConnectOptions::default()).unwrap();
        assert!(curve.is_empty());
    }

    #[test]
    fn test_single_anchor() {
        let graph = strip(4);
        let fold: Vec<usize> = (0..8).collect();
        let curve =
            connect_anchors(&graph, &[0.5; 8], &fold, &[2], &ConnectOptions::default()).unwrap();
        assert_eq!(curve.vertices(), &[2]);
    }

    #[test]
    fn test_path_follows_high_likelihood() {
        // Bottom row is the likely trough; anchors at its two ends.
        let graph = strip(5);
        let mut likelihoods = vec![0.1; 10];
        for v in 0..5 {
            likelihoods[v] = 0.9;
        }
        let fold: Vec<usize> = (0..10).collect();
        let curve = connect_anchors(
            &graph,
            &likelihoods,
            &fold,
            &[0, 4],
            &ConnectOptions::default().sequential(),
        )
        .unwrap();

        assert_eq!(curve.vertices(), &[0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_curve_contains_anchors() {
        let graph = strip(5);
        let likelihoods = vec![0.5; 10];
        let fold: Vec<usize> = (0..10).collect();
        let curve = connect_anchors(
            &graph,
            &likelihoods,
            &fold,
            &[0, 4, 7],
            &ConnectOptions::default(),
        )
        .unwrap();

        for a in [0, 4, 7] {
            assert!(curve.vertices().contains(&a));
        }
    }

    #[test]
    fn test_unreachable_anchor_skipped() {
        // Fold scope excludes the top row, cutting anchor 7 off.
        let graph = strip(5);
        let likelihoods = vec![0.5; 10];
        let fold: Vec<usize> = (0..5).collect();
        let curve = connect_anchors(
            &graph,
            &likelihoods,
            &fold,
            &[0, 4, 7],
            &ConnectOptions::default().sequential(),
        )
        .unwrap();

        // 7 appears as an isolated component, no path through the top row.
        assert!(curve.vertices().contains(&7));
        assert!(!curve.vertices().contains(&8));
        assert_eq!(curve.vertices(), &[0, 1, 2, 3, 4, 7]);
    }
}
