//! Connected-region segmentation over the mesh graph.
//!
//! Breadth-first region growing from seed sets (or from every unvisited
//! vertex), with optional scalar-value filtering, label-respecting growth,
//! and a minimum region size below which components are discarded. Used to
//! extract depth-thresholded folds and to isolate the largest connected
//! fragment of a feature before spectral analysis.
//!
//! Segment IDs are assigned in discovery order and carry no meaning beyond
//! the partition itself.

use tracing::debug;

use crate::error::{Result, SurfaceError};
use crate::mesh::MeshGraph;

/// Options for [`segment`].
#[derive(Debug, Clone)]
pub struct SegmentOptions {
    /// Seed vertex sets; each list grows into one segment. When empty, every
    /// unvisited in-scope vertex starts a new segment.
    pub seed_lists: Vec<Vec<usize>>,

    /// After seeded growth, continue segmenting leftover in-scope vertices
    /// into additional segments.
    pub keep_seeding: bool,

    /// Restrict growth so that a region never crosses a pre-existing label
    /// boundary (requires `labels`).
    pub spread_within_labels: bool,

    /// Per-vertex labels consulted when `spread_within_labels` is set.
    pub labels: Vec<i32>,

    /// Optional per-vertex scalar filter; only vertices whose value exceeds
    /// `value_threshold` participate. Empty means no filter.
    pub values: Vec<f64>,

    /// Threshold applied to `values`.
    pub value_threshold: f64,

    /// Components with fewer members are discarded (marked unassigned).
    pub min_region_size: usize,

    /// Cap on breadth-first rounds per region. `None` grows to exhaustion.
    pub max_steps: Option<usize>,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self {
            seed_lists: Vec::new(),
            keep_seeding: false,
            spread_within_labels: false,
            labels: Vec::new(),
            values: Vec::new(),
            value_threshold: 0.0,
            min_region_size: 1,
            max_steps: None,
        }
    }
}

impl SegmentOptions {
    /// Set seed vertex lists.
    pub fn with_seeds(mut self, seed_lists: Vec<Vec<usize>>) -> Self {
        self.seed_lists = seed_lists;
        self
    }

    /// Set the minimum region size.
    pub fn with_min_region_size(mut self, size: usize) -> Self {
        self.min_region_size = size;
        self
    }

    /// Filter participating vertices by a scalar threshold.
    pub fn with_value_filter(mut self, values: Vec<f64>, threshold: f64) -> Self {
        self.values = values;
        self.value_threshold = threshold;
        self
    }

    /// Keep regions from crossing boundaries of the given labels.
    pub fn within_labels(mut self, labels: Vec<i32>) -> Self {
        self.spread_within_labels = true;
        self.labels = labels;
        self
    }
}

/// Result of region segmentation: a partition of the in-scope vertices.
#[derive(Debug, Clone)]
pub struct Segmentation {
    ids: Vec<i32>,
    n_segments: usize,
}

impl Segmentation {
    /// Per-vertex segment IDs; `-1` marks vertices that are out of scope or
    /// whose component was discarded.
    #[inline]
    pub fn ids(&self) -> &[i32] {
        &self.ids
    }

    /// Segment ID of a vertex, or `None` if unassigned.
    #[inline]
    pub fn id(&self, v: usize) -> Option<usize> {
        (self.ids[v] >= 0).then_some(self.ids[v] as usize)
    }

    /// Number of segments.
    #[inline]
    pub fn n_segments(&self) -> usize {
        self.n_segments
    }

    /// Member vertices of one segment, in ascending order.
    pub fn members(&self, segment: usize) -> Vec<usize> {
        self.ids
            .iter()
            .enumerate()
            .filter(|&(_, &id)| id == segment as i32)
            .map(|(v, _)| v)
            .collect()
    }

    /// Member lists for all segments, indexed by segment ID.
    pub fn member_lists(&self) -> Vec<Vec<usize>> {
        let mut lists = vec![Vec::new(); self.n_segments];
        for (v, &id) in self.ids.iter().enumerate() {
            if id >= 0 {
                lists[id as usize].push(v);
            }
        }
        lists
    }
}

/// Grow connected components over the adjacency graph.
///
/// `scope` restricts which vertices may participate at all; the options add
/// a value filter, seeded growth, label-respecting growth, and a minimum
/// component size (see [`SegmentOptions`]).
pub fn segment(scope: &[usize], graph: &MeshGraph, options: &SegmentOptions) -> Segmentation {
    let n = graph.num_vertices();

    let mut in_scope = vec![false; n];
    for &v in scope {
        if options.values.is_empty() || options.values[v] > options.value_threshold {
            in_scope[v] = true;
        }
    }

    let mut ids = vec![-1i32; n];
    let mut visited = vec![false; n];
    let mut next_id = 0i32;

    let mut grow = |seeds: &[usize], ids: &mut Vec<i32>, visited: &mut Vec<bool>| -> Vec<usize> {
        let mut members = Vec::new();
        let mut frontier: Vec<usize> = seeds
            .iter()
            .copied()
            .filter(|&v| in_scope[v] && !visited[v])
            .collect();
        for &v in &frontier {
            visited[v] = true;
        }
        members.extend_from_slice(&frontier);

        let mut steps = 0usize;
        while !frontier.is_empty() {
            if let Some(max_steps) = options.max_steps {
                if steps >= max_steps {
                    break;
                }
            }
            let mut next = Vec::new();
            for &v in &frontier {
                for &w in graph.neighbors(v) {
                    if !in_scope[w] || visited[w] {
                        continue;
                    }
                    if options.spread_within_labels && options.labels[w] != options.labels[v] {
                        continue;
                    }
                    visited[w] = true;
                    next.push(w);
                }
            }
            members.extend_from_slice(&next);
            frontier = next;
            steps += 1;
        }

        if members.len() >= options.min_region_size {
            for &v in &members {
                ids[v] = next_id;
            }
            next_id += 1;
        } else if !members.is_empty() {
            debug!(
                size = members.len(),
                min = options.min_region_size,
                "discarding undersized region"
            );
        }
        members
    };

    for seeds in &options.seed_lists {
        grow(seeds, &mut ids, &mut visited);
    }

    if options.seed_lists.is_empty() || options.keep_seeding {
        for &v in scope {
            if in_scope[v] && !visited[v] {
                grow(&[v], &mut ids, &mut visited);
            }
        }
    }

    debug!(segments = next_id, "segmentation complete");
    Segmentation {
        ids,
        n_segments: next_id as usize,
    }
}

/// Extract depth-thresholded fold regions.
///
/// A fold is a connected region of vertices whose depth exceeds
/// `depth_threshold`; folds smaller than `min_fold_size` are discarded.
/// Returns the segmentation and the per-fold member lists.
pub fn extract_folds(
    graph: &MeshGraph,
    depths: &[f64],
    depth_threshold: f64,
    min_fold_size: usize,
) -> Result<(Segmentation, Vec<Vec<usize>>)> {
    if depths.len() != graph.num_vertices() {
        return Err(SurfaceError::ScalarCountMismatch {
            name: "depths",
            count: depths.len(),
            num_vertices: graph.num_vertices(),
        });
    }

    let scope: Vec<usize> = (0..graph.num_vertices()).collect();
    let options = SegmentOptions::default()
        .with_value_filter(depths.to_vec(), depth_threshold)
        .with_min_region_size(min_fold_size);

    let segmentation = segment(&scope, graph, &options);
    let folds = segmentation.member_lists();
    debug!(folds = folds.len(), "fold extraction complete");
    Ok((segmentation, folds))
}

/// Select the largest segment of a segmentation.
///
/// Size is the member count, or the summed per-vertex `areas` when provided.
/// Returns the members of the winning segment, or `None` for an empty
/// segmentation.
pub fn largest_segment(segmentation: &Segmentation, areas: Option<&[f64]>) -> Option<Vec<usize>> {
    let lists = segmentation.member_lists();
    lists
        .into_iter()
        .max_by(|a, b| {
            let size_a = segment_size(a, areas);
            let size_b = segment_size(b, areas);
            size_a.partial_cmp(&size_b).unwrap_or(std::cmp::Ordering::Equal)
        })
        .filter(|members| !members.is_empty())
}

fn segment_size(members: &[usize], areas: Option<&[f64]>) -> f64 {
    match areas {
        Some(areas) => members.iter().map(|&v| areas[v]).sum(),
        None => members.len() as f64,
    }
}
