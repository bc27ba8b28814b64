//! Realigning label boundaries onto fundus curves.
//!
//! Anatomical labels drawn by hand tend to run parallel to, but not on, the
//! fundus at the bottom of a sulcus. Realignment nudges them: the label
//! boundary is broken into per-label-pair segments, segments judged close
//! and parallel to the curve are allowed to propagate, the propagation runs
//! with both the boundary and the curve clamped, and vertices that end up
//! confidently on a segment's far side take that segment's neighbor label.
//!
//! Columns of the realignment field correspond to boundary segments, not
//! labels; inadmissible segments keep their column (zeroed) so indices stay
//! stable.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::algo::boundary::{find_label_boundary_segments, find_polyline_flanks, BoundarySegments};
use crate::algo::propagate::{
    relax_column, rescale_column, AffinityMatrix, ColumnTermination, PropagateOptions,
};
use crate::error::Result;
use crate::mesh::{MeshGraph, Surface};

/// Which claim wins when two segments try to relabel the same vertices, or
/// when both sides of one boundary qualify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlapPolicy {
    /// The segment relabeling more vertices wins; it presumably runs
    /// parallel to the curve.
    LargerSegment,

    /// The segment whose claim touches more curve-flanking vertices wins.
    MoreCurveAdjacent,
}

/// Options for boundary realignment.
#[derive(Debug, Clone)]
pub struct RealignOptions {
    /// A segment is considered only if some curve vertex lies closer than
    /// this to it.
    pub dist_threshold: f64,

    /// Acceptable ratio between a curve vertex's nearest and second-nearest
    /// boundary distances.
    pub proportion: f64,

    /// Boundary vertices within this distance of the curve can join an
    /// already qualified segment during augmentation.
    pub curve_threshold: f64,

    /// Minimum qualifying vertices a segment needs to keep its column.
    pub num_good_vertices: usize,

    /// A qualifying vertex is dropped when its curve vertex's five nearest
    /// boundary vertices spread wider than this.
    pub spread_tol: f64,

    /// Division guard in the proportion test.
    pub eps: f64,

    /// Field value above which a vertex is claimed for relabeling.
    pub threshold: f64,

    /// Minimum curve-flanking vertices a claim must contain to be relevant.
    pub relevance_threshold: usize,

    /// Conflict resolution between surviving claims.
    pub overlap_policy: OverlapPolicy,

    /// Settings for the underlying propagation.
    pub propagate: PropagateOptions,
}

impl Default for RealignOptions {
    fn default() -> Self {
        Self {
            dist_threshold: 8.0,
            proportion: 1.0,
            curve_threshold: 16.0,
            num_good_vertices: 5,
            spread_tol: 6.0,
            eps: 1e-7,
            threshold: 0.5,
            relevance_threshold: 15,
            overlap_policy: OverlapPolicy::LargerSegment,
            propagate: PropagateOptions::default(),
        }
    }
}

impl RealignOptions {
    /// Set the conflict resolution policy.
    pub fn with_overlap_policy(mut self, policy: OverlapPolicy) -> Self {
        self.overlap_policy = policy;
        self
    }

    /// Set the admission distance threshold.
    pub fn with_dist_threshold(mut self, dist_threshold: f64) -> Self {
        self.dist_threshold = dist_threshold;
        self
    }

    /// Set the minimum qualifying vertices per segment.
    pub fn with_num_good_vertices(mut self, num_good_vertices: usize) -> Self {
        self.num_good_vertices = num_good_vertices;
        self
    }

    /// Set the minimum curve-flanking vertices per claim.
    pub fn with_relevance_threshold(mut self, relevance_threshold: usize) -> Self {
        self.relevance_threshold = relevance_threshold;
        self
    }

    /// Force sequential execution of the propagation.
    pub fn sequential(mut self) -> Self {
        self.propagate = self.propagate.sequential();
        self
    }
}

/// Decide which boundary segments may propagate their labels.
///
/// A curve vertex supports the boundary vertex nearest to it when that
/// vertex is both close (`dist_threshold`) and decisively closest
/// (`proportion` with `eps` guard). Supported vertices whose curve vertex
/// sees a wide spread among its five nearest boundary vertices are pruned;
/// boundary vertices near the curve whose curve vertex maps back onto the
/// same segment are added. A segment is admissible when it retains at least
/// `num_good_vertices` supported vertices.
pub fn determine_appropriate_segments(
    surface: &Surface,
    segments: &BoundarySegments,
    curve: &[usize],
    options: &RealignOptions,
) -> Vec<bool> {
    let mut boundary: Vec<usize> = segments
        .segments()
        .iter()
        .flat_map(|s| s.vertices.iter().copied())
        .collect();
    boundary.sort_unstable();
    boundary.dedup();

    if boundary.is_empty() || curve.is_empty() {
        return vec![false; segments.len()];
    }

    let gap = |a: usize, b: usize| (surface.point(a) - surface.point(b)).norm();

    // Boundary vertices of each curve vertex, nearest first.
    let by_distance: Vec<Vec<usize>> = curve
        .iter()
        .map(|&f| {
            let mut order: Vec<usize> = boundary.clone();
            order.sort_by(|&a, &b| {
                gap(f, a)
                    .partial_cmp(&gap(f, b))
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            order
        })
        .collect();

    // Nearest curve vertex of each boundary vertex.
    let nearest_curve = |lb: usize| -> (usize, f64) {
        let mut best = (0usize, f64::INFINITY);
        for (i, &f) in curve.iter().enumerate() {
            let d = gap(f, lb);
            if d < best.1 {
                best = (i, d);
            }
        }
        best
    };

    let mut supported: HashSet<usize> = HashSet::new();
    for (i, &f) in curve.iter().enumerate() {
        let closest = by_distance[i][0];
        let closest_d = gap(f, closest);
        let second_d = if by_distance[i].len() > 1 {
            gap(f, by_distance[i][1])
        } else {
            f64::INFINITY
        };

        let within_distance = closest_d < options.dist_threshold;
        let within_proportion = closest_d / second_d > options.proportion
            || second_d / (closest_d + options.eps) > options.proportion;
        if within_distance && within_proportion {
            supported.insert(closest);
        }
    }
    debug!(supported = supported.len(), "curve-supported boundary vertices");

    // Prune: a supported vertex is unreliable when its curve vertex cannot
    // tell nearby boundary vertices apart over a wide area.
    let snapshot: Vec<usize> = supported.iter().copied().collect();
    for lb in snapshot {
        let (f_index, _) = nearest_curve(lb);
        let top = &by_distance[f_index][..by_distance[f_index].len().min(5)];
        let mut spread = 0.0f64;
        for (i, &a) in top.iter().enumerate() {
            for &b in &top[i + 1..] {
                spread = spread.max(gap(a, b));
            }
        }
        if spread > options.spread_tol {
            supported.remove(&lb);
            debug!(vertex = lb, spread, "pruned wide-spread boundary vertex");
        }
    }

    // Augment: pull in boundary vertices whose curve vertex maps back onto
    // an already supported vertex of the same segment.
    let mut additions = Vec::new();
    for &lb in &boundary {
        let (f_index, d) = nearest_curve(lb);
        if d < options.curve_threshold {
            let mapped = by_distance[f_index][0];
            if supported.contains(&mapped) && segments.same_segment(mapped, lb) {
                additions.push(lb);
            }
        }
    }
    supported.extend(additions);

    segments
        .segments()
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let good = s
                .vertices
                .iter()
                .filter(|v| supported.contains(v))
                .count();
            let admissible = good >= options.num_good_vertices;
            debug!(
                segment = i,
                pair = ?s.pair,
                good,
                admissible,
                "segment admission"
            );
            admissible
        })
        .collect()
}

/// Per-segment realignment field in `[0, 1]`, one column per boundary
/// segment (inadmissible columns are identically `0.5`, claiming nothing).
#[derive(Debug, Clone)]
pub struct RealignmentField {
    columns: Vec<Vec<f64>>,
    terminations: Vec<ColumnTermination>,
}

impl RealignmentField {
    /// Number of columns.
    #[inline]
    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// Field values of column `c`, one per vertex.
    #[inline]
    pub fn column(&self, c: usize) -> &[f64] {
        &self.columns[c]
    }

    /// How column `c` finished relaxing.
    #[inline]
    pub fn termination(&self, c: usize) -> ColumnTermination {
        self.terminations[c]
    }
}

/// Relax one realignment column per admissible segment.
///
/// The seed matrix marks every segment-member row `-1` with `+1` in the
/// columns of its own segments; both the boundary and the curve stay
/// clamped throughout. Inadmissible columns are left neutral so column
/// indices keep matching segment indices.
pub fn propagate_realignment(
    surface: &Surface,
    graph: &MeshGraph,
    segments: &BoundarySegments,
    curve: &[usize],
    admissible: &[bool],
    options: &RealignOptions,
) -> Result<RealignmentField> {
    let n = surface.num_vertices();
    let affinity = AffinityMatrix::build(surface, graph, &options.propagate.kernel)?;

    let mut on_segment = vec![false; n];
    for s in segments.segments() {
        for &v in &s.vertices {
            on_segment[v] = true;
        }
    }
    let mut clamp = on_segment.clone();
    for &v in curve {
        clamp[v] = true;
    }

    let mut columns = Vec::with_capacity(segments.len());
    let mut terminations = Vec::with_capacity(segments.len());
    for (c, segment) in segments.segments().iter().enumerate() {
        if !admissible[c] {
            columns.push(vec![0.5; n]);
            terminations.push(ColumnTermination::Converged { iterations: 0 });
            continue;
        }

        let mut seed = vec![0.0; n];
        for (v, &member) in on_segment.iter().enumerate() {
            if member {
                seed[v] = -1.0;
            }
        }
        for &v in &segment.vertices {
            seed[v] = 1.0;
        }

        let (mut y, termination) = relax_column(
            &affinity,
            &seed,
            &clamp,
            options.propagate.max_iters,
            options.propagate.tol,
        );
        rescale_column(&mut y);
        if termination == ColumnTermination::MaxItersReached {
            warn!(segment = c, "realignment column hit iteration cap");
        }
        columns.push(y);
        terminations.push(termination);
    }

    Ok(RealignmentField {
        columns,
        terminations,
    })
}

/// Turn the realignment field into a relabeling.
///
/// Each admissible column claims the vertices whose field value exceeds the
/// threshold; claims touching too few curve-flanking vertices are dropped
/// as irrelevant, and overlapping or two-sided claims are resolved by the
/// [`OverlapPolicy`]. Surviving claims take the second label of their
/// segment's pair.
pub fn assign_realigned_labels(
    labels: &[i32],
    segments: &BoundarySegments,
    field: &RealignmentField,
    flanks: &[usize],
    options: &RealignOptions,
) -> Vec<i32> {
    let flank_set: HashSet<usize> = flanks.iter().copied().collect();

    let claims: Vec<Vec<usize>> = (0..field.n_columns())
        .map(|c| {
            field
                .column(c)
                .iter()
                .enumerate()
                .filter(|&(_, &p)| p > options.threshold)
                .map(|(v, _)| v)
                .collect()
        })
        .collect();

    let flank_counts: Vec<usize> = claims
        .iter()
        .map(|claim| claim.iter().filter(|v| flank_set.contains(v)).count())
        .collect();

    let mut alive: Vec<bool> = claims
        .iter()
        .zip(flank_counts.iter())
        .enumerate()
        .map(|(c, (claim, &touching))| {
            let relevant = !claim.is_empty() && touching >= options.relevance_threshold;
            if !claim.is_empty() && !relevant {
                debug!(segment = c, touching, "claim dropped as irrelevant");
            }
            relevant
        })
        .collect();

    // Conflicts: overlapping claims, and the two sides of one boundary.
    let strength = |c: usize| match options.overlap_policy {
        OverlapPolicy::LargerSegment => claims[c].len(),
        OverlapPolicy::MoreCurveAdjacent => flank_counts[c],
    };
    for i in 0..claims.len() {
        for j in i + 1..claims.len() {
            if !alive[i] || !alive[j] {
                continue;
            }
            let overlapping = {
                let set: HashSet<usize> = claims[i].iter().copied().collect();
                claims[j].iter().any(|v| set.contains(v))
            };
            let two_sided = segments.co_segment(i) == Some(j);
            if overlapping || two_sided {
                // Ties keep the earlier (lexicographically smaller) segment.
                let loser = if strength(j) > strength(i) { i } else { j };
                alive[loser] = false;
                debug!(winner = i + j - loser, loser, "claim conflict resolved");
            }
        }
    }

    let mut out = labels.to_vec();
    for (c, claim) in claims.iter().enumerate() {
        if !alive[c] {
            continue;
        }
        let new_label = segments.segment(c).pair.1;
        info!(
            segment = c,
            pair = ?segments.segment(c).pair,
            vertices = claim.len(),
            "relabeling claim applied"
        );
        for &v in claim {
            out[v] = new_label;
        }
    }
    out
}

/// Full realignment pass: segment the boundary, admit segments, propagate,
/// and relabel. Returns the adjusted per-vertex labels.
pub fn realign_label_boundaries(
    surface: &Surface,
    graph: &MeshGraph,
    labels: &[i32],
    curve: &[usize],
    options: &RealignOptions,
) -> Result<Vec<i32>> {
    let segments = find_label_boundary_segments(surface, graph, labels)?;
    if segments.is_empty() {
        info!("no label boundary to realign");
        return Ok(labels.to_vec());
    }

    let admissible = determine_appropriate_segments(surface, &segments, curve, options);
    if !admissible.iter().any(|&a| a) {
        info!("no admissible boundary segments");
        return Ok(labels.to_vec());
    }

    let field = propagate_realignment(surface, graph, &segments, curve, &admissible, options)?;
    let flanks = find_polyline_flanks(surface, curve);
    Ok(assign_realigned_labels(
        labels, &segments, &field, &flanks, options,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::boundary::find_label_boundary_segments;
    use nalgebra::Point3;

    /// Flat 3x5 vertex grid at unit spacing, row-major indices.
    fn grid3x5() -> (Surface, MeshGraph) {
        let points: Vec<Point3<f64>> = (0..3)
            .flat_map(|r| (0..5).map(move |c| Point3::new(c as f64, r as f64, 0.0)))
            .collect();
        let mut faces = Vec::new();
        for r in 0..2 {
            for c in 0..4 {
                let v = 5 * r + c;
                faces.push([v, v + 1, v + 5]);
                faces.push([v + 1, v + 6, v + 5]);
            }
        }
        let surface = Surface::new(points, faces).unwrap();
        let graph = MeshGraph::build(&surface);
        (surface, graph)
    }

    /// Columns 0..=1 labeled 1, columns 2..=4 labeled 2.
    fn split_labels() -> Vec<i32> {
        (0..15).map(|v| if v % 5 <= 1 { 1 } else { 2 }).collect()
    }

    #[test]
    fn test_admission_prefers_near_side() {
        let (surface, graph) = grid3x5();
        let labels = split_labels();
        let segments = find_label_boundary_segments(&surface, &graph, &labels).unwrap();
        // Segment 0 is (1,2) on column 1, segment 1 is (2,1) on column 2.
        assert_eq!(segments.segment(0).pair, (1, 2));
        assert_eq!(segments.segment(1).pair, (2, 1));

        // Curve on column 3: column 2 is its decisively nearest boundary.
        let curve = [3, 8, 13];
        let options = RealignOptions::default().with_num_good_vertices(2);
        let admissible = determine_appropriate_segments(&surface, &segments, &curve, &options);
        assert_eq!(admissible, vec![false, true]);
    }

    #[test]
    fn test_no_curve_nothing_admissible() {
        let (surface, graph) = grid3x5();
        let labels = split_labels();
        let segments = find_label_boundary_segments(&surface, &graph, &labels).unwrap();
        let admissible =
            determine_appropriate_segments(&surface, &segments, &[], &RealignOptions::default());
        assert_eq!(admissible, vec![false, false]);
    }

    #[test]
    fn test_inadmissible_columns_claim_nothing() {
        let (surface, graph) = grid3x5();
        let labels = split_labels();
        let segments = find_label_boundary_segments(&surface, &graph, &labels).unwrap();
        let curve = [3, 8, 13];
        let field = propagate_realignment(
            &surface,
            &graph,
            &segments,
            &curve,
            &[false, false],
            &RealignOptions::default(),
        )
        .unwrap();

        for c in 0..field.n_columns() {
            assert!(field.column(c).iter().all(|&p| p == 0.5));
        }
    }

    #[test]
    fn test_field_respects_clamps() {
        let (surface, graph) = grid3x5();
        let labels = split_labels();
        let segments = find_label_boundary_segments(&surface, &graph, &labels).unwrap();
        let curve = [3, 8, 13];
        let options = RealignOptions::default().sequential();
        let field =
            propagate_realignment(&surface, &graph, &segments, &curve, &[true, true], &options)
                .unwrap();

        // Own-segment rows at 1, other-segment rows at 0, curve rows neutral.
        assert_eq!(field.column(1)[2], 1.0);
        assert_eq!(field.column(1)[1], 0.0);
        assert_eq!(field.column(1)[3], 0.5);
    }

    #[test]
    fn test_realign_moves_boundary_toward_curve() {
        let (surface, graph) = grid3x5();
        let labels = split_labels();
        let curve = vec![3, 8, 13];
        let options = RealignOptions::default()
            .with_num_good_vertices(2)
            .with_relevance_threshold(2)
            .sequential();

        let realigned =
            realign_label_boundaries(&surface, &graph, &labels, &curve, &options).unwrap();

        // Column 2 flips from label 2 to label 1; the rest is untouched.
        for v in 0..15 {
            let expected = match v % 5 {
                0 | 1 | 2 => 1,
                _ => 2,
            };
            assert_eq!(realigned[v], expected, "vertex {v}");
        }
    }

    #[test]
    fn test_overlap_policy_larger_segment() {
        let (surface, graph) = grid3x5();
        let labels = split_labels();
        let segments = find_label_boundary_segments(&surface, &graph, &labels).unwrap();

        // Hand-built field: segment 0 claims two vertices, segment 1 three,
        // overlapping at vertex 7.
        let mut col0 = vec![0.0; 15];
        let mut col1 = vec![0.0; 15];
        for v in [6, 7] {
            col0[v] = 0.9;
        }
        for v in [2, 7, 12] {
            col1[v] = 0.9;
        }
        let field = RealignmentField {
            columns: vec![col0, col1],
            terminations: vec![ColumnTermination::Converged { iterations: 1 }; 2],
        };

        let options = RealignOptions::default().with_relevance_threshold(0);
        let flanks = [2, 6, 7, 12];
        let realigned = assign_realigned_labels(&labels, &segments, &field, &flanks, &options);

        // Larger claim (segment 1, pair (2,1)) wins; segment 0 is dropped.
        assert_eq!(realigned[2], 1);
        assert_eq!(realigned[12], 1);
        assert_eq!(realigned[7], 1);
        assert_eq!(realigned[6], 1); // untouched, was already label 1
        assert_eq!(realigned[5], 1);
    }

    #[test]
    fn test_irrelevant_claim_dropped() {
        let (surface, graph) = grid3x5();
        let labels = split_labels();
        let segments = find_label_boundary_segments(&surface, &graph, &labels).unwrap();

        let mut col1 = vec![0.0; 15];
        for v in [2, 7, 12] {
            col1[v] = 0.9;
        }
        let field = RealignmentField {
            columns: vec![vec![0.0; 15], col1],
            terminations: vec![ColumnTermination::Converged { iterations: 1 }; 2],
        };

        // The claim touches no flank vertex, so nothing changes.
        let options = RealignOptions::default().with_relevance_threshold(1);
        let realigned = assign_realigned_labels(&labels, &segments, &field, &[], &options);
        assert_eq!(realigned, labels);
    }
}
