//! Anchor point selection on likelihood fields.
//!
//! Anchors are high-likelihood fold vertices kept far enough apart that the
//! curve connecting them stays simple. Selection is greedy in descending
//! likelihood (ties broken toward the lower vertex index) with a uniform
//! grid over candidate positions so each admission test only inspects
//! nearby accepted anchors.

use std::collections::HashMap;

use nalgebra::{Point3, Vector3};
use tracing::debug;

use crate::error::{Result, SurfaceError};

/// How the pairwise spacing requirement between anchors is measured.
#[derive(Debug, Clone)]
pub enum AnchorSpacing {
    /// Every pair of anchors must be at least `min_distance` apart.
    Uniform,

    /// Spacing widens toward `max_distance` across the per-vertex direction
    /// of least curvature, and relaxes toward `min_distance` along it.
    /// Anchors are never admitted closer than `min_distance`.
    Directional {
        /// Unit direction of least curvature per vertex.
        directions: Vec<Vector3<f64>>,
    },
}

/// Options for [`find_anchors`].
#[derive(Debug, Clone)]
pub struct AnchorOptions {
    /// Likelihood a vertex must exceed to be an anchor candidate.
    pub threshold: f64,

    /// Minimum Euclidean distance between any two accepted anchors.
    pub min_distance: f64,

    /// Radius of the isolation test: a candidate needs `min_support` other
    /// candidates within this distance. Also the widest spacing used by
    /// [`AnchorSpacing::Directional`].
    pub max_distance: f64,

    /// Number of nearby above-threshold candidates required for admission.
    pub min_support: usize,

    /// Spacing rule.
    pub spacing: AnchorSpacing,
}

impl Default for AnchorOptions {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            min_distance: 5.0,
            max_distance: 8.0,
            min_support: 1,
            spacing: AnchorSpacing::Uniform,
        }
    }
}

impl AnchorOptions {
    /// Set the candidate likelihood threshold.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the spacing distances.
    pub fn with_distances(mut self, min_distance: f64, max_distance: f64) -> Self {
        self.min_distance = min_distance;
        self.max_distance = max_distance;
        self
    }

    /// Use direction-aware spacing.
    pub fn with_directions(mut self, directions: Vec<Vector3<f64>>) -> Self {
        self.spacing = AnchorSpacing::Directional { directions };
        self
    }
}

/// Uniform grid over 3D positions; cell size equals the query radius so a
/// radius query only inspects the 27 surrounding cells.
struct GridIndex {
    cell: f64,
    cells: HashMap<(i64, i64, i64), Vec<usize>>,
}

impl GridIndex {
    fn new(cell: f64) -> Self {
        Self {
            cell,
            cells: HashMap::new(),
        }
    }

    fn key(&self, p: &Point3<f64>) -> (i64, i64, i64) {
        (
            (p.x / self.cell).floor() as i64,
            (p.y / self.cell).floor() as i64,
            (p.z / self.cell).floor() as i64,
        )
    }

    fn insert(&mut self, v: usize, p: &Point3<f64>) {
        self.cells.entry(self.key(p)).or_default().push(v);
    }

    fn near(&self, p: &Point3<f64>) -> impl Iterator<Item = usize> + '_ {
        let (x, y, z) = self.key(p);
        (-1..=1).flat_map(move |dx| {
            (-1..=1).flat_map(move |dy| {
                (-1..=1).flat_map(move |dz| {
                    self.cells
                        .get(&(x + dx, y + dy, z + dz))
                        .map(|c| c.iter().copied())
                        .into_iter()
                        .flatten()
                })
            })
        })
    }
}

/// Select anchor vertices within one fold.
///
/// Candidates are fold vertices whose likelihood exceeds the threshold and
/// that have enough above-threshold company nearby. They are admitted
/// greedily in descending likelihood order as long as every previously
/// accepted anchor is far enough away under the configured
/// [`AnchorSpacing`]. Returns anchors in admission order.
pub fn find_anchors(
    points: &[Point3<f64>],
    likelihoods: &[f64],
    fold: &[usize],
    options: &AnchorOptions,
) -> Result<Vec<usize>> {
    if likelihoods.len() != points.len() {
        return Err(SurfaceError::ScalarCountMismatch {
            name: "likelihoods",
            count: likelihoods.len(),
            num_vertices: points.len(),
        });
    }
    if let AnchorSpacing::Directional { directions } = &options.spacing {
        if directions.len() != points.len() {
            return Err(SurfaceError::ScalarCountMismatch {
                name: "directions",
                count: directions.len(),
                num_vertices: points.len(),
            });
        }
    }
    if options.min_distance <= 0.0 || options.max_distance < options.min_distance {
        return Err(SurfaceError::invalid_param(
            "min_distance/max_distance",
            format!("{}/{}", options.min_distance, options.max_distance),
            "distances must be positive with min_distance <= max_distance",
        ));
    }

    let mut candidates: Vec<usize> = fold
        .iter()
        .copied()
        .filter(|&v| likelihoods[v] > options.threshold)
        .collect();

    // Isolation test: lone high-likelihood vertices are noise.
    if options.min_support > 0 {
        let mut grid = GridIndex::new(options.max_distance);
        for &v in &candidates {
            grid.insert(v, &points[v]);
        }
        candidates.retain(|&v| {
            let support = grid
                .near(&points[v])
                .filter(|&w| {
                    w != v && (points[v] - points[w]).norm() <= options.max_distance
                })
                .count();
            support >= options.min_support
        });
    }

    candidates.sort_by(|&a, &b| {
        likelihoods[b]
            .partial_cmp(&likelihoods[a])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });

    let widest = match options.spacing {
        AnchorSpacing::Uniform => options.min_distance,
        AnchorSpacing::Directional { .. } => options.max_distance,
    };
    let mut accepted = GridIndex::new(widest);
    let mut anchors = Vec::new();

    for &v in &candidates {
        let admissible = accepted.near(&points[v]).all(|a| {
            let gap = (points[v] - points[a]).norm();
            gap >= required_spacing(points, v, a, options)
        });
        if admissible {
            accepted.insert(v, &points[v]);
            anchors.push(v);
        }
    }

    debug!(
        candidates = candidates.len(),
        anchors = anchors.len(),
        "anchor selection complete"
    );
    Ok(anchors)
}

/// Spacing a candidate must keep from an already accepted anchor.
fn required_spacing(
    points: &[Point3<f64>],
    candidate: usize,
    anchor: usize,
    options: &AnchorOptions,
) -> f64 {
    match &options.spacing {
        AnchorSpacing::Uniform => options.min_distance,
        AnchorSpacing::Directional { directions } => {
            let conn = points[candidate] - points[anchor];
            let norm = conn.norm();
            if norm == 0.0 {
                return options.max_distance;
            }
            // Alignment with the least-curvature direction at the anchor:
            // along the fundus track the minimum spacing applies, across it
            // the requirement widens to max_distance.
            let alignment = (conn / norm).dot(&directions[anchor]).abs();
            options.max_distance - (options.max_distance - options.min_distance) * alignment
        }
    }
}
