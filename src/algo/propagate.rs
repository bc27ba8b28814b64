//! Guided label propagation over the mesh graph.
//!
//! Seed labels spread across the surface by repeated weighted averaging:
//! each label becomes one column of a vertex-by-label matrix, seeded rows
//! are held fixed at `+1` for their own column and `-1` for every other,
//! and unseeded rows relax toward the degree-normalized average of their
//! neighbors. After convergence the columns are rescaled to `[0, 1]` and a
//! hard labeling is read off by row-wise argmax.
//!
//! # Examples
//!
//! ```
//! use sulcal::algo::{propagate, PropagateOptions, SeedLabels};
//! use sulcal::mesh::{MeshGraph, Surface};
//! use nalgebra::Point3;
//!
//! let surface = Surface::new(
//!     vec![
//!         Point3::new(0.0, 0.0, 0.0),
//!         Point3::new(1.0, 0.0, 0.0),
//!         Point3::new(2.0, 0.0, 0.0),
//!         Point3::new(1.0, 1.0, 0.0),
//!     ],
//!     vec![[0, 1, 3], [1, 2, 3]],
//! )?;
//! let graph = MeshGraph::build(&surface);
//!
//! // Seed the two ends; the middle relaxes.
//! let seeds = SeedLabels::new(vec![1, 0, 2, 0], surface.num_vertices())?;
//! let assignment = propagate(&surface, &graph, &seeds, &PropagateOptions::default())?;
//! let labels = assignment.decode();
//! assert_eq!(labels[0], 1);
//! assert_eq!(labels[2], 2);
//! # Ok::<(), sulcal::error::SurfaceError>(())
//! ```

use nalgebra::DVector;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::algo::sparse::CsrMatrix;
use crate::error::{Result, SurfaceError};
use crate::mesh::{MeshGraph, Surface};

/// Edge weighting used to build the [`AffinityMatrix`].
#[derive(Debug, Clone)]
pub enum AffinityKernel {
    /// Gaussian falloff `exp(-d^2 / (2 sigma^2))` with edge length `d`.
    Rbf {
        /// Kernel width.
        sigma: f64,
    },

    /// Inverse edge length `1 / (d + epsilon)`.
    InverseDistance {
        /// Guard added to the length to keep weights finite.
        epsilon: f64,
    },

    /// Unit weight on every edge; the average ignores geometry.
    Uniform,
}

impl Default for AffinityKernel {
    fn default() -> Self {
        Self::Rbf { sigma: 10.0 }
    }
}

/// Symmetric edge-weight matrix with its inverse degree vector.
#[derive(Debug, Clone)]
pub struct AffinityMatrix {
    weights: CsrMatrix,
    inv_degree: Vec<f64>,
}

impl AffinityMatrix {
    /// Weight every mesh edge with the kernel. Isolated vertices get a zero
    /// inverse degree and never move during propagation.
    pub fn build(surface: &Surface, graph: &MeshGraph, kernel: &AffinityKernel) -> Result<Self> {
        match kernel {
            AffinityKernel::Rbf { sigma } if *sigma <= 0.0 => {
                return Err(SurfaceError::invalid_param(
                    "sigma",
                    sigma,
                    "kernel width must be positive",
                ));
            }
            AffinityKernel::InverseDistance { epsilon } if *epsilon <= 0.0 => {
                return Err(SurfaceError::invalid_param(
                    "epsilon",
                    epsilon,
                    "distance guard must be positive",
                ));
            }
            _ => {}
        }

        let n = graph.num_vertices();
        let mut triplets = Vec::new();
        for (v, w) in graph.edges() {
            let weight = match kernel {
                AffinityKernel::Rbf { sigma } => {
                    let d = surface.distance(v, w);
                    (-d * d / (2.0 * sigma * sigma)).exp()
                }
                AffinityKernel::InverseDistance { epsilon } => {
                    1.0 / (surface.distance(v, w) + epsilon)
                }
                AffinityKernel::Uniform => 1.0,
            };
            triplets.push((v, w, weight));
            triplets.push((w, v, weight));
        }

        let weights = CsrMatrix::from_triplets(n, n, triplets);
        debug_assert_eq!(weights.ncols(), n);
        let inv_degree: Vec<f64> = weights
            .row_sums()
            .into_iter()
            .map(|s| if s > 0.0 { 1.0 / s } else { 0.0 })
            .collect();
        debug!(vertices = n, nnz = weights.nnz(), "affinity matrix built");
        Ok(Self { weights, inv_degree })
    }

    /// Number of vertices.
    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.weights.nrows()
    }

    /// One degree-normalized averaging step: `D^-1 W y`.
    pub(crate) fn step(&self, y: &DVector<f64>) -> DVector<f64> {
        let mut out = self.weights.mul_vec(y);
        for (o, &inv) in out.iter_mut().zip(self.inv_degree.iter()) {
            *o *= inv;
        }
        out
    }
}

/// Sorted table of the distinct labels taking part in a propagation; each
/// label owns one column of the assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTable {
    labels: Vec<i32>,
}

impl LabelTable {
    /// Collect the distinct positive labels, sorted ascending.
    pub fn from_labels(labels: &[i32]) -> Self {
        let mut distinct: Vec<i32> = labels.iter().copied().filter(|&l| l > 0).collect();
        distinct.sort_unstable();
        distinct.dedup();
        Self { labels: distinct }
    }

    /// Number of labels (columns).
    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the table has no labels.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Label owning column `c`.
    #[inline]
    pub fn label(&self, c: usize) -> i32 {
        self.labels[c]
    }

    /// Column of a label, if present.
    pub fn column_of(&self, label: i32) -> Option<usize> {
        self.labels.binary_search(&label).ok()
    }

    /// All labels in column order.
    #[inline]
    pub fn labels(&self) -> &[i32] {
        &self.labels
    }
}

/// Per-vertex seed labels; zero and negative values mean unseeded.
#[derive(Debug, Clone)]
pub struct SeedLabels {
    labels: Vec<i32>,
}

impl SeedLabels {
    /// Validate the label count against the vertex count.
    pub fn new(labels: Vec<i32>, num_vertices: usize) -> Result<Self> {
        if labels.len() != num_vertices {
            return Err(SurfaceError::LabelCountMismatch {
                count: labels.len(),
                num_vertices,
            });
        }
        Ok(Self { labels })
    }

    /// Per-vertex labels.
    #[inline]
    pub fn labels(&self) -> &[i32] {
        &self.labels
    }

    /// Whether vertex `v` carries a seed label.
    #[inline]
    pub fn is_seeded(&self, v: usize) -> bool {
        self.labels[v] > 0
    }

    /// Number of seeded vertices.
    pub fn seeded_count(&self) -> usize {
        self.labels.iter().filter(|&&l| l > 0).count()
    }
}

/// Options for [`propagate`].
#[derive(Debug, Clone)]
pub struct PropagateOptions {
    /// Edge weighting.
    pub kernel: AffinityKernel,

    /// Iteration cap per column; hitting it is recorded, not an error.
    pub max_iters: usize,

    /// Convergence threshold on the summed absolute change per step.
    pub tol: f64,

    /// Relax the label columns in parallel.
    pub parallel: bool,
}

impl Default for PropagateOptions {
    fn default() -> Self {
        Self {
            kernel: AffinityKernel::default(),
            max_iters: 200,
            tol: 1e-3,
            parallel: true,
        }
    }
}

impl PropagateOptions {
    /// Set the affinity kernel.
    pub fn with_kernel(mut self, kernel: AffinityKernel) -> Self {
        self.kernel = kernel;
        self
    }

    /// Set the iteration cap.
    pub fn with_max_iters(mut self, max_iters: usize) -> Self {
        self.max_iters = max_iters;
        self
    }

    /// Set the convergence threshold.
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Force sequential execution.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }
}

/// How one label column finished relaxing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnTermination {
    /// The summed change dropped below the threshold.
    Converged {
        /// Steps taken.
        iterations: usize,
    },

    /// The iteration cap was reached first; the column is still usable.
    MaxItersReached,
}

/// Soft vertex-by-label assignment with values in `[0, 1]`.
#[derive(Debug, Clone)]
pub struct ProbabilisticAssignment {
    num_vertices: usize,
    table: LabelTable,
    /// Column-major: entry for vertex `v`, column `c` is `values[c * n + v]`.
    values: Vec<f64>,
    terminations: Vec<ColumnTermination>,
}

impl ProbabilisticAssignment {
    pub(crate) fn new(
        num_vertices: usize,
        table: LabelTable,
        values: Vec<f64>,
        terminations: Vec<ColumnTermination>,
    ) -> Self {
        Self {
            num_vertices,
            table,
            values,
            terminations,
        }
    }

    /// Number of vertices (rows).
    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.num_vertices
    }

    /// The labels owning the columns.
    #[inline]
    pub fn labels(&self) -> &LabelTable {
        &self.table
    }

    /// Values of column `c`, one per vertex.
    #[inline]
    pub fn column(&self, c: usize) -> &[f64] {
        &self.values[c * self.num_vertices..(c + 1) * self.num_vertices]
    }

    /// Value for vertex `v` under column `c`.
    #[inline]
    pub fn probability(&self, v: usize, c: usize) -> f64 {
        self.values[c * self.num_vertices + v]
    }

    /// How column `c` finished relaxing.
    #[inline]
    pub fn termination(&self, c: usize) -> ColumnTermination {
        self.terminations[c]
    }

    /// Hard labeling by row-wise argmax; ties go to the lowest label.
    pub fn decode(&self) -> Vec<i32> {
        let mut out = vec![0i32; self.num_vertices];
        if self.table.is_empty() {
            return out;
        }
        for v in 0..self.num_vertices {
            let mut best_c = 0;
            let mut best = self.probability(v, 0);
            for c in 1..self.table.len() {
                let p = self.probability(v, c);
                if p > best {
                    best = p;
                    best_c = c;
                }
            }
            out[v] = self.table.label(best_c);
        }
        out
    }
}

/// Relax one seed column against the affinity matrix.
///
/// `seed` holds `+1`, `-1`, and `0` entries; `clamp` marks rows reset back
/// to their seed value after every averaging step. Returns the relaxed
/// column still in `[-1, 1]`.
pub(crate) fn relax_column(
    affinity: &AffinityMatrix,
    seed: &[f64],
    clamp: &[bool],
    max_iters: usize,
    tol: f64,
) -> (Vec<f64>, ColumnTermination) {
    let n = affinity.num_vertices();
    let mut y = DVector::from_column_slice(seed);

    for iteration in 1..=max_iters {
        let mut next = affinity.step(&y);
        for v in 0..n {
            if clamp[v] {
                next[v] = seed[v];
            }
        }
        let delta: f64 = y.iter().zip(next.iter()).map(|(a, b)| (a - b).abs()).sum();
        y = next;
        if delta < tol {
            return (
                y.as_slice().to_vec(),
                ColumnTermination::Converged { iterations: iteration },
            );
        }
    }
    (y.as_slice().to_vec(), ColumnTermination::MaxItersReached)
}

/// Map a relaxed column from `[-1, 1]` into `[0, 1]`.
#[inline]
pub(crate) fn rescale_column(y: &mut [f64]) {
    for v in y.iter_mut() {
        *v = (*v + 1.0) / 2.0;
    }
}

/// Spread seed labels across the surface.
///
/// Builds the affinity matrix from the kernel in `options`, relaxes one
/// column per distinct seed label, and returns the rescaled soft
/// assignment. Fails with [`SurfaceError::NoSeedLabels`] when no vertex is
/// seeded; columns that hit the iteration cap are recorded on the result
/// and logged, not failed.
pub fn propagate(
    surface: &Surface,
    graph: &MeshGraph,
    seeds: &SeedLabels,
    options: &PropagateOptions,
) -> Result<ProbabilisticAssignment> {
    if options.tol <= 0.0 {
        return Err(SurfaceError::invalid_param(
            "tol",
            options.tol,
            "convergence threshold must be positive",
        ));
    }

    let table = LabelTable::from_labels(seeds.labels());
    if table.is_empty() {
        return Err(SurfaceError::NoSeedLabels);
    }

    let affinity = AffinityMatrix::build(surface, graph, &options.kernel)?;
    let n = affinity.num_vertices();
    let clamp: Vec<bool> = (0..n).map(|v| seeds.is_seeded(v)).collect();

    debug!(
        labels = table.len(),
        seeded = seeds.seeded_count(),
        "propagating seed labels"
    );

    let relax_one = |c: usize| {
        let label = table.label(c);
        let seed: Vec<f64> = seeds
            .labels()
            .iter()
            .map(|&l| {
                if l == label {
                    1.0
                } else if l > 0 {
                    -1.0
                } else {
                    0.0
                }
            })
            .collect();
        let (mut y, termination) =
            relax_column(&affinity, &seed, &clamp, options.max_iters, options.tol);
        rescale_column(&mut y);
        if termination == ColumnTermination::MaxItersReached {
            warn!(label, max_iters = options.max_iters, "column hit iteration cap");
        }
        (y, termination)
    };

    let relaxed: Vec<(Vec<f64>, ColumnTermination)> = if options.parallel {
        (0..table.len()).into_par_iter().map(relax_one).collect()
    } else {
        (0..table.len()).map(relax_one).collect()
    };

    let mut values = Vec::with_capacity(n * table.len());
    let mut terminations = Vec::with_capacity(table.len());
    for (column, termination) in relaxed {
        values.extend_from_slice(&column);
        terminations.push(termination);
    }

    Ok(ProbabilisticAssignment::new(n, table, values, terminations))
}

/// Percentage of positions on which two labelings agree.
pub fn percent_agreement(a: &[i32], b: &[i32]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(SurfaceError::LabelCountMismatch {
            count: b.len(),
            num_vertices: a.len(),
        });
    }
    if a.is_empty() {
        return Ok(100.0);
    }
    let same = a.iter().zip(b.iter()).filter(|(x, y)| x == y).count();
    Ok(100.0 * same as f64 / a.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    /// Hexagonal fan: ring vertices 0..6 around center 6.
    fn hexagon() -> (Surface, MeshGraph) {
        let mut points: Vec<Point3<f64>> = (0..6)
            .map(|i| {
                let a = std::f64::consts::FRAC_PI_3 * i as f64;
                Point3::new(a.cos(), a.sin(), 0.0)
            })
            .collect();
        points.push(Point3::new(0.0, 0.0, 0.0));
        let faces: Vec<[usize; 3]> = (0..6).map(|i| [i, (i + 1) % 6, 6]).collect();
        let surface = Surface::new(points, faces).unwrap();
        let graph = MeshGraph::build(&surface);
        (surface, graph)
    }

    #[test]
    fn test_seeds_stay_clamped() {
        let (surface, graph) = hexagon();
        let seeds = SeedLabels::new(vec![1, 0, 0, 2, 0, 0, 0], 7).unwrap();
        let assignment =
            propagate(&surface, &graph, &seeds, &PropagateOptions::default().sequential())
                .unwrap();

        // Seeded rows hold +1 for their own column and -1 elsewhere, so the
        // rescaled values are exactly 1 and 0.
        assert_eq!(assignment.probability(0, 0), 1.0);
        assert_eq!(assignment.probability(0, 1), 0.0);
        assert_eq!(assignment.probability(3, 1), 1.0);
        assert_eq!(assignment.probability(3, 0), 0.0);
    }

    #[test]
    fn test_ring_bisection() {
        let (surface, graph) = hexagon();
        let seeds = SeedLabels::new(vec![1, 0, 0, 2, 0, 0, 0], 7).unwrap();
        let options = PropagateOptions::default()
            .with_kernel(AffinityKernel::Uniform)
            .sequential();
        let assignment = propagate(&surface, &graph, &seeds, &options).unwrap();
        let labels = assignment.decode();

        // Ring vertices adjacent to each seed follow it.
        assert_eq!(labels[0], 1);
        assert_eq!(labels[1], 1);
        assert_eq!(labels[5], 1);
        assert_eq!(labels[3], 2);
        assert_eq!(labels[2], 2);
        assert_eq!(labels[4], 2);

        for c in 0..assignment.labels().len() {
            assert!(matches!(
                assignment.termination(c),
                ColumnTermination::Converged { .. }
            ));
        }
    }

    #[test]
    fn test_values_in_unit_interval() {
        let (surface, graph) = hexagon();
        let seeds = SeedLabels::new(vec![1, 0, 0, 2, 0, 5, 0], 7).unwrap();
        let assignment =
            propagate(&surface, &graph, &seeds, &PropagateOptions::default()).unwrap();

        for c in 0..assignment.labels().len() {
            for &p in assignment.column(c) {
                assert!((0.0..=1.0).contains(&p));
            }
        }
    }

    #[test]
    fn test_rescale_round_trip() {
        let original = [-1.0, -0.25, 0.0, 0.6, 1.0];
        let mut y = original;
        rescale_column(&mut y);
        for (&rescaled, &before) in y.iter().zip(&original) {
            assert!((2.0 * rescaled - 1.0 - before).abs() < 1e-12);
        }
    }

    #[test]
    fn test_no_seeds_is_an_error() {
        let (surface, graph) = hexagon();
        let seeds = SeedLabels::new(vec![0; 7], 7).unwrap();
        let result = propagate(&surface, &graph, &seeds, &PropagateOptions::default());
        assert!(matches!(result, Err(SurfaceError::NoSeedLabels)));
    }

    #[test]
    fn test_label_table_sorted_distinct() {
        let table = LabelTable::from_labels(&[5, 2, 0, 2, -1, 9, 5]);
        assert_eq!(table.labels(), &[2, 5, 9]);
        assert_eq!(table.column_of(5), Some(1));
        assert_eq!(table.column_of(7), None);
    }

    #[test]
    fn test_decode_ties_to_lowest_label() {
        let table = LabelTable::from_labels(&[3, 8]);
        let assignment = ProbabilisticAssignment::new(
            2,
            table,
            // Vertex 0 ties across both columns; vertex 1 prefers column 1.
            vec![0.5, 0.2, 0.5, 0.7],
            vec![
                ColumnTermination::Converged { iterations: 1 },
                ColumnTermination::Converged { iterations: 1 },
            ],
        );
        assert_eq!(assignment.decode(), vec![3, 8]);
    }

    #[test]
    fn test_max_iters_recorded_not_fatal() {
        let (surface, graph) = hexagon();
        let seeds = SeedLabels::new(vec![1, 0, 0, 2, 0, 0, 0], 7).unwrap();
        let options = PropagateOptions::default()
            .with_max_iters(1)
            .sequential();
        let assignment = propagate(&surface, &graph, &seeds, &options).unwrap();
        assert_eq!(assignment.termination(0), ColumnTermination::MaxItersReached);
    }

    #[test]
    fn test_percent_agreement() {
        assert_eq!(percent_agreement(&[1, 2, 3, 4], &[1, 2, 0, 4]).unwrap(), 75.0);
        assert!(percent_agreement(&[1], &[1, 2]).is_err());
    }

    #[test]
    fn test_seed_label_count_checked() {
        assert!(SeedLabels::new(vec![1, 2], 3).is_err());
    }
}
