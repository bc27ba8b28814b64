//! # Sulcal
//!
//! Graph-based analysis of triangulated cortical surface meshes.
//!
//! Sulcal takes a labeled brain surface and its per-vertex shape measures
//! (travel depth, mean curvature) and extracts structure from the sulci:
//! deep fold regions, fundus curves along their bottoms, and anatomical
//! label boundaries realigned onto those curves. The algorithms are pure
//! graph and sparse-matrix procedures over an immutable [`mesh::Surface`];
//! no file formats or rendering are involved.
//!
//! ## Quick start
//!
//! ```
//! use sulcal::mesh::{MeshGraph, Surface};
//! use sulcal::algo::{extract_fundi, FundiOptions};
//! use nalgebra::Point3;
//!
//! // A small flat patch; real inputs are hemisphere meshes.
//! let points = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(2.0, 0.0, 0.0),
//!     Point3::new(1.0, 1.0, 0.0),
//! ];
//! let faces = vec![[0, 1, 3], [1, 2, 3]];
//! let surface = Surface::new(points, faces)?;
//! let graph = MeshGraph::build(&surface);
//!
//! let depths = vec![0.1, 0.9, 0.1, 0.1];
//! let curvatures = vec![0.0, 0.5, 0.0, 0.0];
//! let curves = extract_fundi(
//!     &surface,
//!     &graph,
//!     &depths,
//!     &curvatures,
//!     None,
//!     &FundiOptions::default().with_min_fold_size(1),
//! )?;
//! assert_eq!(curves.len(), 1);
//! # Ok::<(), sulcal::error::SurfaceError>(())
//! ```
//!
//! ## Label propagation and realignment
//!
//! Seed labels spread over the mesh with [`algo::propagate`]; hand-drawn
//! label boundaries move onto extracted fundus curves with
//! [`algo::realign_label_boundaries`]. Both share the same clamped
//! weighted-average relaxation over an [`algo::AffinityMatrix`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algo;
pub mod error;
pub mod mesh;

/// Prelude module for convenient imports.
///
/// This module re-exports the most commonly used types and functions:
///
/// ```
/// use sulcal::prelude::*;
/// ```
pub mod prelude {
    pub use crate::algo::{
        connect_anchors, extract_folds, extract_fundi, find_anchors, find_label_boundaries,
        propagate, realign_label_boundaries, segment, AffinityKernel, AnchorOptions,
        ConnectOptions, FundiOptions, FundusCurve, ProbabilisticAssignment, PropagateOptions,
        RealignOptions, SeedLabels, SegmentOptions,
    };
    pub use crate::error::{Result, SurfaceError};
    pub use crate::mesh::{MeshGraph, Surface};
}

// Re-export nalgebra types for convenience
pub use nalgebra;

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use nalgebra::Point3;

    /// Regular 5x5 vertex grid in the plane, 32 triangles.
    fn grid5() -> (Surface, MeshGraph) {
        let points: Vec<Point3<f64>> = (0..5)
            .flat_map(|r| (0..5).map(move |c| Point3::new(c as f64, r as f64, 0.0)))
            .collect();
        let mut faces = Vec::new();
        for r in 0..4 {
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

    #[test]
    fn test_grid_bisection() {
        // Seeding the two boundary columns of a 5x5 grid splits it down the
        // middle: each half follows its own seed, with the equidistant
        // center column going to the lower label.
        let (surface, graph) = grid5();
        let mut seed_labels = vec![0i32; 25];
        for r in 0..5 {
            seed_labels[5 * r] = 1;
            seed_labels[5 * r + 4] = 2;
        }
        let seeds = SeedLabels::new(seed_labels, 25).unwrap();
        let assignment =
            propagate(&surface, &graph, &seeds, &PropagateOptions::default()).unwrap();
        let labels = assignment.decode();

        for r in 0..5 {
            assert_eq!(labels[5 * r], 1);
            assert_eq!(labels[5 * r + 1], 1);
            assert_eq!(labels[5 * r + 3], 2);
            assert_eq!(labels[5 * r + 4], 2);
        }
    }

    #[test]
    fn test_fold_segmentation_partitions_scope() {
        let (_, graph) = grid5();
        // Depth ridge down the middle column plus one deep corner patch.
        let mut depths = vec![0.0; 25];
        for r in 0..5 {
            depths[5 * r + 2] = 1.0;
        }
        depths[20] = 1.0;

        let (segmentation, folds) = extract_folds(&graph, &depths, 0.5, 1).unwrap();
        assert_eq!(folds.len(), 2);

        // Every in-scope vertex belongs to exactly one fold.
        let mut seen = vec![false; 25];
        for fold in &folds {
            for &v in fold {
                assert!(!seen[v]);
                seen[v] = true;
            }
        }
        assert_eq!(seen.iter().filter(|&&s| s).count(), 6);
        assert_eq!(segmentation.n_segments(), 2);
    }
}
