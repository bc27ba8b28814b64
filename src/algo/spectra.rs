//! Spectral shape description of surface features.
//!
//! The eigen-spectrum of a feature's intrinsic geometry is a compact shape
//! descriptor. Operator assembly and eigensolving are deliberately outside
//! this crate; a [`SpectralBackend`] supplies them, while this module owns
//! the mesh-side preparation: isolating the largest connected fragment of a
//! feature and compacting it into a standalone sub-surface.

use nalgebra::Point3;
use tracing::debug;

use crate::algo::region::{largest_segment, segment, SegmentOptions};
use crate::error::{Result, SurfaceError};
use crate::mesh::{MeshGraph, Surface};

/// Numeric black box computing the smallest eigenvalues of a surface's
/// intrinsic operator.
pub trait SpectralBackend {
    /// Return the `k` smallest eigenvalues for the given compact surface.
    fn smallest_eigenvalues(
        &self,
        points: &[Point3<f64>],
        faces: &[[usize; 3]],
        k: usize,
    ) -> Result<Vec<f64>>;
}

/// Spectrum of the largest connected fragment of a feature.
///
/// Segments `scope` into connected components, keeps the largest one
/// (area-weighted when `areas` is given), compacts it into its own surface,
/// and delegates to the backend. Fails with
/// [`SurfaceError::TooFewVertices`] when the fragment has fewer than `k`
/// vertices.
pub fn spectrum_of_largest(
    surface: &Surface,
    graph: &MeshGraph,
    scope: &[usize],
    k: usize,
    areas: Option<&[f64]>,
    backend: &dyn SpectralBackend,
) -> Result<Vec<f64>> {
    if let Some(areas) = areas {
        surface.check_scalars("areas", areas)?;
    }

    let segmentation = segment(scope, graph, &SegmentOptions::default());
    let fragment = largest_segment(&segmentation, areas).unwrap_or_default();
    if fragment.len() < k {
        return Err(SurfaceError::TooFewVertices {
            count: fragment.len(),
            required: k,
        });
    }
    debug!(
        scope = scope.len(),
        fragment = fragment.len(),
        "isolated largest fragment"
    );

    let kept = surface.restrict_faces(&fragment);
    let (sub, _) = surface.compact(&kept)?;
    backend.smallest_eigenvalues(sub.points(), sub.faces(), k)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Backend that just reports the vertex count it was handed.
    struct CountingBackend;

    impl SpectralBackend for CountingBackend {
        fn smallest_eigenvalues(
            &self,
            points: &[Point3<f64>],
            _faces: &[[usize; 3]],
            k: usize,
        ) -> Result<Vec<f64>> {
            Ok((0..k).map(|i| (points.len() * 100 + i) as f64).collect())
        }
    }

    /// Two components: a quad (4 vertices) and a triangle (3 vertices).
    fn two_fragments() -> (Surface, MeshGraph) {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(5.0, 0.0, 0.0),
            Point3::new(6.0, 0.0, 0.0),
            Point3::new(5.0, 1.0, 0.0),
        ];
        let faces = vec![[0, 1, 2], [1, 3, 2], [4, 5, 6]];
        let surface = Surface::new(points, faces).unwrap();
        let graph = MeshGraph::build(&surface);
        (surface, graph)
    }

    #[test]
    fn test_largest_fragment_delegated() {
        let (surface, graph) = two_fragments();
        let scope: Vec<usize> = (0..7).collect();
        let spectrum =
            spectrum_of_largest(&surface, &graph, &scope, 2, None, &CountingBackend).unwrap();
        // The backend saw the compacted 4-vertex quad.
        assert_eq!(spectrum, vec![400.0, 401.0]);
    }

    #[test]
    fn test_area_weighting_flips_choice() {
        let (surface, graph) = two_fragments();
        let scope: Vec<usize> = (0..7).collect();
        let areas = [0.1, 0.1, 0.1, 0.1, 9.0, 9.0, 9.0];
        let spectrum =
            spectrum_of_largest(&surface, &graph, &scope, 2, Some(&areas), &CountingBackend)
                .unwrap();
        assert_eq!(spectrum, vec![300.0, 301.0]);
    }

    #[test]
    fn test_too_few_vertices() {
        let (surface, graph) = two_fragments();
        let scope = [4, 5, 6];
        let result = spectrum_of_largest(&surface, &graph, &scope, 5, None, &CountingBackend);
        assert!(matches!(
            result,
            Err(SurfaceError::TooFewVertices { count: 3, required: 5 })
        ));
    }
}
