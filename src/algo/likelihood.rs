//! Per-vertex fundus likelihood from depth and curvature.
//!
//! Deep, concave vertices are likely to lie on a fundus. The likelihood is
//! the product of two logistic gates, one over travel depth and one over
//! mean curvature, so it rises monotonically with each cue and stays in
//! `[0, 1]`. Slopes and midpoints are tunable per hemisphere or dataset.

use crate::error::{Result, SurfaceError};

/// Tunable parameters of the likelihood gates.
#[derive(Debug, Clone)]
pub struct LikelihoodOptions {
    /// Logistic steepness of the depth gate.
    pub depth_slope: f64,

    /// Depth at which the depth gate reaches one half.
    pub depth_midpoint: f64,

    /// Logistic steepness of the curvature gate.
    pub curvature_slope: f64,

    /// Curvature at which the curvature gate reaches one half.
    pub curvature_midpoint: f64,
}

impl Default for LikelihoodOptions {
    fn default() -> Self {
        Self {
            depth_slope: 10.0,
            depth_midpoint: 0.5,
            curvature_slope: 5.0,
            curvature_midpoint: 0.0,
        }
    }
}

impl LikelihoodOptions {
    /// Set the depth gate parameters.
    pub fn with_depth_gate(mut self, slope: f64, midpoint: f64) -> Self {
        self.depth_slope = slope;
        self.depth_midpoint = midpoint;
        self
    }

    /// Set the curvature gate parameters.
    pub fn with_curvature_gate(mut self, slope: f64, midpoint: f64) -> Self {
        self.curvature_slope = slope;
        self.curvature_midpoint = midpoint;
        self
    }
}

#[inline]
fn logistic(x: f64, slope: f64, midpoint: f64) -> f64 {
    1.0 / (1.0 + (-slope * (x - midpoint)).exp())
}

/// Compute per-vertex fundus likelihoods.
///
/// `depths` should be normalized travel depths and `curvatures` mean
/// curvatures with the convention that positive values are concave. Both
/// slices must have one entry per vertex; the result is in `[0, 1]`.
pub fn compute_likelihood(
    depths: &[f64],
    curvatures: &[f64],
    options: &LikelihoodOptions,
) -> Result<Vec<f64>> {
    if depths.len() != curvatures.len() {
        return Err(SurfaceError::ScalarCountMismatch {
            name: "curvatures",
            count: curvatures.len(),
            num_vertices: depths.len(),
        });
    }

    Ok(depths
        .iter()
        .zip(curvatures.iter())
        .map(|(&d, &c)| {
            logistic(d, options.depth_slope, options.depth_midpoint)
                * logistic(c, options.curvature_slope, options.curvature_midpoint)
        })
        .collect())
}
