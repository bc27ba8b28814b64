//! End-to-end fundus extraction.
//!
//! Strings the pieces together: depth-thresholded folds, per-vertex fundus
//! likelihood, anchor selection inside each fold, and cheapest-path
//! connection of the anchors into one curve per fold. Folds are processed
//! in parallel; a fold without usable anchors yields an empty curve so the
//! output stays aligned with the fold list.

use nalgebra::Vector3;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::algo::anchors::{find_anchors, AnchorOptions};
use crate::algo::curve::{connect_anchors, ConnectOptions, FundusCurve};
use crate::algo::likelihood::{compute_likelihood, LikelihoodOptions};
use crate::algo::region::extract_folds;
use crate::error::Result;
use crate::mesh::{MeshGraph, Surface};

/// Options for [`extract_fundi`].
#[derive(Debug, Clone)]
pub struct FundiOptions {
    /// Normalized depth a vertex must exceed to belong to a fold.
    pub depth_threshold: f64,

    /// Folds with fewer vertices are ignored.
    pub min_fold_size: usize,

    /// Likelihood shape parameters.
    pub likelihood: LikelihoodOptions,

    /// Anchor selection parameters.
    pub anchors: AnchorOptions,

    /// Anchor connection parameters.
    pub connect: ConnectOptions,

    /// Process folds in parallel.
    pub parallel: bool,
}

impl Default for FundiOptions {
    fn default() -> Self {
        Self {
            depth_threshold: 0.2,
            min_fold_size: 50,
            likelihood: LikelihoodOptions::default(),
            anchors: AnchorOptions::default(),
            connect: ConnectOptions::default(),
            parallel: true,
        }
    }
}

impl FundiOptions {
    /// Set the fold depth threshold.
    pub fn with_depth_threshold(mut self, depth_threshold: f64) -> Self {
        self.depth_threshold = depth_threshold;
        self
    }

    /// Set the minimum fold size.
    pub fn with_min_fold_size(mut self, min_fold_size: usize) -> Self {
        self.min_fold_size = min_fold_size;
        self
    }

    /// Set the anchor selection parameters.
    pub fn with_anchors(mut self, anchors: AnchorOptions) -> Self {
        self.anchors = anchors;
        self
    }

    /// Force sequential execution throughout.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self.connect = self.connect.sequential();
        self
    }
}

/// Extract one fundus curve per fold.
///
/// `depths` are travel depths (normalized internally by their maximum) and
/// `mean_curvatures` use the convention that positive values are concave.
/// When `min_directions` is given, anchor spacing becomes direction-aware
/// (see [`crate::algo::AnchorSpacing`]). The result holds one curve per
/// fold, empty where a fold produced no anchors.
pub fn extract_fundi(
    surface: &Surface,
    graph: &MeshGraph,
    depths: &[f64],
    mean_curvatures: &[f64],
    min_directions: Option<&[Vector3<f64>]>,
    options: &FundiOptions,
) -> Result<Vec<FundusCurve>> {
    surface.check_scalars("depths", depths)?;
    surface.check_scalars("mean_curvatures", mean_curvatures)?;

    let max_depth = depths.iter().cloned().fold(0.0f64, f64::max);
    let normalized: Vec<f64> = if max_depth > 0.0 {
        depths.iter().map(|&d| d / max_depth).collect()
    } else {
        depths.to_vec()
    };

    let (_, folds) = extract_folds(graph, &normalized, options.depth_threshold, options.min_fold_size)?;
    info!(folds = folds.len(), "extracting fundi");

    let likelihoods = compute_likelihood(&normalized, mean_curvatures, &options.likelihood)?;

    let anchor_options = match min_directions {
        Some(directions) => options.anchors.clone().with_directions(directions.to_vec()),
        None => options.anchors.clone(),
    };

    let per_fold = |fold: &Vec<usize>| -> Result<FundusCurve> {
        let anchors = find_anchors(surface.points(), &likelihoods, fold, &anchor_options)?;
        if anchors.is_empty() {
            debug!(fold_size = fold.len(), "fold yielded no anchors");
            return Ok(FundusCurve::empty());
        }
        connect_anchors(graph, &likelihoods, fold, &anchors, &options.connect)
    };

    let curves: Result<Vec<FundusCurve>> = if options.parallel {
        folds.par_iter().map(per_fold).collect()
    } else {
        folds.iter().map(per_fold).collect()
    };
    let curves = curves?;

    info!(
        curves = curves.iter().filter(|c| !c.is_empty()).count(),
        "fundus extraction complete"
    );
    Ok(curves)
}
