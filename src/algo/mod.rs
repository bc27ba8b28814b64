//! Surface analysis algorithms.
//!
//! This module contains the analysis stages, roughly in pipeline order:
//!
//! - **Region segmentation**: connected-region growing, fold extraction
//! - **Likelihood**: per-vertex fundus likelihood from depth and curvature
//! - **Anchors**: spaced high-likelihood points within a fold
//! - **Curves**: cheapest-path connection of anchors into fundus curves
//! - **Propagation**: graph-based spreading of seed labels
//! - **Boundaries**: label boundary extraction and segmentation
//! - **Realignment**: nudging label boundaries onto fundus curves
//! - **Spectra**: largest-fragment preparation for spectral backends
//! - **Fundi**: the assembled fold-to-fundus pipeline

pub mod anchors;
pub mod boundary;
pub mod curve;
pub mod fundi;
pub mod likelihood;
pub mod propagate;
pub mod realign;
pub mod region;
pub mod spectra;
pub(crate) mod sparse;

pub use anchors::{find_anchors, AnchorOptions, AnchorSpacing};
pub use boundary::{
    find_intersections, find_label_boundaries, find_label_boundary_segments,
    find_polyline_flanks, nearest_label_pair, segment_curve_by_labels, BoundarySegment,
    BoundarySegments,
};
pub use curve::{connect_anchors, ConnectOptions, FundusCurve};
pub use fundi::{extract_fundi, FundiOptions};
pub use likelihood::{compute_likelihood, LikelihoodOptions};
pub use propagate::{
    percent_agreement, propagate, AffinityKernel, AffinityMatrix, ColumnTermination, LabelTable,
    ProbabilisticAssignment, PropagateOptions, SeedLabels,
};
pub use realign::{
    assign_realigned_labels, determine_appropriate_segments, propagate_realignment,
    realign_label_boundaries, OverlapPolicy, RealignmentField, RealignOptions,
};
pub use region::{extract_folds, largest_segment, segment, SegmentOptions, Segmentation};
pub use spectra::{spectrum_of_largest, SpectralBackend};
