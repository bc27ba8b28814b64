//! Error types for sulcal.
//!
//! This module defines all error types used throughout the library.
//!
//! Integrity problems (malformed meshes, mismatched scalar arrays) and
//! missing supervision fail fast with an error. Conditions that are part of
//! normal operation — a propagation column hitting its iteration cap, a fold
//! yielding no anchors, a bounded search coming up empty — are *not* errors:
//! they are represented in the result types themselves (see
//! [`ColumnTermination`](crate::algo::propagate::ColumnTermination) and the
//! empty-collection conventions documented on each algorithm).

use thiserror::Error;

/// Result type alias using [`SurfaceError`].
pub type Result<T> = std::result::Result<T, SurfaceError>;

/// Errors that can occur during surface mesh analysis.
#[derive(Error, Debug)]
pub enum SurfaceError {
    /// The mesh has no faces.
    #[error("mesh has no faces")]
    EmptyMesh,

    /// A face references a vertex index outside the mesh.
    #[error("face {face} references invalid vertex index {vertex} (mesh has {num_vertices} vertices)")]
    InvalidVertexIndex {
        /// The face index.
        face: usize,
        /// The invalid vertex index.
        vertex: usize,
        /// Number of vertices in the mesh.
        num_vertices: usize,
    },

    /// A face has duplicate vertex indices (degenerate triangle).
    #[error("face {face} is degenerate (repeats a vertex)")]
    DegenerateFace {
        /// The face index.
        face: usize,
    },

    /// A per-vertex label array does not match the vertex count.
    #[error("{count} labels provided for a mesh with {num_vertices} vertices")]
    LabelCountMismatch {
        /// Number of labels provided.
        count: usize,
        /// Number of vertices in the mesh.
        num_vertices: usize,
    },

    /// A per-vertex scalar array does not match the vertex count.
    #[error("scalar array '{name}' has {count} values for a mesh with {num_vertices} vertices")]
    ScalarCountMismatch {
        /// Name of the scalar array.
        name: &'static str,
        /// Number of values provided.
        count: usize,
        /// Number of vertices in the mesh.
        num_vertices: usize,
    },

    /// No seed labels were present before label propagation.
    #[error("no seed labels present before propagation")]
    NoSeedLabels,

    /// The input is too small for the requested computation.
    #[error("input has {count} vertices but at least {required} are required")]
    TooFewVertices {
        /// Number of vertices available.
        count: usize,
        /// Minimum number required.
        required: usize,
    },

    /// Invalid parameter value.
    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// The invalid value (as string).
        value: String,
        /// Reason the value is invalid.
        reason: &'static str,
    },

    /// An external spectral backend failed.
    #[error("spectral backend failed: {0}")]
    SpectralBackend(String),
}

impl SurfaceError {
    /// Create an invalid parameter error.
    pub fn invalid_param<T: std::fmt::Display>(
        name: &'static str,
        value: T,
        reason: &'static str,
    ) -> Self {
        SurfaceError::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }
}
