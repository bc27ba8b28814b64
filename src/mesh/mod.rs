//! Core mesh data structures.
//!
//! The primary types are [`Surface`], an immutable vertex/face mesh validated
//! at construction, and [`MeshGraph`], the vertex-adjacency index derived
//! from it. Everything else in the crate operates on borrows of these two.
//!
//! # Construction
//!
//! ```
//! use sulcal::mesh::{MeshGraph, Surface};
//! use nalgebra::Point3;
//!
//! let points = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.5, 1.0, 0.0),
//! ];
//! let faces = vec![[0, 1, 2]];
//!
//! let surface = Surface::new(points, faces).unwrap();
//! let graph = MeshGraph::build(&surface);
//! assert_eq!(graph.neighbors(0), &[1, 2]);
//! ```

mod surface;
mod topology;

pub use surface::Surface;
pub use topology::{adjacent_faces, FaceNeighbor, MeshGraph};
