//! The immutable triangulated surface.

use nalgebra::Point3;

use crate::error::{Result, SurfaceError};

/// A triangulated surface mesh: vertex coordinates plus triangular faces.
///
/// The surface is immutable once constructed. Derived structures (adjacency,
/// affinity matrices, label boundaries) are computed from it on demand and
/// passed around explicitly; nothing here is mutated after [`Surface::new`]
/// returns.
///
/// # Invariants
///
/// Every face index is below the vertex count and no face repeats a vertex.
/// Both are checked at construction; violations are data-integrity errors,
/// never silently dropped.
#[derive(Debug, Clone)]
pub struct Surface {
    points: Vec<Point3<f64>>,
    faces: Vec<[usize; 3]>,
}

impl Surface {
    /// Build a surface from vertex coordinates and triangular faces.
    ///
    /// # Errors
    ///
    /// - [`SurfaceError::EmptyMesh`] if there are no faces
    /// - [`SurfaceError::InvalidVertexIndex`] if a face references a vertex
    ///   index at or beyond the vertex count
    /// - [`SurfaceError::DegenerateFace`] if a face repeats a vertex
    pub fn new(points: Vec<Point3<f64>>, faces: Vec<[usize; 3]>) -> Result<Self> {
        if faces.is_empty() {
            return Err(SurfaceError::EmptyMesh);
        }
        validate_faces(points.len(), &faces)?;
        Ok(Self { points, faces })
    }

    /// Number of vertices.
    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.points.len()
    }

    /// Number of faces.
    #[inline]
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Vertex coordinates, indexed by vertex ID.
    #[inline]
    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }

    /// Triangular faces as vertex-index triples.
    #[inline]
    pub fn faces(&self) -> &[[usize; 3]] {
        &self.faces
    }

    /// Coordinates of a single vertex.
    #[inline]
    pub fn point(&self, v: usize) -> &Point3<f64> {
        &self.points[v]
    }

    /// Euclidean distance between two vertices.
    #[inline]
    pub fn distance(&self, a: usize, b: usize) -> f64 {
        (self.points[a] - self.points[b]).norm()
    }

    /// Check that a per-vertex label array matches the vertex count.
    pub fn check_labels(&self, labels: &[i32]) -> Result<()> {
        if labels.len() != self.num_vertices() {
            return Err(SurfaceError::LabelCountMismatch {
                count: labels.len(),
                num_vertices: self.num_vertices(),
            });
        }
        Ok(())
    }

    /// Check that a per-vertex scalar array matches the vertex count.
    pub fn check_scalars(&self, name: &'static str, scalars: &[f64]) -> Result<()> {
        if scalars.len() != self.num_vertices() {
            return Err(SurfaceError::ScalarCountMismatch {
                name,
                count: scalars.len(),
                num_vertices: self.num_vertices(),
            });
        }
        Ok(())
    }

    /// Keep only faces whose three vertices all belong to `scope`.
    ///
    /// Vertex indices in the returned faces are unchanged; use
    /// [`Surface::compact`] to renumber them for a standalone sub-surface.
    pub fn restrict_faces(&self, scope: &[usize]) -> Vec<[usize; 3]> {
        let mut in_scope = vec![false; self.num_vertices()];
        for &v in scope {
            in_scope[v] = true;
        }
        self.faces
            .iter()
            .filter(|f| f.iter().all(|&v| in_scope[v]))
            .copied()
            .collect()
    }

    /// Build a standalone sub-surface from a face subset, renumbering vertex
    /// indices and dropping unreferenced coordinates.
    ///
    /// Returns the compacted surface and the mapping from new vertex index to
    /// original vertex index. Used to hand the largest connected fragment of
    /// a feature to a spectral backend.
    pub fn compact(&self, faces: &[[usize; 3]]) -> Result<(Surface, Vec<usize>)> {
        let mut keep = vec![false; self.num_vertices()];
        for face in faces {
            for &v in face {
                keep[v] = true;
            }
        }

        let mut old_to_new = vec![usize::MAX; self.num_vertices()];
        let mut new_to_old = Vec::new();
        for (old, &kept) in keep.iter().enumerate() {
            if kept {
                old_to_new[old] = new_to_old.len();
                new_to_old.push(old);
            }
        }

        let points = new_to_old.iter().map(|&old| self.points[old]).collect();
        let faces = faces
            .iter()
            .map(|f| [old_to_new[f[0]], old_to_new[f[1]], old_to_new[f[2]]])
            .collect();

        Ok((Surface::new(points, faces)?, new_to_old))
    }
}

/// Validate that faces reference existing vertices and repeat none.
pub(crate) fn validate_faces(num_vertices: usize, faces: &[[usize; 3]]) -> Result<()> {
    for (i, face) in faces.iter().enumerate() {
        for &v in face {
            if v >= num_vertices {
                return Err(SurfaceError::InvalidVertexIndex {
                    face: i,
                    vertex: v,
                    num_vertices,
                });
            }
        }
        if face[0] == face[1] || face[1] == face[2] || face[0] == face[2] {
            return Err(SurfaceError::DegenerateFace { face: i });
        }
    }
    Ok(())
}
