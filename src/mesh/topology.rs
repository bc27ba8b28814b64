//! Mesh adjacency and topology queries.
//!
//! [`MeshGraph`] is the vertex-adjacency index derived once from a mesh's
//! face list: neighbor lists, faces-at-vertex maps, and hop-bounded
//! neighborhood expansion. It is a pure function of the face list and is
//! meant to be built once per mesh and shared (immutably) by every algorithm
//! that walks the graph.
//!
//! Face-to-face adjacency ([`adjacent_faces`]) is provided as a standalone
//! query since most pipelines never need it.

use std::collections::HashMap;

use crate::error::Result;
use crate::mesh::surface::validate_faces;
use crate::mesh::Surface;

/// Vertex-adjacency index of a triangular mesh.
///
/// Neighbor lists are unique and sorted, and symmetric by construction:
/// `w ∈ neighbors(v)` if and only if `v ∈ neighbors(w)`.
#[derive(Debug, Clone)]
pub struct MeshGraph {
    neighbors: Vec<Vec<usize>>,
    faces_at_vertex: Vec<Vec<usize>>,
}

impl MeshGraph {
    /// Build the adjacency index for a validated surface.
    pub fn build(surface: &Surface) -> Self {
        // Faces were validated at Surface construction.
        Self::build_unchecked(surface.num_vertices(), surface.faces())
    }

    /// Build the adjacency index from a raw face list.
    ///
    /// # Errors
    ///
    /// Fails with a data-integrity error if a face references a vertex index
    /// at or beyond `num_vertices`, or repeats a vertex.
    pub fn from_faces(num_vertices: usize, faces: &[[usize; 3]]) -> Result<Self> {
        validate_faces(num_vertices, faces)?;
        Ok(Self::build_unchecked(num_vertices, faces))
    }

    fn build_unchecked(num_vertices: usize, faces: &[[usize; 3]]) -> Self {
        let mut neighbors = vec![Vec::new(); num_vertices];
        let mut faces_at_vertex = vec![Vec::new(); num_vertices];

        for (face_id, face) in faces.iter().enumerate() {
            let [v0, v1, v2] = *face;
            neighbors[v0].push(v1);
            neighbors[v0].push(v2);
            neighbors[v1].push(v0);
            neighbors[v1].push(v2);
            neighbors[v2].push(v0);
            neighbors[v2].push(v1);
            faces_at_vertex[v0].push(face_id);
            faces_at_vertex[v1].push(face_id);
            faces_at_vertex[v2].push(face_id);
        }

        for list in &mut neighbors {
            list.sort_unstable();
            list.dedup();
        }

        Self {
            neighbors,
            faces_at_vertex,
        }
    }

    /// Number of vertices in the underlying mesh.
    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.neighbors.len()
    }

    /// Unique, sorted neighbor vertex IDs of `v`.
    #[inline]
    pub fn neighbors(&self, v: usize) -> &[usize] {
        &self.neighbors[v]
    }

    /// Indices of all faces containing `v`.
    #[inline]
    pub fn faces_at_vertex(&self, v: usize) -> &[usize] {
        &self.faces_at_vertex[v]
    }

    /// Vertices within `nedges` hops of `seeds`, excluding the seeds
    /// themselves.
    ///
    /// Frontier expansion with a visited set: each round collects the
    /// unvisited neighbors of the current frontier. The result is sorted.
    pub fn neighborhood(&self, seeds: &[usize], nedges: usize) -> Vec<usize> {
        let mut visited = vec![false; self.num_vertices()];
        for &s in seeds {
            visited[s] = true;
        }

        let mut neighborhood = Vec::new();
        let mut frontier: Vec<usize> = seeds.to_vec();

        for _ in 0..nedges {
            if frontier.is_empty() {
                break;
            }
            let mut next = Vec::new();
            for &v in &frontier {
                for &w in self.neighbors(v) {
                    if !visited[w] {
                        visited[w] = true;
                        next.push(w);
                    }
                }
            }
            neighborhood.extend_from_slice(&next);
            frontier = next;
        }

        neighborhood.sort_unstable();
        neighborhood
    }

    /// All undirected edges of the mesh, each as an ordered `(lo, hi)` pair,
    /// sorted and unique.
    pub fn edges(&self) -> Vec<(usize, usize)> {
        let mut edges = Vec::new();
        for (v, list) in self.neighbors.iter().enumerate() {
            for &w in list {
                if v < w {
                    edges.push((v, w));
                }
            }
        }
        edges
    }
}

/// A face adjacent across one edge of another face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceNeighbor {
    /// Index of the adjacent face.
    pub face: usize,
    /// The adjacent face's vertex that is not on the shared edge.
    pub opposite: usize,
}

/// For each face, the faces sharing each of its three edges.
///
/// Entry `i` of a face's result corresponds to the edge *opposite* the face's
/// vertex `i` (the edge formed by its other two vertices). `None` marks an
/// open-mesh boundary edge with no adjacent face.
///
/// Assumes a manifold mesh: at most two faces per edge. When more than two
/// faces share an edge, the first pairing encountered wins and the rest are
/// reported against it.
pub fn adjacent_faces(faces: &[[usize; 3]]) -> Vec<[Option<FaceNeighbor>; 3]> {
    // Map each undirected edge to the faces containing it, tagged with the
    // slot of the face's vertex opposite that edge.
    let mut faces_at_edge: HashMap<(usize, usize), Vec<(usize, usize)>> = HashMap::new();
    for (face_id, face) in faces.iter().enumerate() {
        for slot in 0..3 {
            let a = face[(slot + 1) % 3];
            let b = face[(slot + 2) % 3];
            let key = (a.min(b), a.max(b));
            faces_at_edge.entry(key).or_default().push((face_id, slot));
        }
    }

    let mut adjacency = vec![[None; 3]; faces.len()];
    for sharers in faces_at_edge.values() {
        for &(face_id, slot) in sharers {
            let partner = sharers.iter().find(|&&(other, _)| other != face_id);
            if let Some(&(other_face, other_slot)) = partner {
                adjacency[face_id][slot] = Some(FaceNeighbor {
                    face: other_face,
                    opposite: faces[other_face][other_slot],
                });
            }
        }
    }

    adjacency
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Open fan of five faces around vertex 0.
    fn fan_faces() -> Vec<[usize; 3]> {
        vec![[0, 1, 2], [0, 2, 3], [0, 3, 4], [0, 1, 4], [4, 3, 1]]
    }

    #[test]
    fn test_neighbors_sorted_unique() {
        let graph = MeshGraph::from_faces(5, &fan_faces()).unwrap();
        assert_eq!(graph.neighbors(0), &[1, 2, 3, 4]);
        assert_eq!(graph.neighbors(1), &[0, 2, 3, 4]);
        assert_eq!(graph.neighbors(2), &[0, 1, 3]);
        assert_eq!(graph.neighbors(3), &[0, 1, 2, 4]);
        assert_eq!(graph.neighbors(4), &[0, 1, 3]);
    }

    #[test]
    fn test_neighbor_symmetry() {
        let graph = MeshGraph::from_faces(5, &fan_faces()).unwrap();
        for v in 0..graph.num_vertices() {
            for &w in graph.neighbors(v) {
                assert!(
                    graph.neighbors(w).contains(&v),
                    "asymmetric adjacency between {} and {}",
                    v,
                    w
                );
            }
        }
    }

    #[test]
    fn test_faces_at_vertex() {
        let graph = MeshGraph::from_faces(5, &fan_faces()).unwrap();
        assert_eq!(graph.faces_at_vertex(0), &[0, 1, 2, 3]);
        assert_eq!(graph.faces_at_vertex(1), &[0, 3, 4]);
        assert_eq!(graph.faces_at_vertex(2), &[0, 1]);
        assert_eq!(graph.faces_at_vertex(3), &[1, 2, 4]);
        assert_eq!(graph.faces_at_vertex(4), &[2, 3, 4]);
    }

    #[test]
    fn test_invalid_face_reported() {
        assert!(MeshGraph::from_faces(3, &[[0, 1, 7]]).is_err());
    }

    #[test]
    fn test_neighborhood_two_hops() {
        let graph = MeshGraph::from_faces(5, &fan_faces()).unwrap();
        // One hop from vertex 2 reaches 0, 1, 3; the seed itself is excluded.
        assert_eq!(graph.neighborhood(&[2], 1), vec![0, 1, 3]);
        // Two hops adds vertex 4.
        assert_eq!(graph.neighborhood(&[2], 2), vec![0, 1, 3, 4]);
    }

    #[test]
    fn test_edges() {
        let graph = MeshGraph::from_faces(4, &[[0, 1, 2], [1, 2, 3]]).unwrap();
        assert_eq!(
            graph.edges(),
            vec![(0, 1), (0, 2), (1, 2), (1, 3), (2, 3)]
        );
    }

    #[test]
    fn test_adjacent_faces_closed_tetrahedron() {
        let faces = [[0, 1, 2], [0, 2, 3], [0, 3, 1], [1, 2, 3]];
        let adjacency = adjacent_faces(&faces);

        // Every edge of a closed tetrahedron has exactly two faces.
        for per_face in &adjacency {
            for neighbor in per_face {
                assert!(neighbor.is_some());
            }
        }

        // Face 0 = [0,1,2]: the edge opposite vertex 0 is (1,2), shared with
        // face 3 = [1,2,3] whose off-edge vertex is 3.
        assert_eq!(
            adjacency[0][0],
            Some(FaceNeighbor { face: 3, opposite: 3 })
        );
        // Edge opposite vertex 1 is (0,2), shared with face 1 = [0,2,3].
        assert_eq!(
            adjacency[0][1],
            Some(FaceNeighbor { face: 1, opposite: 3 })
        );
    }

    #[test]
    fn test_adjacent_faces_open_boundary() {
        // Two triangles sharing edge (1,2); all other edges are boundary.
        let faces = [[0, 1, 2], [1, 2, 3]];
        let adjacency = adjacent_faces(&faces);

        assert_eq!(
            adjacency[0][0],
            Some(FaceNeighbor { face: 1, opposite: 3 })
        );
        assert_eq!(adjacency[0][1], None);
        assert_eq!(adjacency[0][2], None);
        assert_eq!(
            adjacency[1][2],
            Some(FaceNeighbor { face: 0, opposite: 0 })
        );
    }
}
