//! Control volume meshes.
//!
//! The flow kernel only talks to meshes through [`ControlVolumeMesh`]. A median dual
//! implementation over linear triangles and tetrahedra is provided by [`DualMesh`], built from
//! a tagged primal [`SimplexMesh`].
use crate::connectivity::{Connectivity, SimplexConnectivity, Tet4Connectivity, Tri3Connectivity};
use crate::util::elevation;
use crate::Real;
use eyre::{bail, ensure};
use nalgebra::{Point3, Vector3};
use std::collections::BTreeMap;
use std::ops::Range;

mod dual;
mod partition;
pub mod procedural;

pub use dual::DualMesh;
pub use partition::{partition_by_node_owner, Partition};

/// The part of a control volume lying inside a single element.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SubControlVolume<T> {
    pub element: usize,
    pub volume: T,
}

/// The two end nodes of a mesh edge.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct EdgeNodes {
    pub back: usize,
    pub front: usize,
}

impl EdgeNodes {
    pub fn contains(&self, node: usize) -> bool {
        self.back == node || self.front == node
    }
}

/// A face of the dual mesh, separating two control volumes or bounding the domain.
///
/// Interior faces lie inside `element` and separate the control volumes of `back` and `front`,
/// with the unit `normal` pointing from `back` towards `front`. Boundary faces belong to the
/// control volume of `back` (with `front == back`), carry a boundary tag and have an outward
/// unit normal.
#[derive(Clone, Debug, PartialEq)]
pub struct CvFace<T: Real> {
    pub element: usize,
    pub back: usize,
    pub front: usize,
    pub edge: Option<usize>,
    pub normal: Vector3<T>,
    pub area: T,
    pub centroid: Point3<T>,
    pub boundary_tag: Option<usize>,
}

impl<T: Real> CvFace<T> {
    pub fn is_boundary(&self) -> bool {
        self.boundary_tag.is_some()
    }
}

/// Read-only topology and geometry of a (partition of a) vertex-centred finite volume mesh.
///
/// Nodes `[0, num_local_nodes)` are owned by the partition, the remaining nodes are halo copies
/// of nodes owned elsewhere. CV faces `[0, num_interior_cv_faces)` are interior faces, the
/// remaining ones are boundary faces.
pub trait ControlVolumeMesh<T: Real> {
    /// Spatial dimension, either 2 or 3.
    fn dim(&self) -> usize;

    fn num_nodes(&self) -> usize;
    fn num_local_nodes(&self) -> usize;
    fn num_edges(&self) -> usize;
    fn num_elements(&self) -> usize;
    fn num_cv_faces(&self) -> usize;
    fn num_interior_cv_faces(&self) -> usize;

    /// Position of a node. The z coordinate of 2D meshes is zero.
    fn node_position(&self, node: usize) -> Point3<T>;
    fn cv_volume(&self, node: usize) -> T;
    fn node_scvs(&self, node: usize) -> &[SubControlVolume<T>];
    /// Boundary tags of all boundary faces of the node's control volume, sorted and unique.
    fn node_boundary_tags(&self, node: usize) -> &[usize];

    fn edge_nodes(&self, edge: usize) -> EdgeNodes;
    /// Interior CV faces attached to the edge, sorted.
    fn edge_cv_faces(&self, edge: usize) -> &[usize];

    fn element_nodes(&self, element: usize) -> &[usize];
    fn element_physical_tag(&self, element: usize) -> usize;
    /// Interior CV faces owned by the element.
    fn element_cv_faces(&self, element: usize) -> &[usize];

    fn cv_face(&self, face: usize) -> &CvFace<T>;

    fn is_local_node(&self, node: usize) -> bool {
        node < self.num_local_nodes()
    }

    fn node_elevation(&self, node: usize) -> T {
        elevation(&self.node_position(node), self.dim())
    }

    fn interior_cv_faces(&self) -> Range<usize> {
        0..self.num_interior_cv_faces()
    }

    fn boundary_cv_faces(&self) -> Range<usize> {
        self.num_interior_cv_faces()..self.num_cv_faces()
    }
}

/// Primal mesh of linear simplices, carrying a physical tag per cell and a set of tagged
/// boundary faces.
///
/// Vertices of triangle meshes lie in the plane z = 0.
#[derive(Clone, Debug, PartialEq)]
pub struct SimplexMesh<T: Real, C: Connectivity> {
    vertices: Vec<Point3<T>>,
    connectivity: Vec<C>,
    cell_tags: Vec<usize>,
    boundary_faces: Vec<(C::FaceConnectivity, usize)>,
}

pub type TriangleMesh<T> = SimplexMesh<T, Tri3Connectivity>;
pub type TetMesh<T> = SimplexMesh<T, Tet4Connectivity>;

impl<T, C> SimplexMesh<T, C>
where
    T: Real,
    C: SimplexConnectivity,
{
    /// Construct a mesh in which every cell has physical tag 1 and no boundary face is tagged.
    pub fn from_vertices_and_connectivity(vertices: Vec<Point3<T>>, connectivity: Vec<C>) -> Self {
        let cell_tags = vec![1; connectivity.len()];
        Self {
            vertices,
            connectivity,
            cell_tags,
            boundary_faces: Vec::new(),
        }
    }

    pub fn vertices(&self) -> &[Point3<T>] {
        &self.vertices
    }

    pub fn connectivity(&self) -> &[C] {
        &self.connectivity
    }

    pub fn cell_tags(&self) -> &[usize] {
        &self.cell_tags
    }

    /// Tagged boundary faces as `(face connectivity, boundary tag)` pairs.
    pub fn boundary_faces(&self) -> &[(C::FaceConnectivity, usize)] {
        &self.boundary_faces
    }

    pub fn dim(&self) -> usize {
        C::DIM
    }

    pub fn cell_centroid(&self, cell: usize) -> Point3<T> {
        centroid(&self.vertices, self.connectivity[cell].vertex_indices())
    }

    /// Assign physical tags to cells based on their centroids.
    pub fn tag_cells(&mut self, tag: impl Fn(&Point3<T>) -> usize) {
        self.cell_tags = (0..self.connectivity.len())
            .map(|cell| tag(&self.cell_centroid(cell)))
            .collect();
    }

    pub fn with_cell_tags(mut self, cell_tags: Vec<usize>) -> eyre::Result<Self> {
        ensure!(
            cell_tags.len() == self.connectivity.len(),
            "got {} cell tags for {} cells",
            cell_tags.len(),
            self.connectivity.len()
        );
        self.cell_tags = cell_tags;
        Ok(self)
    }

    pub fn add_boundary_face(&mut self, face: C::FaceConnectivity, tag: usize) {
        self.boundary_faces.push((face, tag));
    }

    /// Tags the faces lying on the boundary of the mesh.
    ///
    /// `tag` is called with the centroid of each boundary face. Faces for which it returns `None`
    /// stay untagged and carry no boundary CV faces. Previously tagged faces are discarded.
    pub fn tag_boundary_faces(&mut self, tag: impl Fn(&Point3<T>) -> Option<usize>) {
        let boundary_faces = self
            .find_boundary_faces()
            .into_iter()
            .filter_map(|(face, _, _)| {
                let face_centroid = centroid(&self.vertices, face.vertex_indices());
                tag(&face_centroid).map(|t| (face, t))
            })
            .collect();
        self.boundary_faces = boundary_faces;
    }

    /// Returns the faces referenced by exactly one cell, together with the index of that cell
    /// and the local index of the face within the cell.
    pub fn find_boundary_faces(&self) -> Vec<(C::FaceConnectivity, usize, usize)> {
        // Sorted vertex lists as keys of a BTreeMap, to avoid non-determinism
        let mut face_counts: BTreeMap<Vec<usize>, (C::FaceConnectivity, usize, usize, usize)> = BTreeMap::new();
        for (cell_idx, cell_conn) in self.connectivity.iter().enumerate() {
            for local_idx in 0..cell_conn.num_faces() {
                if let Some(face_conn) = cell_conn.get_face_connectivity(local_idx) {
                    let mut key = face_conn.vertex_indices().to_vec();
                    key.sort_unstable();
                    face_counts
                        .entry(key)
                        .and_modify(|(_, _, _, count)| *count += 1)
                        .or_insert((face_conn, cell_idx, local_idx, 1));
                }
            }
        }

        // Faces with a count of 1 are boundary faces
        face_counts
            .into_values()
            .filter(|&(_, _, _, count)| count == 1)
            .map(|(face, cell, local, _)| (face, cell, local))
            .collect()
    }

    /// Checks that every index is in bounds and that every tagged face belongs to a cell.
    pub fn validate(&self) -> eyre::Result<()> {
        let num_vertices = self.vertices.len();
        for (cell_idx, cell) in self.connectivity.iter().enumerate() {
            if let Some(&v) = cell.vertex_indices().iter().find(|&&v| v >= num_vertices) {
                bail!("cell {} references vertex {}, but the mesh has {} vertices", cell_idx, v, num_vertices);
            }
        }
        for (face, tag) in &self.boundary_faces {
            ensure!(
                self.connectivity.iter().any(|cell| cell.contains_face(face)),
                "boundary face {:?} with tag {} does not belong to any cell",
                face.vertex_indices(),
                tag
            );
        }
        ensure!(
            self.cell_tags.len() == self.connectivity.len(),
            "got {} cell tags for {} cells",
            self.cell_tags.len(),
            self.connectivity.len()
        );
        Ok(())
    }
}

pub(crate) fn centroid<T: Real>(vertices: &[Point3<T>], indices: &[usize]) -> Point3<T> {
    let mut sum = Vector3::zeros();
    for &i in indices {
        sum += vertices[i].coords;
    }
    let n = T::from_usize(indices.len().max(1)).expect("Must be able to fit usize in T");
    Point3::from(sum / n)
}
