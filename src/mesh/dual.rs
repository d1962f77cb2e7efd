use super::{centroid, ControlVolumeMesh, CvFace, EdgeNodes, SimplexMesh, SubControlVolume};
use crate::connectivity::{Connectivity, SimplexConnectivity};
use crate::Real;
use eyre::{eyre, ensure};
use log::debug;
use nalgebra::{Point3, Vector3};
use numeric_literals::replace_float_literals;
use rustc_hash::FxHashMap;

/// Median dual of a mesh of linear triangles or tetrahedra.
///
/// Each element is split into one sub-control volume per vertex of equal volume. Inside an
/// element, the face separating the control volumes of the two end nodes of an element edge
/// connects the edge midpoint with the element centroid (2D), or with the centroids of the two
/// element faces adjacent to the edge and the element centroid (3D). Each tagged boundary face
/// is split into one boundary CV face per vertex.
#[derive(Clone, Debug, PartialEq)]
pub struct DualMesh<T: Real> {
    dim: usize,
    num_local_nodes: usize,
    positions: Vec<Point3<T>>,
    cv_volumes: Vec<T>,
    node_scvs: Vec<Vec<SubControlVolume<T>>>,
    node_boundary_tags: Vec<Vec<usize>>,
    edges: Vec<EdgeNodes>,
    edge_cv_faces: Vec<Vec<usize>>,
    element_nodes: Vec<Vec<usize>>,
    element_tags: Vec<usize>,
    element_cv_faces: Vec<Vec<usize>>,
    cv_faces: Vec<CvFace<T>>,
    num_interior_cv_faces: usize,
}

impl<T: Real> DualMesh<T> {
    /// Builds the dual of a mesh in which every node is owned.
    pub fn from_simplex_mesh<C: SimplexConnectivity>(mesh: &SimplexMesh<T, C>) -> eyre::Result<Self> {
        Self::with_local_nodes(mesh, mesh.vertices().len())
    }

    /// Builds the dual of a mesh partition in which the first `num_local_nodes` vertices are
    /// owned and the remaining vertices are halo nodes.
    pub fn with_local_nodes<C: SimplexConnectivity>(mesh: &SimplexMesh<T, C>, num_local_nodes: usize) -> eyre::Result<Self> {
        mesh.validate()?;
        let vertices = mesh.vertices();
        let num_nodes = vertices.len();
        ensure!(
            num_local_nodes <= num_nodes,
            "{} owned nodes requested for a mesh with {} vertices",
            num_local_nodes,
            num_nodes
        );
        let dim = C::DIM;
        let scv_fraction = T::from_usize(dim + 1).expect("Must be able to fit usize in T");

        let mut edge_ids: FxHashMap<(usize, usize), usize> = FxHashMap::default();
        let mut edges = Vec::new();
        let mut edge_cv_faces: Vec<Vec<usize>> = Vec::new();
        let mut element_cv_faces = Vec::with_capacity(mesh.connectivity().len());
        let mut cv_faces = Vec::new();
        let mut node_scvs = vec![Vec::new(); num_nodes];
        let mut cv_volumes = vec![T::zero(); num_nodes];
        let mut node_cells = vec![Vec::new(); num_nodes];

        for (cell_idx, cell) in mesh.connectivity().iter().enumerate() {
            let nodes = cell.vertex_indices();
            let measure = simplex_measure(vertices, nodes);
            ensure!(measure > T::zero(), "element {} is degenerate", cell_idx);

            let scv_volume = measure / scv_fraction;
            for &v in nodes {
                node_scvs[v].push(SubControlVolume {
                    element: cell_idx,
                    volume: scv_volume,
                });
                cv_volumes[v] += scv_volume;
                node_cells[v].push(cell_idx);
            }

            let cell_centroid = centroid(vertices, nodes);
            let mut faces_of_cell = Vec::with_capacity(C::local_edges().len());
            for &[i, j] in C::local_edges() {
                let (a, b) = (nodes[i], nodes[j]);
                let (back, front) = if a < b { (a, b) } else { (b, a) };
                let edge = *edge_ids.entry((back, front)).or_insert_with(|| {
                    edges.push(EdgeNodes { back, front });
                    edge_cv_faces.push(Vec::new());
                    edges.len() - 1
                });

                let others: Vec<usize> = nodes.iter().copied().filter(|&v| v != a && v != b).collect();
                let (area_vector, face_centroid) =
                    interior_face_geometry(vertices, back, front, &others, &cell_centroid);
                let area = area_vector.norm();
                ensure!(
                    area > T::zero(),
                    "degenerate control volume face in element {} between nodes {} and {}",
                    cell_idx,
                    back,
                    front
                );

                let face_idx = cv_faces.len();
                cv_faces.push(CvFace {
                    element: cell_idx,
                    back,
                    front,
                    edge: Some(edge),
                    normal: area_vector / area,
                    area,
                    centroid: face_centroid,
                    boundary_tag: None,
                });
                edge_cv_faces[edge].push(face_idx);
                faces_of_cell.push(face_idx);
            }
            element_cv_faces.push(faces_of_cell);
        }
        let num_interior_cv_faces = cv_faces.len();

        let mut node_boundary_tags = vec![Vec::new(); num_nodes];
        for (face, tag) in mesh.boundary_faces() {
            let face_nodes = face.vertex_indices();
            let owner = face_nodes
                .first()
                .and_then(|&v| {
                    node_cells[v]
                        .iter()
                        .copied()
                        .find(|&c| mesh.connectivity()[c].contains_face(face))
                })
                .ok_or_else(|| eyre!("boundary face {:?} does not belong to any element", face_nodes))?;
            let opposite = mesh.connectivity()[owner]
                .vertex_indices()
                .iter()
                .copied()
                .find(|v| !face_nodes.contains(v))
                .ok_or_else(|| eyre!("element {} has no vertex opposite to boundary face", owner))?;

            let face_centroid = centroid(vertices, face_nodes);
            let mut area_vector = facet_area_vector(vertices, face_nodes);
            if area_vector.dot(&(face_centroid - vertices[opposite])) < T::zero() {
                area_vector = -area_vector;
            }
            let total_area = area_vector.norm();
            ensure!(
                total_area > T::zero(),
                "boundary face {:?} with tag {} is degenerate",
                face_nodes,
                tag
            );
            let normal = area_vector / total_area;
            let share = total_area / T::from_usize(face_nodes.len()).expect("Must be able to fit usize in T");

            for &v in face_nodes {
                cv_faces.push(CvFace {
                    element: owner,
                    back: v,
                    front: v,
                    edge: None,
                    normal,
                    area: share,
                    centroid: boundary_sub_face_centroid(vertices, v, face_nodes, &face_centroid),
                    boundary_tag: Some(*tag),
                });
                node_boundary_tags[v].push(*tag);
            }
        }
        for tags in &mut node_boundary_tags {
            tags.sort_unstable();
            tags.dedup();
        }

        debug!(
            "Built {}D dual mesh: {} nodes ({} owned), {} edges, {} elements, {} interior and {} boundary CV faces",
            dim,
            num_nodes,
            num_local_nodes,
            edges.len(),
            mesh.connectivity().len(),
            num_interior_cv_faces,
            cv_faces.len() - num_interior_cv_faces
        );

        Ok(Self {
            dim,
            num_local_nodes,
            positions: vertices.to_vec(),
            cv_volumes,
            node_scvs,
            node_boundary_tags,
            edges,
            edge_cv_faces,
            element_nodes: mesh
                .connectivity()
                .iter()
                .map(|cell| cell.vertex_indices().to_vec())
                .collect(),
            element_tags: mesh.cell_tags().to_vec(),
            element_cv_faces,
            cv_faces,
            num_interior_cv_faces,
        })
    }
}

/// Area (2D) or volume (3D) of a simplex.
#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
fn simplex_measure<T: Real>(vertices: &[Point3<T>], nodes: &[usize]) -> T {
    let x0 = vertices[nodes[0]];
    let d1 = vertices[nodes[1]] - x0;
    let d2 = vertices[nodes[2]] - x0;
    if nodes.len() == 3 {
        0.5 * d1.cross(&d2).norm()
    } else {
        let d3 = vertices[nodes[3]] - x0;
        d1.dot(&d2.cross(&d3)).abs() / 6.0
    }
}

/// Area-weighted normal and centroid of the dual face between `back` and `front` inside an
/// element. `others` are the remaining vertices of the element.
#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
fn interior_face_geometry<T: Real>(
    vertices: &[Point3<T>],
    back: usize,
    front: usize,
    others: &[usize],
    cell_centroid: &Point3<T>,
) -> (Vector3<T>, Point3<T>) {
    let axis = vertices[front] - vertices[back];
    let midpoint = centroid(vertices, &[back, front]);
    let oriented = |v: Vector3<T>| if v.dot(&axis) < 0.0 { -v } else { v };

    if others.len() == 1 {
        let t = cell_centroid - midpoint;
        let area_vector = oriented(Vector3::new(t.y, -t.x, 0.0));
        (area_vector, Point3::from((midpoint.coords + cell_centroid.coords) * 0.5))
    } else {
        let mut area_vector = Vector3::zeros();
        let mut weighted_centroid = Vector3::zeros();
        let mut total_area = 0.0;
        for &k in others {
            let facet_centroid = centroid(vertices, &[back, front, k]);
            let triangle =
                oriented((facet_centroid - midpoint).cross(&(cell_centroid - midpoint)) * 0.5);
            let triangle_area = triangle.norm();
            area_vector += triangle;
            weighted_centroid +=
                (midpoint.coords + facet_centroid.coords + cell_centroid.coords) * (triangle_area / 3.0);
            total_area += triangle_area;
        }
        let face_centroid = if total_area > 0.0 {
            Point3::from(weighted_centroid / total_area)
        } else {
            midpoint
        };
        (area_vector, face_centroid)
    }
}

/// Area-weighted normal of a boundary segment (2D) or triangle (3D), not yet oriented.
#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
fn facet_area_vector<T: Real>(vertices: &[Point3<T>], nodes: &[usize]) -> Vector3<T> {
    let x0 = vertices[nodes[0]];
    let d1 = vertices[nodes[1]] - x0;
    if nodes.len() == 2 {
        Vector3::new(d1.y, -d1.x, 0.0)
    } else {
        let d2 = vertices[nodes[2]] - x0;
        d1.cross(&d2) * 0.5
    }
}

/// Centroid of the part of a boundary face belonging to the control volume of `node`.
#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
fn boundary_sub_face_centroid<T: Real>(
    vertices: &[Point3<T>],
    node: usize,
    face_nodes: &[usize],
    face_centroid: &Point3<T>,
) -> Point3<T> {
    let x = vertices[node].coords;
    if face_nodes.len() == 2 {
        Point3::from((x + face_centroid.coords) * 0.5)
    } else {
        let mut sum = x + face_centroid.coords;
        for &w in face_nodes.iter().filter(|&&w| w != node) {
            sum += (x + vertices[w].coords) * 0.5;
        }
        Point3::from(sum / 4.0)
    }
}

impl<T: Real> ControlVolumeMesh<T> for DualMesh<T> {
    fn dim(&self) -> usize {
        self.dim
    }

    fn num_nodes(&self) -> usize {
        self.positions.len()
    }

    fn num_local_nodes(&self) -> usize {
        self.num_local_nodes
    }

    fn num_edges(&self) -> usize {
        self.edges.len()
    }

    fn num_elements(&self) -> usize {
        self.element_nodes.len()
    }

    fn num_cv_faces(&self) -> usize {
        self.cv_faces.len()
    }

    fn num_interior_cv_faces(&self) -> usize {
        self.num_interior_cv_faces
    }

    fn node_position(&self, node: usize) -> Point3<T> {
        self.positions[node]
    }

    fn cv_volume(&self, node: usize) -> T {
        self.cv_volumes[node]
    }

    fn node_scvs(&self, node: usize) -> &[SubControlVolume<T>] {
        &self.node_scvs[node]
    }

    fn node_boundary_tags(&self, node: usize) -> &[usize] {
        &self.node_boundary_tags[node]
    }

    fn edge_nodes(&self, edge: usize) -> EdgeNodes {
        self.edges[edge]
    }

    fn edge_cv_faces(&self, edge: usize) -> &[usize] {
        &self.edge_cv_faces[edge]
    }

    fn element_nodes(&self, element: usize) -> &[usize] {
        &self.element_nodes[element]
    }

    fn element_physical_tag(&self, element: usize) -> usize {
        self.element_tags[element]
    }

    fn element_cv_faces(&self, element: usize) -> &[usize] {
        &self.element_cv_faces[element]
    }

    fn cv_face(&self, face: usize) -> &CvFace<T> {
        &self.cv_faces[face]
    }
}
