//! Connectivity of the linear simplices making up a primal mesh.
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

pub trait Connectivity: Clone + Debug + PartialEq + Send + Sync {
    type FaceConnectivity: Connectivity;

    fn num_faces(&self) -> usize;
    fn get_face_connectivity(&self, index: usize) -> Option<Self::FaceConnectivity>;

    fn vertex_indices(&self) -> &[usize];
}

impl Connectivity for () {
    type FaceConnectivity = ();

    fn num_faces(&self) -> usize {
        0
    }

    fn get_face_connectivity(&self, _index: usize) -> Option<Self::FaceConnectivity> {
        None
    }

    fn vertex_indices(&self) -> &[usize] {
        &[]
    }
}

pub trait ConnectivityMut: Connectivity {
    fn vertex_indices_mut(&mut self) -> &mut [usize];
}

/// Connectivity of a linear simplex spanning its embedding dimension.
pub trait SimplexConnectivity: ConnectivityMut {
    /// Spatial dimension of the simplex.
    const DIM: usize;

    /// Pairs of local vertex indices forming the edges of the simplex.
    fn local_edges() -> &'static [[usize; 2]];

    /// Whether all vertices of the given face are vertices of this simplex.
    fn contains_face(&self, face: &Self::FaceConnectivity) -> bool {
        face.vertex_indices()
            .iter()
            .all(|v| self.vertex_indices().contains(v))
    }
}

/// Connectivity of a line segment, the boundary facet of a triangle.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Segment2Connectivity(pub [usize; 2]);

impl Connectivity for Segment2Connectivity {
    type FaceConnectivity = ();

    fn num_faces(&self) -> usize {
        0
    }

    fn get_face_connectivity(&self, _index: usize) -> Option<Self::FaceConnectivity> {
        None
    }

    fn vertex_indices(&self) -> &[usize] {
        &self.0
    }
}

impl ConnectivityMut for Segment2Connectivity {
    fn vertex_indices_mut(&mut self) -> &mut [usize] {
        &mut self.0
    }
}

/// Connectivity for a Tri3 element.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tri3Connectivity(pub [usize; 3]);

impl Connectivity for Tri3Connectivity {
    type FaceConnectivity = Segment2Connectivity;

    fn num_faces(&self) -> usize {
        3
    }

    fn get_face_connectivity(&self, index: usize) -> Option<Self::FaceConnectivity> {
        let idx = &self.0;
        if index < 3 {
            Some(Segment2Connectivity([idx[index], idx[(index + 1) % 3]]))
        } else {
            None
        }
    }

    fn vertex_indices(&self) -> &[usize] {
        &self.0
    }
}

impl ConnectivityMut for Tri3Connectivity {
    fn vertex_indices_mut(&mut self) -> &mut [usize] {
        &mut self.0
    }
}

impl SimplexConnectivity for Tri3Connectivity {
    const DIM: usize = 2;

    fn local_edges() -> &'static [[usize; 2]] {
        &[[0, 1], [1, 2], [2, 0]]
    }
}

/// Connectivity of a triangle embedded in 3D, the boundary facet of a tetrahedron.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tri3FaceConnectivity(pub [usize; 3]);

impl Connectivity for Tri3FaceConnectivity {
    type FaceConnectivity = Segment2Connectivity;

    fn num_faces(&self) -> usize {
        3
    }

    fn get_face_connectivity(&self, index: usize) -> Option<Self::FaceConnectivity> {
        let segment = |i, j| Some(Segment2Connectivity([self.0[i], self.0[j]]));
        match index {
            0 => segment(0, 1),
            1 => segment(1, 2),
            2 => segment(2, 0),
            _ => None,
        }
    }

    fn vertex_indices(&self) -> &[usize] {
        &self.0
    }
}

impl ConnectivityMut for Tri3FaceConnectivity {
    fn vertex_indices_mut(&mut self) -> &mut [usize] {
        &mut self.0
    }
}

/// Connectivity for a Tet4 element.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tet4Connectivity(pub [usize; 4]);

impl Connectivity for Tet4Connectivity {
    type FaceConnectivity = Tri3FaceConnectivity;

    fn num_faces(&self) -> usize {
        4
    }

    fn get_face_connectivity(&self, index: usize) -> Option<Self::FaceConnectivity> {
        let v = &self.0;
        // Faces are ordered such that their normals point outwards for positively oriented tets
        match index {
            0 => Some(Tri3FaceConnectivity([v[0], v[2], v[1]])),
            1 => Some(Tri3FaceConnectivity([v[0], v[1], v[3]])),
            2 => Some(Tri3FaceConnectivity([v[1], v[2], v[3]])),
            3 => Some(Tri3FaceConnectivity([v[0], v[3], v[2]])),
            _ => None,
        }
    }

    fn vertex_indices(&self) -> &[usize] {
        &self.0
    }
}

impl ConnectivityMut for Tet4Connectivity {
    fn vertex_indices_mut(&mut self) -> &mut [usize] {
        &mut self.0
    }
}

impl SimplexConnectivity for Tet4Connectivity {
    const DIM: usize = 3;

    fn local_edges() -> &'static [[usize; 2]] {
        &[[0, 1], [0, 2], [0, 3], [1, 2], [1, 3], [2, 3]]
    }
}
