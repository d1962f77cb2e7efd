//! Caller-owned buffers holding the result of a flow evaluation.
use crate::mesh::ControlVolumeMesh;
use crate::Real;

/// Per-node fields. Only entries of owned nodes are meaningful after an evaluation, although
/// constitutive quantities are evaluated for halo nodes as well.
#[derive(Clone, Debug, PartialEq)]
pub struct NodalFields<T> {
    /// Fluid density.
    pub rho: Vec<T>,
    /// Porosity.
    pub phi: Vec<T>,
    pub dphi: Vec<T>,
    /// Saturation.
    pub sw: Vec<T>,
    pub dsw: Vec<T>,
    /// Moisture content `sw * phi`.
    pub theta: Vec<T>,
    /// Coefficient of the head time derivative in the mass balance.
    pub ahh: Vec<T>,
}

impl<T: Real> NodalFields<T> {
    pub fn new(num_nodes: usize) -> Self {
        let zeros = vec![T::zero(); num_nodes];
        Self {
            rho: zeros.clone(),
            phi: zeros.clone(),
            dphi: zeros.clone(),
            sw: zeros.clone(),
            dsw: zeros.clone(),
            theta: zeros.clone(),
            ahh: zeros,
        }
    }

    pub fn len(&self) -> usize {
        self.rho.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rho.is_empty()
    }
}

/// Per-CV-face fields, indexed by CV face.
///
/// Head, head gradient, density and the blended quantities are only defined on interior faces.
/// Fluxes are defined on all faces.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceFields<T> {
    pub h: Vec<T>,
    /// Components of the head gradient.
    pub grad_h: [Vec<T>; 3],
    pub rho: Vec<T>,
    /// Density blended from the end nodes of the face's edge with the edge weights.
    pub rho_lim: Vec<T>,
    /// Relative permeability blended from the end nodes with the edge weights.
    pub krw_lim: Vec<T>,
    /// Volumetric flux through the face.
    pub qdotn: Vec<T>,
    /// Mass flux through the face.
    pub mass_flux: Vec<T>,
}

impl<T: Real> FaceFields<T> {
    pub fn new(num_faces: usize) -> Self {
        let zeros = vec![T::zero(); num_faces];
        Self {
            h: zeros.clone(),
            grad_h: [zeros.clone(), zeros.clone(), zeros.clone()],
            rho: zeros.clone(),
            rho_lim: zeros.clone(),
            krw_lim: zeros.clone(),
            qdotn: zeros.clone(),
            mass_flux: zeros,
        }
    }

    pub fn len(&self) -> usize {
        self.qdotn.len()
    }

    pub fn is_empty(&self) -> bool {
        self.qdotn.is_empty()
    }
}

/// Per-edge fields.
#[derive(Clone, Debug, PartialEq)]
pub struct EdgeFields<T> {
    /// Area-averaged flux from the back node towards the front node.
    pub flux: Vec<T>,
    /// Upstream node of each edge.
    pub up: Vec<usize>,
    /// Downstream node of each edge.
    pub down: Vec<usize>,
    pub weight_back: Vec<T>,
    pub weight_front: Vec<T>,
}

impl<T: Real> EdgeFields<T> {
    /// Edge weights start out as an even blend of both end nodes.
    pub fn new(num_edges: usize) -> Self {
        let half = T::from_f64(0.5).expect("Literal must fit in T");
        Self {
            flux: vec![T::zero(); num_edges],
            up: vec![0; num_edges],
            down: vec![0; num_edges],
            weight_back: vec![half; num_edges],
            weight_front: vec![half; num_edges],
        }
    }

    pub fn len(&self) -> usize {
        self.flux.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flux.is_empty()
    }
}

/// Per-control-volume fields of the Van Leer limiter.
#[derive(Clone, Debug, PartialEq)]
pub struct ControlVolumeFields<T> {
    /// Largest flux entering each control volume.
    pub flux: Vec<T>,
    /// The node upstream of each control volume.
    pub up: Vec<usize>,
}

impl<T: Real> ControlVolumeFields<T> {
    pub fn new(num_nodes: usize) -> Self {
        Self {
            flux: vec![T::zero(); num_nodes],
            up: (0..num_nodes).collect(),
        }
    }
}

/// All fields produced by a flow evaluation.
///
/// The edge weights are the only quantities carried over from one evaluation to the next: the
/// weights computed at the end of an evaluation are used to blend face quantities in the next.
#[derive(Clone, Debug, PartialEq)]
pub struct FlowState<T> {
    pub nodes: NodalFields<T>,
    pub faces: FaceFields<T>,
    pub edges: EdgeFields<T>,
    pub cvs: ControlVolumeFields<T>,
}

impl<T: Real> FlowState<T> {
    pub fn new(mesh: &impl ControlVolumeMesh<T>) -> Self {
        Self {
            nodes: NodalFields::new(mesh.num_nodes()),
            faces: FaceFields::new(mesh.num_cv_faces()),
            edges: EdgeFields::new(mesh.num_edges()),
            cvs: ControlVolumeFields::new(mesh.num_nodes()),
        }
    }

    /// # Panics
    /// Panics if the buffers were not sized for a mesh with the given counts.
    pub(crate) fn assert_dimensions(&self, num_nodes: usize, num_faces: usize, num_edges: usize) {
        let n = &self.nodes;
        for field in [&n.rho, &n.phi, &n.dphi, &n.sw, &n.dsw, &n.theta, &n.ahh, &self.cvs.flux] {
            assert_eq!(field.len(), num_nodes, "nodal buffer length must match number of nodes");
        }
        assert_eq!(self.cvs.up.len(), num_nodes, "nodal buffer length must match number of nodes");
        let f = &self.faces;
        let [gx, gy, gz] = &f.grad_h;
        for field in [&f.h, gx, gy, gz, &f.rho, &f.rho_lim, &f.krw_lim, &f.qdotn, &f.mass_flux] {
            assert_eq!(field.len(), num_faces, "face buffer length must match number of CV faces");
        }
        let e = &self.edges;
        for field in [&e.flux, &e.weight_back, &e.weight_front] {
            assert_eq!(field.len(), num_edges, "edge buffer length must match number of edges");
        }
        assert_eq!(e.up.len(), num_edges, "edge buffer length must match number of edges");
        assert_eq!(e.down.len(), num_edges, "edge buffer length must match number of edges");
    }
}
