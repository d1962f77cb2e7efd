//! Darcy and mass fluxes across control volume faces.
use crate::boundary::{BoundaryCondition, BoundaryConditions, BoundaryKind};
use crate::constitutive::{density, Constants};
use crate::mesh::{ControlVolumeMesh, EdgeNodes};
use crate::state::EdgeFields;
use crate::util::vertical_unit_vector;
use crate::zone::PhysicalZones;
use crate::Real;
use eyre::eyre;
use itertools::izip;
use log::{trace, warn};
use nalgebra::Vector3;
use std::collections::BTreeSet;

/// A boundary CV face and the condition applied to it.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundaryFace<T> {
    pub face: usize,
    /// The node whose control volume the face bounds.
    pub node: usize,
    pub tag: usize,
    pub normal: Vector3<T>,
    pub area: T,
    pub condition: BoundaryCondition<T>,
}

/// Face geometry and material data needed to evaluate fluxes.
#[derive(Clone, Debug)]
pub struct FluxEvaluator<T> {
    constants: Constants<T>,
    vertical: Vector3<T>,
    /// Negated saturated conductivity of the zone of each interior face.
    conductivity: Vec<Vector3<T>>,
    normals: Vec<Vector3<T>>,
    /// End nodes and edge of each interior face.
    face_edges: Vec<(EdgeNodes, usize)>,
    boundary_faces: Vec<BoundaryFace<T>>,
}

impl<T: Real> FluxEvaluator<T> {
    /// Fails if a face lies in an element without a configured zone, or if a boundary face
    /// carries a tag without a boundary condition.
    pub fn build(
        mesh: &impl ControlVolumeMesh<T>,
        zones: &PhysicalZones<T>,
        boundary_conditions: &BoundaryConditions<T>,
        constants: Constants<T>,
    ) -> eyre::Result<Self> {
        let num_interior = mesh.num_interior_cv_faces();
        let mut conductivity = Vec::with_capacity(num_interior);
        let mut normals = Vec::with_capacity(num_interior);
        let mut face_edges = Vec::with_capacity(num_interior);
        for face_idx in mesh.interior_cv_faces() {
            let face = mesh.cv_face(face_idx);
            let zone = zones.get(mesh.element_physical_tag(face.element))?;
            let edge = face
                .edge
                .ok_or_else(|| eyre!("interior CV face {} has no edge", face_idx))?;
            conductivity.push(-zone.conductivity());
            normals.push(face.normal);
            face_edges.push((
                EdgeNodes {
                    back: face.back,
                    front: face.front,
                },
                edge,
            ));
        }

        let mut boundary_faces = Vec::with_capacity(mesh.num_cv_faces() - num_interior);
        let mut non_overriding_tags = BTreeSet::new();
        for face_idx in mesh.boundary_cv_faces() {
            let face = mesh.cv_face(face_idx);
            let tag = face
                .boundary_tag
                .ok_or_else(|| eyre!("boundary CV face {} has no boundary tag", face_idx))?;
            let condition = boundary_conditions.get(tag)?.clone();
            if matches!(condition.kind(), BoundaryKind::Dirichlet | BoundaryKind::Hydrostatic) {
                non_overriding_tags.insert(tag);
            }
            boundary_faces.push(BoundaryFace {
                face: face_idx,
                node: face.back,
                tag,
                normal: face.normal,
                area: face.area,
                condition,
            });
        }
        for tag in non_overriding_tags {
            warn!(
                "Boundary tag {} prescribes head, its boundary CV faces carry no flux of their own",
                tag
            );
        }

        Ok(Self {
            constants,
            vertical: vertical_unit_vector(mesh.dim()),
            conductivity,
            normals,
            face_edges,
            boundary_faces,
        })
    }

    pub fn boundary_faces(&self) -> &[BoundaryFace<T>] {
        &self.boundary_faces
    }

    pub fn num_interior_faces(&self) -> usize {
        self.conductivity.len()
    }

    /// Fluid density at interior faces, from the interpolated face head.
    pub fn face_density(&self, h_faces: &[T], rho_faces: &mut [T]) {
        let n = self.num_interior_faces();
        density(&h_faces[..n], &mut rho_faces[..n], &self.constants);
    }

    /// Blends nodal density onto interior faces with the weights of each face's edge.
    pub fn blend_density(&self, rho: &[T], edges: &EdgeFields<T>, rho_lim: &mut [T]) {
        for ((nodes, edge), r) in izip!(&self.face_edges, rho_lim.iter_mut()) {
            *r = rho[nodes.back] * edges.weight_back[*edge] + rho[nodes.front] * edges.weight_front[*edge];
        }
    }

    /// Computes the volumetric flux `qdotn` and mass flux of every face at time `t`.
    ///
    /// Interior fluxes follow Darcy's law from the face head gradient, scaled by the blended
    /// relative permeability. Boundary fluxes are prescribed by the boundary conditions, and
    /// boundary inflow carries the density of the boundary node while outflow carries the
    /// reference density.
    ///
    /// # Panics
    /// Panics if any buffer is shorter than the number of faces.
    pub fn compute(&self, t: T, inputs: FluxInputs<T>, qdotn: &mut [T], mass_flux: &mut [T]) {
        let FluxInputs {
            grad_h,
            krw_lim,
            rho_lim,
            rho,
        } = inputs;
        let [gx, gy, gz] = grad_h;
        for (f, (k, n)) in self.conductivity.iter().zip(&self.normals).enumerate() {
            let gradient = Vector3::new(gx[f], gy[f], gz[f]) + self.vertical;
            let q = k.component_mul(&gradient);
            let flux = q.dot(n) * krw_lim[f];
            qdotn[f] = flux;
            mass_flux[f] = rho_lim[f] * flux;
        }

        for bf in &self.boundary_faces {
            let flux = match bf.condition.kind() {
                BoundaryKind::PrescribedFlux | BoundaryKind::Seepage => bf.condition.value(t) * bf.area,
                BoundaryKind::DirectionalFlux => bf.condition.flux(t, &bf.normal) * bf.area,
                BoundaryKind::SeepageShoreline => T::zero(),
                // Boundary faces have no interior gradient
                BoundaryKind::Dirichlet | BoundaryKind::Hydrostatic => T::zero(),
            };
            let face_rho = if flux >= T::zero() {
                self.constants.rho_0
            } else {
                rho[bf.node]
            };
            qdotn[bf.face] = flux;
            mass_flux[bf.face] = face_rho * flux;
        }
        trace!(
            "Computed fluxes of {} interior and {} boundary faces",
            self.num_interior_faces(),
            self.boundary_faces.len()
        );
    }
}

/// Face and node quantities entering the flux computation.
#[derive(Copy, Clone, Debug)]
pub struct FluxInputs<'a, T> {
    /// Components of the head gradient at interior faces.
    pub grad_h: [&'a [T]; 3],
    pub krw_lim: &'a [T],
    pub rho_lim: &'a [T],
    /// Nodal density.
    pub rho: &'a [T],
}
