//! The flow evaluation pipeline.
use crate::aggregate::{ZoneAggregator, ZoneTables};
use crate::boundary::{BoundaryCondition, BoundaryConditions};
use crate::config::SimulationConfig;
use crate::constitutive::{density, Constants};
use crate::flux::{FluxEvaluator, FluxInputs};
use crate::halo::HaloExchange;
use crate::interpolation::InterpolationOperator;
use crate::mesh::ControlVolumeMesh;
use crate::state::{ControlVolumeFields, EdgeFields, FaceFields, FlowState, NodalFields};
use crate::util::elevation;
use crate::weighting::{SpatialWeighting, SpatialWeightingEngine};
use crate::Real;
use eyre::{ensure, eyre};
use itertools::izip;
use log::{info, trace};
use nalgebra::Point3;

/// Evaluates every per-node, per-face and per-edge quantity of variably saturated flow from
/// nodal head.
///
/// All operators and tables are built once by [`FlowEvaluator::new`]. The evaluator itself is
/// immutable afterwards; the results of an evaluation, including the edge weights carried over
/// to the next evaluation, live in a caller-owned [`FlowState`].
#[derive(Debug)]
pub struct FlowEvaluator<T: Real> {
    dim: usize,
    num_nodes: usize,
    num_local_nodes: usize,
    num_edges: usize,
    num_cv_faces: usize,
    num_interior_cv_faces: usize,
    constants: Constants<T>,
    positions: Vec<Point3<T>>,
    cv_volumes: Vec<T>,
    boundary_conditions: BoundaryConditions<T>,
    /// First head-prescribing boundary tag of every node that has one.
    dirichlet_tags: Vec<Option<usize>>,
    interpolation: InterpolationOperator<T>,
    aggregator: ZoneAggregator<T>,
    flux: FluxEvaluator<T>,
    weighting: SpatialWeightingEngine<T>,
}

impl<T: Real> FlowEvaluator<T> {
    /// Builds the evaluator for a mesh partition.
    ///
    /// Registers the vectors exchanged during evaluation with `exchange`, so every partition
    /// must construct its evaluator with the same configuration.
    pub fn new<E>(mesh: &impl ControlVolumeMesh<T>, config: &SimulationConfig<T>, exchange: &mut E) -> eyre::Result<Self>
    where
        E: HaloExchange<T> + ?Sized,
    {
        config.validate()?;
        let pattern = exchange.pattern();
        ensure!(
            pattern.num_nodes() == mesh.num_nodes() && pattern.num_local() == mesh.num_local_nodes(),
            "halo pattern with {} nodes ({} owned) does not match mesh with {} nodes ({} owned)",
            pattern.num_nodes(),
            pattern.num_local(),
            mesh.num_nodes(),
            mesh.num_local_nodes()
        );
        ensure!(mesh.dim() == 2 || mesh.dim() == 3, "unsupported mesh dimension {}", mesh.dim());

        let interpolation = InterpolationOperator::build(mesh)?;
        let tables = ZoneTables::build(mesh, &config.zones)?;
        let num_zones = tables.len();
        let aggregator = ZoneAggregator::new(tables, config.constants, config.saturation_backend.evaluator());
        let flux = FluxEvaluator::build(mesh, &config.zones, &config.boundary_conditions, config.constants)?;
        let weighting = SpatialWeightingEngine::new(mesh, config.spatial_weighting, exchange)?;

        let mut dirichlet_tags = Vec::with_capacity(mesh.num_nodes());
        for node in 0..mesh.num_nodes() {
            let mut tag = None;
            for &t in mesh.node_boundary_tags(node) {
                let condition = config
                    .boundary_conditions
                    .get(t)
                    .map_err(|err| eyre!("boundary node {} cannot be assigned a condition: {}", node, err))?;
                if condition.is_dirichlet() {
                    tag = Some(t);
                    break;
                }
            }
            dirichlet_tags.push(tag);
        }

        info!(
            "Set up {}-D flow evaluation: {} nodes ({} owned), {} edges, {} CV faces ({} interior), {} zones, {:?} weighting",
            mesh.dim(),
            mesh.num_nodes(),
            mesh.num_local_nodes(),
            mesh.num_edges(),
            mesh.num_cv_faces(),
            mesh.num_interior_cv_faces(),
            num_zones,
            config.spatial_weighting
        );

        Ok(Self {
            dim: mesh.dim(),
            num_nodes: mesh.num_nodes(),
            num_local_nodes: mesh.num_local_nodes(),
            num_edges: mesh.num_edges(),
            num_cv_faces: mesh.num_cv_faces(),
            num_interior_cv_faces: mesh.num_interior_cv_faces(),
            constants: config.constants,
            positions: (0..mesh.num_nodes()).map(|n| mesh.node_position(n)).collect(),
            cv_volumes: (0..mesh.num_nodes()).map(|n| mesh.cv_volume(n)).collect(),
            boundary_conditions: config.boundary_conditions.clone(),
            dirichlet_tags,
            interpolation,
            aggregator,
            flux,
            weighting,
        })
    }

    /// A state with buffers sized for this evaluator.
    pub fn create_state(&self) -> FlowState<T> {
        FlowState {
            nodes: NodalFields::new(self.num_nodes),
            faces: FaceFields::new(self.num_cv_faces),
            edges: EdgeFields::new(self.num_edges),
            cvs: ControlVolumeFields::new(self.num_nodes),
        }
    }

    /// Evaluates all fields of `state` for the nodal head at time `t`.
    ///
    /// The edge weights stored in `state` on entry are used to blend face density and relative
    /// permeability, and are replaced by the weights computed from the new fluxes.
    ///
    /// Fails if `head` does not hold a value for every node, or if the halo exchange fails.
    ///
    /// # Panics
    /// Panics if the buffers of `state` were not sized for the mesh of this evaluator.
    pub fn evaluate<E>(&self, t: T, head: &[T], state: &mut FlowState<T>, exchange: &mut E) -> eyre::Result<()>
    where
        E: HaloExchange<T> + ?Sized,
    {
        ensure!(
            head.len() == self.num_nodes,
            "head vector of length {} does not match number of nodes {}",
            head.len(),
            self.num_nodes
        );
        state.assert_dimensions(self.num_nodes, self.num_cv_faces, self.num_edges);
        let FlowState { nodes, faces, edges, cvs } = state;
        let n_interior = self.num_interior_cv_faces;

        {
            let [gx, gy, gz] = &mut faces.grad_h;
            self.interpolation.interpolate(
                head,
                &mut faces.h[..n_interior],
                [&mut gx[..n_interior], &mut gy[..n_interior], &mut gz[..n_interior]],
            );
        }
        trace!("Interpolated head onto {} faces", n_interior);

        density(head, &mut nodes.rho, &self.constants);
        self.aggregator
            .aggregate(head, edges, nodes, &mut faces.krw_lim[..n_interior]);
        self.flux.face_density(&faces.h, &mut faces.rho);
        self.flux
            .blend_density(&nodes.rho, edges, &mut faces.rho_lim[..n_interior]);

        let [gx, gy, gz] = &faces.grad_h;
        let inputs = FluxInputs {
            grad_h: [gx.as_slice(), gy.as_slice(), gz.as_slice()],
            krw_lim: &faces.krw_lim,
            rho_lim: &faces.rho_lim,
            rho: &nodes.rho,
        };
        self.flux
            .compute(t, inputs, &mut faces.qdotn, &mut faces.mass_flux);

        self.weighting.update(&faces.qdotn, edges, cvs, exchange)?;

        self.derivative_coefficients(nodes);
        trace!("Finished flow evaluation at t = {:?}", t);
        Ok(())
    }

    /// `ahh = rho phi dSw + rho Sw dphi + rho_0^2 g beta phi Sw` for owned nodes.
    fn derivative_coefficients(&self, nodes: &mut NodalFields<T>) {
        let c = self.constants.density_gradient();
        let n = self.num_local_nodes;
        for (ahh, &rho, &phi, &dphi, &sw, &dsw) in izip!(
            &mut nodes.ahh[..n],
            &nodes.rho[..n],
            &nodes.phi[..n],
            &nodes.dphi[..n],
            &nodes.sw[..n],
            &nodes.dsw[..n]
        ) {
            *ahh = rho * phi * dsw + rho * sw * dphi + c * phi * sw;
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    pub fn num_local_nodes(&self) -> usize {
        self.num_local_nodes
    }

    pub fn constants(&self) -> &Constants<T> {
        &self.constants
    }

    pub fn spatial_weighting(&self) -> SpatialWeighting {
        self.weighting.mode()
    }

    pub fn interpolation(&self) -> &InterpolationOperator<T> {
        &self.interpolation
    }

    pub fn zone_tables(&self) -> &ZoneTables<T> {
        self.aggregator.tables()
    }

    pub fn flux_evaluator(&self) -> &FluxEvaluator<T> {
        &self.flux
    }

    /// Owned nodes whose head is prescribed, with the boundary tag prescribing it.
    pub fn dirichlet_nodes(&self) -> Vec<(usize, usize)> {
        self.dirichlet_tags[..self.num_local_nodes]
            .iter()
            .enumerate()
            .filter_map(|(node, tag)| tag.map(|tag| (node, tag)))
            .collect()
    }

    fn dirichlet_condition(&self, node: usize) -> Option<&BoundaryCondition<T>> {
        let tag = self.dirichlet_tags.get(node).copied().flatten()?;
        self.boundary_conditions.get(tag).ok()
    }

    /// The head prescribed at `node` at time `t`, if any of its boundary tags prescribes one.
    pub fn dirichlet_head(&self, t: T, node: usize) -> Option<T> {
        let condition = self.dirichlet_condition(node)?;
        condition.prescribed_head(t, elevation(&self.positions[node], self.dim))
    }

    /// Initial head of every node: the prescribed head where one applies, otherwise `fallback`
    /// evaluated at the node position.
    pub fn initial_head(&self, t: T, fallback: impl Fn(&Point3<T>) -> T) -> Vec<T> {
        (0..self.num_nodes)
            .map(|node| {
                self.dirichlet_head(t, node)
                    .unwrap_or_else(|| fallback(&self.positions[node]))
            })
            .collect()
    }

    /// Total fluid mass `sum(V rho theta)` in the owned control volumes.
    pub fn fluid_mass(&self, state: &FlowState<T>) -> T {
        let n = self.num_local_nodes;
        izip!(&self.cv_volumes[..n], &state.nodes.rho[..n], &state.nodes.theta[..n])
            .fold(T::zero(), |mass, (&v, &rho, &theta)| mass + v * rho * theta)
    }

    /// Net mass flux through the boundary faces of owned nodes, positive for outflow.
    pub fn boundary_mass_flux(&self, state: &FlowState<T>) -> T {
        self.flux
            .boundary_faces()
            .iter()
            .filter(|bf| bf.node < self.num_local_nodes)
            .fold(T::zero(), |total, bf| total + state.faces.mass_flux[bf.face])
    }

    /// The storage term `ahh * dh/dt` of every owned node.
    ///
    /// # Panics
    /// Panics if `head_dot` holds fewer values than there are owned nodes.
    pub fn accumulation(&self, state: &FlowState<T>, head_dot: &[T]) -> Vec<T> {
        let n = self.num_local_nodes;
        assert!(head_dot.len() >= n, "head derivative must hold a value for every owned node");
        izip!(&state.nodes.ahh[..n], &head_dot[..n])
            .map(|(&ahh, &dh)| ahh * dh)
            .collect()
    }
}
