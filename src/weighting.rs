//! Spatial weighting of edges.
//!
//! Face quantities that depend on the state of the fluid (density and relative permeability)
//! are blended from the two end nodes of the face's edge. The blending weights are updated at
//! the end of every evaluation from the edge fluxes.
use crate::halo::{ExchangeHandle, HaloExchange};
use crate::interpolation::FluxAveragingOperator;
use crate::mesh::{ControlVolumeMesh, EdgeNodes};
use crate::state::{ControlVolumeFields, EdgeFields};
use crate::Real;
use eyre::eyre;
use log::{debug, trace};
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};

/// How edge weights are computed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpatialWeighting {
    /// The upstream node receives weight one.
    #[default]
    Upwind,
    /// Both nodes receive weight one half.
    Averaging,
    /// Flux-limited blend between upwinding and averaging.
    VanLeer,
}

/// The Van Leer limiter `sigma(r)` for the ratio `r = q2up / qup` of the flux entering the
/// upstream control volume to the flux along the edge.
///
/// Returns 1 for a vanishing edge flux and saturates at 2 for `r > 1e10`.
#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
pub fn van_leer_sigma<T: Real>(qup: T, q2up: T) -> T {
    if qup == 0.0 {
        return 1.0;
    }
    let r = q2up / qup;
    if r > 1e10 {
        2.0
    } else {
        (r + r.abs()) / (1.0 + r.abs())
    }
}

/// Computes edge fluxes, upstream directions and edge weights.
#[derive(Clone, Debug)]
pub struct SpatialWeightingEngine<T> {
    mode: SpatialWeighting,
    averaging: FluxAveragingOperator<T>,
    edges: Vec<EdgeNodes>,
    /// Edges with at least one owned end node.
    local_edges: Vec<usize>,
    /// Boundary faces of owned nodes as `(face, node)` pairs.
    local_boundary_faces: Vec<(usize, usize)>,
    num_local_nodes: usize,
    cv_flux_handle: Option<ExchangeHandle>,
}

impl<T: Real> SpatialWeightingEngine<T> {
    /// Sets up the engine, registering the control volume flux with the exchange when the
    /// Van Leer limiter is used.
    pub fn new<E>(mesh: &impl ControlVolumeMesh<T>, mode: SpatialWeighting, exchange: &mut E) -> eyre::Result<Self>
    where
        E: HaloExchange<T> + ?Sized,
    {
        let averaging = FluxAveragingOperator::build(mesh)?;
        let edges: Vec<EdgeNodes> = (0..mesh.num_edges()).map(|e| mesh.edge_nodes(e)).collect();
        let local_edges = edges
            .iter()
            .enumerate()
            .filter(|(_, edge)| mesh.is_local_node(edge.back) || mesh.is_local_node(edge.front))
            .map(|(idx, _)| idx)
            .collect();
        let local_boundary_faces = mesh
            .boundary_cv_faces()
            .map(|f| (f, mesh.cv_face(f).back))
            .filter(|&(_, node)| mesh.is_local_node(node))
            .collect();
        let cv_flux_handle = match mode {
            SpatialWeighting::VanLeer => Some(
                exchange
                    .register("cv_flux", mesh.num_nodes())
                    .map_err(|err| eyre!("failed to register control volume flux for exchange: {}", err))?,
            ),
            _ => None,
        };

        Ok(Self {
            mode,
            averaging,
            edges,
            local_edges,
            local_boundary_faces,
            num_local_nodes: mesh.num_local_nodes(),
            cv_flux_handle,
        })
    }

    pub fn mode(&self) -> SpatialWeighting {
        self.mode
    }

    pub fn flux_averaging(&self) -> &FluxAveragingOperator<T> {
        &self.averaging
    }

    /// Updates edge fluxes, directions and weights from the volumetric face fluxes.
    ///
    /// With the Van Leer limiter, control volume fluxes are exchanged with neighbouring
    /// partitions, and only edges with an owned end node are updated.
    pub fn update<E>(
        &self,
        qdotn: &[T],
        edge_fields: &mut EdgeFields<T>,
        cv_fields: &mut ControlVolumeFields<T>,
        exchange: &mut E,
    ) -> eyre::Result<()>
    where
        E: HaloExchange<T> + ?Sized,
    {
        self.averaging.apply(qdotn, &mut edge_fields.flux);
        match self.mode {
            SpatialWeighting::Upwind => {
                self.set_upwind_directions(edge_fields);
                self.upwind_weights(edge_fields);
            }
            SpatialWeighting::Averaging => {
                self.set_upwind_directions(edge_fields);
                let half = T::from_f64(0.5).expect("Literal must fit in T");
                edge_fields.weight_back.fill(half);
                edge_fields.weight_front.fill(half);
            }
            SpatialWeighting::VanLeer => self.van_leer_weights(qdotn, edge_fields, cv_fields, exchange)?,
        }
        trace!("Updated {:?} weights of {} edges", self.mode, self.edges.len());
        Ok(())
    }

    /// A negative flux makes the front node upstream, otherwise the back node is upstream.
    fn set_upwind_directions(&self, edge_fields: &mut EdgeFields<T>) {
        for (e, edge) in self.edges.iter().enumerate() {
            let (up, down) = if edge_fields.flux[e] < T::zero() {
                (edge.front, edge.back)
            } else {
                (edge.back, edge.front)
            };
            edge_fields.up[e] = up;
            edge_fields.down[e] = down;
        }
    }

    fn upwind_weights(&self, edge_fields: &mut EdgeFields<T>) {
        for e in 0..self.edges.len() {
            let back_is_upstream = edge_fields.flux[e] >= T::zero();
            let (w_back, w_front) = if back_is_upstream {
                (T::one(), T::zero())
            } else {
                (T::zero(), T::one())
            };
            edge_fields.weight_back[e] = w_back;
            edge_fields.weight_front[e] = w_front;
        }
    }

    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    fn van_leer_weights<E>(
        &self,
        qdotn: &[T],
        edge_fields: &mut EdgeFields<T>,
        cv_fields: &mut ControlVolumeFields<T>,
        exchange: &mut E,
    ) -> eyre::Result<()>
    where
        E: HaloExchange<T> + ?Sized,
    {
        // A positive flux makes the back node upstream
        for (e, edge) in self.edges.iter().enumerate() {
            let (up, down) = if edge_fields.flux[e] > 0.0 {
                (edge.back, edge.front)
            } else {
                (edge.front, edge.back)
            };
            edge_fields.up[e] = up;
            edge_fields.down[e] = down;
        }

        // Largest flux entering each owned control volume, starting from the boundary inflow
        cv_fields.flux.fill(0.0);
        for (node, up) in cv_fields.up.iter_mut().enumerate() {
            *up = node;
        }
        for &(face, node) in &self.local_boundary_faces {
            cv_fields.flux[node] -= qdotn[face];
        }
        for &e in &self.local_edges {
            let down = edge_fields.down[e];
            let q = edge_fields.flux[e].abs();
            if down < self.num_local_nodes && q > cv_fields.flux[down] {
                cv_fields.flux[down] = q;
                cv_fields.up[down] = edge_fields.up[e];
            }
        }
        let num_self_upwind = (0..self.num_local_nodes)
            .filter(|&node| cv_fields.up[node] == node)
            .count();
        if num_self_upwind > 0 {
            debug!("{} control volumes have no upstream neighbour", num_self_upwind);
        }

        let handle = self
            .cv_flux_handle
            .as_ref()
            .ok_or_else(|| eyre!("control volume flux was not registered for exchange"))?;
        debug!("Exchanging control volume flux {}", handle);
        exchange.exchange(handle, &mut cv_fields.flux)?;

        for &e in &self.local_edges {
            let flux = edge_fields.flux[e];
            let qup = flux.abs();
            let q2up = cv_fields.flux[edge_fields.up[e]];
            let sigma = van_leer_sigma(qup, q2up);
            let (w_back, w_front) = if flux > 0.0 {
                (sigma / 2.0, 1.0 - sigma / 2.0)
            } else {
                (1.0 - sigma / 2.0, sigma / 2.0)
            };
            edge_fields.weight_back[e] = w_back;
            edge_fields.weight_front[e] = w_front;
        }
        Ok(())
    }
}
