//! Per-zone evaluation of the constitutive relations and accumulation into nodal fields.
//!
//! A node whose control volume straddles several physical zones receives the volume-weighted
//! contribution of every zone. The weights of a node sum to one over all zones.
use crate::constitutive::{porosity, Constants, SaturationBuffers, SaturationEvaluator};
use crate::mesh::ControlVolumeMesh;
use crate::state::{EdgeFields, NodalFields};
use crate::util::{gather, scatter_add_weighted};
use crate::zone::{PhysicalZone, PhysicalZones};
use crate::Real;
use eyre::eyre;
use itertools::izip;
use log::{debug, trace};
use std::collections::BTreeSet;

/// Faces of a zone together with one of their end nodes, used to scatter nodal relative
/// permeability onto faces.
///
/// Entries are sorted by the zone-local position of the node.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FaceScatterTable {
    /// Position of the node in the zone's node list.
    pub zone_node: Vec<usize>,
    pub edge: Vec<usize>,
    pub face: Vec<usize>,
}

impl FaceScatterTable {
    fn from_entries(mut entries: Vec<(usize, usize, usize)>) -> Self {
        entries.sort_unstable();
        let mut table = Self::default();
        for (zone_node, edge, face) in entries {
            table.zone_node.push(zone_node);
            table.edge.push(edge);
            table.face.push(face);
        }
        table
    }

    pub fn len(&self) -> usize {
        self.face.len()
    }

    pub fn is_empty(&self) -> bool {
        self.face.is_empty()
    }
}

/// The nodes and faces belonging to a single physical zone.
#[derive(Clone, Debug, PartialEq)]
pub struct ZoneTable<T> {
    pub tag: usize,
    pub zone: PhysicalZone<T>,
    /// Nodes whose control volume intersects the zone, ascending.
    pub nodes: Vec<usize>,
    /// Fraction of each node's control volume lying inside the zone.
    pub weights: Vec<T>,
    /// Interior faces of the zone with their front node.
    pub front: FaceScatterTable,
    /// Interior faces of the zone with their back node.
    pub back: FaceScatterTable,
}

/// Zone tables of every physical zone present in a mesh, in ascending tag order.
#[derive(Clone, Debug, PartialEq)]
pub struct ZoneTables<T> {
    tables: Vec<ZoneTable<T>>,
}

impl<T: Real> ZoneTables<T> {
    /// Builds the tables for the zones present in the mesh.
    ///
    /// Fails if an element carries a physical tag without a configured zone.
    pub fn build(mesh: &impl ControlVolumeMesh<T>, zones: &PhysicalZones<T>) -> eyre::Result<Self> {
        let mut present_tags = BTreeSet::new();
        for element in 0..mesh.num_elements() {
            let tag = mesh.element_physical_tag(element);
            zones
                .get(tag)
                .map_err(|err| eyre!("element {} cannot be assigned a zone: {}", element, err))?;
            present_tags.insert(tag);
        }

        let mut tables = Vec::with_capacity(present_tags.len());
        for tag in present_tags {
            let zone = *zones.get(tag)?;
            let mut nodes = Vec::new();
            let mut weights = Vec::new();
            let mut zone_position = vec![None; mesh.num_nodes()];
            for node in 0..mesh.num_nodes() {
                let cv_volume = mesh.cv_volume(node);
                if cv_volume <= T::zero() {
                    continue;
                }
                let zone_volume = mesh
                    .node_scvs(node)
                    .iter()
                    .filter(|scv| mesh.element_physical_tag(scv.element) == tag)
                    .fold(T::zero(), |v, scv| v + scv.volume);
                if zone_volume > T::zero() {
                    zone_position[node] = Some(nodes.len());
                    nodes.push(node);
                    weights.push(zone_volume / cv_volume);
                }
            }

            let mut front = Vec::new();
            let mut back = Vec::new();
            for face_idx in mesh.interior_cv_faces() {
                let face = mesh.cv_face(face_idx);
                if mesh.element_physical_tag(face.element) != tag {
                    continue;
                }
                let edge = face
                    .edge
                    .ok_or_else(|| eyre!("interior CV face {} has no edge", face_idx))?;
                // The element of the face lies in the zone, so both end nodes are zone nodes
                let (back_pos, front_pos) = zone_position[face.back]
                    .zip(zone_position[face.front])
                    .ok_or_else(|| eyre!("end nodes of CV face {} are not part of zone {}", face_idx, tag))?;
                front.push((front_pos, edge, face_idx));
                back.push((back_pos, edge, face_idx));
            }

            debug!(
                "Zone {}: {} nodes, {} interior CV faces",
                tag,
                nodes.len(),
                front.len()
            );
            tables.push(ZoneTable {
                tag,
                zone,
                nodes,
                weights,
                front: FaceScatterTable::from_entries(front),
                back: FaceScatterTable::from_entries(back),
            });
        }

        Ok(Self { tables })
    }

    pub fn tables(&self) -> &[ZoneTable<T>] {
        &self.tables
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Sum of the zone weights of every node. Equal to one for every node with a non-empty
    /// control volume.
    pub fn node_weight_sums(&self, num_nodes: usize) -> Vec<T> {
        let mut sums = vec![T::zero(); num_nodes];
        for table in &self.tables {
            for (&node, &w) in izip!(&table.nodes, &table.weights) {
                sums[node] += w;
            }
        }
        sums
    }
}

/// Evaluates porosity and saturation zone by zone and accumulates the results.
pub struct ZoneAggregator<T: Real> {
    tables: ZoneTables<T>,
    constants: Constants<T>,
    saturation: Box<dyn SaturationEvaluator<T>>,
}

impl<T: Real> std::fmt::Debug for ZoneAggregator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZoneAggregator")
            .field("tables", &self.tables)
            .field("constants", &self.constants)
            .finish_non_exhaustive()
    }
}

impl<T: Real> ZoneAggregator<T> {
    pub fn new(tables: ZoneTables<T>, constants: Constants<T>, saturation: Box<dyn SaturationEvaluator<T>>) -> Self {
        Self {
            tables,
            constants,
            saturation,
        }
    }

    pub fn tables(&self) -> &ZoneTables<T> {
        &self.tables
    }

    /// Accumulates porosity, saturation, their derivatives and the moisture content of every
    /// zone into `nodal`, and scatters the relative permeability onto interior faces weighted
    /// with the current edge weights.
    ///
    /// Density is not touched.
    ///
    /// # Panics
    /// Panics if a buffer is too short for the indices stored in the zone tables.
    pub fn aggregate(&self, head: &[T], edges: &EdgeFields<T>, nodal: &mut NodalFields<T>, krw_faces: &mut [T]) {
        for field in [&mut nodal.phi, &mut nodal.dphi, &mut nodal.sw, &mut nodal.dsw, &mut nodal.theta] {
            field.fill(T::zero());
        }
        krw_faces.fill(T::zero());

        for table in &self.tables.tables {
            let n = table.nodes.len();
            let mut h = vec![T::zero(); n];
            gather(head, &table.nodes, &mut h);

            let mut phi = vec![T::zero(); n];
            let mut dphi = vec![T::zero(); n];
            porosity(&h, &mut phi, &mut dphi, &table.zone, &self.constants);

            let mut sw = vec![T::zero(); n];
            let mut dsw = vec![T::zero(); n];
            let mut krw = vec![T::zero(); n];
            self.saturation.evaluate(
                &table.zone.van_genuchten(),
                &h,
                SaturationBuffers {
                    sw: &mut sw,
                    dsw: &mut dsw,
                    krw: &mut krw,
                },
            );
            let theta: Vec<T> = izip!(&sw, &phi).map(|(&s, &p)| s * p).collect();

            scatter_add_weighted(&mut nodal.phi, &table.nodes, &table.weights, &phi);
            scatter_add_weighted(&mut nodal.dphi, &table.nodes, &table.weights, &dphi);
            scatter_add_weighted(&mut nodal.sw, &table.nodes, &table.weights, &sw);
            scatter_add_weighted(&mut nodal.dsw, &table.nodes, &table.weights, &dsw);
            scatter_add_weighted(&mut nodal.theta, &table.nodes, &table.weights, &theta);

            for (side, weights) in [(&table.front, &edges.weight_front), (&table.back, &edges.weight_back)] {
                for (&zone_node, &edge, &face) in izip!(&side.zone_node, &side.edge, &side.face) {
                    krw_faces[face] += krw[zone_node] * weights[edge];
                }
            }
            trace!("Aggregated zone {} over {} nodes", table.tag, n);
        }
    }
}
