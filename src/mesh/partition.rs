use super::{DualMesh, SimplexMesh};
use crate::connectivity::{Connectivity, ConnectivityMut, SimplexConnectivity};
use crate::halo::{HaloPattern, NeighbourLink};
use crate::Real;
use eyre::{bail, ensure};
use log::info;
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;

/// The part of a primal mesh needed by a single partition.
///
/// The local mesh contains every cell touching a node owned by the partition. Owned nodes come
/// first in local numbering, followed by halo nodes, both in ascending global order.
#[derive(Clone, Debug)]
pub struct Partition<T: Real, C: Connectivity> {
    pub rank: usize,
    pub mesh: SimplexMesh<T, C>,
    pub num_local_nodes: usize,
    /// Global index of every local node.
    pub global_nodes: Vec<usize>,
    pub pattern: HaloPattern,
}

impl<T, C> Partition<T, C>
where
    T: Real,
    C: SimplexConnectivity,
{
    pub fn dual_mesh(&self) -> eyre::Result<DualMesh<T>> {
        DualMesh::with_local_nodes(&self.mesh, self.num_local_nodes)
    }
}

/// Splits a mesh into partitions given the owning partition of every node.
///
/// Tagged boundary faces are kept in every partition containing a cell they belong to.
pub fn partition_by_node_owner<T, C>(
    mesh: &SimplexMesh<T, C>,
    owner: &[usize],
    num_partitions: usize,
) -> eyre::Result<Vec<Partition<T, C>>>
where
    T: Real,
    C: SimplexConnectivity,
    C::FaceConnectivity: ConnectivityMut,
{
    mesh.validate()?;
    ensure!(
        owner.len() == mesh.vertices().len(),
        "got {} node owners for {} vertices",
        owner.len(),
        mesh.vertices().len()
    );
    if let Some((node, &rank)) = owner.iter().enumerate().find(|&(_, &rank)| rank >= num_partitions) {
        bail!("node {} is owned by rank {}, but there are {} partitions", node, rank, num_partitions);
    }

    let cells_per_partition: Vec<Vec<usize>> = (0..num_partitions)
        .map(|rank| {
            mesh.connectivity()
                .iter()
                .enumerate()
                .filter(|(_, cell)| cell.vertex_indices().iter().any(|&v| owner[v] == rank))
                .map(|(idx, _)| idx)
                .collect()
        })
        .collect();

    let halo_per_partition: Vec<BTreeSet<usize>> = cells_per_partition
        .iter()
        .enumerate()
        .map(|(rank, cells)| {
            cells
                .iter()
                .flat_map(|&c| mesh.connectivity()[c].vertex_indices().iter().copied())
                .filter(|&v| owner[v] != rank)
                .collect()
        })
        .collect();

    let mut partitions = Vec::with_capacity(num_partitions);
    for rank in 0..num_partitions {
        let owned: Vec<usize> = (0..owner.len()).filter(|&v| owner[v] == rank).collect();
        let halo = &halo_per_partition[rank];
        let global_nodes: Vec<usize> = owned.iter().chain(halo.iter()).copied().collect();
        let local_index: FxHashMap<usize, usize> = global_nodes
            .iter()
            .enumerate()
            .map(|(local, &global)| (global, local))
            .collect();

        let cells = &cells_per_partition[rank];
        let vertices = global_nodes.iter().map(|&v| mesh.vertices()[v]).collect();
        let connectivity = cells
            .iter()
            .map(|&c| {
                let mut cell = mesh.connectivity()[c].clone();
                for v in cell.vertex_indices_mut() {
                    *v = local_index[&*v];
                }
                cell
            })
            .collect();
        let cell_tags = cells.iter().map(|&c| mesh.cell_tags()[c]).collect();
        let mut local_mesh = SimplexMesh::from_vertices_and_connectivity(vertices, connectivity).with_cell_tags(cell_tags)?;

        for (face, tag) in mesh.boundary_faces() {
            let belongs_to_partition = cells
                .iter()
                .any(|&c| mesh.connectivity()[c].contains_face(face));
            if belongs_to_partition {
                let mut local_face = face.clone();
                for v in local_face.vertex_indices_mut() {
                    *v = local_index[&*v];
                }
                local_mesh.add_boundary_face(local_face, *tag);
            }
        }

        let neighbours = (0..num_partitions)
            .filter(|&other| other != rank)
            .filter_map(|other| {
                let send_indices: Vec<usize> = owned
                    .iter()
                    .filter(|&&v| halo_per_partition[other].contains(&v))
                    .map(|v| local_index[v])
                    .collect();
                let receive_indices: Vec<usize> = halo
                    .iter()
                    .filter(|&&v| owner[v] == other)
                    .map(|v| local_index[v])
                    .collect();
                (!send_indices.is_empty() || !receive_indices.is_empty()).then(|| NeighbourLink {
                    rank: other,
                    send_indices,
                    receive_indices,
                })
            })
            .collect();
        let pattern = HaloPattern::try_new(owned.len(), global_nodes.len(), neighbours)?;

        info!(
            "Partition {}: {} owned nodes, {} halo nodes, {} cells, {} neighbours",
            rank,
            owned.len(),
            halo.len(),
            cells.len(),
            pattern.neighbours().len()
        );

        partitions.push(Partition {
            rank,
            mesh: local_mesh,
            num_local_nodes: owned.len(),
            global_nodes,
            pattern,
        });
    }
    Ok(partitions)
}
