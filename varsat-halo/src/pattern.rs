use eyre::{bail, ensure};
use serde::{Deserialize, Serialize};

/// The exchange relationship with a single neighbouring partition.
///
/// `send_indices` are owned node indices whose values the neighbour needs, and
/// `receive_indices` are halo node indices filled from the neighbour. The neighbour's
/// `send_indices` towards this partition must list the owning nodes in the same order as
/// our `receive_indices`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NeighbourLink {
    pub rank: usize,
    pub send_indices: Vec<usize>,
    pub receive_indices: Vec<usize>,
}

/// Describes how node vectors of one partition are synchronised with its neighbours.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HaloPattern {
    num_local: usize,
    num_nodes: usize,
    neighbours: Vec<NeighbourLink>,
}

impl HaloPattern {
    /// A pattern without neighbours, in which every node is owned.
    pub fn without_halo(num_nodes: usize) -> Self {
        Self {
            num_local: num_nodes,
            num_nodes,
            neighbours: Vec::new(),
        }
    }

    /// Construct a pattern, validating all indices.
    ///
    /// Neighbour ranks must be distinct, send indices must refer to owned nodes and receive
    /// indices to halo nodes, and no halo node may be received from more than one neighbour.
    pub fn try_new(num_local: usize, num_nodes: usize, mut neighbours: Vec<NeighbourLink>) -> eyre::Result<Self> {
        ensure!(
            num_local <= num_nodes,
            "number of owned nodes ({}) exceeds total number of nodes ({})",
            num_local,
            num_nodes
        );

        neighbours.sort_by_key(|link| link.rank);
        for pair in neighbours.windows(2) {
            if pair[0].rank == pair[1].rank {
                bail!("neighbour rank {} appears more than once in halo pattern", pair[0].rank);
            }
        }

        let mut received = vec![false; num_nodes - num_local];
        for link in &neighbours {
            if let Some(&idx) = link.send_indices.iter().find(|&&idx| idx >= num_local) {
                bail!("send index {} towards rank {} is not an owned node", idx, link.rank);
            }
            for &idx in &link.receive_indices {
                ensure!(
                    idx >= num_local && idx < num_nodes,
                    "receive index {} from rank {} is not a halo node",
                    idx,
                    link.rank
                );
                let slot = &mut received[idx - num_local];
                ensure!(!*slot, "halo node {} is received from more than one neighbour", idx);
                *slot = true;
            }
        }

        Ok(Self {
            num_local,
            num_nodes,
            neighbours,
        })
    }

    pub fn num_local(&self) -> usize {
        self.num_local
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    pub fn num_halo(&self) -> usize {
        self.num_nodes - self.num_local
    }

    /// Neighbour links, sorted by rank.
    pub fn neighbours(&self) -> &[NeighbourLink] {
        &self.neighbours
    }

    pub fn neighbour(&self, rank: usize) -> Option<&NeighbourLink> {
        self.neighbours.iter().find(|link| link.rank == rank)
    }
}
