//! varsat-halo
//! ===========
//!
//! Halo synchronisation of node-based vectors across mesh partitions.
//!
//! Every partition owns the values stored in the leading `num_local` entries of a node vector,
//! while the trailing entries are *halo* copies of values owned by neighbouring partitions.
//! A [`HaloPattern`] records which owned entries each neighbour needs and where the entries
//! received from each neighbour belong. A [`HaloExchange`] moves values according to the
//! pattern.
//!
//! Vectors are registered once and are afterwards referred to by the [`ExchangeHandle`]
//! returned from registration, so that two different quantities can never be routed into
//! each other.

mod pattern;
mod serial;
mod threaded;

pub use pattern::{HaloPattern, NeighbourLink};
pub use serial::SerialExchange;
pub use threaded::{ExchangeHub, ThreadedExchange};

use eyre::ensure;
use std::fmt;

/// Identifies a vector registered with a [`HaloExchange`].
///
/// Handles are only created by [`HaloExchange::register`]. A handle carries the registered name
/// and length, which are checked again on every send and receive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExchangeHandle {
    id: usize,
    name: String,
    len: usize,
}

impl ExchangeHandle {
    pub(crate) fn new(id: usize, name: &str, len: usize) -> Self {
        Self {
            id,
            name: name.to_string(),
            len,
        }
    }

    /// The registration index of the handle. Identical on all partitions for the same vector.
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Display for ExchangeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} ({}, len {})", self.id, self.name, self.len)
    }
}

/// Collective exchange of halo values between partitions.
///
/// All partitions must register the same vectors in the same order. Sending and receiving is
/// collective: a partition blocks in [`receive`](HaloExchange::receive) until every neighbour
/// has sent its values for the same handle, or has disconnected. There is no timeout.
pub trait HaloExchange<T> {
    /// Index of the partition this endpoint belongs to.
    fn rank(&self) -> usize;

    /// Total number of partitions taking part in the exchange.
    fn num_partitions(&self) -> usize;

    fn pattern(&self) -> &HaloPattern;

    /// Register a vector of the given length under a name.
    ///
    /// The length is checked against the node count of this partition's halo pattern, which
    /// differs between partitions. Across partitions only the name is compared: fails if
    /// another partition registered a different name under the same handle id.
    fn register(&mut self, name: &str, len: usize) -> eyre::Result<ExchangeHandle>;

    /// Send the owned values needed by neighbours.
    fn send(&mut self, handle: &ExchangeHandle, values: &[T]) -> eyre::Result<()>;

    /// Receive halo values from neighbours, overwriting the halo entries of `values`.
    fn receive(&mut self, handle: &ExchangeHandle, values: &mut [T]) -> eyre::Result<()>;

    /// Send followed by receive.
    fn exchange(&mut self, handle: &ExchangeHandle, values: &mut [T]) -> eyre::Result<()> {
        self.send(handle, values)?;
        self.receive(handle, values)
    }
}

/// Checks that a handle was issued by the given registry and that the vector has the registered
/// length.
pub(crate) fn verify_handle(registry: &[ExchangeHandle], handle: &ExchangeHandle, len: usize) -> eyre::Result<()> {
    let registered = registry.get(handle.id());
    ensure!(
        registered == Some(handle),
        "exchange handle {} was not registered with this endpoint",
        handle
    );
    ensure!(
        len == handle.len(),
        "vector of length {} does not match exchange handle {}",
        len,
        handle
    );
    Ok(())
}
