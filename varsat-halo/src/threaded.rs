use crate::{verify_handle, ExchangeHandle, HaloExchange, HaloPattern};
use eyre::{bail, ensure};
use log::trace;
use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use std::sync::Arc;

/// Mailboxes are keyed by (handle id, sending rank, receiving rank).
type MailboxKey = (usize, usize, usize);

#[derive(Debug)]
struct HubState<T> {
    names: Vec<String>,
    /// Ranks whose endpoint has been dropped.
    departed: Vec<bool>,
    mailboxes: FxHashMap<MailboxKey, VecDeque<Vec<T>>>,
}

/// Shared in-process transport connecting the partitions of a multi-threaded run.
///
/// Each partition runs on its own thread and talks to the hub through a [`ThreadedExchange`]
/// endpoint obtained from [`ExchangeHub::endpoint`]. Messages for a given handle and pair of
/// partitions are delivered in the order they were sent.
#[derive(Debug)]
pub struct ExchangeHub<T> {
    num_partitions: usize,
    state: Mutex<HubState<T>>,
    delivered: Condvar,
}

impl<T> ExchangeHub<T>
where
    T: Copy + Send,
{
    pub fn new(num_partitions: usize) -> Arc<Self> {
        Arc::new(Self {
            num_partitions,
            state: Mutex::new(HubState {
                names: Vec::new(),
                departed: vec![false; num_partitions],
                mailboxes: FxHashMap::default(),
            }),
            delivered: Condvar::new(),
        })
    }

    pub fn num_partitions(&self) -> usize {
        self.num_partitions
    }

    /// Create the endpoint for the partition with the given rank.
    pub fn endpoint(self: &Arc<Self>, rank: usize, pattern: HaloPattern) -> eyre::Result<ThreadedExchange<T>> {
        ensure!(
            rank < self.num_partitions,
            "rank {} out of bounds for hub with {} partitions",
            rank,
            self.num_partitions
        );
        if let Some(link) = pattern
            .neighbours()
            .iter()
            .find(|link| link.rank >= self.num_partitions || link.rank == rank)
        {
            bail!("partition {} has invalid neighbour rank {}", rank, link.rank);
        }
        Ok(ThreadedExchange {
            rank,
            hub: Arc::clone(self),
            pattern,
            registry: Vec::new(),
        })
    }

    fn register_name(&self, id: usize, name: &str) -> eyre::Result<()> {
        let mut state = self.state.lock();
        if let Some(existing) = state.names.get(id) {
            ensure!(
                existing == name,
                "exchange pattern mismatch: handle #{} is '{}' on another partition, but '{}' here",
                id,
                existing,
                name
            );
        } else {
            ensure!(
                id == state.names.len(),
                "exchange registrations out of order: handle #{} registered before #{}",
                id,
                state.names.len()
            );
            state.names.push(name.to_string());
        }
        Ok(())
    }

    fn post(&self, key: MailboxKey, message: Vec<T>) {
        let mut state = self.state.lock();
        state.mailboxes.entry(key).or_default().push_back(message);
        self.delivered.notify_all();
    }

    /// Blocks until a message for `key` arrives.
    ///
    /// Messages posted before the sender disconnected are still delivered. Fails once the
    /// mailbox is empty and the sending endpoint has been dropped.
    fn wait_for(&self, key: MailboxKey) -> eyre::Result<Vec<T>> {
        let (_, sender, _) = key;
        let mut state = self.state.lock();
        loop {
            if let Some(message) = state.mailboxes.get_mut(&key).and_then(VecDeque::pop_front) {
                return Ok(message);
            }
            if state.departed[sender] {
                bail!("partition {} disconnected before sending handle #{}", sender, key.0);
            }
            self.delivered.wait(&mut state);
        }
    }
}

impl<T> ExchangeHub<T> {
    fn depart(&self, rank: usize) {
        let mut state = self.state.lock();
        state.departed[rank] = true;
        self.delivered.notify_all();
    }
}

/// Endpoint of an [`ExchangeHub`] for a single partition.
#[derive(Debug)]
pub struct ThreadedExchange<T> {
    rank: usize,
    hub: Arc<ExchangeHub<T>>,
    pattern: HaloPattern,
    registry: Vec<ExchangeHandle>,
}

impl<T> HaloExchange<T> for ThreadedExchange<T>
where
    T: Copy + Send,
{
    fn rank(&self) -> usize {
        self.rank
    }

    fn num_partitions(&self) -> usize {
        self.hub.num_partitions()
    }

    fn pattern(&self) -> &HaloPattern {
        &self.pattern
    }

    fn register(&mut self, name: &str, len: usize) -> eyre::Result<ExchangeHandle> {
        ensure!(
            len == self.pattern.num_nodes(),
            "cannot register '{}' with length {} for a pattern over {} nodes",
            name,
            len,
            self.pattern.num_nodes()
        );
        let id = self.registry.len();
        self.hub.register_name(id, name)?;
        let handle = ExchangeHandle::new(id, name, len);
        self.registry.push(handle.clone());
        Ok(handle)
    }

    fn send(&mut self, handle: &ExchangeHandle, values: &[T]) -> eyre::Result<()> {
        verify_handle(&self.registry, handle, values.len())?;
        for link in self.pattern.neighbours() {
            let message = link.send_indices.iter().map(|&i| values[i]).collect();
            trace!("rank {} sends {} values of {} to rank {}", self.rank, link.send_indices.len(), handle, link.rank);
            self.hub.post((handle.id(), self.rank, link.rank), message);
        }
        Ok(())
    }

    fn receive(&mut self, handle: &ExchangeHandle, values: &mut [T]) -> eyre::Result<()> {
        verify_handle(&self.registry, handle, values.len())?;
        for link in self.pattern.neighbours() {
            let message = self.hub.wait_for((handle.id(), link.rank, self.rank))?;
            ensure!(
                message.len() == link.receive_indices.len(),
                "rank {} expected {} values of {} from rank {}, but received {}",
                self.rank,
                link.receive_indices.len(),
                handle,
                link.rank,
                message.len()
            );
            for (&i, value) in link.receive_indices.iter().zip(message) {
                values[i] = value;
            }
        }
        Ok(())
    }
}

impl<T> Drop for ThreadedExchange<T> {
    fn drop(&mut self) {
        trace!("rank {} disconnects from exchange hub", self.rank);
        self.hub.depart(self.rank);
    }
}
