use crate::{verify_handle, ExchangeHandle, HaloExchange, HaloPattern};
use eyre::ensure;

/// Exchange for a single partition owning every node.
///
/// Sending and receiving only validate the handle, since there are no halo entries to fill.
#[derive(Debug, Clone)]
pub struct SerialExchange {
    pattern: HaloPattern,
    registry: Vec<ExchangeHandle>,
}

impl SerialExchange {
    pub fn new(num_nodes: usize) -> Self {
        Self {
            pattern: HaloPattern::without_halo(num_nodes),
            registry: Vec::new(),
        }
    }
}

impl<T> HaloExchange<T> for SerialExchange {
    fn rank(&self) -> usize {
        0
    }

    fn num_partitions(&self) -> usize {
        1
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
        let handle = ExchangeHandle::new(self.registry.len(), name, len);
        self.registry.push(handle.clone());
        Ok(handle)
    }

    fn send(&mut self, handle: &ExchangeHandle, values: &[T]) -> eyre::Result<()> {
        verify_handle(&self.registry, handle, values.len())
    }

    fn receive(&mut self, handle: &ExchangeHandle, values: &mut [T]) -> eyre::Result<()> {
        verify_handle(&self.registry, handle, values.len())
    }
}
