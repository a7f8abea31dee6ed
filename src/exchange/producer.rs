use std::sync::Arc;

use crossbeam_channel::Sender;

use crate::error::DbResult;
use crate::exchange::partition::PartitionFunction;
use crate::exchange::tuple_bag::{BagBuffer, TupleBag};
use crate::operator::OpIterator;

/// Runs on every non-root worker: opens its child and ships every
/// tuple, batched, to a single `CollectConsumer` on the root worker.
/// End-of-stream is signalled by a zero-tuple `TupleBag`.
pub struct CollectProducer {
    operator_id: usize,
    worker_id: usize,
    child: Box<dyn OpIterator>,
    sender: Sender<TupleBag>,
    min_size: usize,
    max_size: usize,
    max_ms: u64,
}

impl CollectProducer {
    pub fn new(
        operator_id: usize,
        worker_id: usize,
        child: Box<dyn OpIterator>,
        sender: Sender<TupleBag>,
        min_size: usize,
        max_size: usize,
        max_ms: u64,
    ) -> Self {
        CollectProducer {
            operator_id,
            worker_id,
            child,
            sender,
            min_size,
            max_size,
            max_ms,
        }
    }

    /// Drains the child on the calling thread, sending batches as the
    /// buffer rules dictate, then a final end-of-stream bag. Callers
    /// that want this off the main thread spawn it themselves.
    pub fn run(mut self) -> DbResult<()> {
        self.child.open()?;
        let td = self.child.get_tuple_desc().clone();
        let mut buffer = BagBuffer::new(self.operator_id, self.worker_id, td, self.min_size, self.max_size, self.max_ms);
        while let Some(t) = self.child.next()? {
            if let Some(bag) = buffer.push(t) {
                let _ = self.sender.send(bag);
            }
        }
        if let Some(bag) = buffer.flush_if_any() {
            let _ = self.sender.send(bag);
        }
        let _ = self.sender.send(buffer.eos());
        self.child.close();
        Ok(())
    }
}

/// Runs on every worker: partitions each tuple through `partition_fn`
/// and ships batches to the `ShuffleConsumer` responsible for that
/// partition.
pub struct ShuffleProducer {
    operator_id: usize,
    worker_id: usize,
    child: Box<dyn OpIterator>,
    partition_fn: Arc<dyn PartitionFunction>,
    senders: Vec<Sender<TupleBag>>,
    min_size: usize,
    max_size: usize,
    max_ms: u64,
}

impl ShuffleProducer {
    pub fn new(
        operator_id: usize,
        worker_id: usize,
        child: Box<dyn OpIterator>,
        partition_fn: Arc<dyn PartitionFunction>,
        senders: Vec<Sender<TupleBag>>,
        min_size: usize,
        max_size: usize,
        max_ms: u64,
    ) -> Self {
        ShuffleProducer {
            operator_id,
            worker_id,
            child,
            partition_fn,
            senders,
            min_size,
            max_size,
            max_ms,
        }
    }

    pub fn run(mut self) -> DbResult<()> {
        self.child.open()?;
        let td = self.child.get_tuple_desc().clone();
        let num_partitions = self.senders.len();
        let mut buffers: Vec<BagBuffer> = (0..num_partitions)
            .map(|_| BagBuffer::new(self.operator_id, self.worker_id, td.clone(), self.min_size, self.max_size, self.max_ms))
            .collect();

        while let Some(t) = self.child.next()? {
            let target = self.partition_fn.partition(&t, num_partitions);
            if let Some(bag) = buffers[target].push(t) {
                let _ = self.senders[target].send(bag);
            }
        }
        for (idx, buffer) in buffers.iter_mut().enumerate() {
            if let Some(bag) = buffer.flush_if_any() {
                let _ = self.senders[idx].send(bag);
            }
            let _ = self.senders[idx].send(buffer.eos());
        }
        self.child.close();
        Ok(())
    }
}
