use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies one transaction. Monotonically increasing so the lock
/// manager's wait-die-style tie-breaking (older always wins ties) has a
/// total order to compare on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId {
    tid: u64,
}

impl TransactionId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let tid = COUNTER.fetch_add(1, Ordering::SeqCst);
        TransactionId { tid }
    }

    pub fn get_tid(&self) -> u64 {
        self.tid
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Lifetime-bounded transaction handle: `begin -> {commit | abort}`. All
/// state the transaction accrues (locks held, dirty pages) lives in the
/// `LockManager` and `BufferPool`, not here; this struct is just the
/// driver that ties a `TransactionId` to the calls that end its life.
pub struct Transaction<'a> {
    tid: TransactionId,
    buffer_pool: &'a crate::buffer_pool::BufferPool,
    finished: bool,
}

impl<'a> Transaction<'a> {
    pub fn begin(buffer_pool: &'a crate::buffer_pool::BufferPool) -> Self {
        Transaction {
            tid: TransactionId::new(),
            buffer_pool,
            finished: false,
        }
    }

    pub fn id(&self) -> TransactionId {
        self.tid
    }

    pub fn commit(mut self) -> crate::error::DbResult<()> {
        self.finished = true;
        self.buffer_pool.transaction_complete(self.tid, true)
    }

    pub fn abort(mut self) -> crate::error::DbResult<()> {
        self.finished = true;
        self.buffer_pool.transaction_complete(self.tid, false)
    }
}

impl<'a> Drop for Transaction<'a> {
    /// An un-committed, un-aborted transaction that falls out of scope
    /// (e.g. propagating a `?` from `TransactionAborted`) is rolled back.
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.buffer_pool.transaction_complete(self.tid, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_ids_are_monotonic_and_unique() {
        let tid1 = TransactionId::new();
        let tid2 = TransactionId::new();
        assert_ne!(tid1, tid2);
        assert!(tid2.get_tid() > tid1.get_tid());
    }
}
