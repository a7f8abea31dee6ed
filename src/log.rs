/// Write-ahead log collaborator. The on-disk log format itself is out
/// of scope; this trait only fixes the contract `BufferPool` relies on
/// at commit time so the flush-then-release ordering is observable.
pub trait LogFile: Send + Sync {
    fn log_write(&self, tid: crate::transaction::TransactionId);
    fn force(&self);
}

/// No-op `LogFile` used when no durable log is configured. Still logs
/// through the `log` facade so tests can assert on ordering.
pub struct NullLogFile;

impl LogFile for NullLogFile {
    fn log_write(&self, tid: crate::transaction::TransactionId) {
        log::debug!("log_write for {:?}", tid);
    }

    fn force(&self) {
        log::debug!("log force");
    }
}

impl Default for NullLogFile {
    fn default() -> Self {
        NullLogFile
    }
}
