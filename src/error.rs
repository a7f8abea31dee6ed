use thiserror::Error;

/// The error family surfaced by the storage/concurrency/operator core.
///
/// Maps onto the four kinds named in the spec: `DbException` is split
/// into several named variants here for better diagnostics, but all of
/// them are the "local, no state change" kind described there.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("schema mismatch")]
    SchemaMismatch,

    #[error("page full")]
    PageFull,

    #[error("tuple not on page")]
    NotOnPage,

    #[error("all pages dirty")]
    AllPagesDirty,

    #[error("no such table: {0}")]
    CatalogMissing(String),

    #[error("invalid iterator call: {0}")]
    InvalidIteratorState(String),

    #[error("transaction aborted")]
    TransactionAborted,

    #[error("no such element: {0}")]
    NoSuchElement(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type DbResult<T> = Result<T, DbError>;
