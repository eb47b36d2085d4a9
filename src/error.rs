use thiserror::Error;

/// The crate-wide error type. Every fallible operation in the buffer pool
/// and record manager returns `Result<T, StorageError>`.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("page file not found: {0}")]
    FileNotFound(String),

    #[error("allocation failed: {0}")]
    Allocation(String),

    #[error("precondition violated: {0}")]
    Precondition(String),

    /// Distinct from [`StorageError::ScanExhausted`] — see REDESIGN FLAGS
    /// in SPEC_FULL.md. Returned by `get_record`/`update_record` when the
    /// slot addressed by an RID is not in use.
    #[error("no record at the given slot")]
    SlotEmpty,

    /// Returned by `Scan::next` once every data page has been visited.
    #[error("scan exhausted")]
    ScanExhausted,

    #[error("predicate evaluation failed: {0}")]
    Eval(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;
