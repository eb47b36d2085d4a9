pub mod buffer;
pub mod common;
pub mod error;
pub mod record_manager;
pub mod storage;
pub mod tuple;

pub use buffer::BufferPoolManager;
pub use error::{Result, StorageError};
pub use record_manager::{Predicate, Scan, Table};
pub use tuple::{Attribute, DataType, Record, Rid, Schema, Value};

/// Installs the crate's `tracing` subscriber at the given verbosity,
/// mirroring how this codebase's lineage wires up logging at process
/// entry points rather than inside library code.
pub fn init_logging(level: tracing::Level) {
    let subscriber = tracing_subscriber::fmt().with_max_level(level).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
