//! Crate-wide constants and the small configuration struct the record
//! manager and buffer pool take at construction time.

/// Size in bytes of one page / one disk block.
pub const PAGE_SIZE: usize = 4096;

/// Sentinel page number meaning "no page loaded" / "no known free page".
pub const NO_PAGE: PageId = -1;

/// Page 0 of every table file holds textual metadata (§3); data pages start
/// at 1.
pub const FIRST_DATA_PAGE: PageId = 1;

pub type PageId = i64;
pub type FrameId = usize;

/// Default buffer pool size a freshly created or opened table binds to,
/// per SPEC_FULL.md §4.4.1.
pub const DEFAULT_TABLE_POOL_SIZE: usize = 3;

/// Replacement-strategy enum from SPEC_FULL.md §6. Only `LeastUsage` (the
/// policy described in §4.2.1) has a victim-selection implementation; the
/// others are accepted and recorded for observability only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplacementStrategy {
    Fifo = 0,
    Lru = 1,
    Clock = 2,
    LruK = 3,
}

impl Default for ReplacementStrategy {
    fn default() -> Self {
        ReplacementStrategy::Lru
    }
}

/// Construction-time configuration for a [`crate::buffer::BufferPoolManager`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub pool_size: usize,
    pub strategy: ReplacementStrategy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_TABLE_POOL_SIZE,
            strategy: ReplacementStrategy::default(),
        }
    }
}
