//! Compressed last-level cache data path.
//!
//! This crate models a set-associative cache that stores up to four
//! consecutive cache lines (a *superblock*) in a single physical way using
//! DISH dictionary compression. It provides:
//! 1. **Compression:** two dictionary encodings with cheap compressibility
//!    tests, on-the-fly scheme switching, and dictionary compaction.
//! 2. **Cache structure:** superblock-aware address decomposition, tag
//!    store, per-set orchestration, and a per-cache compression policy.
//! 3. **Replacement:** LRU, optionally refined with Query-Based Selection
//!    against lower cache levels.
//! 4. **Observability:** per-scheme occupancy, replacement, and access
//!    statistics collected as plain snapshots.
//!
//! The crate performs no I/O and models no timing; it is the data-path core
//! a cycle-level memory simulator drives. Evictions surface as writeback
//! records owned by the caller, which remains the system of record.

/// Set-associative compressed cache (address codec, sets, policies, façade).
pub mod cache;

/// Encoding schemes, dictionary geometry, and the compression policy.
pub mod compression;

/// Configuration structures and validation.
pub mod config;

/// Error types.
pub mod error;

/// Statistics snapshots and reporting.
pub mod stats;

/// Cache façade; one instance per simulated cache.
pub use crate::cache::Cache;
/// Per-access data buffer and direction.
pub use crate::cache::{Access, MemOp};
/// Line metadata and coherence states.
pub use crate::cache::block_info::{BlockInfo, CState, CacheKind};
/// Controller interface consumed by query-based selection.
pub use crate::cache::set::{CacheController, WritebackLine, WritebackLines};
/// Compression scheme selector.
pub use crate::compression::{CompressionPolicy, Scheme};
/// Root configuration type; use `CacheConfig::default()` or deserialize from JSON.
pub use crate::config::CacheConfig;
/// Data-path and configuration errors.
pub use crate::error::{CacheError, ConfigError};
