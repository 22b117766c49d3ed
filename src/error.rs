//! Error definitions for the compressed cache data path.
//!
//! Two families exist:
//! 1. **Configuration errors** (`ConfigError`): rejected before any cache
//!    structure is built.
//! 2. **Data-path errors** (`CacheError`): recoverable conditions surfaced to
//!    the caller. Invariant breaches (inserting over a valid slot, a full
//!    dictionary the predicates should have prevented, supertag mismatches)
//!    are programming errors and abort with context instead.

use std::fmt;

/// A rejected cache configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A geometry field that must be a power of two was not.
    NotPowerOfTwo { field: &'static str, value: u64 },
    /// A field that must be non-zero was zero.
    ZeroField(&'static str),
    /// The configured superblock size is not supported.
    UnsupportedSuperblockSize(usize),
    /// A replacement policy name that is recognised but not implemented.
    ReservedPolicy(&'static str),
    /// The block size must be a multiple of the dictionary granularity.
    BlocksizeTooSmall(usize),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NotPowerOfTwo { field, value } => {
                write!(f, "{} must be a power of two, got {}", field, value)
            }
            ConfigError::ZeroField(field) => write!(f, "{} must be non-zero", field),
            ConfigError::UnsupportedSuperblockSize(size) => {
                write!(f, "superblock size {} is not supported (must be 4)", size)
            }
            ConfigError::ReservedPolicy(name) => {
                write!(f, "replacement policy '{}' is reserved and not implemented", name)
            }
            ConfigError::BlocksizeTooSmall(size) => {
                write!(f, "blocksize {} is smaller than the dictionary granularity", size)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// A recoverable data-path failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// A write could not be recompressed in place under any permitted scheme.
    /// The owning set recovers by evicting the block and re-inserting it.
    IncompressibleWrite { block_id: usize },
    /// Replacement found no victim: every way holds a line that must not be
    /// victimised. The caller retries later.
    NoReplacementCandidate,
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::IncompressibleWrite { block_id } => {
                write!(f, "write to block {} cannot be recompressed in place", block_id)
            }
            CacheError::NoReplacementCandidate => {
                write!(f, "no way is a valid replacement candidate")
            }
        }
    }
}

impl std::error::Error for CacheError {}
