//! Replacement policies for superblock ways.
//!
//! Policies select a victim way for insertion and track recency on access.
//! They operate on the set's superblock metadata slice, so no back-reference
//! to the owning set or cache is needed.
//!
//! # Policies
//!
//! - `Lru`: Least Recently Used.
//! - `LruQbs`: LRU refined with Query-Based Selection [Jaleel et al.,
//!   MICRO'10], which avoids victimising superblocks still resident in a
//!   lower cache level.

/// Least Recently Used replacement policy.
pub mod lru;

/// LRU with Query-Based Selection.
pub mod lru_qbs;

pub use lru::Lru;
pub use lru_qbs::LruQbs;

use crate::cache::set::CacheController;
use crate::cache::superblock::SuperblockInfo;
use crate::config::{CacheConfig, ReplacementPolicyKind};
use crate::error::ConfigError;
use crate::stats::ReplacementStats;

/// Trait for victim selection among the ways of one set.
pub trait ReplacementPolicy: Send {
    /// Selects a way to evict into.
    ///
    /// Ways whose superblock is entirely invalid win immediately. Ways
    /// holding a line mid-upgrade are never returned. `None` means no way is
    /// currently a valid candidate; the caller surfaces this to the cache
    /// controller, which retries later.
    fn select_victim(
        &mut self,
        ways: &[SuperblockInfo],
        cntlr: Option<&mut dyn CacheController>,
    ) -> Option<usize>;

    /// Records an access to `way`, promoting it to most recently used.
    fn note_access(&mut self, way: usize);

    /// Snapshot of the policy's selection statistics.
    fn stats(&self) -> ReplacementStats;
}

/// Builds the policy configured for a set.
pub fn create(config: &CacheConfig) -> Result<Box<dyn ReplacementPolicy>, ConfigError> {
    match config.replacement_policy {
        ReplacementPolicyKind::Lru => Ok(Box::new(Lru::new(config.associativity))),
        ReplacementPolicyKind::LruQbs => Ok(Box::new(LruQbs::new(
            config.associativity,
            config.qbs_attempts,
            config.allow_forward_invalidation,
        ))),
        reserved => Err(ConfigError::ReservedPolicy(reserved.name())),
    }
}
