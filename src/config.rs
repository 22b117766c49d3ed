//! Configuration for the compressed cache.
//!
//! This module defines the configuration structure and enums used to
//! parameterize a cache instance. It provides:
//! 1. **Defaults:** Baseline geometry constants for a production last-level
//!    cache (64-byte lines, 4-line superblocks).
//! 2. **Enums:** Replacement policy and set-index hash selection.
//! 3. **Validation:** Geometry and policy checks performed before any cache
//!    structure is built.
//!
//! Configuration is supplied via JSON (serde) or `CacheConfig::default()`.

use serde::Deserialize;

use crate::compression::{GRANULARITY_BYTES, SUPERBLOCK_SIZE};
use crate::error::ConfigError;

/// Default configuration constants for the cache.
mod defaults {
    /// Cache line size in bytes. Matches DRAM burst length and the dictionary
    /// chunk layout (16 chunks per line).
    pub const BLOCKSIZE: usize = 64;

    /// Associativity of a production last-level cache.
    pub const ASSOCIATIVITY: usize = 16;

    /// Number of sets of a production last-level cache (8 MiB at 64B x 16).
    pub const NUM_SETS: usize = 8192;

    /// Query-based selection attempts; 1 disables the queries entirely.
    pub const QBS_ATTEMPTS: usize = 1;
}

/// Cache replacement policy selection.
///
/// All names accepted by the configuration surface are listed; only `lru`
/// and `lru_qbs` are implemented. The rest are reserved and rejected by
/// [`CacheConfig::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplacementPolicyKind {
    /// Round-robin (reserved).
    RoundRobin,
    /// Least Recently Used.
    #[default]
    Lru,
    /// LRU with Query-Based Selection over lower cache levels.
    LruQbs,
    /// Not Recently Used (reserved).
    Nru,
    /// Most Recently Used (reserved).
    Mru,
    /// Not Most Recently Used (reserved).
    Nmru,
    /// Tree pseudo-LRU (reserved).
    Plru,
    /// Static re-reference interval prediction (reserved).
    Srrip,
    /// SRRIP with Query-Based Selection (reserved).
    SrripQbs,
    /// Random victim selection (reserved).
    Random,
}

impl ReplacementPolicyKind {
    /// Configuration-surface name of the policy.
    pub fn name(self) -> &'static str {
        match self {
            ReplacementPolicyKind::RoundRobin => "round_robin",
            ReplacementPolicyKind::Lru => "lru",
            ReplacementPolicyKind::LruQbs => "lru_qbs",
            ReplacementPolicyKind::Nru => "nru",
            ReplacementPolicyKind::Mru => "mru",
            ReplacementPolicyKind::Nmru => "nmru",
            ReplacementPolicyKind::Plru => "plru",
            ReplacementPolicyKind::Srrip => "srrip",
            ReplacementPolicyKind::SrripQbs => "srrip_qbs",
            ReplacementPolicyKind::Random => "random",
        }
    }
}

/// Set-index hash selection.
///
/// `Mask` is the production hash; the others exist for interference studies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashKind {
    /// Low bits of the superblock number (requires power-of-two sets).
    #[default]
    Mask,
    /// Superblock number modulo the set count.
    Mod,
    /// One round of a mixing generator, then modulo.
    Rng1Mod,
    /// Two rounds of a mixing generator, then modulo.
    Rng2Mod,
}

/// Configuration of one compressed cache instance.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Human-readable cache name used in log messages and reports.
    #[serde(default = "CacheConfig::default_name")]
    pub name: String,

    /// Cache line size in bytes; must be a power of two.
    #[serde(default = "CacheConfig::default_blocksize")]
    pub blocksize: usize,

    /// Lines per superblock. Fixed at 4 by the encoding layout.
    #[serde(default = "CacheConfig::default_superblock_size")]
    pub superblock_size: usize,

    /// Number of ways per set.
    #[serde(default = "CacheConfig::default_associativity")]
    pub associativity: usize,

    /// Number of sets; must be a power of two for the mask hash.
    #[serde(default = "CacheConfig::default_num_sets")]
    pub num_sets: usize,

    /// Victim selection policy.
    #[serde(default)]
    pub replacement_policy: ReplacementPolicyKind,

    /// Query-based selection attempts (used only by `lru_qbs`).
    #[serde(default = "CacheConfig::default_qbs_attempts")]
    pub qbs_attempts: usize,

    /// Whether a final rejected QBS attempt may still evict the victim,
    /// forcing an invalidation in the lower level.
    #[serde(default)]
    pub allow_forward_invalidation: bool,

    /// Set-index hash function.
    #[serde(default)]
    pub hash_function: HashKind,

    /// Whether lines may be stored compressed.
    #[serde(default = "CacheConfig::default_compressible")]
    pub compressible: bool,

    /// Whether populated superblocks may switch compressed schemes on the fly.
    #[serde(default = "CacheConfig::default_change_scheme_otf")]
    pub change_scheme_otf: bool,

    /// Whether dictionary entries are scavenged on every write.
    #[serde(default)]
    pub prune_dish_entries: bool,

    /// Whether per-set insertion counts are kept.
    #[serde(default)]
    pub track_set_usage: bool,
}

impl CacheConfig {
    fn default_name() -> String {
        "cache".to_string()
    }

    fn default_blocksize() -> usize {
        defaults::BLOCKSIZE
    }

    fn default_superblock_size() -> usize {
        SUPERBLOCK_SIZE
    }

    fn default_associativity() -> usize {
        defaults::ASSOCIATIVITY
    }

    fn default_num_sets() -> usize {
        defaults::NUM_SETS
    }

    fn default_qbs_attempts() -> usize {
        defaults::QBS_ATTEMPTS
    }

    fn default_compressible() -> bool {
        true
    }

    fn default_change_scheme_otf() -> bool {
        true
    }

    /// Checks geometry and policy constraints.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the block size or set count is not a
    /// power of two, a count field is zero, the superblock size is not 4,
    /// the policy is reserved, or `qbs_attempts` is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.blocksize == 0 {
            return Err(ConfigError::ZeroField("blocksize"));
        }
        if !self.blocksize.is_power_of_two() {
            return Err(ConfigError::NotPowerOfTwo {
                field: "blocksize",
                value: self.blocksize as u64,
            });
        }
        if self.blocksize < GRANULARITY_BYTES {
            return Err(ConfigError::BlocksizeTooSmall(self.blocksize));
        }
        if self.superblock_size != SUPERBLOCK_SIZE {
            return Err(ConfigError::UnsupportedSuperblockSize(self.superblock_size));
        }
        if self.associativity == 0 {
            return Err(ConfigError::ZeroField("associativity"));
        }
        if self.num_sets == 0 {
            return Err(ConfigError::ZeroField("num_sets"));
        }
        if !self.num_sets.is_power_of_two() {
            return Err(ConfigError::NotPowerOfTwo {
                field: "num_sets",
                value: self.num_sets as u64,
            });
        }
        if self.qbs_attempts == 0 {
            return Err(ConfigError::ZeroField("qbs_attempts"));
        }
        match self.replacement_policy {
            ReplacementPolicyKind::Lru | ReplacementPolicyKind::LruQbs => Ok(()),
            reserved => Err(ConfigError::ReservedPolicy(reserved.name())),
        }
    }

    /// Number of 4-byte chunks per cache line.
    pub fn chunks_per_block(&self) -> usize {
        self.blocksize / GRANULARITY_BYTES
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: Self::default_name(),
            blocksize: defaults::BLOCKSIZE,
            superblock_size: SUPERBLOCK_SIZE,
            associativity: defaults::ASSOCIATIVITY,
            num_sets: defaults::NUM_SETS,
            replacement_policy: ReplacementPolicyKind::default(),
            qbs_attempts: defaults::QBS_ATTEMPTS,
            allow_forward_invalidation: false,
            hash_function: HashKind::default(),
            compressible: true,
            change_scheme_otf: true,
            prune_dish_entries: false,
            track_set_usage: false,
        }
    }
}
