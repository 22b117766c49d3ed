//! DISH compression model: encoding schemes, dictionary geometry, and the
//! per-cache compression policy.
//!
//! DISH (Dictionary Sharing) stores up to four consecutive cache lines of a
//! superblock in one physical way by sharing a small dictionary of recurring
//! 32-bit values. Two encodings exist:
//! 1. **Scheme 1:** 8 dictionary entries holding full 32-bit values.
//! 2. **Scheme 2:** 4 dictionary entries holding the upper 28 bits of a value,
//!    with a 4-bit offset stored per chunk.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Number of consecutive cache lines grouped into one superblock.
pub const SUPERBLOCK_SIZE: usize = 4;

/// Dictionary capacity for scheme-1 compression (full 32-bit entries).
pub const SCHEME1_DICT_SIZE: usize = 8;

/// Dictionary capacity for scheme-2 compression (28-bit truncated entries).
pub const SCHEME2_DICT_SIZE: usize = 4;

/// Dictionary granularity: chunks are 4-byte aligned 32-bit values.
pub const GRANULARITY_BYTES: usize = 4;

/// Bits stored per chunk as an offset under scheme-2 compression.
pub const SCHEME2_OFFSET_BITS: u32 = 4;

/// Mask selecting the scheme-2 per-chunk offset bits.
pub const SCHEME2_OFFSET_MASK: u32 = 0xF;

/// Sentinel tag marking an unused block or superblock slot.
pub const TAG_UNUSED: u64 = u64::MAX;

/// Encoding state of a superblock's data way.
///
/// `Invalid` is not a storable state; it is the sentinel returned by scheme
/// selection when neither encoding can hold the requested data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// Raw bytes, exactly one resident line, no dictionary.
    Uncompressed,
    /// Shared dictionary of 8 full 32-bit values.
    Scheme1,
    /// Shared dictionary of 4 high-28-bit prefixes plus 4-bit chunk offsets.
    Scheme2,
    /// No feasible encoding; selection failed.
    Invalid,
}

impl Scheme {
    /// Dictionary capacity of a compressed scheme; zero for the others.
    pub fn dict_capacity(self) -> usize {
        match self {
            Scheme::Scheme1 => SCHEME1_DICT_SIZE,
            Scheme::Scheme2 => SCHEME2_DICT_SIZE,
            Scheme::Uncompressed | Scheme::Invalid => 0,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::Uncompressed => write!(f, "UNCOMPRESSED"),
            Scheme::Scheme1 => write!(f, "SCHEME1"),
            Scheme::Scheme2 => write!(f, "SCHEME2"),
            Scheme::Invalid => write!(f, "INVALID"),
        }
    }
}

/// Per-cache compression policy: global capability flags plus running
/// occupancy counters for the two compressed schemes.
///
/// The counters bias the initial scheme choice for a freshly compressed
/// superblock and are maintained with relaxed atomics; sets on different
/// locks may race on them, and exact consistency is not required.
pub struct CompressionPolicy {
    enabled: bool,
    otf_switch_allowed: bool,
    prune_on_write: bool,
    n_scheme1: AtomicU64,
    n_scheme2: AtomicU64,
}

impl CompressionPolicy {
    /// Creates a policy from the three capability flags.
    pub fn new(enabled: bool, otf_switch_allowed: bool, prune_on_write: bool) -> Self {
        Self {
            enabled,
            otf_switch_allowed,
            prune_on_write,
            n_scheme1: AtomicU64::new(0),
            n_scheme2: AtomicU64::new(0),
        }
    }

    /// Whether lines may be stored compressed at all.
    pub fn can_compress(&self) -> bool {
        self.enabled
    }

    /// Whether a populated superblock may be re-encoded from one compressed
    /// scheme to the other without passing through the uncompressed state.
    pub fn can_change_scheme_otf(&self) -> bool {
        self.enabled && self.otf_switch_allowed
    }

    /// Whether dictionary entries should be scavenged on every write.
    pub fn should_prune(&self) -> bool {
        self.enabled && self.prune_on_write
    }

    /// Scheme to try first when a superblock leaves the uncompressed state:
    /// whichever scheme currently holds more superblocks, ties to scheme 1.
    pub fn default_scheme(&self) -> Scheme {
        if self.n_scheme1.load(Ordering::Relaxed) >= self.n_scheme2.load(Ordering::Relaxed) {
            Scheme::Scheme1
        } else {
            Scheme::Scheme2
        }
    }

    /// Notes that a superblock entered `scheme`. Uncompressed and invalid
    /// schemes are not counted.
    pub fn insert(&self, scheme: Scheme) {
        match scheme {
            Scheme::Scheme1 => {
                self.n_scheme1.fetch_add(1, Ordering::Relaxed);
            }
            Scheme::Scheme2 => {
                self.n_scheme2.fetch_add(1, Ordering::Relaxed);
            }
            Scheme::Uncompressed | Scheme::Invalid => {}
        }
    }

    /// Notes that a superblock left `scheme`.
    pub fn evict(&self, scheme: Scheme) {
        match scheme {
            Scheme::Scheme1 => {
                self.n_scheme1.fetch_sub(1, Ordering::Relaxed);
            }
            Scheme::Scheme2 => {
                self.n_scheme2.fetch_sub(1, Ordering::Relaxed);
            }
            Scheme::Uncompressed | Scheme::Invalid => {}
        }
    }

    /// Current (approximate) superblock counts for schemes 1 and 2.
    pub fn scheme_counts(&self) -> (u64, u64) {
        (
            self.n_scheme1.load(Ordering::Relaxed),
            self.n_scheme2.load(Ordering::Relaxed),
        )
    }
}
