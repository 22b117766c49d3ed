//! Per-line cache block metadata.
//!
//! A [`BlockInfo`] carries the tag, coherence state, option bits, and a byte
//! usage mask for one cache line. The cache kind it belongs to is a plain
//! field: replacement and compression logic consume only the common
//! interface, so no per-kind behavior lives here.

use crate::compression::TAG_UNUSED;

/// Cache level a block belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    /// Private L1 cache.
    PrL1,
    /// Private L2 cache.
    PrL2,
    /// Shared (last-level) cache.
    Shared,
}

/// Coherence state of a cache line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CState {
    /// Not resident.
    #[default]
    Invalid,
    /// Resident, clean, possibly in other caches.
    Shared,
    /// Shared line with an upgrade (write permission) request in flight.
    /// Superblocks holding such a line must not be victimised.
    SharedUpgrading,
    /// Resident in this cache only, clean.
    Exclusive,
    /// Resident in multiple caches, this copy responsible for writeback.
    Owned,
    /// Resident in this cache only, dirty.
    Modified,
}

/// Option bit: the line was brought in by a prefetcher.
pub const OPTION_PREFETCH: u8 = 1 << 0;

/// Option bit: the line was inserted during warmup.
pub const OPTION_WARMUP: u8 = 1 << 1;

/// Byte-usage tracking granularity. One usage bit covers one dictionary
/// chunk, so the 64-bit mask spans lines up to 256 bytes.
const USAGE_SHIFT: u32 = 2;

/// Metadata for a single cache line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockInfo {
    kind: CacheKind,
    tag: u64,
    cstate: CState,
    options: u8,
    used: u64,
}

impl BlockInfo {
    /// Creates metadata for a line with the given tag and coherence state.
    pub fn new(kind: CacheKind, tag: u64, cstate: CState) -> Self {
        Self {
            kind,
            tag,
            cstate,
            options: 0,
            used: 0,
        }
    }

    /// Cache level this line belongs to.
    pub fn kind(&self) -> CacheKind {
        self.kind
    }

    /// Line tag ([`TAG_UNUSED`] when the slot is free).
    pub fn tag(&self) -> u64 {
        self.tag
    }

    pub fn set_tag(&mut self, tag: u64) {
        self.tag = tag;
    }

    /// Current coherence state.
    pub fn cstate(&self) -> CState {
        self.cstate
    }

    pub fn set_cstate(&mut self, cstate: CState) {
        self.cstate = cstate;
    }

    /// A line is valid iff it has a tag and a non-invalid coherence state.
    pub fn is_valid(&self) -> bool {
        self.tag != TAG_UNUSED && self.cstate != CState::Invalid
    }

    /// Resets the line to the unused state.
    pub fn invalidate(&mut self) {
        self.tag = TAG_UNUSED;
        self.cstate = CState::Invalid;
    }

    /// Tests an option bit ([`OPTION_PREFETCH`], [`OPTION_WARMUP`]).
    pub fn has_option(&self, option: u8) -> bool {
        self.options & option != 0
    }

    pub fn set_option(&mut self, option: u8) {
        self.options |= option;
    }

    pub fn clear_option(&mut self, option: u8) {
        self.options &= !option;
    }

    /// Marks the byte range `[offset, offset + bytes)` as touched.
    ///
    /// # Returns
    ///
    /// `true` when the access set usage bits that were previously unset.
    pub fn update_usage(&mut self, offset: usize, bytes: usize) -> bool {
        if bytes == 0 {
            return false;
        }
        let first = (offset >> USAGE_SHIFT) as u64;
        let last = ((offset + bytes - 1) >> USAGE_SHIFT) as u64;
        let first_mask = (1u64 << first) - 1;
        let last_mask = if last >= 63 { u64::MAX } else { (1u64 << (last + 1)) - 1 };
        let usage_mask = last_mask & !first_mask;

        let new_bits_set = usage_mask & !self.used != 0;
        self.used |= usage_mask;
        new_bits_set
    }

    /// Current usage mask.
    pub fn usage(&self) -> u64 {
        self.used
    }
}
