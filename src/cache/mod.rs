//! Set-associative compressed cache.
//!
//! This module implements the cache data path. It provides:
//! 1. **Address handling:** superblock-aware decomposition and set indexing.
//! 2. **Storage:** superblock tag structures and DISH-compressed data ways.
//! 3. **Orchestration:** per-set lookup, read, write, insert, and
//!    invalidate, with replacement and writeback collection.
//!
//! The [`Cache`] façade owns one lock per set; concurrent accesses to
//! different sets proceed independently.

/// Address decomposition and set-index hashing.
pub mod addr;

/// Compressed superblock payload storage.
pub mod block_data;

/// Per-line metadata.
pub mod block_info;

/// Replacement policies (LRU, LRU-QBS).
pub mod policies;

/// Set-level orchestration.
pub mod set;

/// Superblock tag structure.
pub mod superblock;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use self::addr::{AddressCodec, AddressHomeLookup, AddressParts};
use self::block_info::{BlockInfo, CState, CacheKind};
use self::set::{CacheController, CacheSet, WritebackLines};
use crate::compression::CompressionPolicy;
use crate::config::CacheConfig;
use crate::error::{CacheError, ConfigError};
use crate::stats::CacheStats;

/// Direction of a cache access, for counter bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemOp {
    Load,
    Store,
}

/// A single-line access and its data buffer.
pub enum Access<'a> {
    /// Read the line into the buffer.
    Load(&'a mut [u8]),
    /// Write the buffer into the line.
    Store(&'a [u8]),
}

impl Access<'_> {
    /// Direction of this access.
    pub fn op(&self) -> MemOp {
        match self {
            Access::Load(_) => MemOp::Load,
            Access::Store(_) => MemOp::Store,
        }
    }
}

/// A set-associative cache with DISH superblock compression.
pub struct Cache {
    name: String,
    kind: CacheKind,
    codec: Arc<AddressCodec>,
    policy: Arc<CompressionPolicy>,
    sets: Vec<Mutex<CacheSet>>,
    enabled: AtomicBool,
    num_accesses: AtomicU64,
    num_hits: AtomicU64,
    set_usage: Option<Vec<AtomicU64>>,
}

impl Cache {
    /// Builds a cache from its configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - Validated geometry, policy, and compression options.
    /// * `kind` - Cache level the per-line metadata is created for.
    /// * `ahl` - Optional address-home translation applied before superblock
    ///   decomposition.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the configuration fails validation.
    pub fn new(
        config: &CacheConfig,
        kind: CacheKind,
        ahl: Option<Box<dyn AddressHomeLookup>>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let codec = Arc::new(AddressCodec::new(
            config.blocksize,
            config.num_sets,
            config.hash_function,
            ahl,
        ));
        let policy = Arc::new(CompressionPolicy::new(
            config.compressible,
            config.change_scheme_otf,
            config.prune_dish_entries,
        ));

        let mut sets = Vec::with_capacity(config.num_sets);
        for _ in 0..config.num_sets {
            sets.push(Mutex::new(CacheSet::new(
                config,
                Arc::clone(&codec),
                Arc::clone(&policy),
            )?));
        }

        let set_usage = config
            .track_set_usage
            .then(|| (0..config.num_sets).map(|_| AtomicU64::new(0)).collect());

        Ok(Self {
            name: config.name.clone(),
            kind,
            codec,
            policy,
            sets,
            enabled: AtomicBool::new(false),
            num_accesses: AtomicU64::new(0),
            num_hits: AtomicU64::new(0),
            set_usage,
        })
    }

    /// Configured cache name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cache level of the per-line metadata.
    pub fn kind(&self) -> CacheKind {
        self.kind
    }

    /// The compression policy shared by this cache's sets.
    pub fn compression_policy(&self) -> &CompressionPolicy {
        &self.policy
    }

    /// Splits an address into its cache coordinates.
    pub fn split_address(&self, addr: u64) -> AddressParts {
        self.codec.split(addr)
    }

    /// Reconstructs the line address a tag stands for.
    pub fn tag_to_address(&self, tag: u64) -> u64 {
        self.codec.tag_to_address(tag)
    }

    /// The lock guarding the set `addr` maps to. Operations on this cache
    /// acquire it internally; callers composing multi-step transactions
    /// (peek, then modify) hold it across the sequence instead.
    pub fn set_lock(&self, addr: u64) -> &Mutex<CacheSet> {
        &self.sets[self.codec.split(addr).set_index]
    }

    /// Accesses a single resident line.
    ///
    /// Loads copy the line's bytes into the buffer; stores write the buffer
    /// into the line, possibly re-encoding the superblock and, when the data
    /// no longer fits, relocating the line with evictions into `writebacks`.
    ///
    /// # Returns
    ///
    /// The line's metadata (as of before the access), or `None` on a miss.
    ///
    /// # Errors
    ///
    /// [`CacheError::NoReplacementCandidate`] when a store had to relocate
    /// the line and no victim way was available.
    pub fn access_single_line(
        &self,
        addr: u64,
        access: Access<'_>,
        update_replacement: bool,
        writebacks: &mut WritebackLines,
        cntlr: Option<&mut dyn CacheController>,
    ) -> Result<Option<BlockInfo>, CacheError> {
        let parts = self.codec.split(addr);
        let mut set = self.sets[parts.set_index].lock().unwrap();

        let found = set
            .find(parts.tag, parts.block_id)
            .map(|(way, info)| (way, info.clone()));
        let Some((way, info)) = found else {
            return Ok(None);
        };

        match access {
            Access::Load(buf) => {
                set.read_line(way, parts.block_id, parts.offset, update_replacement, buf);
            }
            Access::Store(buf) => {
                set.write_line(
                    parts.tag,
                    parts.block_id,
                    parts.offset,
                    buf,
                    update_replacement,
                    writebacks,
                    cntlr,
                )?;
            }
        }

        Ok(Some(info))
    }

    /// Inserts a full line at `addr` with the given initial coherence state.
    ///
    /// # Errors
    ///
    /// [`CacheError::NoReplacementCandidate`] when no victim way was
    /// available; the caller retries later.
    pub fn insert_single_line(
        &self,
        addr: u64,
        cstate: CState,
        ins_data: &[u8],
        writebacks: &mut WritebackLines,
        cntlr: Option<&mut dyn CacheController>,
    ) -> Result<(), CacheError> {
        let parts = self.codec.split(addr);
        let info = BlockInfo::new(self.kind, parts.tag, cstate);

        let mut set = self.sets[parts.set_index].lock().unwrap();
        set.insert_line(info, ins_data, writebacks, cntlr)?;
        drop(set);

        if let Some(usage) = &self.set_usage {
            usage[parts.set_index].fetch_add(1, Ordering::Relaxed);
        }

        Ok(())
    }

    /// Non-destructive lookup of a line's metadata.
    pub fn peek_single_line(&self, addr: u64) -> Option<BlockInfo> {
        let parts = self.codec.split(addr);
        let set = self.sets[parts.set_index].lock().unwrap();

        set.find(parts.tag, parts.block_id).map(|(_, info)| info.clone())
    }

    /// Invalidates the line at `addr`. Returns whether a line was touched.
    pub fn invalidate_single_line(&self, addr: u64) -> bool {
        let parts = self.codec.split(addr);
        let mut set = self.sets[parts.set_index].lock().unwrap();

        set.invalidate(parts.tag, parts.block_id)
    }

    /// Starts counting accesses and hits.
    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    /// Stops counting accesses and hits.
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    /// Whether counters are being updated.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Counts one access and, when `hit`, one hit.
    pub fn update_counters(&self, hit: bool) {
        if self.is_enabled() {
            self.num_accesses.fetch_add(1, Ordering::Relaxed);
            if hit {
                self.num_hits.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Counts `hits` accesses that all hit, e.g. when a burst is resolved in
    /// one step.
    pub fn update_hits(&self, _op: MemOp, hits: u64) {
        if self.is_enabled() {
            self.num_accesses.fetch_add(hits, Ordering::Relaxed);
            self.num_hits.fetch_add(hits, Ordering::Relaxed);
        }
    }

    /// Snapshot of the cache's statistics, aggregated over all sets.
    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats {
            name: self.name.clone(),
            num_accesses: self.num_accesses.load(Ordering::Relaxed),
            num_hits: self.num_hits.load(Ordering::Relaxed),
            ..CacheStats::default()
        };

        for set in &self.sets {
            let set_stats = set.lock().unwrap().stats();
            stats.evict_bc_write += set_stats.evict_bc_write;
            stats.compression.accumulate(&set_stats.compression);
            stats.replacement.accumulate(&set_stats.replacement);
        }

        stats.set_usage = self
            .set_usage
            .as_ref()
            .map(|usage| usage.iter().map(|c| c.load(Ordering::Relaxed)).collect());

        stats
    }
}
