//! Compressed payload storage for one superblock.
//!
//! A [`BlockData`] holds the data of up to four consecutive cache lines in a
//! single physical way. Lines are stored either raw (one line, uncompressed)
//! or through a shared dictionary of 32-bit chunk values (scheme 1) or
//! 28-bit chunk prefixes plus per-chunk offsets (scheme 2). It provides:
//! 1. **Predicates:** whether data fits a scheme given the current dictionary.
//! 2. **Transformations:** scheme changes, chunk encoding, and dictionary
//!    compaction.
//! 3. **Operations:** read, write, insert, evict, and invalidate of one line.
//!
//! A plaintext mirror of every resident line is kept alongside the encoded
//! form, so decompression is a plain byte copy.

use std::collections::{BTreeSet, HashMap, HashSet};

use log::debug;

use crate::compression::{
    CompressionPolicy, Scheme, GRANULARITY_BYTES, SCHEME1_DICT_SIZE, SCHEME2_DICT_SIZE,
    SCHEME2_OFFSET_BITS, SCHEME2_OFFSET_MASK, SUPERBLOCK_SIZE,
};
use crate::error::CacheError;
use crate::stats::CompressionStats;

/// Reads the `index`-th 32-bit chunk of a line.
fn chunk_at(buf: &[u8], index: usize) -> u32 {
    let base = index * GRANULARITY_BYTES;
    u32::from_le_bytes([buf[base], buf[base + 1], buf[base + 2], buf[base + 3]])
}

/// Iterates the 32-bit chunks of a line.
fn chunks(buf: &[u8]) -> impl Iterator<Item = u32> + '_ {
    buf.chunks_exact(GRANULARITY_BYTES)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
}

/// Data container for one superblock way.
pub struct BlockData {
    blocksize: usize,
    chunks_per_block: usize,
    scheme: Scheme,
    valid: [bool; SUPERBLOCK_SIZE],

    // Plaintext mirrors, one per line, kept current under every scheme.
    data: [Vec<u8>; SUPERBLOCK_SIZE],

    // Dictionary entries are full 32-bit values under scheme 1 and 28-bit
    // truncated values under scheme 2.
    dict: HashMap<u8, u32>,
    free_slots: BTreeSet<u8>,
    used_slots: BTreeSet<u8>,

    // Per-chunk dictionary slots, and scheme-2 per-chunk offsets.
    ptrs: [Vec<u8>; SUPERBLOCK_SIZE],
    offsets: [Vec<u8>; SUPERBLOCK_SIZE],

    stats: CompressionStats,
}

impl BlockData {
    /// Creates an empty, uncompressed superblock way for `blocksize`-byte
    /// lines.
    pub fn new(blocksize: usize) -> Self {
        let chunks_per_block = blocksize / GRANULARITY_BYTES;

        let mut block_data = Self {
            blocksize,
            chunks_per_block,
            scheme: Scheme::Uncompressed,
            valid: [false; SUPERBLOCK_SIZE],
            data: std::array::from_fn(|_| vec![0u8; blocksize]),
            dict: HashMap::with_capacity(SCHEME1_DICT_SIZE),
            free_slots: BTreeSet::new(),
            used_slots: BTreeSet::new(),
            ptrs: std::array::from_fn(|_| vec![0u8; chunks_per_block]),
            offsets: std::array::from_fn(|_| vec![0u8; chunks_per_block]),
            stats: CompressionStats::default(),
        };
        block_data.change_scheme(Scheme::Uncompressed);

        block_data
    }

    /// Current encoding scheme.
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Whether any line is resident.
    pub fn is_valid(&self) -> bool {
        self.valid.iter().any(|&v| v)
    }

    /// Whether the given line is resident.
    pub fn is_valid_block(&self, block_id: usize) -> bool {
        assert!(block_id < SUPERBLOCK_SIZE);

        self.valid[block_id]
    }

    /// Occupancy statistics gathered by this way.
    pub fn compression_stats(&self) -> &CompressionStats {
        &self.stats
    }

    fn first_valid(&self) -> Option<usize> {
        self.valid.iter().position(|&v| v)
    }

    fn num_valid(&self) -> usize {
        self.valid.iter().filter(|&&v| v).count()
    }

    fn lookup_dict_entry(&self, value: u32) -> Option<u8> {
        self.dict
            .iter()
            .find(|(_, &v)| v == value)
            .map(|(&slot, _)| slot)
    }

    /// Maps `value` to a dictionary slot, binding the lowest free slot when
    /// the value is new.
    ///
    /// # Panics
    ///
    /// Panics when no free slot remains. The compressibility predicates are
    /// required to have ruled this out, so a full dictionary here is a
    /// programming error, not a data condition.
    fn insert_dict_entry(&mut self, value: u32) -> u8 {
        if let Some(slot) = self.lookup_dict_entry(value) {
            return slot;
        }

        let slot = *self
            .free_slots
            .iter()
            .next()
            .unwrap_or_else(|| panic!("inserting {:#x} into a full {} dictionary", value, self.scheme));
        self.free_slots.remove(&slot);
        self.dict.insert(slot, value);
        self.used_slots.insert(slot);

        slot
    }

    /// Transitions the dictionary to `new`: any previous entries are
    /// dropped and the free list is repopulated with the new scheme's slots.
    /// Callers re-encode resident lines afterwards.
    fn change_scheme(&mut self, new: Scheme) {
        assert!(new != Scheme::Invalid, "cannot change to the invalid scheme");

        if self.scheme != new {
            debug!("changing scheme from {} to {}", self.scheme, new);
        }
        if matches!(
            (self.scheme, new),
            (Scheme::Scheme1, Scheme::Scheme2) | (Scheme::Scheme2, Scheme::Scheme1)
        ) {
            self.stats.otf_switch += 1;
        }

        self.dict.clear();
        self.used_slots.clear();
        self.free_slots.clear();
        for slot in 0..new.dict_capacity() as u8 {
            self.free_slots.insert(slot);
        }
        self.scheme = new;
    }

    /// The line's mirror with `wr_data` overlaid at `offset`.
    fn merged_block(&self, block_id: usize, offset: usize, wr_data: &[u8]) -> Vec<u8> {
        let mut merged = self.data[block_id].clone();
        merged[offset..offset + wr_data.len()].copy_from_slice(wr_data);
        merged
    }

    // ------------------------------------------------------------------
    // Compressibility predicates
    // ------------------------------------------------------------------

    /// Whether overlaying `wr_data` at `offset` of `block_id` leaves the
    /// superblock representable under `try_scheme`.
    ///
    /// The dictionary is not recomputed for the test: feasibility is judged
    /// against the entries the resident lines currently pin.
    pub fn is_compressible(
        &self,
        block_id: usize,
        offset: usize,
        wr_data: &[u8],
        try_scheme: Scheme,
        policy: &CompressionPolicy,
    ) -> bool {
        assert!(offset + wr_data.len() <= self.blocksize);
        assert!(block_id < SUPERBLOCK_SIZE);

        if !policy.can_compress() {
            return try_scheme == Scheme::Uncompressed && self.valid[block_id];
        }
        if !self.is_valid() {
            // Empty superblocks accept any scheme.
            return true;
        }

        match try_scheme {
            Scheme::Scheme1 => self.is_scheme1_compressible(block_id, offset, wr_data, policy),
            Scheme::Scheme2 => self.is_scheme2_compressible(block_id, offset, wr_data, policy),
            Scheme::Uncompressed => self.valid[block_id],
            Scheme::Invalid => panic!("cannot test compressibility for the invalid scheme"),
        }
    }

    fn is_scheme1_compressible(
        &self,
        block_id: usize,
        offset: usize,
        wr_data: &[u8],
        policy: &CompressionPolicy,
    ) -> bool {
        if !self.is_valid() || !policy.can_compress() {
            return false;
        }

        // A non-resident target must be written as a full new line; a
        // resident one accepts any legal offset/length combination.
        debug_assert!(
            self.valid[block_id] || (offset == 0 && wr_data.len() == self.blocksize)
        );

        match self.scheme {
            Scheme::Scheme1 => {
                // Each post-write chunk either matches an existing entry or
                // consumes a vacancy. Repeated new values are counted once
                // per occurrence, which under-approximates feasibility but
                // never overfills the dictionary.
                let merged = self.merged_block(block_id, offset, wr_data);
                let mut vacancies = self.free_slots.len();
                for value in chunks(&merged) {
                    if self.lookup_dict_entry(value).is_none() {
                        if vacancies == 0 {
                            return false;
                        }
                        vacancies -= 1;
                    }
                }
                true
            }
            Scheme::Scheme2 => {
                if !policy.can_change_scheme_otf() {
                    return false;
                }
                // Re-encoding from scratch: every distinct chunk of the other
                // resident lines plus the post-write target must fit.
                let mut unique = HashSet::new();
                for i in 0..SUPERBLOCK_SIZE {
                    if self.valid[i] && i != block_id {
                        unique.extend(chunks(&self.data[i]));
                    }
                }
                unique.extend(chunks(&self.merged_block(block_id, offset, wr_data)));

                unique.len() <= SCHEME1_DICT_SIZE
            }
            Scheme::Uncompressed => {
                let mut unique = HashSet::new();
                // The single resident line; present by the validity check
                // above. A full overwrite of it contributes only the new
                // chunks.
                let Some(uncompressed_id) = self.first_valid() else {
                    return false;
                };
                if uncompressed_id != block_id {
                    unique.extend(chunks(&self.data[uncompressed_id]));
                }
                unique.extend(chunks(&self.merged_block(block_id, offset, wr_data)));

                unique.len() <= SCHEME1_DICT_SIZE
            }
            Scheme::Invalid => unreachable!("stored scheme is never invalid"),
        }
    }

    fn is_scheme2_compressible(
        &self,
        block_id: usize,
        offset: usize,
        wr_data: &[u8],
        policy: &CompressionPolicy,
    ) -> bool {
        if !self.is_valid() || !policy.can_compress() {
            return false;
        }

        debug_assert!(
            self.valid[block_id] || (offset == 0 && wr_data.len() == self.blocksize)
        );

        match self.scheme {
            Scheme::Scheme1 => {
                if !policy.can_change_scheme_otf() {
                    return false;
                }
                let mut unique = HashSet::new();
                for i in 0..SUPERBLOCK_SIZE {
                    if self.valid[i] && i != block_id {
                        unique.extend(chunks(&self.data[i]).map(|v| v >> SCHEME2_OFFSET_BITS));
                    }
                }
                unique.extend(
                    chunks(&self.merged_block(block_id, offset, wr_data))
                        .map(|v| v >> SCHEME2_OFFSET_BITS),
                );

                unique.len() <= SCHEME2_DICT_SIZE
            }
            Scheme::Scheme2 => {
                let merged = self.merged_block(block_id, offset, wr_data);
                let mut vacancies = self.free_slots.len();
                for value in chunks(&merged) {
                    if self.lookup_dict_entry(value >> SCHEME2_OFFSET_BITS).is_none() {
                        if vacancies == 0 {
                            return false;
                        }
                        vacancies -= 1;
                    }
                }
                true
            }
            Scheme::Uncompressed => {
                let mut unique = HashSet::new();
                let Some(uncompressed_id) = self.first_valid() else {
                    return false;
                };
                if uncompressed_id != block_id {
                    unique.extend(
                        chunks(&self.data[uncompressed_id]).map(|v| v >> SCHEME2_OFFSET_BITS),
                    );
                }
                unique.extend(
                    chunks(&self.merged_block(block_id, offset, wr_data))
                        .map(|v| v >> SCHEME2_OFFSET_BITS),
                );

                unique.len() <= SCHEME2_DICT_SIZE
            }
            Scheme::Invalid => unreachable!("stored scheme is never invalid"),
        }
    }

    fn scheme_compressible(
        &self,
        try_scheme: Scheme,
        block_id: usize,
        offset: usize,
        wr_data: &[u8],
        policy: &CompressionPolicy,
    ) -> bool {
        match try_scheme {
            Scheme::Scheme1 => self.is_scheme1_compressible(block_id, offset, wr_data, policy),
            Scheme::Scheme2 => self.is_scheme2_compressible(block_id, offset, wr_data, policy),
            Scheme::Uncompressed | Scheme::Invalid => false,
        }
    }

    // ------------------------------------------------------------------
    // Scheme selection
    // ------------------------------------------------------------------

    /// Encoding to use for an in-place write, or `Invalid` when the write
    /// cannot be absorbed. Writes presume the target line is resident.
    pub fn get_scheme_for_write(
        &self,
        block_id: usize,
        offset: usize,
        wr_data: &[u8],
        policy: &CompressionPolicy,
    ) -> Scheme {
        if !self.is_valid() || !self.valid[block_id] {
            return Scheme::Invalid;
        }

        match self.scheme {
            Scheme::Uncompressed => Scheme::Uncompressed,
            Scheme::Scheme1 => {
                if self.is_scheme1_compressible(block_id, offset, wr_data, policy) {
                    Scheme::Scheme1
                } else if policy.can_change_scheme_otf()
                    && self.is_scheme2_compressible(block_id, offset, wr_data, policy)
                {
                    Scheme::Scheme2
                } else {
                    Scheme::Invalid
                }
            }
            Scheme::Scheme2 => {
                if self.is_scheme2_compressible(block_id, offset, wr_data, policy) {
                    Scheme::Scheme2
                } else if policy.can_change_scheme_otf()
                    && self.is_scheme1_compressible(block_id, offset, wr_data, policy)
                {
                    Scheme::Scheme1
                } else {
                    Scheme::Invalid
                }
            }
            Scheme::Invalid => unreachable!("stored scheme is never invalid"),
        }
    }

    /// Encoding to use for inserting a full new line, or `Invalid` when the
    /// line cannot join this superblock.
    pub fn get_scheme_for_insertion(
        &self,
        block_id: usize,
        ins_data: &[u8],
        policy: &CompressionPolicy,
    ) -> Scheme {
        if !policy.can_compress() {
            // Without compression a way holds a single line.
            return if self.is_valid() {
                Scheme::Invalid
            } else {
                Scheme::Uncompressed
            };
        }
        if !self.is_valid() {
            return Scheme::Uncompressed;
        }
        if self.valid[block_id] {
            return Scheme::Invalid;
        }

        match self.scheme {
            Scheme::Uncompressed => {
                // Leaving the uncompressed state: bias towards the scheme
                // holding more superblocks, fall back to the other.
                let preferred = policy.default_scheme();
                let fallback = match preferred {
                    Scheme::Scheme2 => Scheme::Scheme1,
                    _ => Scheme::Scheme2,
                };

                if self.scheme_compressible(preferred, block_id, 0, ins_data, policy) {
                    preferred
                } else if self.scheme_compressible(fallback, block_id, 0, ins_data, policy) {
                    fallback
                } else {
                    Scheme::Invalid
                }
            }
            Scheme::Scheme1 => {
                if self.is_scheme1_compressible(block_id, 0, ins_data, policy) {
                    Scheme::Scheme1
                } else if policy.can_change_scheme_otf()
                    && self.is_scheme2_compressible(block_id, 0, ins_data, policy)
                {
                    Scheme::Scheme2
                } else {
                    Scheme::Invalid
                }
            }
            Scheme::Scheme2 => {
                if self.is_scheme2_compressible(block_id, 0, ins_data, policy) {
                    Scheme::Scheme2
                } else if policy.can_change_scheme_otf()
                    && self.is_scheme1_compressible(block_id, 0, ins_data, policy)
                {
                    Scheme::Scheme1
                } else {
                    Scheme::Invalid
                }
            }
            Scheme::Invalid => unreachable!("stored scheme is never invalid"),
        }
    }

    // ------------------------------------------------------------------
    // Transformations
    // ------------------------------------------------------------------

    /// Re-encodes chunks `lo..hi` of a line from its mirror under scheme 1.
    fn encode_scheme1(&mut self, block_id: usize, lo: usize, hi: usize) {
        for i in lo..hi {
            let value = chunk_at(&self.data[block_id], i);
            self.ptrs[block_id][i] = self.insert_dict_entry(value);
        }
    }

    /// Re-encodes chunks `lo..hi` of a line from its mirror under scheme 2.
    fn encode_scheme2(&mut self, block_id: usize, lo: usize, hi: usize) {
        for i in lo..hi {
            let value = chunk_at(&self.data[block_id], i);
            self.ptrs[block_id][i] = self.insert_dict_entry(value >> SCHEME2_OFFSET_BITS);
            self.offsets[block_id][i] = (value & SCHEME2_OFFSET_MASK) as u8;
        }
    }

    fn compress_scheme1(
        &mut self,
        block_id: usize,
        offset: usize,
        wr_data: &[u8],
        policy: &CompressionPolicy,
    ) {
        assert!(self.is_valid(), "compressing from an empty superblock");
        assert!(
            self.valid[block_id] || (offset == 0 && wr_data.len() == self.blocksize)
        );
        assert!(
            self.scheme != Scheme::Uncompressed
                || (offset == 0 && wr_data.len() == self.blocksize)
        );
        assert!(
            self.is_scheme1_compressible(block_id, offset, wr_data, policy),
            "scheme-1 compression attempted on incompressible data"
        );

        match self.scheme {
            Scheme::Scheme1 => {
                if policy.should_prune() {
                    self.compact();
                }
                self.data[block_id][offset..offset + wr_data.len()].copy_from_slice(wr_data);

                let lo = offset / GRANULARITY_BYTES;
                let hi = (offset + wr_data.len()).div_ceil(GRANULARITY_BYTES);
                self.encode_scheme1(block_id, lo, hi);
            }
            Scheme::Uncompressed => {
                policy.insert(Scheme::Scheme1);
                self.change_scheme(Scheme::Scheme1);

                // Bring the previously uncompressed line into the dictionary
                // before the incoming one.
                if let Some(u) = self.first_valid() {
                    if u != block_id {
                        self.encode_scheme1(u, 0, self.chunks_per_block);
                    }
                }

                self.data[block_id][offset..offset + wr_data.len()].copy_from_slice(wr_data);
                self.encode_scheme1(block_id, 0, self.chunks_per_block);
            }
            Scheme::Scheme2 => {
                assert!(
                    policy.can_change_scheme_otf(),
                    "scheme change attempted while on-the-fly switching is disabled"
                );
                policy.evict(Scheme::Scheme2);
                policy.insert(Scheme::Scheme1);
                self.change_scheme(Scheme::Scheme1);

                for i in 0..SUPERBLOCK_SIZE {
                    if self.valid[i] && i != block_id {
                        self.encode_scheme1(i, 0, self.chunks_per_block);
                    }
                }

                self.data[block_id][offset..offset + wr_data.len()].copy_from_slice(wr_data);
                self.encode_scheme1(block_id, 0, self.chunks_per_block);
            }
            Scheme::Invalid => unreachable!("stored scheme is never invalid"),
        }
    }

    fn compress_scheme2(
        &mut self,
        block_id: usize,
        offset: usize,
        wr_data: &[u8],
        policy: &CompressionPolicy,
    ) {
        assert!(self.is_valid(), "compressing from an empty superblock");
        assert!(
            self.valid[block_id] || (offset == 0 && wr_data.len() == self.blocksize)
        );
        assert!(
            self.scheme != Scheme::Uncompressed
                || (offset == 0 && wr_data.len() == self.blocksize)
        );
        assert!(
            self.is_scheme2_compressible(block_id, offset, wr_data, policy),
            "scheme-2 compression attempted on incompressible data"
        );

        match self.scheme {
            Scheme::Scheme2 => {
                if policy.should_prune() {
                    self.compact();
                }
                self.data[block_id][offset..offset + wr_data.len()].copy_from_slice(wr_data);

                let lo = offset / GRANULARITY_BYTES;
                let hi = (offset + wr_data.len()).div_ceil(GRANULARITY_BYTES);
                self.encode_scheme2(block_id, lo, hi);
            }
            Scheme::Uncompressed => {
                policy.insert(Scheme::Scheme2);
                self.change_scheme(Scheme::Scheme2);

                if let Some(u) = self.first_valid() {
                    if u != block_id {
                        self.encode_scheme2(u, 0, self.chunks_per_block);
                    }
                }

                self.data[block_id][offset..offset + wr_data.len()].copy_from_slice(wr_data);
                self.encode_scheme2(block_id, 0, self.chunks_per_block);
            }
            Scheme::Scheme1 => {
                assert!(
                    policy.can_change_scheme_otf(),
                    "scheme change attempted while on-the-fly switching is disabled"
                );
                policy.evict(Scheme::Scheme1);
                policy.insert(Scheme::Scheme2);
                self.change_scheme(Scheme::Scheme2);

                for i in 0..SUPERBLOCK_SIZE {
                    if self.valid[i] && i != block_id {
                        self.encode_scheme2(i, 0, self.chunks_per_block);
                    }
                }

                self.data[block_id][offset..offset + wr_data.len()].copy_from_slice(wr_data);
                self.encode_scheme2(block_id, 0, self.chunks_per_block);
            }
            Scheme::Invalid => unreachable!("stored scheme is never invalid"),
        }
    }

    /// Scavenges dictionary entries no longer referenced by any resident
    /// line's chunks and returns their slots to the free list.
    pub fn compact(&mut self) {
        if !self.is_valid() {
            return;
        }

        match self.scheme {
            Scheme::Scheme1 => self.compact_with(|v| v),
            Scheme::Scheme2 => self.compact_with(|v| v >> SCHEME2_OFFSET_BITS),
            Scheme::Uncompressed => {}
            Scheme::Invalid => unreachable!("stored scheme is never invalid"),
        }
    }

    fn compact_with(&mut self, key: fn(u32) -> u32) {
        let mut live: HashSet<u32> = HashSet::new();
        for i in 0..SUPERBLOCK_SIZE {
            if self.valid[i] {
                live.extend(chunks(&self.data[i]).map(key));
            }
        }

        let dead: Vec<u8> = self
            .dict
            .iter()
            .filter(|(_, value)| !live.contains(value))
            .map(|(&slot, _)| slot)
            .collect();
        for slot in dead {
            self.dict.remove(&slot);
            self.used_slots.remove(&slot);
            self.free_slots.insert(slot);
        }
    }

    // ------------------------------------------------------------------
    // Public line operations
    // ------------------------------------------------------------------

    /// Whether an in-place write of `wr_data` at `offset` can be absorbed.
    pub fn can_write(
        &self,
        block_id: usize,
        offset: usize,
        wr_data: &[u8],
        policy: &CompressionPolicy,
    ) -> bool {
        if !self.valid[block_id] {
            return false;
        }

        self.get_scheme_for_write(block_id, offset, wr_data, policy) != Scheme::Invalid
    }

    /// Writes `wr_data` at `offset` of a resident line, re-encoding as
    /// needed.
    ///
    /// # Errors
    ///
    /// [`CacheError::IncompressibleWrite`] when no permitted scheme can hold
    /// the post-write superblock; the owning set recovers by evicting the
    /// line and re-inserting it.
    pub fn write(
        &mut self,
        block_id: usize,
        offset: usize,
        wr_data: &[u8],
        policy: &CompressionPolicy,
    ) -> Result<(), CacheError> {
        assert!(offset + wr_data.len() <= self.blocksize);
        assert!(block_id < SUPERBLOCK_SIZE);

        match self.get_scheme_for_write(block_id, offset, wr_data, policy) {
            Scheme::Uncompressed => {
                self.data[block_id][offset..offset + wr_data.len()].copy_from_slice(wr_data);
            }
            Scheme::Scheme1 => self.compress_scheme1(block_id, offset, wr_data, policy),
            Scheme::Scheme2 => self.compress_scheme2(block_id, offset, wr_data, policy),
            Scheme::Invalid => return Err(CacheError::IncompressibleWrite { block_id }),
        }

        if policy.should_prune() {
            self.compact();
        }

        Ok(())
    }

    /// Copies `rd_data.len()` bytes at `offset` of a resident line into
    /// `rd_data`. The mirror makes this a plain copy under every scheme.
    pub fn read(&self, block_id: usize, offset: usize, rd_data: &mut [u8]) {
        assert!(offset + rd_data.len() <= self.blocksize);
        assert!(self.valid[block_id], "reading an invalid block {}", block_id);

        rd_data.copy_from_slice(&self.data[block_id][offset..offset + rd_data.len()]);
    }

    /// Whether a full new line can join this superblock.
    pub fn can_insert(
        &self,
        block_id: usize,
        ins_data: &[u8],
        policy: &CompressionPolicy,
    ) -> bool {
        if self.valid[block_id] {
            return false;
        }

        self.get_scheme_for_insertion(block_id, ins_data, policy) != Scheme::Invalid
    }

    /// Installs a full new line at `block_id`.
    ///
    /// # Panics
    ///
    /// Panics when the slot is already resident or the data does not fit any
    /// permitted scheme; callers gate insertion on
    /// [`BlockData::can_insert`].
    pub fn insert(&mut self, block_id: usize, ins_data: &[u8], policy: &CompressionPolicy) {
        assert!(block_id < SUPERBLOCK_SIZE);
        assert!(
            ins_data.len() == self.blocksize,
            "inserted lines must be full blocks"
        );
        assert!(
            !self.valid[block_id],
            "inserting block {} on top of an existing one",
            block_id
        );

        match self.get_scheme_for_insertion(block_id, ins_data, policy) {
            Scheme::Uncompressed => self.data[block_id].copy_from_slice(ins_data),
            Scheme::Scheme1 => self.compress_scheme1(block_id, 0, ins_data, policy),
            Scheme::Scheme2 => self.compress_scheme2(block_id, 0, ins_data, policy),
            Scheme::Invalid => panic!("inserting a line that fits no permitted scheme"),
        }

        self.valid[block_id] = true;

        if policy.should_prune() {
            self.compact();
        }

        self.update_statistics();
    }

    /// Removes a resident line, copying its bytes into `evict_data` when
    /// requested. The last line leaving resets the way to uncompressed.
    pub fn evict(
        &mut self,
        block_id: usize,
        evict_data: Option<&mut [u8]>,
        policy: &CompressionPolicy,
    ) {
        assert!(self.valid[block_id], "evicting an invalid block {}", block_id);

        if let Some(out) = evict_data {
            out.copy_from_slice(&self.data[block_id]);
        }

        self.clear_block(block_id);

        if !self.is_valid() {
            policy.evict(self.scheme);
            self.change_scheme(Scheme::Uncompressed);
        } else if policy.should_prune() {
            self.compact();
        }
    }

    /// Removes a resident line without producing its bytes.
    pub fn invalidate(&mut self, block_id: usize, policy: &CompressionPolicy) {
        assert!(self.valid[block_id], "invalidating an invalid block {}", block_id);

        self.clear_block(block_id);

        if !self.is_valid() {
            policy.evict(self.scheme);
            self.change_scheme(Scheme::Uncompressed);
        }
    }

    fn clear_block(&mut self, block_id: usize) {
        self.valid[block_id] = false;
        self.data[block_id].fill(0);
        self.ptrs[block_id].fill(0);
        self.offsets[block_id].fill(0);
    }

    fn update_statistics(&mut self) {
        let resident = self.num_valid();
        match self.scheme {
            Scheme::Uncompressed => {
                if resident > 0 {
                    self.stats.uncompressed_1x += 1;
                }
            }
            Scheme::Scheme1 => {
                if (1..=SUPERBLOCK_SIZE).contains(&resident) {
                    self.stats.scheme1[resident - 1] += 1;
                }
            }
            Scheme::Scheme2 => {
                if (1..=SUPERBLOCK_SIZE).contains(&resident) {
                    self.stats.scheme2[resident - 1] += 1;
                }
            }
            Scheme::Invalid => {}
        }
    }

    /// Number of free dictionary slots under the current scheme.
    pub fn free_slot_count(&self) -> usize {
        self.free_slots.len()
    }

    /// Number of bound dictionary slots under the current scheme.
    pub fn used_slot_count(&self) -> usize {
        self.used_slots.len()
    }
}
