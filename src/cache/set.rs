//! One way-group of the cache.
//!
//! A [`CacheSet`] orchestrates parallel vectors of superblock metadata and
//! compressed data ways, kept in lock-step by way index. It implements
//! lookup, line read/write, insertion with merge-or-evict, invalidation, and
//! victim selection through its replacement policy. Evicted lines leave the
//! set as [`WritebackLine`] records owned by the caller.

use std::sync::Arc;

use log::{debug, warn};

use crate::cache::addr::AddressCodec;
use crate::cache::block_data::BlockData;
use crate::cache::block_info::BlockInfo;
use crate::cache::policies::{self, ReplacementPolicy};
use crate::cache::superblock::SuperblockInfo;
use crate::compression::{CompressionPolicy, SUPERBLOCK_SIZE};
use crate::config::CacheConfig;
use crate::error::{CacheError, ConfigError};
use crate::stats::{CompressionStats, SetStats};

/// Interface to the cache controller driving this cache, used by
/// query-based victim selection.
pub trait CacheController {
    /// Whether a lower cache level still holds the line.
    fn is_in_lower_level(&mut self, info: &BlockInfo) -> bool;

    /// Charges the controller for one QBS lookup.
    fn increment_qbs_lookup_cost(&mut self);
}

/// An evicted line surfaced to the caller for writeback.
#[derive(Debug)]
pub struct WritebackLine {
    /// Address of the evicted line.
    pub addr: u64,
    /// The line's metadata, moved out of the set.
    pub info: BlockInfo,
    /// The line's bytes, moved out of the set.
    pub data: Box<[u8]>,
}

/// Eviction sink filled by insert and write operations.
pub type WritebackLines = Vec<WritebackLine>;

/// One set: superblock metadata and data ways plus the replacement policy.
pub struct CacheSet {
    associativity: usize,
    blocksize: usize,
    codec: Arc<AddressCodec>,
    policy: Arc<CompressionPolicy>,
    infos: Vec<SuperblockInfo>,
    data: Vec<BlockData>,
    replacement: Box<dyn ReplacementPolicy>,
    evict_bc_write: u64,
}

impl CacheSet {
    /// Creates an empty set for the given configuration.
    pub fn new(
        config: &CacheConfig,
        codec: Arc<AddressCodec>,
        policy: Arc<CompressionPolicy>,
    ) -> Result<Self, ConfigError> {
        let replacement = policies::create(config)?;

        Ok(Self {
            associativity: config.associativity,
            blocksize: config.blocksize,
            codec,
            policy,
            infos: (0..config.associativity).map(|_| SuperblockInfo::new()).collect(),
            data: (0..config.associativity).map(|_| BlockData::new(config.blocksize)).collect(),
            replacement,
            evict_bc_write: 0,
        })
    }

    /// Number of ways in the set.
    pub fn associativity(&self) -> usize {
        self.associativity
    }

    /// Superblock metadata of one way.
    pub fn superblock(&self, way: usize) -> &SuperblockInfo {
        &self.infos[way]
    }

    /// Compressed data of one way.
    pub fn block_data(&self, way: usize) -> &BlockData {
        &self.data[way]
    }

    /// Metadata of a resident line, by position.
    pub fn peek_block(&self, way: usize, block_id: usize) -> Option<&BlockInfo> {
        assert!(way < self.associativity);

        self.infos[way].peek_block(block_id)
    }

    /// Mutable metadata of a resident line, for coherence transitions.
    pub fn peek_block_mut(&mut self, way: usize, block_id: usize) -> Option<&mut BlockInfo> {
        assert!(way < self.associativity);

        self.infos[way].peek_block_mut(block_id)
    }

    /// Locates a resident line by tag.
    ///
    /// The tag store places a line only at its address-derived block id, so a
    /// match anywhere else indicates a corrupted set and aborts.
    pub fn find(&self, tag: u64, block_id: usize) -> Option<(usize, &BlockInfo)> {
        for way in 0..self.associativity {
            if let Some(found_id) = self.infos[way].compare_tags(tag) {
                assert!(
                    found_id == block_id,
                    "line tag {:#x} resident at block_id {} instead of {}",
                    tag,
                    found_id,
                    block_id,
                );

                return self.infos[way].peek_block(found_id).map(|info| (way, info));
            }
        }

        None
    }

    /// Reads bytes from a resident line.
    pub fn read_line(
        &mut self,
        way: usize,
        block_id: usize,
        offset: usize,
        update_replacement: bool,
        rd_data: &mut [u8],
    ) {
        assert!(offset + rd_data.len() <= self.blocksize);
        assert!(
            self.infos[way].is_valid_block(block_id),
            "reading way {} block_id {} with no valid line",
            way,
            block_id,
        );

        self.data[way].read(block_id, offset, rd_data);

        if update_replacement {
            self.replacement.note_access(way);
        }
    }

    /// Writes bytes to a resident line.
    ///
    /// When the write cannot be recompressed in place, the line is evicted
    /// from its superblock, updated in a scratch buffer, and re-inserted
    /// through the normal insertion path; evictions caused by the
    /// re-insertion land in `writebacks`.
    ///
    /// # Errors
    ///
    /// [`CacheError::NoReplacementCandidate`] when the re-insertion finds no
    /// victim. The displaced line is appended to `writebacks` so it is not
    /// lost.
    ///
    /// # Panics
    ///
    /// Panics when no line with `tag` is resident; writes presume residency.
    pub fn write_line(
        &mut self,
        tag: u64,
        block_id: usize,
        offset: usize,
        wr_data: &[u8],
        update_replacement: bool,
        writebacks: &mut WritebackLines,
        cntlr: Option<&mut dyn CacheController>,
    ) -> Result<(), CacheError> {
        assert!(offset + wr_data.len() <= self.blocksize);

        let init_way = self
            .find(tag, block_id)
            .map(|(way, _)| way)
            .unwrap_or_else(|| panic!("writing non-resident line tag {:#x}", tag));

        let final_way = match self.data[init_way].write(block_id, offset, wr_data, &self.policy) {
            Ok(()) => init_way,
            Err(CacheError::IncompressibleWrite { .. }) => {
                // The block cannot be modified in place without changing the
                // compression factor. Evict it, patch the bytes, and
                // re-insert through the replacement machinery.
                self.evict_bc_write += 1;

                let mut scratch = vec![0u8; self.blocksize];
                self.data[init_way].evict(block_id, Some(&mut scratch), &self.policy);
                scratch[offset..offset + wr_data.len()].copy_from_slice(wr_data);

                let info = self.infos[init_way]
                    .evict(block_id)
                    .unwrap_or_else(|| panic!("valid line tag {:#x} vanished mid-write", tag));

                debug!(
                    "write to tag {:#x} block_id {} broke compression; re-inserting",
                    tag, block_id,
                );

                if let Err(e) = self.insert_line(info.clone(), &scratch, writebacks, cntlr) {
                    // No way can take the displaced line; surface it as a
                    // writeback so the update is not lost.
                    writebacks.push(WritebackLine {
                        addr: self.codec.tag_to_address(tag),
                        info,
                        data: scratch.into_boxed_slice(),
                    });
                    return Err(e);
                }

                self.find(tag, block_id)
                    .map(|(way, _)| way)
                    .unwrap_or_else(|| panic!("re-inserted line tag {:#x} missing", tag))
            }
            Err(e) => return Err(e),
        };

        if update_replacement {
            self.replacement.note_access(final_way);
        }

        Ok(())
    }

    /// Invalidates a resident line. A miss is logged and reported as `false`
    /// rather than aborting; crossed invalidations are normal under
    /// concurrent eviction.
    pub fn invalidate(&mut self, tag: u64, block_id: usize) -> bool {
        let found = self.find(tag, block_id).map(|(way, _)| way);

        match found {
            Some(way) => {
                self.infos[way].invalidate(tag, block_id);
                // Route the data-side invalidation through the policy so the
                // scheme occupancy accounting stays correct.
                self.data[way].invalidate(block_id, &self.policy);
                true
            }
            None => {
                warn!(
                    "invalidating tag {:#x} block_id {} but no lines were touched",
                    tag, block_id,
                );
                false
            }
        }
    }

    /// Inserts a full line into the set.
    ///
    /// The line first tries to merge into a way that can take both its
    /// metadata (empty superblock, or free slot under a matching supertag)
    /// and its data (compressible alongside the residents). Failing that, a
    /// victim way is selected, every resident line of its superblock is
    /// evicted into `writebacks`, and the new line takes the emptied way.
    ///
    /// # Errors
    ///
    /// [`CacheError::NoReplacementCandidate`] when every way holds a line
    /// that must not be victimised; the caller retries later.
    pub fn insert_line(
        &mut self,
        info: BlockInfo,
        ins_data: &[u8],
        writebacks: &mut WritebackLines,
        cntlr: Option<&mut dyn CacheController>,
    ) -> Result<(), CacheError> {
        assert!(ins_data.len() == self.blocksize, "inserted lines must be full blocks");

        let ins_addr = self.codec.tag_to_address(info.tag());
        let parts = self.codec.split(ins_addr);
        let (ins_supertag, ins_block_id) = (parts.supertag, parts.block_id);

        debug!(
            "inserting line addr {:#x} supertag {:#x} block_id {}",
            ins_addr, ins_supertag, ins_block_id,
        );

        for way in 0..self.associativity {
            if self.infos[way].can_insert(ins_supertag, ins_block_id, &info)
                && self.data[way].can_insert(ins_block_id, ins_data, &self.policy)
            {
                self.data[way].insert(ins_block_id, ins_data, &self.policy);
                self.infos[way].insert(ins_supertag, ins_block_id, info);

                debug!("line merged into existing superblock at way {}", way);
                return Ok(());
            }
        }

        let repl_way = self
            .replacement
            .select_victim(&self.infos, cntlr)
            .ok_or(CacheError::NoReplacementCandidate)?;

        // Kick out every line of the victim superblock so the whole way is
        // free for the incoming superblock.
        for i in 0..SUPERBLOCK_SIZE {
            if self.infos[repl_way].is_valid_block(i) {
                let mut evict_data = vec![0u8; self.blocksize];
                self.data[repl_way].evict(i, Some(&mut evict_data), &self.policy);

                let evict_info = self.infos[repl_way]
                    .evict(i)
                    .unwrap_or_else(|| panic!("valid slot {} vanished during eviction", i));
                let evict_addr = self.codec.tag_to_address(evict_info.tag());

                writebacks.push(WritebackLine {
                    addr: evict_addr,
                    info: evict_info,
                    data: evict_data.into_boxed_slice(),
                });
            }
        }
        assert!(!self.infos[repl_way].is_valid());

        self.data[repl_way].insert(ins_block_id, ins_data, &self.policy);
        self.infos[repl_way].insert(ins_supertag, ins_block_id, info);

        debug!(
            "line inserted at way {} after evicting its superblock ({} writebacks pending)",
            repl_way,
            writebacks.len(),
        );

        Ok(())
    }

    /// Whether the way may be victimised.
    pub fn is_valid_replacement(&self, way: usize) -> bool {
        self.infos[way].is_valid_replacement()
    }

    /// Snapshot of the set's statistics.
    pub fn stats(&self) -> SetStats {
        let mut compression = CompressionStats::default();
        for way_data in &self.data {
            compression.accumulate(way_data.compression_stats());
        }

        SetStats {
            evict_bc_write: self.evict_bc_write,
            compression,
            replacement: self.replacement.stats(),
        }
    }
}
