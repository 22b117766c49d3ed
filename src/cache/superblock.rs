//! Superblock tag structure.
//!
//! A [`SuperblockInfo`] holds the metadata of up to four consecutive cache
//! lines sharing one supertag. While any slot is valid, every valid slot's
//! tag decomposes to the stored supertag; when the last valid slot leaves,
//! the supertag resets to unused.

use log::debug;

use crate::cache::block_info::{BlockInfo, CState};
use crate::compression::{SUPERBLOCK_SIZE, TAG_UNUSED};

/// Metadata for one physical way: a supertag plus four block slots.
#[derive(Debug, Clone)]
pub struct SuperblockInfo {
    supertag: u64,
    blocks: [Option<BlockInfo>; SUPERBLOCK_SIZE],
}

impl Default for SuperblockInfo {
    fn default() -> Self {
        Self::new()
    }
}

impl SuperblockInfo {
    /// Creates an empty superblock.
    pub fn new() -> Self {
        Self {
            supertag: TAG_UNUSED,
            blocks: Default::default(),
        }
    }

    /// Supertag shared by the resident lines ([`TAG_UNUSED`] when empty).
    pub fn supertag(&self) -> u64 {
        self.supertag
    }

    /// Returns the metadata of a resident, valid line.
    pub fn peek_block(&self, block_id: usize) -> Option<&BlockInfo> {
        assert!(block_id < SUPERBLOCK_SIZE);

        self.blocks[block_id].as_ref().filter(|info| info.is_valid())
    }

    /// Mutable access to a resident, valid line's metadata.
    pub fn peek_block_mut(&mut self, block_id: usize) -> Option<&mut BlockInfo> {
        assert!(block_id < SUPERBLOCK_SIZE);

        self.blocks[block_id].as_mut().filter(|info| info.is_valid())
    }

    /// Whether any slot holds a valid line.
    pub fn is_valid(&self) -> bool {
        self.blocks
            .iter()
            .any(|slot| slot.as_ref().is_some_and(|info| info.is_valid()))
    }

    /// Whether the given slot holds a valid line.
    pub fn is_valid_block(&self, block_id: usize) -> bool {
        assert!(block_id < SUPERBLOCK_SIZE);

        self.blocks[block_id].as_ref().is_some_and(|info| info.is_valid())
    }

    /// Whether `info` may be inserted at `block_id` under `supertag`:
    /// the superblock is empty, or the slot is free and the supertag matches.
    pub fn can_insert(&self, supertag: u64, block_id: usize, _info: &BlockInfo) -> bool {
        assert!(block_id < SUPERBLOCK_SIZE);

        if !self.is_valid() {
            true
        } else {
            !self.is_valid_block(block_id) && supertag == self.supertag
        }
    }

    /// Assigns `info` to the slot, adopting `supertag` if the superblock was
    /// empty.
    ///
    /// # Panics
    ///
    /// Panics when [`SuperblockInfo::can_insert`] does not hold; callers must
    /// check first. A supertag mismatch here means the set picked the wrong
    /// way and continuing would corrupt the tag store.
    pub fn insert(&mut self, supertag: u64, block_id: usize, info: BlockInfo) {
        assert!(
            self.can_insert(supertag, block_id, &info),
            "inserting supertag {:#x} block_id {} over supertag {:#x} (valid: {})",
            supertag,
            block_id,
            self.supertag,
            self.is_valid_block(block_id),
        );

        if !self.is_valid() {
            self.supertag = supertag;
        }
        self.blocks[block_id] = Some(info);
    }

    /// Takes the slot's metadata out, clearing the supertag when this was the
    /// last valid line.
    pub fn evict(&mut self, block_id: usize) -> Option<BlockInfo> {
        assert!(block_id < SUPERBLOCK_SIZE);

        let evicted = self.blocks[block_id].take();
        if !self.is_valid() {
            self.supertag = TAG_UNUSED;
        }

        evicted
    }

    /// Searches the four slots for a valid line with the given tag.
    pub fn compare_tags(&self, tag: u64) -> Option<usize> {
        self.blocks.iter().position(|slot| {
            slot.as_ref()
                .is_some_and(|info| info.is_valid() && info.tag() == tag)
        })
    }

    /// Marks the slot invalid. The slot must hold a valid line whose tag
    /// matches; the caller locates it through [`SuperblockInfo::compare_tags`].
    pub fn invalidate(&mut self, tag: u64, block_id: usize) {
        assert!(block_id < SUPERBLOCK_SIZE);

        let info = self.blocks[block_id]
            .as_mut()
            .filter(|info| info.is_valid())
            .unwrap_or_else(|| panic!("invalidating an already invalid block {}", block_id));
        assert!(
            info.tag() == tag,
            "invalidation tag mismatch ({:#x} != {:#x})",
            tag,
            info.tag(),
        );

        debug!("invalidating tag {:#x} block_id {}", tag, block_id);
        info.invalidate();

        if !self.is_valid() {
            self.supertag = TAG_UNUSED;
        }
    }

    /// A superblock may be victimised unless one of its lines is mid-upgrade
    /// in the coherence protocol.
    pub fn is_valid_replacement(&self) -> bool {
        !self.blocks.iter().any(|slot| {
            slot.as_ref()
                .is_some_and(|info| info.is_valid() && info.cstate() == CState::SharedUpgrading)
        })
    }
}
