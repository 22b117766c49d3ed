//! Address decomposition for superblocked caches.
//!
//! An address splits into `{tag, supertag, set_index, block_id, offset}`.
//! Four physically consecutive lines share a supertag; the 2-bit block id
//! selects a line within its superblock. The set index is derived from the
//! superblock number so that all four lines of a superblock land in the same
//! set.

use crate::compression::SUPERBLOCK_SIZE;
use crate::config::HashKind;

/// Optional address-home translation applied before superblock
/// decomposition, e.g. to interleave addresses across NUCA slices.
pub trait AddressHomeLookup: Send + Sync {
    /// Maps an address to its linear (home-relative) form.
    fn linear_address(&self, addr: u64) -> u64;
}

/// The fields an address decomposes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressParts {
    /// Line number: address with the block offset stripped.
    pub tag: u64,
    /// Superblock number: the tag with the block-id bits stripped.
    pub supertag: u64,
    /// Target set.
    pub set_index: usize,
    /// Position of the line within its superblock (0..4).
    pub block_id: usize,
    /// Byte offset within the line.
    pub offset: usize,
}

/// Immutable address codec shared by a cache and its sets.
pub struct AddressCodec {
    blocksize: usize,
    num_sets: usize,
    log2_blocksize: u32,
    log2_superblock: u32,
    hash: HashKind,
    ahl: Option<Box<dyn AddressHomeLookup>>,
}

impl AddressCodec {
    /// Creates a codec for the given geometry.
    ///
    /// `blocksize` and `num_sets` must be powers of two (validated by the
    /// cache configuration before construction).
    pub fn new(
        blocksize: usize,
        num_sets: usize,
        hash: HashKind,
        ahl: Option<Box<dyn AddressHomeLookup>>,
    ) -> Self {
        debug_assert!(blocksize.is_power_of_two());
        debug_assert!(num_sets.is_power_of_two());

        Self {
            blocksize,
            num_sets,
            log2_blocksize: blocksize.trailing_zeros(),
            log2_superblock: (SUPERBLOCK_SIZE as u64).trailing_zeros(),
            hash,
            ahl,
        }
    }

    /// Cache line size in bytes.
    pub fn blocksize(&self) -> usize {
        self.blocksize
    }

    /// Number of sets addressed by the codec.
    pub fn num_sets(&self) -> usize {
        self.num_sets
    }

    /// Splits an address into its cache coordinates.
    pub fn split(&self, addr: u64) -> AddressParts {
        let tag = addr >> self.log2_blocksize;
        let offset = (addr & (self.blocksize as u64 - 1)) as usize;

        let linear = match &self.ahl {
            Some(ahl) => ahl.linear_address(addr),
            None => addr,
        };
        let superblock_num = linear >> self.log2_blocksize;
        let supertag = superblock_num >> self.log2_superblock;
        let block_id = (superblock_num & (SUPERBLOCK_SIZE as u64 - 1)) as usize;

        // All four lines of a superblock hash through the shared block
        // number, keeping them in the same set.
        let block_num = supertag;
        let set_index = self.set_index(block_num);

        AddressParts {
            tag,
            supertag,
            set_index,
            block_id,
            offset,
        }
    }

    /// Inverse of the tag field of [`AddressCodec::split`].
    pub fn tag_to_address(&self, tag: u64) -> u64 {
        tag << self.log2_blocksize
    }

    fn set_index(&self, block_num: u64) -> usize {
        match self.hash {
            HashKind::Mask => (block_num & (self.num_sets as u64 - 1)) as usize,
            HashKind::Mod => (block_num % self.num_sets as u64) as usize,
            HashKind::Rng1Mod => (mix64(block_num) % self.num_sets as u64) as usize,
            HashKind::Rng2Mod => (mix64(mix64(block_num)) % self.num_sets as u64) as usize,
        }
    }
}

/// One round of a splitmix64-style mixer, used by the rng hash variants.
fn mix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}
