//! Address Decomposition Tests.
//!
//! Verifies the superblock-aware address split, tag inversion, and the
//! pluggable set-index hashes.

use dish_cache::cache::addr::{AddressCodec, AddressHomeLookup};
use dish_cache::config::HashKind;

const BLOCKSIZE: usize = 64;
const NUM_SETS: usize = 16;

fn codec(hash: HashKind) -> AddressCodec {
    AddressCodec::new(BLOCKSIZE, NUM_SETS, hash, None)
}

// ══════════════════════════════════════════════════════════
// 1. Field extraction
// ══════════════════════════════════════════════════════════

/// With 64-byte lines: tag = addr >> 6, offset = addr & 63,
/// block_id = (addr >> 6) & 3, supertag = addr >> 8.
#[test]
fn split_extracts_all_fields() {
    let codec = codec(HashKind::Mask);
    let addr = 0x0001_2345u64;

    let parts = codec.split(addr);
    assert_eq!(parts.tag, addr >> 6);
    assert_eq!(parts.offset, (addr & 63) as usize);
    assert_eq!(parts.block_id, ((addr >> 6) & 3) as usize);
    assert_eq!(parts.supertag, addr >> 8);
    assert_eq!(parts.set_index, ((addr >> 8) % NUM_SETS as u64) as usize);
}

/// The four lines of an aligned superblock share a supertag and a set and
/// take block ids 0..4 in order.
#[test]
fn superblock_lines_share_set_and_supertag() {
    let codec = codec(HashKind::Mask);
    let base = 0x4_0000u64; // superblock aligned (multiple of 256)

    let parts0 = codec.split(base);
    for block_id in 0..4u64 {
        let parts = codec.split(base + block_id * BLOCKSIZE as u64);
        assert_eq!(parts.block_id, block_id as usize);
        assert_eq!(parts.supertag, parts0.supertag);
        assert_eq!(parts.set_index, parts0.set_index);
    }

    // The next superblock starts a new group.
    let next = codec.split(base + 4 * BLOCKSIZE as u64);
    assert_eq!(next.block_id, 0);
    assert_eq!(next.supertag, parts0.supertag + 1);
}

/// Splitting the reconstructed tag address yields the original tag.
#[test]
fn tag_to_address_inverts_split() {
    let codec = codec(HashKind::Mask);

    for addr in [0u64, 0x40, 0xFFC0, 0x1234_5678] {
        let parts = codec.split(addr);
        let rebuilt = codec.tag_to_address(parts.tag);
        assert_eq!(rebuilt, addr & !(BLOCKSIZE as u64 - 1));
        assert_eq!(codec.split(rebuilt).tag, parts.tag);
    }
}

// ══════════════════════════════════════════════════════════
// 2. Hash functions
// ══════════════════════════════════════════════════════════

/// For a power-of-two set count, mask and mod indexing agree.
#[test]
fn mask_and_mod_agree_for_power_of_two_sets() {
    let mask = codec(HashKind::Mask);
    let modulo = codec(HashKind::Mod);

    for addr in (0..0x10_000u64).step_by(64) {
        assert_eq!(mask.split(addr).set_index, modulo.split(addr).set_index);
    }
}

/// The rng hashes are deterministic and stay in range.
#[test]
fn rng_hashes_are_deterministic_and_in_range() {
    for hash in [HashKind::Rng1Mod, HashKind::Rng2Mod] {
        let a = codec(hash);
        let b = codec(hash);
        for addr in (0..0x8_000u64).step_by(64) {
            let index = a.split(addr).set_index;
            assert!(index < NUM_SETS);
            assert_eq!(index, b.split(addr).set_index);
        }
    }
}

/// The two rng variants spread a sequential sweep over every set.
#[test]
fn rng_hashes_spread_sequential_addresses() {
    for hash in [HashKind::Rng1Mod, HashKind::Rng2Mod] {
        let codec = codec(hash);
        let mut touched = vec![false; NUM_SETS];
        for addr in (0..0x10_000u64).step_by(256) {
            touched[codec.split(addr).set_index] = true;
        }
        assert!(touched.iter().all(|&t| t), "{:?} left sets unused", hash);
    }
}

// ══════════════════════════════════════════════════════════
// 3. Address-home translation
// ══════════════════════════════════════════════════════════

struct OffsetHome(u64);

impl AddressHomeLookup for OffsetHome {
    fn linear_address(&self, addr: u64) -> u64 {
        addr - self.0
    }
}

/// The home translation shifts the superblock decomposition but not the tag
/// or offset, which stay address-derived.
#[test]
fn home_lookup_applies_to_superblock_fields_only() {
    let base = 0x10_0000u64;
    let codec = AddressCodec::new(
        BLOCKSIZE,
        NUM_SETS,
        HashKind::Mask,
        Some(Box::new(OffsetHome(base))),
    );

    let addr = base + 0x140;
    let parts = codec.split(addr);
    assert_eq!(parts.tag, addr >> 6);
    assert_eq!(parts.offset, 0);
    // Linear address is 0x140: superblock_num = 5, block_id = 1, supertag = 1.
    assert_eq!(parts.block_id, 1);
    assert_eq!(parts.supertag, 1);
    assert_eq!(parts.set_index, 1);
}
