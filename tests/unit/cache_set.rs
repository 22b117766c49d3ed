//! Cache Set Tests.
//!
//! Verifies set orchestration: superblock merging, replacement with
//! writeback collection, the self-eviction write path, and invalidation.

use std::sync::Arc;

use dish_cache::cache::addr::AddressCodec;
use dish_cache::cache::set::CacheSet;
use dish_cache::compression::CompressionPolicy;
use dish_cache::config::CacheConfig;
use dish_cache::{BlockInfo, CState, CacheError, CacheKind, Scheme, WritebackLines};

use crate::common::{init_logging, line_of, superblock_addr, test_config, uniform_line, BLOCKSIZE};

fn make_set(config: &CacheConfig) -> (CacheSet, Arc<CompressionPolicy>) {
    init_logging();

    let codec = Arc::new(AddressCodec::new(
        config.blocksize,
        config.num_sets,
        config.hash_function,
        None,
    ));
    let policy = Arc::new(CompressionPolicy::new(
        config.compressible,
        config.change_scheme_otf,
        config.prune_dish_entries,
    ));
    let set = CacheSet::new(config, codec, Arc::clone(&policy)).expect("valid test config");

    (set, policy)
}

fn info_at(supertag: u64, block_id: usize) -> BlockInfo {
    let tag = (supertag << 2) | block_id as u64;
    BlockInfo::new(CacheKind::Shared, tag, CState::Exclusive)
}

fn tag_of(supertag: u64, block_id: usize) -> u64 {
    (supertag << 2) | block_id as u64
}

// ══════════════════════════════════════════════════════════
// 1. Insertion: merge path
// ══════════════════════════════════════════════════════════

/// Lines of one superblock merge into a single way.
#[test]
fn lines_of_one_superblock_share_a_way() {
    let (mut set, _) = make_set(&test_config());
    let mut writebacks = WritebackLines::new();

    set.insert_line(info_at(7, 0), &uniform_line(0xAAAA_AAAA), &mut writebacks, None)
        .unwrap();
    set.insert_line(info_at(7, 1), &uniform_line(0xBBBB_BBBB), &mut writebacks, None)
        .unwrap();

    assert!(writebacks.is_empty());
    let (way_a, _) = set.find(tag_of(7, 0), 0).expect("line 0 resident");
    let (way_b, _) = set.find(tag_of(7, 1), 1).expect("line 1 resident");
    assert_eq!(way_a, way_b, "superblock lines must share a way");
    assert_eq!(set.block_data(way_a).scheme(), Scheme::Scheme1);
}

/// Different supertags land in different ways.
#[test]
fn different_supertags_take_separate_ways() {
    let (mut set, _) = make_set(&test_config());
    let mut writebacks = WritebackLines::new();

    set.insert_line(info_at(1, 0), &uniform_line(0x1), &mut writebacks, None)
        .unwrap();
    set.insert_line(info_at(2, 0), &uniform_line(0x2), &mut writebacks, None)
        .unwrap();

    let (way_a, _) = set.find(tag_of(1, 0), 0).expect("first line resident");
    let (way_b, _) = set.find(tag_of(2, 0), 0).expect("second line resident");
    assert_ne!(way_a, way_b);
    assert!(writebacks.is_empty());
}

// ══════════════════════════════════════════════════════════
// 2. Insertion: replacement path
// ══════════════════════════════════════════════════════════

/// Replacement evicts the whole victim superblock into the writeback list.
#[test]
fn replacement_evicts_victim_superblock() {
    let (mut set, _) = make_set(&test_config());
    let mut writebacks = WritebackLines::new();

    // Fill both ways: supertag 1 with two lines, supertag 2 with one.
    set.insert_line(info_at(1, 0), &uniform_line(0x10), &mut writebacks, None)
        .unwrap();
    set.insert_line(info_at(1, 1), &uniform_line(0x11), &mut writebacks, None)
        .unwrap();
    set.insert_line(info_at(2, 0), &uniform_line(0x20), &mut writebacks, None)
        .unwrap();
    assert!(writebacks.is_empty());

    // A third supertag must displace the LRU way (way 0, supertag 1).
    set.insert_line(info_at(3, 0), &uniform_line(0x30), &mut writebacks, None)
        .unwrap();

    assert_eq!(writebacks.len(), 2, "both lines of the victim superblock");
    let mut addrs: Vec<u64> = writebacks.iter().map(|wb| wb.addr).collect();
    addrs.sort_unstable();
    assert_eq!(addrs, vec![superblock_addr(1, 0), superblock_addr(1, 1)]);
    for wb in &writebacks {
        let expected = if wb.addr == superblock_addr(1, 0) { 0x10 } else { 0x11 };
        assert_eq!(wb.data.as_ref(), uniform_line(expected).as_slice());
        assert!(wb.info.is_valid());
    }

    assert!(set.find(tag_of(1, 0), 0).is_none());
    assert!(set.find(tag_of(1, 1), 1).is_none());
    assert!(set.find(tag_of(3, 0), 0).is_some());
}

/// A read refreshes recency, steering replacement to the other way.
#[test]
fn read_protects_way_from_replacement() {
    let (mut set, _) = make_set(&test_config());
    let mut writebacks = WritebackLines::new();

    set.insert_line(info_at(1, 0), &uniform_line(0x10), &mut writebacks, None)
        .unwrap();
    set.insert_line(info_at(2, 0), &uniform_line(0x20), &mut writebacks, None)
        .unwrap();

    // Touch supertag 1's line so way 0 becomes MRU.
    let (way, _) = set.find(tag_of(1, 0), 0).expect("resident");
    let mut buf = [0u8; 4];
    set.read_line(way, 0, 0, true, &mut buf);

    set.insert_line(info_at(3, 0), &uniform_line(0x30), &mut writebacks, None)
        .unwrap();

    assert!(set.find(tag_of(1, 0), 0).is_some(), "recently read line survives");
    assert!(set.find(tag_of(2, 0), 0).is_none(), "LRU way was displaced");
}

/// When every way holds an upgrading line, insertion reports no candidate.
#[test]
fn insertion_fails_with_all_ways_upgrading() {
    let (mut set, _) = make_set(&test_config());
    let mut writebacks = WritebackLines::new();

    for supertag in 1..=2u64 {
        let tag = tag_of(supertag, 0);
        let info = BlockInfo::new(CacheKind::Shared, tag, CState::SharedUpgrading);
        set.insert_line(info, &uniform_line(supertag as u32), &mut writebacks, None)
            .unwrap();
    }

    let result = set.insert_line(info_at(3, 0), &uniform_line(0x30), &mut writebacks, None);
    assert_eq!(result, Err(CacheError::NoReplacementCandidate));
    assert!(writebacks.is_empty(), "failed insertion must not evict anything");
}

// ══════════════════════════════════════════════════════════
// 3. Write path
// ══════════════════════════════════════════════════════════

/// An absorbable write stays in place.
#[test]
fn write_in_place_preserves_surroundings() {
    let (mut set, _) = make_set(&test_config());
    let mut writebacks = WritebackLines::new();

    set.insert_line(info_at(5, 2), &uniform_line(0x5555_5555), &mut writebacks, None)
        .unwrap();

    let patch = 0x1234_5678u32.to_le_bytes();
    set.write_line(tag_of(5, 2), 2, 20, &patch, true, &mut writebacks, None)
        .unwrap();
    assert!(writebacks.is_empty());

    let (way, _) = set.find(tag_of(5, 2), 2).expect("line resident");
    let mut line = vec![0u8; BLOCKSIZE];
    set.read_line(way, 2, 0, false, &mut line);

    let mut expected = uniform_line(0x5555_5555);
    expected[20..24].copy_from_slice(&patch);
    assert_eq!(line, expected);
}

/// A write that breaks compression evicts the block, re-inserts it, and
/// displaces the superblock's other resident as a writeback.
#[test]
fn incompressible_write_self_evicts_and_reinserts() {
    let config = CacheConfig {
        associativity: 1,
        ..test_config()
    };
    let (mut set, _) = make_set(&config);
    let mut writebacks = WritebackLines::new();

    // Two lines with eight distinct chunk values and eight distinct 28-bit
    // prefixes: the dictionary is exactly full under scheme 1 and scheme 2
    // is out of reach.
    let line_a = line_of(&[0x100, 0x200, 0x300, 0x400]);
    let line_b = line_of(&[0x500, 0x600, 0x700, 0x800]);
    set.insert_line(info_at(9, 0), &line_a, &mut writebacks, None).unwrap();
    set.insert_line(info_at(9, 1), &line_b, &mut writebacks, None).unwrap();
    assert_eq!(set.block_data(0).scheme(), Scheme::Scheme1);
    assert_eq!(set.block_data(0).used_slot_count(), 8);

    // A ninth distinct value cannot be absorbed anywhere in the set, so the
    // written line displaces its superblock partner.
    let patch = 0x900u32.to_le_bytes();
    set.write_line(tag_of(9, 0), 0, 0, &patch, true, &mut writebacks, None)
        .unwrap();

    assert_eq!(writebacks.len(), 1, "exactly one line displaced");
    assert_eq!(writebacks[0].addr, superblock_addr(9, 1));
    assert_eq!(writebacks[0].data.as_ref(), line_b.as_slice());

    // The written line survives with the patch applied, uncompressed.
    let (way, _) = set.find(tag_of(9, 0), 0).expect("re-inserted line resident");
    assert_eq!(set.block_data(way).scheme(), Scheme::Uncompressed);
    let mut line = vec![0u8; BLOCKSIZE];
    set.read_line(way, 0, 0, false, &mut line);
    let mut expected = line_a.clone();
    expected[0..4].copy_from_slice(&patch);
    assert_eq!(line, expected);

    assert_eq!(set.stats().evict_bc_write, 1);
}

#[test]
#[should_panic]
fn write_to_non_resident_line_panics() {
    let (mut set, _) = make_set(&test_config());
    let mut writebacks = WritebackLines::new();

    let _ = set.write_line(tag_of(1, 0), 0, 0, &[0u8; 4], false, &mut writebacks, None);
}

// ══════════════════════════════════════════════════════════
// 4. Invalidation
// ══════════════════════════════════════════════════════════

/// Invalidating a resident line removes it and fixes scheme accounting.
#[test]
fn invalidate_removes_line_and_scheme_accounting() {
    let (mut set, policy) = make_set(&test_config());
    let mut writebacks = WritebackLines::new();

    set.insert_line(info_at(4, 0), &uniform_line(0x1), &mut writebacks, None).unwrap();
    set.insert_line(info_at(4, 1), &uniform_line(0x2), &mut writebacks, None).unwrap();
    assert_eq!(policy.scheme_counts(), (1, 0));

    assert!(set.invalidate(tag_of(4, 0), 0));
    assert!(set.find(tag_of(4, 0), 0).is_none());
    assert_eq!(policy.scheme_counts(), (1, 0), "superblock still compressed");

    assert!(set.invalidate(tag_of(4, 1), 1));
    assert_eq!(policy.scheme_counts(), (0, 0), "last line out resets the scheme");
}

/// An invalidation miss is reported, not fatal.
#[test]
fn invalidate_miss_returns_false() {
    let (mut set, _) = make_set(&test_config());

    assert!(!set.invalidate(tag_of(6, 3), 3));
}
