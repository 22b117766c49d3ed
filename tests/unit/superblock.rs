//! Superblock Tag Structure Tests.
//!
//! Verifies supertag adoption and sharing, insertion admission, eviction,
//! invalidation, and the replacement-candidate filter.

use dish_cache::cache::superblock::SuperblockInfo;
use dish_cache::compression::TAG_UNUSED;
use dish_cache::{BlockInfo, CState, CacheKind};

fn info(tag: u64) -> BlockInfo {
    BlockInfo::new(CacheKind::Shared, tag, CState::Exclusive)
}

/// Tag of line `block_id` inside superblock `supertag`.
fn tag_of(supertag: u64, block_id: usize) -> u64 {
    (supertag << 2) | block_id as u64
}

// ══════════════════════════════════════════════════════════
// 1. Insertion admission
// ══════════════════════════════════════════════════════════

/// An empty superblock accepts any line and adopts its supertag.
#[test]
fn empty_superblock_adopts_supertag() {
    let mut superblock = SuperblockInfo::new();
    assert!(!superblock.is_valid());
    assert_eq!(superblock.supertag(), TAG_UNUSED);
    assert!(superblock.can_insert(0x77, 2, &info(tag_of(0x77, 2))));

    superblock.insert(0x77, 2, info(tag_of(0x77, 2)));
    assert_eq!(superblock.supertag(), 0x77);
    assert!(superblock.is_valid_block(2));
}

/// A populated superblock admits only free slots under the same supertag.
#[test]
fn populated_superblock_requires_matching_supertag() {
    let mut superblock = SuperblockInfo::new();
    superblock.insert(0x77, 0, info(tag_of(0x77, 0)));

    // Free slot, same supertag: admitted.
    assert!(superblock.can_insert(0x77, 1, &info(tag_of(0x77, 1))));
    // Occupied slot: rejected.
    assert!(!superblock.can_insert(0x77, 0, &info(tag_of(0x77, 0))));
    // Different supertag: rejected.
    assert!(!superblock.can_insert(0x99, 1, &info(tag_of(0x99, 1))));
}

/// Inserting without admission is a fatal tag-store corruption.
#[test]
#[should_panic]
fn insert_panics_on_supertag_mismatch() {
    let mut superblock = SuperblockInfo::new();
    superblock.insert(0x77, 0, info(tag_of(0x77, 0)));
    superblock.insert(0x99, 1, info(tag_of(0x99, 1)));
}

// ══════════════════════════════════════════════════════════
// 2. Lookup
// ══════════════════════════════════════════════════════════

/// `compare_tags` finds valid lines by tag and reports their position.
#[test]
fn compare_tags_finds_valid_lines_only() {
    let mut superblock = SuperblockInfo::new();
    superblock.insert(0x10, 1, info(tag_of(0x10, 1)));
    superblock.insert(0x10, 3, info(tag_of(0x10, 3)));

    assert_eq!(superblock.compare_tags(tag_of(0x10, 1)), Some(1));
    assert_eq!(superblock.compare_tags(tag_of(0x10, 3)), Some(3));
    assert_eq!(superblock.compare_tags(tag_of(0x10, 0)), None);

    superblock.invalidate(tag_of(0x10, 1), 1);
    assert_eq!(superblock.compare_tags(tag_of(0x10, 1)), None);
}

/// `peek_block` hides invalid slots.
#[test]
fn peek_block_filters_invalid_slots() {
    let mut superblock = SuperblockInfo::new();
    assert!(superblock.peek_block(0).is_none());

    superblock.insert(0x20, 0, info(tag_of(0x20, 0)));
    assert_eq!(superblock.peek_block(0).map(|b| b.tag()), Some(tag_of(0x20, 0)));
}

// ══════════════════════════════════════════════════════════
// 3. Eviction and invalidation
// ══════════════════════════════════════════════════════════

/// Evicting the last valid line clears the supertag; earlier evictions keep it.
#[test]
fn last_eviction_clears_supertag() {
    let mut superblock = SuperblockInfo::new();
    superblock.insert(0x30, 0, info(tag_of(0x30, 0)));
    superblock.insert(0x30, 1, info(tag_of(0x30, 1)));

    let evicted = superblock.evict(0).expect("slot 0 was valid");
    assert_eq!(evicted.tag(), tag_of(0x30, 0));
    assert_eq!(superblock.supertag(), 0x30);

    superblock.evict(1).expect("slot 1 was valid");
    assert!(!superblock.is_valid());
    assert_eq!(superblock.supertag(), TAG_UNUSED);

    // A new supertag may now move in.
    assert!(superblock.can_insert(0x55, 0, &info(tag_of(0x55, 0))));
}

/// Invalidating the last valid line also releases the supertag.
#[test]
fn invalidation_releases_supertag_when_empty() {
    let mut superblock = SuperblockInfo::new();
    superblock.insert(0x40, 2, info(tag_of(0x40, 2)));

    superblock.invalidate(tag_of(0x40, 2), 2);
    assert!(!superblock.is_valid());
    assert_eq!(superblock.supertag(), TAG_UNUSED);
}

#[test]
#[should_panic]
fn invalidate_panics_on_tag_mismatch() {
    let mut superblock = SuperblockInfo::new();
    superblock.insert(0x40, 2, info(tag_of(0x40, 2)));
    superblock.invalidate(tag_of(0x41, 2), 2);
}

// ══════════════════════════════════════════════════════════
// 4. Replacement filter
// ══════════════════════════════════════════════════════════

/// A superblock with an upgrading line must not be victimised.
#[test]
fn upgrading_line_blocks_replacement() {
    let mut superblock = SuperblockInfo::new();
    superblock.insert(0x50, 0, info(tag_of(0x50, 0)));
    assert!(superblock.is_valid_replacement());

    let mut upgrading = info(tag_of(0x50, 1));
    upgrading.set_cstate(CState::SharedUpgrading);
    superblock.insert(0x50, 1, upgrading);
    assert!(!superblock.is_valid_replacement());

    // The upgrade completing restores eligibility.
    superblock
        .peek_block_mut(1)
        .expect("slot 1 is valid")
        .set_cstate(CState::Modified);
    assert!(superblock.is_valid_replacement());
}
