//! LRU replacement with Query-Based Selection.
//!
//! Victims are chosen as under plain LRU, but before evicting, every valid
//! line of the candidate superblock is queried against the lower cache
//! level. A candidate still resident below is pushed back to MRU and the
//! search retries from the LRU end, up to a configured number of attempts.
//! With one attempt no queries are issued and the policy degenerates to
//! plain LRU.

use log::warn;

use super::ReplacementPolicy;
use crate::cache::set::CacheController;
use crate::cache::superblock::SuperblockInfo;
use crate::compression::SUPERBLOCK_SIZE;
use crate::stats::ReplacementStats;

/// LRU-QBS policy state for one set.
pub struct LruQbs {
    /// Way indices ordered LRU (front) to MRU (back); always a permutation
    /// of `0..associativity`.
    order: Vec<usize>,
    num_attempts: usize,
    /// Whether a final rejected attempt may still evict, forcing the lower
    /// level to invalidate its copy.
    allow_fwd_inv: bool,
    access_depth: Vec<u64>,
    qbs_attempts: Vec<u64>,
}

impl LruQbs {
    /// Creates the policy for a set with `associativity` ways.
    pub fn new(associativity: usize, num_attempts: usize, allow_fwd_inv: bool) -> Self {
        assert!(num_attempts >= 1, "QBS requires at least one attempt");

        Self {
            order: (0..associativity).collect(),
            num_attempts,
            allow_fwd_inv,
            access_depth: vec![0; associativity],
            qbs_attempts: vec![0; num_attempts],
        }
    }

    fn move_to_mru(&mut self, way: usize) {
        if let Some(pos) = self.order.iter().position(|&w| w == way) {
            self.order.remove(pos);
        }
        self.order.push(way);
    }

    fn depth(&self, way: usize) -> usize {
        self.order
            .iter()
            .rev()
            .position(|&w| w == way)
            .unwrap_or(self.order.len() - 1)
    }

    /// Whether any valid line of the candidate superblock is still held by a
    /// lower cache level.
    fn query_lower_level(
        superblock: &SuperblockInfo,
        cntlr: &mut dyn CacheController,
    ) -> bool {
        let mut reject = false;
        for block_id in 0..SUPERBLOCK_SIZE {
            if let Some(info) = superblock.peek_block(block_id) {
                reject |= cntlr.is_in_lower_level(info);
            }
        }

        reject
    }
}

impl ReplacementPolicy for LruQbs {
    fn select_victim(
        &mut self,
        ways: &[SuperblockInfo],
        mut cntlr: Option<&mut dyn CacheController>,
    ) -> Option<usize> {
        // Unallocated superblocks are free capacity; take them first.
        for (way, superblock) in ways.iter().enumerate() {
            if !superblock.is_valid() {
                self.move_to_mru(way);
                return Some(way);
            }
        }

        for attempt in 0..self.num_attempts {
            let repl_way = self
                .order
                .iter()
                .copied()
                .find(|&way| ways[way].is_valid_replacement());
            let Some(repl_way) = repl_way else {
                warn!("no way in the set is a valid replacement candidate");
                return None;
            };

            // With a single attempt the query step is skipped entirely,
            // making the policy identical to plain LRU.
            let qbs_reject = match (self.num_attempts > 1, cntlr.as_deref_mut()) {
                (true, Some(cntlr)) => Self::query_lower_level(&ways[repl_way], cntlr),
                _ => false,
            };

            if attempt < self.num_attempts - 1 {
                if qbs_reject {
                    // Still held below; give the superblock another lease and
                    // charge the controller for the lookup.
                    self.move_to_mru(repl_way);
                    if let Some(cntlr) = cntlr.as_deref_mut() {
                        cntlr.increment_qbs_lookup_cost();
                    }
                } else {
                    self.move_to_mru(repl_way);
                    self.qbs_attempts[attempt] += 1;
                    return Some(repl_way);
                }
            } else if !qbs_reject || self.allow_fwd_inv {
                self.move_to_mru(repl_way);
                self.qbs_attempts[attempt] += 1;
                return Some(repl_way);
            }
        }

        warn!("query-based selection found no evictable superblock");
        None
    }

    fn note_access(&mut self, way: usize) {
        let depth = self.depth(way);
        self.access_depth[depth] += 1;
        self.move_to_mru(way);
    }

    fn stats(&self) -> ReplacementStats {
        ReplacementStats {
            access_depth: self.access_depth.clone(),
            qbs_attempts: self.qbs_attempts.clone(),
        }
    }
}
