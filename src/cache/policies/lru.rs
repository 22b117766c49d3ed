//! Least Recently Used (LRU) replacement policy.
//!
//! Maintains an order list of way indices from LRU to MRU. Accessing a way
//! moves it to the MRU end; victim selection walks from the LRU end and
//! returns the first way not blocked by an in-flight coherence upgrade.

use log::warn;

use super::ReplacementPolicy;
use crate::cache::set::CacheController;
use crate::cache::superblock::SuperblockInfo;
use crate::stats::ReplacementStats;

/// LRU policy state for one set.
pub struct Lru {
    /// Way indices ordered LRU (front) to MRU (back); always a permutation
    /// of `0..associativity`.
    order: Vec<usize>,
    /// Access-depth histogram, indexed by distance from MRU.
    access_depth: Vec<u64>,
}

impl Lru {
    /// Creates the policy for a set with `associativity` ways.
    pub fn new(associativity: usize) -> Self {
        Self {
            order: (0..associativity).collect(),
            access_depth: vec![0; associativity],
        }
    }

    fn move_to_mru(&mut self, way: usize) {
        if let Some(pos) = self.order.iter().position(|&w| w == way) {
            self.order.remove(pos);
        }
        self.order.push(way);
    }

    /// Distance of `way` from the MRU end (0 = MRU).
    fn depth(&self, way: usize) -> usize {
        self.order
            .iter()
            .rev()
            .position(|&w| w == way)
            .unwrap_or(self.order.len() - 1)
    }
}

impl ReplacementPolicy for Lru {
    fn select_victim(
        &mut self,
        ways: &[SuperblockInfo],
        _cntlr: Option<&mut dyn CacheController>,
    ) -> Option<usize> {
        // Unallocated superblocks are free capacity; take them first.
        for (way, superblock) in ways.iter().enumerate() {
            if !superblock.is_valid() {
                self.move_to_mru(way);
                return Some(way);
            }
        }

        for i in 0..self.order.len() {
            let way = self.order[i];
            if ways[way].is_valid_replacement() {
                self.move_to_mru(way);
                return Some(way);
            }
        }

        warn!("no way in the set is a valid replacement candidate");
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
            qbs_attempts: Vec::new(),
        }
    }
}
