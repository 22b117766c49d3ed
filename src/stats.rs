//! Compression and replacement statistics.
//!
//! This module tracks occupancy metrics for the compressed cache. It provides:
//! 1. **Compression:** Per-scheme superblock occupancy histograms and
//!    on-the-fly switch counts.
//! 2. **Replacement:** Access-depth and QBS-attempt histograms.
//! 3. **Cache totals:** Access/hit counters, write-caused evictions, and an
//!    optional per-set insertion histogram.
//!
//! All structures are plain-field snapshots collected on demand; nothing is
//! registered globally. Callers aggregate them with `accumulate`.

use std::fmt;

use crate::compression::SUPERBLOCK_SIZE;

/// Occupancy statistics of one or more superblock data ways.
///
/// `scheme1[k]` / `scheme2[k]` count insertions that left the superblock
/// holding `k + 1` valid lines under that scheme.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompressionStats {
    /// Insertions into an uncompressed (single-line) superblock.
    pub uncompressed_1x: u64,
    /// Scheme-1 occupancy histogram, indexed by valid-line count minus one.
    pub scheme1: [u64; SUPERBLOCK_SIZE],
    /// Scheme-2 occupancy histogram, indexed by valid-line count minus one.
    pub scheme2: [u64; SUPERBLOCK_SIZE],
    /// On-the-fly switches between the two compressed schemes.
    pub otf_switch: u64,
}

impl CompressionStats {
    /// Folds another snapshot into this one.
    pub fn accumulate(&mut self, other: &CompressionStats) {
        self.uncompressed_1x += other.uncompressed_1x;
        for i in 0..SUPERBLOCK_SIZE {
            self.scheme1[i] += other.scheme1[i];
            self.scheme2[i] += other.scheme2[i];
        }
        self.otf_switch += other.otf_switch;
    }
}

/// Victim-selection statistics of one or more replacement policy instances.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplacementStats {
    /// Access-depth histogram: `access_depth[d]` counts accesses that hit a
    /// way at distance `d` from the MRU position.
    pub access_depth: Vec<u64>,
    /// QBS attempt histogram: `qbs_attempts[a]` counts victims accepted on
    /// attempt `a`. Empty for policies without query-based selection.
    pub qbs_attempts: Vec<u64>,
}

impl ReplacementStats {
    /// Folds another snapshot into this one, growing histograms as needed.
    pub fn accumulate(&mut self, other: &ReplacementStats) {
        if self.access_depth.len() < other.access_depth.len() {
            self.access_depth.resize(other.access_depth.len(), 0);
        }
        for (i, v) in other.access_depth.iter().enumerate() {
            self.access_depth[i] += v;
        }
        if self.qbs_attempts.len() < other.qbs_attempts.len() {
            self.qbs_attempts.resize(other.qbs_attempts.len(), 0);
        }
        for (i, v) in other.qbs_attempts.iter().enumerate() {
            self.qbs_attempts[i] += v;
        }
    }
}

/// Snapshot of one cache set.
#[derive(Debug, Clone, Default)]
pub struct SetStats {
    /// Lines evicted because an in-place write could not be recompressed.
    pub evict_bc_write: u64,
    /// Occupancy statistics summed over the set's ways.
    pub compression: CompressionStats,
    /// Victim-selection statistics of the set's policy.
    pub replacement: ReplacementStats,
}

/// Snapshot of a whole cache.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Cache name, as configured.
    pub name: String,
    /// Accesses counted while the cache was enabled.
    pub num_accesses: u64,
    /// Hits counted while the cache was enabled.
    pub num_hits: u64,
    /// Write-caused evictions summed over all sets.
    pub evict_bc_write: u64,
    /// Occupancy statistics summed over all sets.
    pub compression: CompressionStats,
    /// Victim-selection statistics summed over all sets.
    pub replacement: ReplacementStats,
    /// Insertions per set, when tracking is enabled.
    pub set_usage: Option<Vec<u64>>,
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let accesses = if self.num_accesses == 0 { 1 } else { self.num_accesses };
        writeln!(f, "==========================================================")?;
        writeln!(f, "CACHE STATISTICS: {}", self.name)?;
        writeln!(f, "==========================================================")?;
        writeln!(f, "num_accesses             {}", self.num_accesses)?;
        writeln!(f, "num_hits                 {}", self.num_hits)?;
        writeln!(
            f,
            "hit_rate                 {:.2}%",
            (self.num_hits as f64 / accesses as f64) * 100.0
        )?;
        writeln!(f, "evict_bc_write           {}", self.evict_bc_write)?;
        writeln!(f, "otf_switch               {}", self.compression.otf_switch)?;
        writeln!(f, "uncompressed_1x          {}", self.compression.uncompressed_1x)?;
        for i in 0..SUPERBLOCK_SIZE {
            writeln!(f, "scheme1_{}x               {}", i + 1, self.compression.scheme1[i])?;
        }
        for i in 0..SUPERBLOCK_SIZE {
            writeln!(f, "scheme2_{}x               {}", i + 1, self.compression.scheme2[i])?;
        }
        for (d, count) in self.replacement.access_depth.iter().enumerate() {
            writeln!(f, "access-mru-{:<13}{}", d, count)?;
        }
        for (a, count) in self.replacement.qbs_attempts.iter().enumerate() {
            writeln!(f, "qbs-attempt-{:<12}{}", a, count)?;
        }
        write!(f, "==========================================================")
    }
}

impl CacheStats {
    /// Prints the report to stdout.
    pub fn print(&self) {
        println!("{}", self);
    }
}
