// Copyright (c) 2019 King's College London created by the Software Development
// Team <http://soft-dev.org/>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0>, or the MIT license <LICENSE-MIT
// or http://opensource.org/licenses/MIT>, or the UPL-1.0 license
// <http://opensource.org/licenses/UPL> at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Heap statistics: a plain data snapshot, with formatting left to the
//! caller rather than printed directly by the collector.

use crate::header::UNIT_SIZE;
use crate::Collector;

/// A point-in-time snapshot of heap occupancy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Statistics {
    /// Bytes currently reachable and handed out to the client.
    pub live_bytes: u64,
    /// Bytes sitting on the free list, available for future allocations.
    pub free_bytes: u64,
    /// Bytes that lie between two adjacent free blocks without belonging
    /// to either: memory that is neither live nor immediately usable by
    /// an allocation request larger than either neighbour alone.
    pub gap_bytes: u64,
    /// Number of blocks currently on the used list.
    pub live_blocks: usize,
    /// Number of blocks currently on the free list.
    pub free_blocks: usize,
}

impl Statistics {
    /// Fraction of the free-list span (`free + gap`) that is unusable
    /// gap, in `[0.0, 1.0]`. Returns `0.0` when there is no free memory
    /// at all, rather than dividing by zero.
    pub fn fragmentation(&self) -> f64 {
        let total = self.free_bytes + self.gap_bytes;
        if total == 0 {
            0.0
        } else {
            self.gap_bytes as f64 / total as f64
        }
    }

    /// Fraction of the heap (`live + free`) that is currently free, in
    /// `[0.0, 1.0]`. Returns `0.0` on a heap with no mapped memory at
    /// all, rather than dividing by zero.
    pub fn free_fraction(&self) -> f64 {
        let total = self.live_bytes + self.free_bytes;
        if total == 0 {
            0.0
        } else {
            self.free_bytes as f64 / total as f64
        }
    }
}

impl Collector {
    /// Compute a fresh [`Statistics`] snapshot by walking both lists.
    ///
    /// `verbose` additionally emits a `tracing` event per list (mirroring
    /// the original source's developer-facing dump), independent of
    /// whichever `tracing` subscriber the host process has installed.
    pub fn snapshot(&self, verbose: bool) -> Statistics {
        let mut live_bytes = 0u64;
        let mut live_blocks = 0usize;
        for block in self.used.iter() {
            live_bytes += block.payload_bytes() as u64;
            live_blocks += 1;
            if verbose {
                tracing::trace!(addr = block.addr(), size = block.size, "live block");
            }
        }

        let (free_bytes, gap_bytes) = self.free.fragmentation_bytes();
        let free_blocks = self.free.iter().count();
        if verbose {
            for block in self.free.iter() {
                tracing::trace!(addr = block.addr(), size = block.size * UNIT_SIZE, "free block");
            }
        }

        Statistics {
            live_bytes,
            free_bytes,
            gap_bytes,
            live_blocks,
            free_blocks,
        }
    }

    /// Fraction of the heap currently free, `free_bytes / (free_bytes +
    /// live_bytes)`, matching the original source's `print_statistics`
    /// return value. Equivalent to `self.snapshot(verbose).free_fraction()`.
    pub fn statistics(&self, verbose: bool) -> f64 {
        let snap = self.snapshot(verbose);
        tracing::debug!(
            live_bytes = snap.live_bytes,
            free_bytes = snap.free_bytes,
            gap_bytes = snap.gap_bytes,
            "heap statistics"
        );
        snap.free_fraction()
    }

    /// Fraction of the free-list span that is gap rather than usable
    /// free memory, matching the original source's `compute_fragmentation`.
    /// Equivalent to `self.snapshot(verbose).fragmentation()`.
    pub fn fragmentation(&self, verbose: bool) -> f64 {
        self.snapshot(verbose).fragmentation()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statistics_and_fragmentation_of_empty_heap_are_zero() {
        let gc = Collector::new().expect("collector init");
        assert_eq!(gc.statistics(false), 0.0);
        assert_eq!(gc.fragmentation(false), 0.0);
    }

    #[test]
    fn snapshot_counts_live_allocation() {
        let mut gc = Collector::new().expect("collector init");
        gc.allocate(64).unwrap();
        let snap = gc.snapshot(false);
        assert_eq!(snap.live_blocks, 1);
        assert!(snap.live_bytes >= 64);
    }

    #[test]
    fn statistics_is_the_free_fraction_not_the_gap_ratio() {
        let mut gc = Collector::new().expect("collector init");
        gc.allocate(32).unwrap();
        gc.allocate(32).unwrap();
        let snap = gc.snapshot(false);
        assert_eq!(gc.statistics(false), snap.free_fraction());
        assert!((0.0..=1.0).contains(&gc.statistics(false)));
        assert!((0.0..=1.0).contains(&gc.fragmentation(false)));
    }
}
