// Copyright (c) 2019 King's College London created by the Software Development
// Team <http://soft-dev.org/>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0>, or the MIT license <LICENSE-MIT
// or http://opensource.org/licenses/MIT>, or the UPL-1.0 license
// <http://opensource.org/licenses/UPL> at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The incremental collector: tri-colour marking over an explicit grey
//! work-list with a per-invocation wall-clock budget.

use std::ptr::NonNull;
use std::time::Instant;

use crate::header::Header;
use crate::scan::MarkOutcome;
use crate::Collector;

/// Persistent state for an in-progress mark cycle, carried on the
/// [`Collector`] so it survives across suspending/resuming calls to
/// [`Collector::collect_incremental`].
///
/// `grey` and `black` are plain `Vec`s rather than the original source's
/// hand-rolled cons-cell lists. The persistence requirement is that this
/// state outlives a single invocation as a field, not that it take any
/// particular list shape, and a `Vec`-backed stack matches this crate's
/// own worklist elsewhere.
pub(crate) struct CycleState {
    /// `true` for the duration of an in-progress mark cycle.
    pub(crate) marking: bool,
    /// LIFO stack of blocks reached but not yet scanned.
    pub(crate) grey: Vec<NonNull<Header>>,
    /// Blocks fully scanned this cycle. Kept for parity with the
    /// original source's `black_list`; not required for correctness
    /// (a block's own colour tag already records this), but useful for
    /// diagnostics and for observing monotonic progress across slices.
    pub(crate) black: Vec<NonNull<Header>>,
}

impl CycleState {
    pub(crate) fn new() -> Self {
        CycleState {
            marking: false,
            grey: Vec::new(),
            black: Vec::new(),
        }
    }

    /// Number of blocks scanned so far in the current cycle.
    pub fn progress(&self) -> usize {
        self.black.len()
    }
}

impl Collector {
    /// Number of blocks scanned so far in the mark cycle currently (or
    /// most recently) in progress. Resets to zero each time a new cycle
    /// starts. Exposed so callers driving [`Collector::collect_incremental`]
    /// in a loop can observe that each slice makes non-decreasing
    /// progress.
    pub fn cycle_progress(&self) -> usize {
        self.cycle.progress()
    }

    /// Whether a mark cycle is currently suspended mid-way through
    /// [`Collector::collect_incremental`], i.e. a prior call returned
    /// without finishing sweeping.
    pub fn is_collecting(&self) -> bool {
        self.cycle.marking
    }

    /// Run one time-bounded slice of an ongoing mark-and-sweep cycle,
    /// starting a new cycle if none is in progress.
    ///
    /// Returns without effect (other than progress already made on the
    /// grey/black lists) if the time budget expires before the cycle
    /// completes this call.
    pub fn collect_incremental(&mut self) {
        if !self.try_enter() {
            return;
        }
        if self.used.is_empty() {
            self.leave();
            return;
        }

        if !self.cycle.marking {
            self.used.reset_colours();
            self.cycle.grey.clear();
            self.cycle.black.clear();
            self.cycle.marking = true;
            tracing::debug!("incremental cycle started");
        }

        if self.debug_flags.mark_phase {
            let deadline = Instant::now() + self.config.max_pause;
            if self.scan_roots(Some(deadline)) == MarkOutcome::Exhausted {
                tracing::trace!("incremental slice exhausted during root scan");
                self.leave();
                return;
            }
            if self.drain_grey(Some(deadline)) == MarkOutcome::Exhausted {
                tracing::trace!(
                    progress = self.cycle.progress(),
                    "incremental slice exhausted during heap scan"
                );
                self.leave();
                return;
            }
        }

        self.cycle.marking = false;
        if self.debug_flags.sweep_phase {
            self.sweep();
        }
        tracing::debug!("incremental cycle completed");
        self.leave();
    }
}
