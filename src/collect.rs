// Copyright (c) 2019 King's College London created by the Software Development
// Team <http://soft-dev.org/>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0>, or the MIT license <LICENSE-MIT
// or http://opensource.org/licenses/MIT>, or the UPL-1.0 license
// <http://opensource.org/licenses/UPL> at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The stop-the-world collector and the sweep helper shared with the
//! incremental collector.

use crate::scan::MarkOutcome;
use crate::Collector;

impl Collector {
    /// Run one complete mark-and-sweep cycle to completion: reset every
    /// block to White, mark everything reachable from the data segment
    /// and the current stack, then reclaim whatever is left White.
    ///
    /// A no-op if another collector operation is already in progress on
    /// this instance, or if the used list is currently empty.
    pub fn collect(&mut self) {
        if !self.try_enter() {
            return;
        }
        if self.used.is_empty() {
            self.leave();
            return;
        }

        self.used.reset_colours();
        self.cycle.grey.clear();
        self.cycle.black.clear();

        if self.debug_flags.mark_phase {
            let root_outcome = self.scan_roots(None);
            debug_assert_eq!(root_outcome, MarkOutcome::Done, "unbounded scan cannot exhaust");
            let drain_outcome = self.drain_grey(None);
            debug_assert_eq!(drain_outcome, MarkOutcome::Done, "unbounded drain cannot exhaust");
        }

        if self.debug_flags.sweep_phase {
            self.sweep();
        }

        tracing::debug!("stop-the-world collection completed");
        self.leave();
    }

    /// Reclaim every White block in the used list back onto the free
    /// list, resetting every surviving block to White on the way.
    pub(crate) fn sweep(&mut self) {
        let free = &mut self.free;
        let mut reclaimed = 0usize;
        self.used.sweep(|block| {
            free.release(block);
            reclaimed += 1;
        });
        tracing::debug!(reclaimed, "sweep reclaimed blocks");
    }
}
