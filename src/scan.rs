// Copyright (c) 2019 King's College London created by the Software Development
// Team <http://soft-dev.org/>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0>, or the MIT license <LICENSE-MIT
// or http://opensource.org/licenses/MIT>, or the UPL-1.0 license
// <http://opensource.org/licenses/UPL> at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The conservative scanner and the tri-colour mark engine that both the
//! stop-the-world and the incremental collector drive, sharing a single
//! work-list formulation between both modes.

use std::ptr::NonNull;
use std::time::Instant;

use crate::header::{Header, UNIT_SIZE};
use crate::tag::Colour;
use crate::Collector;

const WORD_SIZE: usize = std::mem::size_of::<usize>();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MarkOutcome {
    /// The grey work-list is empty: marking is done for this cycle.
    Done,
    /// The time budget ran out with work still remaining.
    Exhausted,
}

impl Collector {
    /// Scan `[start, end)` word by word, enqueueing every new hit as
    /// Grey. Returns `Exhausted` if `deadline` passes before the range
    /// is exhausted; `deadline` of `None` means "no budget", used by the
    /// stop-the-world collector.
    pub(crate) fn scan_range(
        &mut self,
        start: usize,
        end: usize,
        deadline: Option<Instant>,
    ) -> MarkOutcome {
        if end <= start {
            return MarkOutcome::Done;
        }
        // Candidate pointers are only meaningful word-aligned; roots
        // handed in from the platform layer (frame pointer, linker
        // symbols) are not guaranteed to be, so align up defensively.
        let mut addr = (start + WORD_SIZE - 1) & !(WORD_SIZE - 1);
        while addr + WORD_SIZE <= end {
            // Safety: `[start, end)` is the data segment or the live
            // stack range, both entirely mapped and readable for the
            // duration of a collector call.
            let candidate = unsafe { *(addr as *const usize) };
            if let Some(block) = self.used.find_hit(candidate) {
                self.mark_grey(block);
            }
            addr += WORD_SIZE;
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return MarkOutcome::Exhausted;
                }
            }
        }
        MarkOutcome::Done
    }

    /// Scan the data segment then the live stack range, in that order.
    /// Both ranges are rescanned from the
    /// beginning on every call: only the heap scan's grey work-list
    /// persists across invocations.
    pub(crate) fn scan_roots(&mut self, deadline: Option<Instant>) -> MarkOutcome {
        let (seg_start, seg_end) = crate::platform::data_segment();
        if self.scan_range(seg_start, seg_end, deadline) == MarkOutcome::Exhausted {
            return MarkOutcome::Exhausted;
        }

        let frame = crate::platform::current_stack_frame();
        let (lo, hi) = if frame <= self.stack_base {
            (frame, self.stack_base)
        } else {
            // Ascending order regardless of stack growth direction.
            (self.stack_base, frame)
        };
        self.scan_range(lo, hi, deadline)
    }

    fn mark_grey(&mut self, block: NonNull<Header>) {
        unsafe {
            if (*block.as_ptr()).colour() == Colour::White {
                (*block.as_ptr()).set_colour(Colour::Grey);
                self.cycle.grey.push(block);
            }
        }
    }

    /// Pop the grey work-list, scanning each block's payload for further
    /// hits, until it empties or the budget runs out. A block found to
    /// have been superseded (no longer Grey by
    /// the time it is popped) is simply discarded.
    pub(crate) fn drain_grey(&mut self, deadline: Option<Instant>) -> MarkOutcome {
        while let Some(block) = self.cycle.grey.pop() {
            unsafe {
                if (*block.as_ptr()).colour() != Colour::Grey {
                    continue;
                }
                let base = (*block.as_ptr()).payload_addr();
                let limit = (*block.as_ptr()).addr() + (*block.as_ptr()).size * UNIT_SIZE;
                let mut addr = base;
                let mut exhausted = false;
                while addr + WORD_SIZE <= limit {
                    let candidate = *(addr as *const usize);
                    if let Some(hit) = self.used.find_hit(candidate) {
                        self.mark_grey(hit);
                    }
                    addr += WORD_SIZE;
                    if let Some(deadline) = deadline {
                        if Instant::now() >= deadline {
                            exhausted = true;
                            break;
                        }
                    }
                }
                if exhausted {
                    // Not finished with this block's payload: re-push it
                    // (still Grey) so the next invocation resumes. This
                    // rescans the block's payload from the top rather
                    // than tracking an exact resume offset. Idempotent,
                    // since candidates pointing at already-Black/Grey
                    // blocks are no-ops, at the cost of some redundant
                    // word reads.
                    self.cycle.grey.push(block);
                    return MarkOutcome::Exhausted;
                }
                (*block.as_ptr()).set_colour(Colour::Black);
                self.cycle.black.push(block);
            }
        }
        MarkOutcome::Done
    }
}
