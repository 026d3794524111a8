// Copyright (c) 2019 King's College London created by the Software Development
// Team <http://soft-dev.org/>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0>, or the MIT license <LICENSE-MIT
// or http://opensource.org/licenses/MIT>, or the UPL-1.0 license
// <http://opensource.org/licenses/UPL> at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! First-fit/next-fit allocation and the page supplier that backs it
//! when the free list runs dry.

use std::ptr::NonNull;

use crate::error::{Error, Result};
use crate::header::{Header, UNIT_SIZE};
use crate::{platform, Collector};

impl Collector {
    /// Return the address of a payload at least `n` bytes long, correctly
    /// aligned for any object the client can place there, threaded into
    /// the used list as White.
    ///
    /// The payload is not zeroed.
    ///
    /// Returns `Err(Error::Busy)` if another collector operation on this
    /// instance is already in progress (e.g. `allocate` called reentrantly
    /// from a signal handler mid-collection).
    pub fn allocate(&mut self, n: usize) -> Result<NonNull<u8>> {
        if !self.try_enter() {
            return Err(Error::Busy);
        }
        let result = self.allocate_locked(n);
        self.leave();
        result
    }

    fn allocate_locked(&mut self, n: usize) -> Result<NonNull<u8>> {
        let units = Header::units_for(n);

        let block = loop {
            if let Some(block) = self.free.take_first_fit(units) {
                break block;
            }
            self.morecore(units)?;
        };

        self.used.insert(block);
        tracing::debug!(bytes = n, units, "allocated block");
        Ok(Self::payload_of(block))
    }

    /// Map at least `max(units, page_size / UNIT_SIZE)` fresh header
    /// units of anonymous memory and insert them as a single free block.
    fn morecore(&mut self, units: usize) -> Result<()> {
        let floor_units = self
            .config
            .min_mapping_units
            .unwrap_or_else(|| platform::page_size() / UNIT_SIZE);
        let mapped_units = units.max(floor_units);
        let bytes = mapped_units
            .checked_mul(UNIT_SIZE)
            .ok_or(Error::OutOfMemory { units: mapped_units })?;

        let pages = platform::map_pages(bytes)?;
        let block = pages.cast::<Header>();
        unsafe {
            (*block.as_ptr()).size = mapped_units;
        }
        tracing::debug!(mapped_units, "mapped fresh pages from the OS");
        self.free.release(block);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_returns_distinct_non_overlapping_payloads() {
        let mut gc = crate::Collector::new().expect("collector init");
        let a = gc.allocate(64).unwrap();
        let b = gc.allocate(64).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn allocate_zero_bytes_succeeds() {
        let mut gc = crate::Collector::new().expect("collector init");
        assert!(gc.allocate(0).is_ok());
    }

    #[test]
    fn allocate_near_a_page_forces_morecore() {
        let mut gc = crate::Collector::new().expect("collector init");
        // Comfortably larger than one page so the free list (initially
        // empty) must call through to the page supplier at least once.
        let page = platform::page_size();
        let ptr = gc.allocate(page - UNIT_SIZE).unwrap();
        unsafe {
            // Touch the first and last byte of the claimed payload.
            *ptr.as_ptr() = 1;
        }
    }
}
