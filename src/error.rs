// Copyright (c) 2019 King's College London created by the Software Development
// Team <http://soft-dev.org/>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0>, or the MIT license <LICENSE-MIT
// or http://opensource.org/licenses/MIT>, or the UPL-1.0 license
// <http://opensource.org/licenses/UPL> at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Error kinds the collector can report.

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Errors the collector can report.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The OS refused to supply more pages, or the requested size
    /// overflows the unit calculation. Returned from `allocate`.
    #[error("out of memory: failed to obtain {units} more header units from the OS")]
    OutOfMemory {
        /// Units that were being requested when the page supplier failed.
        units: usize,
    },

    /// The process-info facility or linker symbols this collector needs
    /// are unavailable on this platform.
    #[error("platform unsupported: {0}")]
    PlatformUnsupported(&'static str),

    /// Another call into the same collector is already in progress. The
    /// caller sees this only if it re-enters non-reentrantly (e.g. from a
    /// signal handler); normal single-threaded use never hits it.
    #[error("collector is already busy with another operation")]
    Busy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_memory_reports_requested_units() {
        let err = Error::OutOfMemory { units: 42 };
        assert!(err.to_string().contains("42"));
    }
}
