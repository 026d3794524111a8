// Copyright (c) 2019 King's College London created by the Software Development
// Team <http://soft-dev.org/>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0>, or the MIT license <LICENSE-MIT
// or http://opensource.org/licenses/MIT>, or the UPL-1.0 license
// <http://opensource.org/licenses/UPL> at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Narrow OS interfaces the core consumes: anonymous page mapping, the
//! process stack base, the data-segment bounds, and a hook to read the
//! current frame pointer. None of this is collector logic; it is kept in
//! one place so a port to another platform only has to replace this
//! file.

use std::ptr::NonNull;

use crate::error::Error;

/// Anonymous, read-write pages the collector does not otherwise use.
///
/// `mmap` rather than `brk`/`sbrk`: the collector must not assume it owns
/// the program break, since the client's own `malloc` almost certainly
/// does.
pub(crate) fn map_pages(bytes: usize) -> Result<NonNull<u8>, Error> {
    let addr = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            bytes,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
            -1,
            0,
        )
    };
    if addr == libc::MAP_FAILED {
        return Err(Error::OutOfMemory {
            units: bytes / crate::header::UNIT_SIZE,
        });
    }
    // Safety: mmap succeeded, so `addr` is a valid non-null mapping.
    Ok(unsafe { NonNull::new_unchecked(addr as *mut u8) })
}

/// OS page size, queried once and cached by the caller. Falls back to the
/// historically-assumed 4096 bytes if `sysconf` cannot answer.
pub(crate) fn page_size() -> usize {
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as usize
    } else {
        4096
    }
}

/// Address of the process's stack base (the "old" end, farthest from the
/// current frame), read once at collector construction.
///
/// Generalized from reading `/proc/self/stat` (as the original C source
/// does) to the equivalent `pthread_getattr_np` query, which does not
/// require parsing a text file.
#[cfg(target_os = "linux")]
pub(crate) fn stack_base() -> Option<usize> {
    unsafe {
        let mut attr: libc::pthread_attr_t = std::mem::zeroed();
        if libc::pthread_attr_init(&mut attr) != 0 {
            return None;
        }
        let tid = libc::pthread_self();
        let got_attr = libc::pthread_getattr_np(tid, &mut attr) == 0;

        let mut result = None;
        if got_attr {
            let mut stack_addr = std::ptr::null_mut();
            let mut stack_size = 0usize;
            if libc::pthread_attr_getstack(&attr, &mut stack_addr, &mut stack_size) == 0 {
                result = Some(stack_addr as usize + stack_size);
            }
        }

        libc::pthread_attr_destroy(&mut attr);
        result
    }
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn stack_base() -> Option<usize> {
    None
}

/// Bounds of the writable data segment, via the linker-provided `etext`
/// and `end` symbols.
#[cfg(target_os = "linux")]
pub(crate) fn data_segment() -> (usize, usize) {
    extern "C" {
        static etext: u8;
        static end: u8;
    }
    unsafe {
        (
            std::ptr::addr_of!(etext) as usize,
            std::ptr::addr_of!(end) as usize,
        )
    }
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn data_segment() -> (usize, usize) {
    (0, 0)
}

/// Read the current call frame's base-pointer register: the younger end
/// of the range scanned as stack roots.
///
/// Contract: the returned address points within the caller's activation
/// record and is no younger than any live local the caller holds.
/// Expressed with stable inline assembly rather than an externally
/// linked register-spilling stub, since `core::arch::asm!` is sufficient
/// for a single register read and needs no build-time assembler step.
#[cfg(target_arch = "x86_64")]
#[inline(always)]
pub(crate) fn current_stack_frame() -> usize {
    let frame: usize;
    unsafe {
        std::arch::asm!("mov {}, rbp", out(reg) frame, options(nomem, nostack, preserves_flags));
    }
    frame
}

#[cfg(target_arch = "aarch64")]
#[inline(always)]
pub(crate) fn current_stack_frame() -> usize {
    let frame: usize;
    unsafe {
        std::arch::asm!("mov {}, x29", out(reg) frame, options(nomem, nostack, preserves_flags));
    }
    frame
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
#[inline(always)]
pub(crate) fn current_stack_frame() -> usize {
    // No platform hook for this architecture: return 0 so the scan range
    // below is empty rather than garbage. `Collector::new` already refuses
    // to start on platforms without a `stack_base`; this is the residual
    // case of a supported OS on an unsupported architecture.
    0
}
