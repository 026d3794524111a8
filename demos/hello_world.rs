// Copyright (c) 2019 King's College London created by the Software Development
// Team <http://soft-dev.org/>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0>, or the MIT license <LICENSE-MIT
// or http://opensource.org/licenses/MIT>, or the UPL-1.0 license
// <http://opensource.org/licenses/UPL> at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use congc::Collector;

fn main() {
    let mut gc = Collector::new().expect("failed to initialize collector");
    let message = match gc.allocate(32) {
        Ok(ptr) => ptr,
        Err(e) => {
            eprintln!("Something went wrong and memory couldn't be allocated: {e}");
            std::process::exit(1);
        }
    };

    unsafe {
        let text = b"Hello, world!\0";
        std::ptr::copy_nonoverlapping(text.as_ptr(), message.as_ptr(), text.len());
        let cstr = std::ffi::CStr::from_ptr(message.as_ptr() as *const i8);
        println!("{}", cstr.to_string_lossy());
    }

    gc.collect_incremental();
}
