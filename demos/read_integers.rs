// Copyright (c) 2019 King's College London created by the Software Development
// Team <http://soft-dev.org/>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0>, or the MIT license <LICENSE-MIT
// or http://opensource.org/licenses/MIT>, or the UPL-1.0 license
// <http://opensource.org/licenses/UPL> at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::io::{self, BufRead};

use congc::Collector;

fn main() {
    let mut gc = Collector::new().expect("failed to initialize collector");
    let stdin = io::stdin();

    let mut slot = match gc.allocate(std::mem::size_of::<i64>()) {
        Ok(ptr) => ptr,
        Err(e) => {
            eprintln!("Memory allocation failed: {e}");
            std::process::exit(1);
        }
    };

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(_) => break,
        };
        let value: i64 = match line.trim().parse() {
            Ok(v) => v,
            Err(_) => break,
        };
        unsafe {
            std::ptr::write(slot.as_ptr() as *mut i64, value);
            println!("--- Read: {} ---", std::ptr::read(slot.as_ptr() as *const i64));
        }

        slot = match gc.allocate(std::mem::size_of::<i64>()) {
            Ok(ptr) => ptr,
            Err(e) => {
                eprintln!("Memory allocation failed: {e}");
                std::process::exit(1);
            }
        };

        println!("--- Fragmentation: {} ---", gc.fragmentation(false));
        println!("--- Free fraction: {} ---", gc.statistics(false));
    }

    gc.collect_incremental();
}
