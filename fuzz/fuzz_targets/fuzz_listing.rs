//! Fuzz target: `parse_listing`
//!
//! cargo fuzz run fuzz_listing

#![no_main]

use libfuzzer_sys::fuzz_target;
use replfs::listing::parse_listing;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = core::str::from_utf8(data) {
        if let Ok(Some(entries)) = parse_listing(text) {
            for entry in entries {
                let _ = entry.hash_matches(b"");
            }
        }
    }
});
