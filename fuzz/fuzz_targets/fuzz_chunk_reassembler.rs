//! Fuzz target: `ChunkReassembler::feed`
//!
//! Arbitrary text must never panic the reassembler, and a finished
//! stream must always yield a buffer.
//!
//! cargo fuzz run fuzz_chunk_reassembler

#![no_main]

use libfuzzer_sys::fuzz_target;
use replfs::transfer::ChunkReassembler;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let mut r = ChunkReassembler::new();
    if r.feed(&text).is_ok() && r.is_finished() {
        assert!(r.finish().is_ok());
    }
});
