//! Fuzz target: `ResponseDecoder::feed` + `interpret`
//!
//! Splits arbitrary board output at an arbitrary point and checks that
//! feeding it in two pieces decodes exactly like feeding it at once, and
//! that interpretation never panics.
//!
//! cargo fuzz run fuzz_response_decoder

#![no_main]

use libfuzzer_sys::fuzz_target;
use replfs::repl::codec::{ResponseDecoder, Terminator, interpret};

fuzz_target!(|data: &[u8]| {
    let Some((&split, body)) = data.split_first() else {
        return;
    };
    let split = usize::from(split).min(body.len());

    let mut whole = ResponseDecoder::new(Terminator::RawPrompt);
    let whole_done = whole.feed(body);

    let mut pieces = ResponseDecoder::new(Terminator::RawPrompt);
    let first_done = pieces.feed(&body[..split]);
    let pieces_done = first_done || pieces.feed(&body[split..]);

    assert_eq!(whole_done, pieces_done);
    let whole = whole.finish();
    assert_eq!(whole, pieces.finish());

    if whole_done {
        let _ = interpret(whole);
    }
});
