//! Upload compression using DEFLATE via `miniz_oxide`.
//!
//! File content is compressed on the host before it is staged on the
//! board, and the board inflates it in place afterwards with
//! `uzlib.decompress`. That function expects the zlib container (2-byte
//! header + Adler-32 trailer), so the zlib variants are used here.

use log::warn;
use miniz_oxide::deflate::compress_to_vec_zlib;
use miniz_oxide::inflate::decompress_to_vec_zlib;

use crate::error::{Error, Result};

/// DEFLATE compression level (0-10). Low: the board has to inflate it
/// with very little RAM, and most source files compress well anyway.
const COMPRESSION_LEVEL: u8 = 2;

/// Compress a payload. Always produces a valid zlib stream, including
/// for empty input.
pub fn compress(input: &[u8]) -> Vec<u8> {
    compress_to_vec_zlib(input, COMPRESSION_LEVEL)
}

/// Decompress a zlib payload produced by [`compress`].
pub fn decompress(input: &[u8]) -> Result<Vec<u8>> {
    decompress_to_vec_zlib(input).map_err(|e| {
        warn!("decompress: zlib error: {:?}", e);
        Error::Protocol(format!("invalid zlib stream: {:?}", e.status))
    })
}

// ── Tests ────────────────────────────────────────────────────
