//! Transfer codec.
//!
//! ```text
//!  read:  board ──b2a_base64 lines──▶ ChunkReassembler ──▶ FileContents
//!  write: bytes ──compress──▶ chunk_payload ──encode_chunk──▶ board
//!                                   (board inflates in place afterwards)
//! ```

pub mod chunked;
pub mod compress;

pub use chunked::{ChunkReassembler, FileContents};
