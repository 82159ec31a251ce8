//! Chunked printable transfer encoding.
//!
//! File bytes cross the REPL as text: each chunk of at most
//! `upload_chunk_size` bytes becomes one base64 line, exactly what the
//! board's `ubinascii.b2a_base64` produces.
//!
//! ```text
//! Line 1: base64(chunk 1) '\n'
//! Line 2: base64(chunk 2) '\n'
//! Line N: base64(chunk N) '\n'
//! End:    '\n'                  (b2a_base64 of an empty read)
//! ```
//!
//! The receiver decodes line by line and concatenates. The stream ends
//! exactly at the first empty line; a non-empty chunk always encodes to
//! at least four characters, so the sentinel cannot collide with data.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::error::{Error, Result};

/// Split `data` into transfer chunks of at most `chunk_size` bytes.
/// Empty input yields no chunks.
pub fn chunk_payload(data: &[u8], chunk_size: usize) -> impl Iterator<Item = &[u8]> {
    data.chunks(chunk_size.max(1))
}

/// Encode one chunk as a base64 line, newline included.
pub fn encode_chunk(chunk: &[u8]) -> String {
    let mut line = STANDARD.encode(chunk);
    line.push('\n');
    line
}

/// Decode one base64 line. Surrounding `\r` / `\n` are ignored.
pub fn decode_chunk(line: &str) -> Result<Vec<u8>> {
    Ok(STANDARD.decode(line.trim_end_matches(['\r', '\n']))?)
}

/// File content as received: raw bytes plus a UTF-8 view for text-mode
/// callers (invalid sequences replaced).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContents {
    pub bytes: Vec<u8>,
    pub text: String,
}

impl FileContents {
    pub fn new(bytes: Vec<u8>) -> Self {
        let text = String::from_utf8_lossy(&bytes).into_owned();
        Self { bytes, text }
    }
}

/// Reassembly buffer for an incoming chunk stream.
pub struct ChunkReassembler {
    buffer: Vec<u8>,
    partial: String,
    chunks: usize,
    finished: bool,
}

impl ChunkReassembler {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            partial: String::new(),
            chunks: 0,
            finished: false,
        }
    }

    /// Feed response text (split anywhere). Returns the number of chunks
    /// completed by this call. Text after the end sentinel is ignored.
    pub fn feed(&mut self, text: &str) -> Result<usize> {
        let before = self.chunks;
        for c in text.chars() {
            if self.finished {
                break;
            }
            if c != '\n' {
                self.partial.push(c);
                continue;
            }

            let line = core::mem::take(&mut self.partial);
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                self.finished = true;
            } else {
                self.buffer.extend(decode_chunk(line)?);
                self.chunks += 1;
            }
        }
        Ok(self.chunks - before)
    }

    /// Whether the end sentinel has been seen.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Chunks decoded so far.
    pub fn chunks(&self) -> usize {
        self.chunks
    }

    /// Complete the transfer. Fails if the stream stopped before its
    /// end sentinel.
    pub fn finish(self) -> Result<FileContents> {
        if !self.finished {
            return Err(Error::Protocol(format!(
                "chunk stream truncated after {} chunks",
                self.chunks
            )));
        }
        Ok(FileContents::new(self.buffer))
    }

    /// Reset the reassembler, discarding any partial data.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.partial.clear();
        self.chunks = 0;
        self.finished = false;
    }
}

impl Default for ChunkReassembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode a complete read-program response.
pub fn decode_stream(text: &str) -> Result<FileContents> {
    let mut r = ChunkReassembler::new();
    r.feed(text)?;
    r.finish()
}

/// Encode `data` the way the board's read program streams it, sentinel
/// included.
pub fn encode_stream(data: &[u8], chunk_size: usize) -> String {
    let mut out: String = chunk_payload(data, chunk_size).map(encode_chunk).collect();
    out.push('\n');
    out
}

// ── Tests ────────────────────────────────────────────────────
