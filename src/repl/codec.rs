//! Raw-REPL response decoder.
//!
//! Wire format of one raw-mode exchange, after the host has sent the
//! program text and Ctrl-D:
//! ```text
//! ┌────┬───────────────┬──────┬───────────────┬──────┬───┐
//! │ OK │ stdout (N B)  │ 0x04 │ stderr (M B)  │ 0x04 │ > │
//! └────┴───────────────┴──────┴───────────────┴──────┴───┘
//! ```
//!
//! The decoder accumulates incoming bytes and reports completion once
//! the second 0x04 arrives. This handles partial reads gracefully; a
//! single `Board::read` call may return part of the ack, part of the
//! output, or the whole exchange at once. Anything before the `OK`
//! (stray prompts, echoes of an earlier exchange) is skipped.

use log::warn;

use crate::error::{Error, Result};

/// End-of-transmission marker: executes raw input and separates the
/// stdout and stderr sections of a response.
pub const EOT: u8 = 0x04;

/// Prefix of every remote exception report.
pub const TRACEBACK_MARKER: &str = "Traceback (";

/// Acknowledgment the board prints when it accepts raw input (and after
/// a soft reset).
pub const ACK: &[u8] = b"OK";

/// What ends a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminator {
    /// Standard raw-mode framing (`OK … 0x04 … 0x04`).
    RawPrompt,
    /// Free-form output ending with this byte pattern.
    Marker(Vec<u8>),
}

/// Decoder state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoderState {
    /// Waiting for the `OK` acknowledgment.
    AwaitingAck { matched: usize },
    /// Collecting stdout until the first EOT.
    ReadingOutput,
    /// Collecting stderr until the second EOT.
    ReadingError,
    /// Response complete; trailing bytes (the `>` prompt) are ignored.
    Done,
}

/// Decoded (but not yet interpreted) response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawResponse {
    pub output: String,
    pub error: String,
}

/// Streaming response decoder.
pub struct ResponseDecoder {
    terminator: Terminator,
    state: DecoderState,
    output: Vec<u8>,
    error: Vec<u8>,
}

impl ResponseDecoder {
    pub fn new(terminator: Terminator) -> Self {
        let state = Self::initial_state(&terminator);
        Self {
            terminator,
            state,
            output: Vec::new(),
            error: Vec::new(),
        }
    }

    fn initial_state(terminator: &Terminator) -> DecoderState {
        match terminator {
            Terminator::RawPrompt => DecoderState::AwaitingAck { matched: 0 },
            Terminator::Marker(_) => DecoderState::ReadingOutput,
        }
    }

    /// Feed bytes into the decoder. Returns `true` once the response is
    /// complete.
    pub fn feed(&mut self, data: &[u8]) -> bool {
        for &byte in data {
            match &mut self.state {
                DecoderState::AwaitingAck { matched } => {
                    if byte == ACK[*matched] {
                        *matched += 1;
                        if *matched == ACK.len() {
                            self.state = DecoderState::ReadingOutput;
                        }
                    } else {
                        *matched = usize::from(byte == ACK[0]);
                    }
                }

                DecoderState::ReadingOutput => match &self.terminator {
                    Terminator::RawPrompt if byte == EOT => {
                        self.state = DecoderState::ReadingError;
                    }
                    Terminator::RawPrompt => self.output.push(byte),
                    Terminator::Marker(marker) => {
                        self.output.push(byte);
                        if self.output.ends_with(marker) {
                            let keep = self.output.len() - marker.len();
                            self.output.truncate(keep);
                            self.state = DecoderState::Done;
                        }
                    }
                },

                DecoderState::ReadingError => {
                    if byte == EOT {
                        self.state = DecoderState::Done;
                    } else {
                        self.error.push(byte);
                    }
                }

                DecoderState::Done => break,
            }
        }

        self.is_complete()
    }

    pub fn is_complete(&self) -> bool {
        self.state == DecoderState::Done
    }

    /// Whether the board has acknowledged the command.
    pub fn is_acknowledged(&self) -> bool {
        !matches!(self.state, DecoderState::AwaitingAck { .. })
    }

    /// Stdout collected so far.
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Consume the decoder and return what it collected.
    pub fn finish(self) -> RawResponse {
        RawResponse {
            output: String::from_utf8_lossy(&self.output).into_owned(),
            error: String::from_utf8_lossy(&self.error).into_owned(),
        }
    }

    /// Reset decoder state (e.g. before a retry).
    pub fn reset(&mut self) {
        self.state = Self::initial_state(&self.terminator);
        self.output.clear();
        self.error.clear();
    }
}

/// Turn a decoded response into command output.
///
/// A leading `OK` left over from a soft reset that raced with the new
/// output is stripped. A traceback anywhere in the response makes the
/// whole text an [`Error::Interpreter`].
pub fn interpret(response: RawResponse) -> Result<String> {
    let RawResponse { mut output, error } = response;

    if output.starts_with("OK") {
        output.drain(..2);
    }

    if output.contains(TRACEBACK_MARKER) || error.contains(TRACEBACK_MARKER) {
        let mut text = output;
        text.push_str(&error);
        return Err(Error::Interpreter(text));
    }

    if !error.is_empty() {
        warn!("EXEC: remote wrote to stderr: {}", error.trim_end());
    }

    Ok(output)
}

// ── Tests ────────────────────────────────────────────────────
