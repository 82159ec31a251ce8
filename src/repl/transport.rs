//! Board connection abstraction: any byte-oriented link to a board.
//!
//! Concrete implementations:
//! - USB serial / UART (see `crate::serial`, feature `host`)
//! - Telnet or WebSocket REPL links (network boards)
//!
//! The shell is generic over `Board`, so adding a new link type
//! requires zero changes to the protocol logic. Opening, closing and
//! reconnecting the physical link are the implementation's business;
//! the protocol only reads, writes and asks for the primitives below.

use core::time::Duration;
use std::time::Instant;

use log::trace;

use crate::error::{Error, Result};

/// How long the poll loops sleep when the link has nothing to read.
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Physical flavour of a link. Serial links stay open on close;
/// network links are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Serial,
    Network,
}

/// Byte-oriented duplex link to a board.
pub trait Board {
    /// Error type for this link.
    type Error: core::fmt::Debug;

    /// Read up to `buf.len()` bytes into `buf`.
    /// Returns 0 if no data is available (non-blocking).
    fn read(&mut self, buf: &mut [u8]) -> core::result::Result<usize, Self::Error>;

    /// Write `data` to the link.
    /// Returns the number of bytes actually written.
    fn write(&mut self, data: &[u8]) -> core::result::Result<usize, Self::Error>;

    /// Flush any buffered output.
    fn flush(&mut self) -> core::result::Result<(), Self::Error>;

    /// Whether the link is currently up.
    fn is_connected(&self) -> bool;

    /// Serial or network link.
    fn kind(&self) -> LinkKind;

    /// Drop the link and open it again.
    fn reconnect(&mut self) -> core::result::Result<(), Self::Error>;

    /// Drop the link without notifying anyone.
    fn disconnect(&mut self);

    /// Hold the board in safe-boot for `wait` and release it.
    fn safe_boot(&mut self, wait: Duration) -> core::result::Result<(), Self::Error>;
}

/// A board that is never connected. Useful as a placeholder before a
/// real link is configured; every protocol operation fails fast on it.
pub struct NullBoard;

impl Board for NullBoard {
    type Error = ();

    fn read(&mut self, _buf: &mut [u8]) -> core::result::Result<usize, ()> {
        Ok(0)
    }

    fn write(&mut self, _data: &[u8]) -> core::result::Result<usize, ()> {
        Err(())
    }

    fn flush(&mut self) -> core::result::Result<(), ()> {
        Ok(())
    }

    fn is_connected(&self) -> bool {
        false
    }

    fn kind(&self) -> LinkKind {
        LinkKind::Serial
    }

    fn reconnect(&mut self) -> core::result::Result<(), ()> {
        Err(())
    }

    fn disconnect(&mut self) {}

    fn safe_boot(&mut self, _wait: Duration) -> core::result::Result<(), ()> {
        Err(())
    }
}

// ── Helpers shared by the mode controller and executor ───────

/// Write all of `data`, mapping link failures to `Connectivity`.
pub(crate) fn write_all<B: Board>(board: &mut B, mut data: &[u8]) -> Result<()> {
    while !data.is_empty() {
        match board.write(data) {
            Ok(0) => return Err(Error::Connectivity),
            Ok(n) => data = &data[n..],
            Err(e) => {
                trace!("REPL: write failed: {:?}", e);
                return Err(Error::Connectivity);
            }
        }
    }
    board.flush().map_err(|_| Error::Connectivity)
}

/// Read until `pattern` appears in the accumulated input or `timeout`
/// elapses. Returns everything read, pattern included.
pub(crate) fn read_until<B: Board>(
    board: &mut B,
    pattern: &[u8],
    timeout: Duration,
) -> Result<Vec<u8>> {
    let deadline = Instant::now() + timeout;
    let mut acc = Vec::new();
    let mut buf = [0u8; 256];
    loop {
        if contains(&acc, pattern) {
            return Ok(acc);
        }
        if !board.is_connected() {
            return Err(Error::Connectivity);
        }
        if Instant::now() >= deadline {
            trace!("REPL: read_until timed out, got {:?}", String::from_utf8_lossy(&acc));
            return Err(Error::Timeout);
        }
        match board.read(&mut buf) {
            Ok(0) => std::thread::sleep(POLL_INTERVAL),
            Ok(n) => acc.extend_from_slice(&buf[..n]),
            Err(_) => return Err(Error::Connectivity),
        }
    }
}

/// Discard whatever is waiting on the link until it has been quiet for
/// `quiet`.
pub(crate) fn drain<B: Board>(board: &mut B, quiet: Duration) {
    let mut buf = [0u8; 256];
    let mut last = Instant::now();
    while last.elapsed() < quiet {
        match board.read(&mut buf) {
            Ok(0) => std::thread::sleep(POLL_INTERVAL),
            Ok(_) => last = Instant::now(),
            Err(_) => return,
        }
    }
}

pub(crate) fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|w| w == needle)
}

// ── Scripted test board ──────────────────────────────────────
