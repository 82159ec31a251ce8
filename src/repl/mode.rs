//! Interpreter mode controller.
//!
//! The remote REPL has two modes. Friendly is the interactive prompt a
//! human types into; Raw accepts a block of code terminated by Ctrl-D and
//! answers with machine-parsable framing. Every command runs in Raw, and
//! Friendly is restored on clean shutdown.
//!
//! The current mode is a field of this controller and only changes
//! through [`ModeController::enter_raw`] and [`ModeController::enter_friendly`]
//! (and [`ModeController::link_lost`], when the board went away and its
//! mode is unknown).

use core::time::Duration;

use log::{debug, info};

use super::transport::{self, Board};
use crate::error::{Error, Result};

/// Interrupt whatever is running, twice, after a fresh line.
const INTERRUPT_SEQ: &[u8] = b"\r\x03\x03";
/// Ctrl-A: enter raw REPL.
const ENTER_RAW: &[u8] = b"\x01";
/// Ctrl-B: leave raw REPL.
const EXIT_RAW: &[u8] = b"\x02";
/// Banner printed once raw mode is active.
const RAW_BANNER: &[u8] = b"raw REPL; CTRL-B to exit\r\n>";

const SETTLE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Friendly,
    Raw,
}

pub struct ModeController {
    mode: Mode,
    timeout: Duration,
}

impl ModeController {
    pub fn new(timeout: Duration) -> Self {
        Self {
            mode: Mode::Friendly,
            timeout,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Switch to raw mode without a soft reset. No-op when already raw.
    pub fn enter_raw<B: Board>(&mut self, board: &mut B) -> Result<()> {
        if self.mode == Mode::Raw {
            return Ok(());
        }
        if !board.is_connected() {
            return Err(Error::Connectivity);
        }

        debug!("MODE: entering raw REPL");
        transport::write_all(board, INTERRUPT_SEQ)?;
        transport::drain(board, SETTLE);
        transport::write_all(board, ENTER_RAW)?;
        transport::read_until(board, RAW_BANNER, self.timeout)?;

        self.mode = Mode::Raw;
        info!("MODE: raw REPL active");
        Ok(())
    }

    /// Send the friendly-mode exit sequence and a trailing newline.
    /// Always sent, whatever the recorded mode is.
    pub fn enter_friendly<B: Board>(&mut self, board: &mut B) -> Result<()> {
        if !board.is_connected() {
            return Err(Error::Connectivity);
        }

        debug!("MODE: returning to friendly REPL");
        transport::write_all(board, EXIT_RAW)?;
        transport::write_all(board, b"\r\n")?;

        self.mode = Mode::Friendly;
        Ok(())
    }

    /// The board rebooted or the link dropped; whatever mode it was in
    /// is gone.
    pub fn link_lost(&mut self) {
        self.mode = Mode::Friendly;
    }
}
