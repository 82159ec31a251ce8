//! Command executor: one raw-mode exchange at a time.
//!
//! ```text
//!  run(op) ─▶ enter_raw ─▶ write(cmd ‖ 0x04) ─▶ poll board ──▶ decoder
//!                 ▲                                │  │
//!                 │        timeout: Ctrl-C, drain  │  │ stop token set:
//!                 └──────── retry (attempt budget) ┘  │ Ctrl-C, drain, ack
//!                                                     ▼
//!                                         interpret ─▶ Ok(stdout) / Err
//! ```
//!
//! The executor is the only writer on the link while an exchange is in
//! progress; callers reach it through `&mut self`, so a second request
//! cannot start before the first one has produced a terminal response,
//! timed out, or been interrupted.

use core::time::Duration;
use std::time::Instant;

use log::{debug, warn};

use super::codec::{self, EOT, RawResponse, ResponseDecoder, Terminator};
use super::interrupt::{InterruptController, InterruptHandle, WorkState};
use super::mode::{Mode, ModeController};
use super::transport::{self, Board, POLL_INTERVAL};
use crate::config::ShellConfig;
use crate::error::{Error, Result};

/// Ctrl-C: abort the running remote program.
const CTRL_C: &[u8] = b"\x03";

/// Quiet period used to flush leftovers after aborting a program.
const RECOVERY_QUIET: Duration = Duration::from_millis(50);

/// One command to run on the board.
#[derive(Debug, Clone)]
pub struct Operation {
    pub command: String,
    pub terminator: Terminator,
    pub timeout: Duration,
    /// Attempt budget; `None` uses the executor's configured budget.
    pub attempts: Option<u8>,
}

impl Operation {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            terminator: Terminator::RawPrompt,
            timeout,
            attempts: None,
        }
    }

    /// Finish on `marker` instead of the raw-mode framing.
    pub fn until(mut self, marker: &[u8]) -> Self {
        self.terminator = Terminator::Marker(marker.to_vec());
        self
    }

    pub fn attempts(mut self, attempts: u8) -> Self {
        self.attempts = Some(attempts.max(1));
        self
    }
}

pub struct CommandExecutor {
    mode: ModeController,
    interrupt: InterruptController,
    attempts: u8,
    /// Set while a multi-command batch holds the working state.
    in_batch: bool,
}

impl CommandExecutor {
    pub fn new(config: &ShellConfig) -> Self {
        Self {
            mode: ModeController::new(config.mode_timeout()),
            interrupt: InterruptController::new(config.interrupt_wait()),
            attempts: config.retries.max(1),
            in_batch: false,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode.mode()
    }

    pub fn work_state(&self) -> WorkState {
        self.interrupt.state()
    }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.handle()
    }

    pub fn enter_raw<B: Board>(&mut self, board: &mut B) -> Result<()> {
        self.mode.enter_raw(board)
    }

    pub fn enter_friendly<B: Board>(&mut self, board: &mut B) -> Result<()> {
        self.mode.enter_friendly(board)
    }

    /// The link dropped or the board rebooted.
    pub fn link_lost(&mut self) {
        self.mode.link_lost();
    }

    /// Run `command` and wait for its terminal response.
    pub fn send_wait<B: Board>(
        &mut self,
        board: &mut B,
        command: &str,
        terminator: Option<&[u8]>,
        timeout: Duration,
    ) -> Result<String> {
        let mut op = Operation::new(command, timeout);
        if let Some(marker) = terminator {
            op = op.until(marker);
        }
        self.run(board, &op)
    }

    /// Send a command that never answers (a reboot) and return as soon as
    /// it is on the wire.
    pub fn send_only<B: Board>(&mut self, board: &mut B, command: &str) -> Result<()> {
        if !board.is_connected() {
            return Err(Error::Connectivity);
        }
        self.mode.enter_raw(board)?;
        let mut frame = command.as_bytes().to_vec();
        frame.push(EOT);
        transport::write_all(board, &frame)
    }

    /// Run one operation, retrying transient failures within its budget.
    pub fn run<B: Board>(&mut self, board: &mut B, op: &Operation) -> Result<String> {
        if self.in_batch {
            return self.run_attempts(board, op);
        }
        self.interrupt.begin();
        let result = self.run_attempts(board, op);
        self.interrupt.finish();
        result
    }

    /// Run several operations as one interruptible unit of work. `f`
    /// should call [`Self::checkpoint`] between steps.
    pub fn batch<B, T, F>(&mut self, board: &mut B, f: F) -> Result<T>
    where
        B: Board,
        F: FnOnce(&mut Self, &mut B) -> Result<T>,
    {
        self.interrupt.begin();
        self.in_batch = true;
        let result = f(self, board);
        self.in_batch = false;
        self.interrupt.finish();
        result
    }

    /// Chunk boundary: stop here if an interrupt was requested.
    pub fn checkpoint<B: Board>(&mut self, board: &mut B) -> Result<()> {
        if !self.interrupt.stop_requested() {
            return Ok(());
        }
        debug!("EXEC: stop observed, aborting remote program");
        abort_remote(board);
        self.interrupt.acknowledge();
        Err(Error::Interrupted)
    }

    fn run_attempts<B: Board>(&mut self, board: &mut B, op: &Operation) -> Result<String> {
        let budget = op.attempts.unwrap_or(self.attempts);
        let mut attempt = 1;
        loop {
            match self.exchange(board, op) {
                Ok(response) => return codec::interpret(response),
                Err(e) if e.is_retryable() && attempt < budget && board.is_connected() => {
                    warn!("EXEC: attempt {}/{} failed: {}, retrying", attempt, budget, e);
                    self.recover(board);
                    attempt += 1;
                }
                Err(e) => {
                    if e == Error::Timeout {
                        self.recover(board);
                    }
                    return Err(e);
                }
            }
        }
    }

    /// One write/collect cycle.
    fn exchange<B: Board>(&mut self, board: &mut B, op: &Operation) -> Result<RawResponse> {
        self.checkpoint(board)?;
        if !board.is_connected() {
            return Err(Error::Connectivity);
        }
        self.mode.enter_raw(board)?;

        let mut frame = Vec::with_capacity(op.command.len() + 1);
        frame.extend_from_slice(op.command.as_bytes());
        frame.push(EOT);
        debug!("EXEC: sending {} bytes", frame.len());
        transport::write_all(board, &frame)?;

        let mut decoder = ResponseDecoder::new(op.terminator.clone());
        let deadline = Instant::now() + op.timeout;
        let mut buf = [0u8; 512];
        loop {
            self.checkpoint(board)?;
            if !board.is_connected() {
                self.mode.link_lost();
                return Err(Error::Connectivity);
            }
            if Instant::now() >= deadline {
                debug!(
                    "EXEC: timed out after {:?} ({} bytes of output)",
                    op.timeout,
                    decoder.output().len()
                );
                return Err(Error::Timeout);
            }
            match board.read(&mut buf) {
                Ok(0) => std::thread::sleep(POLL_INTERVAL),
                Ok(n) => {
                    if decoder.feed(&buf[..n]) {
                        return Ok(decoder.finish());
                    }
                }
                Err(e) => {
                    debug!("EXEC: read failed: {:?}", e);
                    return Err(Error::Connectivity);
                }
            }
        }
    }

    /// A timeout only stops the local wait; abort whatever the board is
    /// still running and flush its output before the next attempt.
    fn recover<B: Board>(&mut self, board: &mut B) {
        abort_remote(board);
    }
}

/// Ctrl-C, then flush whatever the board still had queued.
fn abort_remote<B: Board>(board: &mut B) {
    if let Err(e) = transport::write_all(board, CTRL_C) {
        debug!("EXEC: Ctrl-C not delivered: {:?}", e);
    }
    transport::drain(board, RECOVERY_QUIET);
}

// ── Tests ────────────────────────────────────────────────────
