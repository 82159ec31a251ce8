//! High-level board shell.
//!
//! `Shell` owns the link and the executor and turns each file operation
//! into one or more generated programs. All methods take `&mut self`,
//! which is what keeps a single command in flight per connection; share
//! a shell between threads behind a mutex (see `crate::fs::RemoteFs`)
//! and hand out [`InterruptHandle`]s for cancellation.

use core::time::Duration;
use std::sync::Arc;

use log::{debug, info, warn};

use super::channels::{ConnectionState, LinkEvent, LinkEvents};
use super::executor::{CommandExecutor, Operation};
use super::interrupt::{InterruptHandle, StopOutcome, WorkState};
use super::mode::Mode;
use super::script;
use super::transport::{Board, LinkKind};
use crate::config::ShellConfig;
use crate::error::{Error, Result};
use crate::listing::{self, DirEntry, EntryKind};
use crate::transfer::chunked::{self, FileContents};
use crate::transfer::compress;

pub struct Shell<B: Board> {
    config: ShellConfig,
    board: B,
    exec: CommandExecutor,
    events: Arc<LinkEvents>,
    connection: ConnectionState,
}

impl<B: Board> Shell<B> {
    /// Build a shell over `board`. `events` is the queue the board
    /// publishes its connect/disconnect notifications on.
    pub fn new(board: B, config: ShellConfig, events: Arc<LinkEvents>) -> Result<Self> {
        config.validate()?;
        let connection = if board.is_connected() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        };
        Ok(Self {
            exec: CommandExecutor::new(&config),
            config,
            board,
            events,
            connection,
        })
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    pub fn board(&self) -> &B {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut B {
        &mut self.board
    }

    pub fn mode(&self) -> Mode {
        self.exec.mode()
    }

    pub fn work_state(&self) -> WorkState {
        self.exec.work_state()
    }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.exec.interrupt_handle()
    }

    /// Connection state after applying pending link notifications.
    pub fn connection(&mut self) -> ConnectionState {
        self.sync_link();
        self.connection
    }

    fn sync_link(&mut self) {
        while let Some(event) = self.events.try_next() {
            debug!("REPL: link event {:?}", event);
            if event == LinkEvent::Disconnected {
                self.exec.link_lost();
            }
            self.connection = self.connection.apply(event);
        }
        if !self.board.is_connected() && self.connection == ConnectionState::Connected {
            self.exec.link_lost();
            self.connection = ConnectionState::Disconnected;
        }
    }

    fn ensure_connected(&mut self) -> Result<()> {
        match self.connection() {
            ConnectionState::Connected => Ok(()),
            ConnectionState::Disconnected => Err(Error::Connectivity),
        }
    }

    fn run(&mut self, command: String, timeout: Duration) -> Result<String> {
        self.run_op(&Operation::new(command, timeout))
    }

    /// Run a program that must not be repeated: a timed-out attempt may
    /// still have executed on the board.
    fn run_once(&mut self, command: String, timeout: Duration) -> Result<String> {
        self.run_op(&Operation::new(command, timeout).attempts(1))
    }

    fn run_op(&mut self, op: &Operation) -> Result<String> {
        self.ensure_connected()?;
        self.exec.run(&mut self.board, op)
    }

    // ── Session ──────────────────────────────────────────────

    /// Put the board in raw mode (no soft reset).
    pub fn initialise(&mut self) -> Result<()> {
        self.ensure_connected()?;
        self.exec.enter_raw(&mut self.board)
    }

    /// Run arbitrary code and return its stdout.
    pub fn eval(&mut self, code: &str, timeout: Duration) -> Result<String> {
        self.run(code.to_string(), timeout)
    }

    /// Reboot the board and reconnect once it has settled. The board comes
    /// back in friendly mode.
    pub fn reset(&mut self) -> Result<()> {
        self.ensure_connected()?;
        info!("REPL: resetting board");
        self.exec.send_only(&mut self.board, &script::reboot())?;
        std::thread::sleep(Duration::from_millis(self.config.reset_settle_ms));
        self.exec.link_lost();
        self.board.reconnect().map_err(|e| {
            warn!("REPL: reconnect after reset failed: {:?}", e);
            Error::Connectivity
        })?;
        self.connection = ConnectionState::Connected;
        Ok(())
    }

    /// Restart through the board's safe-boot path, then enter raw mode.
    pub fn safeboot_restart(&mut self) -> Result<()> {
        info!("REPL: safe-boot restart");
        self.board
            .safe_boot(Duration::from_millis(self.config.safeboot_wait_ms))
            .map_err(|e| {
                warn!("REPL: safe boot failed: {:?}", e);
                Error::Connectivity
            })?;
        self.exec.link_lost();
        self.initialise()
    }

    /// Ask the running operation to stop. Blocks for at most the
    /// configured interrupt wait.
    pub fn stop_working(&self) -> StopOutcome {
        self.exec.interrupt_handle().request_stop()
    }

    pub fn exit(&mut self) -> Result<()> {
        self.stop_working();
        self.clean_close()
    }

    /// Leave the board the way a user expects after a session: rebooted
    /// when `reboot_after_upload` is set, otherwise back at the friendly
    /// prompt.
    pub fn clean_close(&mut self) -> Result<()> {
        if self.config.reboot_after_upload {
            self.reset()
        } else {
            self.close()
        }
    }

    /// Restore friendly mode. Network links are dropped; serial links
    /// stay open.
    pub fn close(&mut self) -> Result<()> {
        self.ensure_connected()?;
        self.exec.enter_friendly(&mut self.board)?;
        if self.board.kind() != LinkKind::Serial {
            self.board.disconnect();
            self.exec.link_lost();
            self.connection = ConnectionState::Disconnected;
        }
        Ok(())
    }

    // ── Queries ──────────────────────────────────────────────

    /// Free bytes on the filesystem holding the root folder.
    pub fn free_space(&mut self) -> Result<u64> {
        let out = self.run(
            script::free_space(&self.config.root_folder),
            self.config.default_timeout(),
        )?;
        out.trim()
            .parse()
            .map_err(|_| Error::Protocol(format!("free space is not a number: {:?}", out.trim())))
    }

    /// List `root`. Fails with `NotFound` when the board reports that
    /// `root` cannot be listed.
    pub fn list(&mut self, root: &str, recursive: bool, hash: bool) -> Result<Vec<DirEntry>> {
        let root = listing::normalize(root);
        let out = self.run(
            script::list_dir(&root, recursive, hash),
            self.config.list_timeout(),
        )?;
        listing::parse_listing(&out)?.ok_or(Error::NotFound(root))
    }

    /// Entry for `path`, or `None` when it does not exist.
    pub fn file_stat(&mut self, path: &str) -> Result<Option<DirEntry>> {
        self.stat_with(path, false)
    }

    fn stat_with(&mut self, path: &str, hash: bool) -> Result<Option<DirEntry>> {
        let path = listing::normalize(path);
        if path == "/" {
            return Ok(Some(DirEntry::root()));
        }
        let (parent, name) = listing::split_parent(&path);
        match self.list(&parent, false, hash) {
            Ok(entries) => Ok(entries
                .into_iter()
                .find(|e| e.full_name == path || e.name == name)),
            Err(Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Names and kinds of the direct children of `path`.
    pub fn list_names(&mut self, path: &str) -> Result<Vec<(String, EntryKind)>> {
        Ok(self
            .list(path, false, false)?
            .into_iter()
            .map(|e| (e.name, e.kind))
            .collect())
    }

    /// Compare the board's SHA-256 of `path` with `content`.
    pub fn verify_hash(&mut self, path: &str, content: &[u8]) -> Result<bool> {
        let entry = self
            .stat_with(path, true)?
            .ok_or_else(|| Error::NotFound(path.to_string()))?;
        entry
            .hash_matches(content)
            .ok_or_else(|| Error::Protocol(format!("no hash reported for {path}")))
    }

    // ── Transfer ─────────────────────────────────────────────

    pub fn compress(&self, content: &[u8]) -> Vec<u8> {
        compress::compress(content)
    }

    /// Inflate a zlib-compressed file in place on the board.
    pub fn decompress(&mut self, path: &str) -> Result<()> {
        self.run_once(script::decompress(path), self.config.decompress_timeout())?;
        Ok(())
    }

    /// Download a file.
    pub fn read_file(&mut self, path: &str) -> Result<FileContents> {
        info!("REPL: reading {}", path);
        let out = self.run(
            script::read_chunked(path, self.config.upload_chunk_size),
            self.config.read_timeout(),
        )?;
        chunked::decode_stream(&out)
    }

    /// Upload a file. The compressed content is staged in base64 chunks
    /// next to `path`, inflated there, then moved over `path`; the
    /// previous file survives any failure before that last step. Can be
    /// stopped between chunks.
    pub fn write_file(&mut self, path: &str, content: &[u8]) -> Result<()> {
        self.ensure_connected()?;
        self.ensure_directory(path)?;

        let staged = compress::compress(content);
        let staging = script::staging_path(path);
        info!(
            "REPL: writing {} ({} bytes, {} compressed)",
            path,
            content.len(),
            staged.len()
        );

        let inflated = self
            .stage_upload(&staging, &staged)
            .and_then(|()| self.decompress(&staging));
        if let Err(e) = inflated {
            warn!("REPL: upload of {} failed: {}", path, e);
            self.discard_upload(&staging);
            return Err(e);
        }
        self.run_once(script::replace(&staging, path), self.config.default_timeout())
            .map_err(|e| {
                warn!("REPL: could not move {} over {}: {}", staging, path, e);
                e
            })?;
        Ok(())
    }

    /// Write `payload` into `staging` chunk by chunk as one unit of work.
    fn stage_upload(&mut self, staging: &str, payload: &[u8]) -> Result<()> {
        self.ensure_connected()?;
        let chunk_size = self.config.upload_chunk_size;
        let timeout = self.config.default_timeout();

        self.exec.batch(&mut self.board, |ex, board| {
            let open = Operation::new(script::open_upload(staging), timeout).attempts(1);
            ex.run(board, &open)?;
            for (i, chunk) in chunked::chunk_payload(payload, chunk_size).enumerate() {
                ex.checkpoint(board)?;
                let line = chunked::encode_chunk(chunk);
                let write =
                    Operation::new(script::write_chunk(line.trim_end()), timeout).attempts(1);
                ex.run(board, &write)?;
                debug!("REPL: chunk {} sent", i + 1);
            }
            ex.checkpoint(board)?;
            ex.run(
                board,
                &Operation::new(script::close_upload(), timeout).attempts(1),
            )?;
            Ok(())
        })
    }

    /// Best effort: close a dangling upload handle and drop the staged file.
    fn discard_upload(&mut self, staging: &str) {
        let op = Operation::new(script::abort_upload(staging), self.config.default_timeout())
            .attempts(1);
        if let Err(e) = self.exec.run(&mut self.board, &op) {
            warn!("REPL: cleanup of {} failed: {}", staging, e);
        }
    }

    // ── Mutations ────────────────────────────────────────────

    /// Create every missing parent directory of `file_path`.
    pub fn ensure_directory(&mut self, file_path: &str) -> Result<()> {
        match script::ensure_parent_dirs(file_path) {
            Some(program) => {
                self.run(program, self.config.mkdir_timeout())?;
                Ok(())
            }
            None => Ok(()),
        }
    }

    pub fn remove_file(&mut self, path: &str) -> Result<()> {
        self.os_call("remove", path)
    }

    pub fn rename_file(&mut self, old: &str, new: &str) -> Result<()> {
        self.run(script::rename(old, new), self.config.default_timeout())?;
        Ok(())
    }

    pub fn create_dir(&mut self, path: &str) -> Result<()> {
        self.os_call("mkdir", path)
    }

    pub fn change_dir(&mut self, path: &str) -> Result<()> {
        self.os_call("chdir", path)
    }

    pub fn remove_dir(&mut self, path: &str) -> Result<()> {
        self.os_call("rmdir", path)
    }

    fn os_call(&mut self, primitive: &str, path: &str) -> Result<()> {
        self.run(script::os_call(primitive, path), self.config.default_timeout())?;
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────
