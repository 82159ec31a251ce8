//! Shell configuration parameters
//!
//! All tunable parameters for talking to a board: transfer chunk size,
//! retry budget and the per-operation timeouts. Values can be loaded
//! from a JSON file; missing fields fall back to the defaults.

use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Largest chunk the remote side is asked to read or write in one go.
const MAX_CHUNK_SIZE: usize = 4096;

/// Core shell configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    // --- Transfer ---
    /// Bytes per transfer chunk (before printable encoding)
    pub upload_chunk_size: usize,
    /// Attempts per command before a transient failure is surfaced
    pub retries: u8,

    // --- Timeouts (milliseconds) ---
    /// Fallback for commands without a dedicated timeout
    pub default_timeout_ms: u64,
    /// Directory listing script
    pub list_timeout_ms: u64,
    /// Recursive directory creation
    pub mkdir_timeout_ms: u64,
    /// Chunked file read
    pub read_timeout_ms: u64,
    /// Remote decompress-in-place
    pub decompress_timeout_ms: u64,
    /// Raw/friendly mode switch banners
    pub mode_timeout_ms: u64,
    /// Bounded wait for an interrupt acknowledgment
    pub interrupt_wait_ms: u64,

    // --- Board lifecycle ---
    /// Delay between a remote reboot and the reconnect
    pub reset_settle_ms: u64,
    /// How long the board is held in safe-boot
    pub safeboot_wait_ms: u64,
    /// Reboot instead of returning to the friendly REPL on clean close
    pub reboot_after_upload: bool,

    // --- Filesystem adapter ---
    /// Keep last-known stat results per path
    pub cache_enabled: bool,
    /// Remote folder used for free-space queries
    pub root_folder: String,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            // Transfer
            upload_chunk_size: 256,
            retries: 2,

            // Timeouts
            default_timeout_ms: 5_000,
            list_timeout_ms: 10_000,
            mkdir_timeout_ms: 30_000,
            read_timeout_ms: 60_000,
            decompress_timeout_ms: 90_000,
            mode_timeout_ms: 2_000,
            interrupt_wait_ms: 1_000,

            // Board lifecycle
            reset_settle_ms: 1_000,
            safeboot_wait_ms: 4_000,
            reboot_after_upload: false,

            // Filesystem adapter
            cache_enabled: false,
            root_folder: "/".into(),
        }
    }
}

impl ShellConfig {
    /// Parse a JSON document and validate it.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the protocol cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.upload_chunk_size == 0 || self.upload_chunk_size > MAX_CHUNK_SIZE {
            return Err(Error::Config("upload_chunk_size must be 1..=4096"));
        }
        if self.retries == 0 {
            return Err(Error::Config("retries must be at least 1"));
        }
        let timeouts = [
            self.default_timeout_ms,
            self.list_timeout_ms,
            self.mkdir_timeout_ms,
            self.read_timeout_ms,
            self.decompress_timeout_ms,
            self.mode_timeout_ms,
            self.interrupt_wait_ms,
        ];
        if timeouts.contains(&0) {
            return Err(Error::Config("timeouts must be non-zero"));
        }
        if !self.root_folder.starts_with('/') {
            return Err(Error::Config("root_folder must be absolute"));
        }
        Ok(())
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn list_timeout(&self) -> Duration {
        Duration::from_millis(self.list_timeout_ms)
    }

    pub fn mkdir_timeout(&self) -> Duration {
        Duration::from_millis(self.mkdir_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn decompress_timeout(&self) -> Duration {
        Duration::from_millis(self.decompress_timeout_ms)
    }

    pub fn mode_timeout(&self) -> Duration {
        Duration::from_millis(self.mode_timeout_ms)
    }

    pub fn interrupt_wait(&self) -> Duration {
        Duration::from_millis(self.interrupt_wait_ms)
    }
}
