//! Virtual filesystem adapter.
//!
//! Presents the board's storage to a generic filesystem host as
//! stat/list results. Mutations are not offered through this surface
//! (use [`Shell`] directly); every such call reports
//! [`FsError::NotImplemented`].
//!
//! The shell sits behind a mutex, so callers on different threads queue
//! up one command at a time. The interrupt handle is kept outside the
//! lock so a stop can be requested while a command holds it.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use core::fmt;

use log::{debug, warn};

use crate::error::Error;
use crate::listing::{self, DirEntry, EntryKind};
use crate::repl::channels::ConnectionState;
use crate::repl::interrupt::{InterruptHandle, StopOutcome};
use crate::repl::shell::Shell;
use crate::repl::transport::Board;

/// Error vocabulary of a filesystem host. Interpreter tracebacks are kept
/// in the detail text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsError {
    Unavailable(String),
    NotFound(String),
    Exists(String),
    NotImplemented(&'static str),
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(detail) => write!(f, "unavailable: {detail}"),
            Self::NotFound(detail) => write!(f, "not found: {detail}"),
            Self::Exists(detail) => write!(f, "already exists: {detail}"),
            Self::NotImplemented(op) => write!(f, "{op} is not implemented"),
        }
    }
}

impl std::error::Error for FsError {}

impl From<Error> for FsError {
    fn from(e: Error) -> Self {
        match e {
            Error::NotFound(path) => Self::NotFound(path),
            Error::NotImplemented(op) => Self::NotImplemented(op),
            Error::Interpreter(text) if text.contains("EEXIST") => Self::Exists(text),
            Error::Interpreter(text) if text.contains("ENOENT") => Self::NotFound(text),
            Error::Interpreter(text) => Self::Unavailable(text),
            other => Self::Unavailable(other.to_string()),
        }
    }
}

pub type FsResult<T> = core::result::Result<T, FsError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    File,
    Directory,
    Unknown,
}

impl From<EntryKind> for FileType {
    fn from(kind: EntryKind) -> Self {
        match kind {
            EntryKind::File => Self::File,
            EntryKind::Directory => Self::Directory,
            EntryKind::Error => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    pub create: bool,
    pub overwrite: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DeleteOptions {
    pub recursive: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RenameOptions {
    pub overwrite: bool,
}

#[derive(Debug, Clone, Default)]
pub struct WatchOptions {
    pub recursive: bool,
    pub excludes: Vec<String>,
}

/// A change reported by a [`Watch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: String,
}

/// Subscription returned by [`RemoteFs::watch`]. Remote changes are only
/// visible by polling the board, so it never reports anything.
#[derive(Debug)]
pub struct Watch {
    path: String,
    options: WatchOptions,
}

impl Watch {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn options(&self) -> &WatchOptions {
        &self.options
    }

    pub fn poll(&self) -> Option<FileChange> {
        None
    }
}

struct Inner<B: Board> {
    shell: Shell<B>,
    cache: BTreeMap<String, DirEntry>,
}

pub struct RemoteFs<B: Board> {
    inner: Mutex<Inner<B>>,
    interrupt: InterruptHandle,
    cache_enabled: bool,
}

impl<B: Board> RemoteFs<B> {
    pub fn new(shell: Shell<B>) -> Self {
        let cache_enabled = shell.config().cache_enabled;
        let interrupt = shell.interrupt_handle();
        Self {
            inner: Mutex::new(Inner {
                shell,
                cache: BTreeMap::new(),
            }),
            interrupt,
            cache_enabled,
        }
    }

    fn lock(&self) -> FsResult<MutexGuard<'_, Inner<B>>> {
        self.inner
            .lock()
            .map_err(|_| FsError::Unavailable("shell lock poisoned".into()))
    }

    fn lock_connected(&self) -> FsResult<MutexGuard<'_, Inner<B>>> {
        let mut inner = self.lock()?;
        match inner.shell.connection() {
            ConnectionState::Connected => Ok(inner),
            ConnectionState::Disconnected => {
                Err(FsError::Unavailable(Error::Connectivity.to_string()))
            }
        }
    }

    /// Run `f` with exclusive access to the shell.
    pub fn with_shell<T>(&self, f: impl FnOnce(&mut Shell<B>) -> T) -> FsResult<T> {
        let mut inner = self.lock()?;
        Ok(f(&mut inner.shell))
    }

    /// Request a stop of the command currently holding the shell.
    pub fn stop(&self) -> StopOutcome {
        self.interrupt.request_stop()
    }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    pub fn stat(&self, path: &str) -> FsResult<DirEntry> {
        let path = listing::normalize(path);
        let mut inner = self.lock_connected()?;

        if self.cache_enabled {
            if let Some(entry) = inner.cache.get(&path) {
                debug!("FS: stat {} served from cache", path);
                return Ok(entry.clone());
            }
        }

        match inner.shell.file_stat(&path) {
            Ok(Some(entry)) => {
                if self.cache_enabled {
                    inner.cache.insert(path, entry.clone());
                }
                Ok(entry)
            }
            Ok(None) => {
                inner.cache.remove(&path);
                Err(FsError::NotFound(path))
            }
            Err(e) => {
                inner.cache.remove(&path);
                Err(e.into())
            }
        }
    }

    /// Direct children of `path` as (name, type) pairs.
    pub fn list(&self, path: &str) -> FsResult<Vec<(String, FileType)>> {
        let mut inner = self.lock_connected()?;
        let names = inner.shell.list_names(path)?;
        Ok(names
            .into_iter()
            .map(|(name, kind)| (name, kind.into()))
            .collect())
    }

    pub fn read(&self, _path: &str) -> FsResult<Vec<u8>> {
        Err(FsError::NotImplemented("read"))
    }

    pub fn write(&self, _path: &str, _content: &[u8], _options: WriteOptions) -> FsResult<()> {
        Err(FsError::NotImplemented("write"))
    }

    pub fn delete(&self, _path: &str, _options: DeleteOptions) -> FsResult<()> {
        Err(FsError::NotImplemented("delete"))
    }

    pub fn rename(&self, _old: &str, _new: &str, _options: RenameOptions) -> FsResult<()> {
        Err(FsError::NotImplemented("rename"))
    }

    pub fn create_directory(&self, _path: &str) -> FsResult<()> {
        Err(FsError::NotImplemented("create_directory"))
    }

    pub fn watch(&self, path: &str, options: WatchOptions) -> Watch {
        Watch {
            path: listing::normalize(path),
            options,
        }
    }

    /// Re-query every cached path; entries that no longer stat are
    /// dropped.
    pub fn refresh_cache(&self) -> FsResult<()> {
        let mut inner = self.lock_connected()?;
        let paths: Vec<String> = inner.cache.keys().cloned().collect();
        for path in paths {
            match inner.shell.file_stat(&path) {
                Ok(Some(entry)) => {
                    inner.cache.insert(path, entry);
                }
                Ok(None) => {
                    debug!("FS: {} is gone, dropping from cache", path);
                    inner.cache.remove(&path);
                }
                Err(e) => {
                    warn!("FS: refresh of {} failed: {}", path, e);
                    inner.cache.remove(&path);
                }
            }
        }
        Ok(())
    }

    pub fn clear_cache(&self) {
        if let Ok(mut inner) = self.lock() {
            inner.cache.clear();
        }
    }

    /// Paths currently cached, in order.
    pub fn cached_paths(&self) -> Vec<String> {
        self.lock()
            .map(|inner| inner.cache.keys().cloned().collect())
            .unwrap_or_default()
    }
}

// ── Tests ────────────────────────────────────────────────────
