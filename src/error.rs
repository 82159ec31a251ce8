//! Unified error types for the REPL bridge.
//!
//! A single `Error` enum that every layer (mode controller, executor,
//! transfer codec, script parsing) funnels into, so the shell and the
//! filesystem adapter handle failures uniformly.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible protocol operation funnels into this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The link is down, or dropped in the middle of an exchange.
    Connectivity,
    /// No terminal response arrived within the operation's time budget.
    Timeout,
    /// The remote interpreter raised an exception. Holds the full response
    /// text, traceback included.
    Interpreter(String),
    /// The response could not be parsed (bad JSON, bad base64, bad integer).
    Protocol(String),
    /// The requested remote path does not exist.
    NotFound(String),
    /// The operation is not supported.
    NotImplemented(&'static str),
    /// The operation was stopped by an interrupt request.
    Interrupted,
    /// A configuration value is out of range.
    Config(&'static str),
}

impl Error {
    /// Transport and timeout failures are transient; everything else
    /// indicates a logic fault and is surfaced immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connectivity | Self::Timeout)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connectivity => write!(f, "board not connected"),
            Self::Timeout => write!(f, "timed out waiting for the board"),
            Self::Interpreter(text) => write!(f, "remote exception:\n{text}"),
            Self::Protocol(msg) => write!(f, "malformed response: {msg}"),
            Self::NotFound(path) => write!(f, "no such remote path: {path}"),
            Self::NotImplemented(what) => write!(f, "{what} is not implemented"),
            Self::Interrupted => write!(f, "operation interrupted"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Protocol(format!("invalid JSON: {e}"))
    }
}

impl From<base64::DecodeError> for Error {
    fn from(e: base64::DecodeError) -> Self {
        Self::Protocol(format!("invalid base64 chunk: {e}"))
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
