//! Host-side driver for MicroPython's raw REPL.
//!
//! Switches the board's interpreter into raw mode, runs small generated
//! programs on it, and moves file contents across the text-only link as
//! base64 chunks (zlib-compressed on upload). On top of that sits a
//! filesystem adapter exposing the board's storage as stat/list results.
//!
//! The link itself is abstracted by [`repl::Board`]; a serial
//! implementation lives in [`serial`] behind the `host` feature.

#![deny(unused_must_use)]

pub mod config;
pub mod error;
pub mod fs;
pub mod listing;
pub mod repl;
pub mod transfer;

#[cfg(feature = "host")]
pub mod serial;

pub use error::{Error, Result};
