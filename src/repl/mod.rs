//! Raw-REPL protocol driver.
//!
//! ```text
//!  ┌──────────┐  ┌──────────────────────────────────────────┐  ┌───────┐
//!  │ RemoteFs │─▶│ Shell ─▶ CommandExecutor ─▶ ModeController│─▶│ Board │
//!  └──────────┘  │   │            │   ▲                      │  └───┬───┘
//!                │ script     codec  InterruptController◀─ handle   │
//!                │                                 ▲         │      │
//!                │   ConnectionState ◀── LinkEvents ◀────────┼──────┘
//!                └──────────────────────────────────────────┘
//! ```
//!
//! Modules, leaves first:
//! - [`transport`]: the [`Board`](transport::Board) link abstraction
//! - [`channels`]: connect/disconnect notifications
//! - [`mode`]: friendly/raw switching
//! - [`codec`]: raw-mode response framing
//! - [`interrupt`]: cancellation of the in-flight command
//! - [`executor`]: one command at a time, with timeouts and retries
//! - [`script`]: generated remote programs
//! - [`shell`]: file operations on top of all of the above

pub mod channels;
pub mod codec;
pub mod executor;
pub mod interrupt;
pub mod mode;
pub mod script;
pub mod shell;
pub mod transport;

pub use channels::{ConnectionState, LinkEvent, LinkEvents};
pub use executor::{CommandExecutor, Operation};
pub use interrupt::{InterruptHandle, StopOutcome, WorkState};
pub use mode::Mode;
pub use shell::Shell;
pub use transport::{Board, LinkKind, NullBoard};
