//! Interrupt controller: cancellation of the in-flight command.
//!
//! ```text
//!  Idle ──begin()──▶ Working ──request_stop()──▶ Interrupting
//!   ▲                   │                             │
//!   └────finish()───────┘      ack  or  wait elapsed  │
//!   ▲                                                 │
//!   └─────────────────────────────────────────────────┘
//! ```
//!
//! The executor owns the [`InterruptController`] and polls its
//! cancellation token at every chunk boundary. Any other thread may hold
//! an [`InterruptHandle`] and call [`InterruptHandle::request_stop`],
//! which blocks until the executor acknowledges or the bounded wait runs
//! out. The board does not reliably acknowledge an interrupt (a tight
//! loop with no I/O never yields), so a timeout is logged and the caller
//! carries on as if stopped.

use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use core::time::Duration;
use std::sync::Arc;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use futures_lite::future;
use log::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkState {
    Idle = 0,
    Working = 1,
    Interrupting = 2,
}

impl WorkState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Working,
            2 => Self::Interrupting,
            _ => Self::Idle,
        }
    }
}

/// How a stop request resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Nothing was running.
    NotWorking,
    /// The executor observed the request and stopped the board.
    Acknowledged,
    /// No acknowledgment within the bounded wait.
    TimedOut,
}

struct Shared {
    state: AtomicU8,
    /// Cancellation token observed by the chunk loop. Stays set after a
    /// timed-out request until the executor sees it or starts new work.
    cancel: AtomicBool,
    ack: Signal<CriticalSectionRawMutex, ()>,
    wait: Duration,
}

impl Shared {
    fn state(&self) -> WorkState {
        WorkState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set(&self, state: WorkState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

/// Executor-side half.
pub struct InterruptController {
    shared: Arc<Shared>,
}

impl InterruptController {
    pub fn new(wait: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: AtomicU8::new(WorkState::Idle as u8),
                cancel: AtomicBool::new(false),
                ack: Signal::new(),
                wait,
            }),
        }
    }

    /// A handle other threads can use to request a stop.
    pub fn handle(&self) -> InterruptHandle {
        InterruptHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn state(&self) -> WorkState {
        self.shared.state()
    }

    /// Mark an operation as started.
    pub fn begin(&self) {
        self.shared.cancel.store(false, Ordering::Release);
        self.shared.set(WorkState::Working);
    }

    /// Check the cancellation token. Called at every chunk boundary.
    pub fn stop_requested(&self) -> bool {
        self.shared.cancel.load(Ordering::Acquire)
    }

    /// The in-flight operation stopped because of a request.
    pub fn acknowledge(&self) {
        self.shared.cancel.store(false, Ordering::Release);
        self.shared.set(WorkState::Idle);
        self.shared.ack.signal(());
        info!("IRQ: interrupt done");
    }

    /// The operation ended on its own. A pending requester is released
    /// as well, since there is nothing left to stop.
    pub fn finish(&self) {
        self.shared.cancel.store(false, Ordering::Release);
        let was = self
            .shared
            .state
            .swap(WorkState::Idle as u8, Ordering::AcqRel);
        if WorkState::from_u8(was) == WorkState::Interrupting {
            self.shared.ack.signal(());
        }
    }
}

/// Requester-side half. Cheap to clone and `Send + Sync`.
#[derive(Clone)]
pub struct InterruptHandle {
    shared: Arc<Shared>,
}

impl InterruptHandle {
    pub fn state(&self) -> WorkState {
        self.shared.state()
    }

    /// Ask the in-flight operation to stop and wait (bounded) for it.
    /// Returns immediately when nothing is running.
    pub fn request_stop(&self) -> StopOutcome {
        let claimed = self.shared.state.compare_exchange(
            WorkState::Working as u8,
            WorkState::Interrupting as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        match claimed {
            Ok(_) => {}
            Err(raw) if WorkState::from_u8(raw) == WorkState::Interrupting => {}
            Err(_) => {
                info!("IRQ: not working, nothing to stop");
                return StopOutcome::NotWorking;
            }
        }

        info!("IRQ: stop requested while working, interrupting");
        // Drop an ack left over from an earlier request before arming.
        self.shared.ack.reset();
        self.shared.cancel.store(true, Ordering::Release);
        if self.shared.state() == WorkState::Idle {
            return StopOutcome::Acknowledged;
        }

        let shared = &self.shared;
        let outcome = future::block_on(future::or(
            async {
                shared.ack.wait().await;
                StopOutcome::Acknowledged
            },
            async {
                async_io_mini::Timer::after(shared.wait).await;
                StopOutcome::TimedOut
            },
        ));

        if outcome == StopOutcome::TimedOut {
            info!("IRQ: interrupt timed out, continuing anyway");
            self.shared.set(WorkState::Idle);
        }
        outcome
    }
}

// ── Tests ────────────────────────────────────────────────────
