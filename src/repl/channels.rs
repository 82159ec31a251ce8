//! Link notification channel.
//!
//! Uses an `embassy-sync` bounded channel to carry connect/disconnect
//! notifications from the board implementation (which may run its own
//! reader thread) to the shell, which owns the connection state.
//!
//! ```text
//! ┌──────────────┐  LinkEvent  ┌──────────────┐
//! │    Board     │────────────▶│    Shell     │
//! │ (link owner) │             │ (conn state) │
//! └──────────────┘             └──────────────┘
//! ```

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::warn;

/// Channel depth for link notifications.
const EVENT_DEPTH: usize = 8;

/// Transport-level notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    Connected,
    Disconnected,
}

/// Connection state as seen by the protocol layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

impl ConnectionState {
    /// Apply a notification.
    pub fn apply(self, event: LinkEvent) -> Self {
        match event {
            LinkEvent::Connected => Self::Connected,
            LinkEvent::Disconnected => Self::Disconnected,
        }
    }
}

/// Shared notification queue. Boards publish, the shell drains.
pub struct LinkEvents {
    channel: Channel<CriticalSectionRawMutex, LinkEvent, EVENT_DEPTH>,
}

impl LinkEvents {
    pub fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Publish a notification. If the shell has fallen behind, the
    /// oldest queued notification is dropped so the latest state wins.
    pub fn publish(&self, event: LinkEvent) {
        if self.channel.try_send(event).is_err() {
            warn!("LINK: event queue full, dropping oldest");
            let _ = self.channel.try_receive();
            let _ = self.channel.try_send(event);
        }
    }

    /// Take the next pending notification, if any.
    pub fn try_next(&self) -> Option<LinkEvent> {
        self.channel.try_receive().ok()
    }
}

impl Default for LinkEvents {
    fn default() -> Self {
        Self::new()
    }
}
