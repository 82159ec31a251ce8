//! Serial-port board link.
//!
//! Wraps a `serialport` handle as a [`Board`]. Reads use a short port
//! timeout so the protocol poll loops stay responsive; a timed-out read
//! is reported as "no data". Any other I/O failure drops the handle and
//! publishes [`LinkEvent::Disconnected`].

use core::time::Duration;
use std::io::{self, Read, Write};
use std::sync::Arc;

use log::{info, warn};
use serialport::{ClearBuffer, SerialPort};

use crate::repl::channels::{LinkEvent, LinkEvents};
use crate::repl::transport::{Board, LinkKind};

/// Port read timeout.
const READ_TIMEOUT: Duration = Duration::from_millis(10);

/// How long the reset line is held during a safe-boot restart.
const RESET_PULSE: Duration = Duration::from_millis(100);

pub struct SerialBoard {
    path: String,
    baud: u32,
    port: Option<Box<dyn SerialPort>>,
    events: Arc<LinkEvents>,
}

impl SerialBoard {
    /// Open `path` at `baud` and announce the connection on `events`.
    pub fn open(path: &str, baud: u32, events: Arc<LinkEvents>) -> serialport::Result<Self> {
        let port = Self::open_port(path, baud)?;
        info!("REPL: opened {} at {} baud", path, baud);
        events.publish(LinkEvent::Connected);
        Ok(Self {
            path: path.to_string(),
            baud,
            port: Some(port),
            events,
        })
    }

    fn open_port(path: &str, baud: u32) -> serialport::Result<Box<dyn SerialPort>> {
        let port = serialport::new(path, baud).timeout(READ_TIMEOUT).open()?;
        port.clear(ClearBuffer::All)?;
        Ok(port)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn port(&mut self) -> io::Result<&mut Box<dyn SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))
    }

    fn lost(&mut self, e: &io::Error) {
        if self.port.take().is_some() {
            warn!("REPL: {} lost: {}", self.path, e);
            self.events.publish(LinkEvent::Disconnected);
        }
    }
}

impl Board for SerialBoard {
    type Error = io::Error;

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.port()?.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(e) => {
                self.lost(&e);
                Err(e)
            }
        }
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let result = self.port()?.write(data);
        if let Err(e) = &result {
            self.lost(e);
        }
        result
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port()?.flush()
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    fn kind(&self) -> LinkKind {
        LinkKind::Serial
    }

    fn reconnect(&mut self) -> io::Result<()> {
        if self.port.take().is_some() {
            self.events.publish(LinkEvent::Disconnected);
        }
        let port = Self::open_port(&self.path, self.baud)?;
        self.port = Some(port);
        self.events.publish(LinkEvent::Connected);
        info!("REPL: reconnected to {}", self.path);
        Ok(())
    }

    fn disconnect(&mut self) {
        self.port = None;
    }

    /// Pulse reset through RTS with DTR released, then give the board
    /// `wait` to come up before flushing its boot output.
    fn safe_boot(&mut self, wait: Duration) -> io::Result<()> {
        let port = self.port()?;
        port.write_data_terminal_ready(false)?;
        port.write_request_to_send(true)?;
        std::thread::sleep(RESET_PULSE);
        port.write_request_to_send(false)?;
        std::thread::sleep(wait);
        port.clear(ClearBuffer::Input)?;
        Ok(())
    }
}
