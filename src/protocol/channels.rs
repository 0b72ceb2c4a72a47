//! Single-consumer inbox between the transport and the state machine.
//!
//! Uses an `embassy-sync` bounded channel so the GATT callback task can
//! hand over messages without touching the session. The main loop is the
//! only consumer, so messages are processed strictly one at a time and in
//! arrival order.
//!
//! ```text
//! ┌──────────────┐ ReceiverCommand ┌──────────────┐
//! │ GATT task    │────────────────▶│  Main loop   │──▶ ReceiverService
//! │ (callbacks)  │   (bounded)     │  (consumer)  │
//! └──────────────┘                 └──────────────┘
//! ```
//!
//! Writes may be refused when the channel is full. Disconnect notices may
//! not: one that finds the channel full is parked in a small per-connection
//! set and handed out once the channel has drained.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use crate::app::commands::{ConnId, InboundWrite, ReceiverCommand};

use super::codec::MAX_MESSAGE_LEN;

/// Pending-message depth of the device inbox.
pub const INBOUND_DEPTH: usize = 8;

/// Parked disconnect notices. Bluedroid caps concurrent links well below this,
/// and repeated notices for one connection collapse into one entry.
const PARKED_DISCONNECTS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    /// Zero-length write.
    Empty,
    /// Write larger than the receive buffer.
    TooLong(usize),
    /// Consumer has fallen behind; the write is refused.
    QueueFull,
}

impl core::fmt::Display for SubmitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Empty => write!(f, "empty write"),
            Self::TooLong(n) => write!(f, "write of {n} bytes exceeds {MAX_MESSAGE_LEN}"),
            Self::QueueFull => write!(f, "inbox full"),
        }
    }
}

/// Bounded multi-producer, single-consumer command queue.
pub struct Inbox<const N: usize> {
    channel: Channel<CriticalSectionRawMutex, ReceiverCommand, N>,
    parked: Mutex<CriticalSectionRawMutex, RefCell<heapless::Vec<ConnId, PARKED_DISCONNECTS>>>,
}

impl<const N: usize> Inbox<N> {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
            parked: Mutex::new(RefCell::new(heapless::Vec::new())),
        }
    }

    /// Copy a raw write into the queue.
    pub fn submit_write(&self, conn_id: ConnId, raw: &[u8]) -> Result<(), SubmitError> {
        if raw.is_empty() {
            return Err(SubmitError::Empty);
        }
        let data = heapless::Vec::from_slice(raw).map_err(|()| SubmitError::TooLong(raw.len()))?;
        self.channel
            .try_send(ReceiverCommand::Write(InboundWrite { conn_id, data }))
            .map_err(|_| SubmitError::QueueFull)
    }

    /// Queue a disconnect notification, parking it if the channel is full.
    /// Returns `false` only if the parking set is exhausted as well.
    pub fn submit_disconnect(&self, conn_id: ConnId) -> bool {
        if self
            .channel
            .try_send(ReceiverCommand::Disconnected(conn_id))
            .is_ok()
        {
            return true;
        }
        self.parked.lock(|parked| {
            let mut parked = parked.borrow_mut();
            parked.contains(&conn_id) || parked.push(conn_id).is_ok()
        })
    }

    /// Pop the oldest pending command, if any. Parked disconnects follow
    /// everything that was already queued.
    pub fn try_take(&self) -> Option<ReceiverCommand> {
        if let Ok(cmd) = self.channel.try_receive() {
            return Some(cmd);
        }
        self.parked.lock(|parked| {
            let mut parked = parked.borrow_mut();
            if parked.is_empty() {
                None
            } else {
                Some(ReceiverCommand::Disconnected(parked.remove(0)))
            }
        })
    }

    /// Drain every pending command into `handler` in FIFO order.
    /// Returns the number of commands handled.
    pub fn drain(&self, mut handler: impl FnMut(ReceiverCommand)) -> usize {
        let mut handled = 0;
        while let Some(cmd) = self.try_take() {
            handler(cmd);
            handled += 1;
        }
        handled
    }

    pub fn len(&self) -> usize {
        self.channel.len() + self.parked.lock(|parked| parked.borrow().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<const N: usize> Default for Inbox<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Device-wide inbox fed by the BLE adapter and drained by `main`.
pub static INBOUND: Inbox<INBOUND_DEPTH> = Inbox::new();
