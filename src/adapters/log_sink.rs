//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing receiver events to the ESP-IDF
//! logger (which goes to UART / USB-CDC in production). The log stream is
//! the only place a sender's mistakes become visible.

use log::{debug, error, info, warn};

use crate::app::events::OtaEvent;
use crate::app::ports::EventSink;
use crate::error::ErrorClass;

/// Adapter that logs every [`OtaEvent`] to the serial console.
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &OtaEvent) {
        match event {
            OtaEvent::SessionStarted {
                conn_id,
                expected_size,
            } => {
                info!("OTA | start | conn={} | expected={}B", conn_id, expected_size);
            }
            OtaEvent::SessionSuperseded { written, expected } => {
                warn!(
                    "OTA | superseded | aborted at {}/{}B",
                    written, expected
                );
            }
            OtaEvent::ChunkWritten {
                len,
                written,
                expected,
            } => {
                debug!("OTA | chunk | +{}B | {}/{}B", len, written, expected);
            }
            OtaEvent::Progress {
                percent,
                written,
                expected,
            } => {
                info!("OTA | progress | {}% | {}/{}B", percent, written, expected);
            }
            OtaEvent::StateChanged { from, to } => {
                info!("OTA | state | {:?} -> {:?}", from, to);
            }
            OtaEvent::SalvageFinalize { written, expected } => {
                warn!(
                    "OTA | salvage | finalizing partial image {}/{}B",
                    written, expected
                );
            }
            OtaEvent::Committed { written } => {
                info!("OTA | committed | {}B set as boot image", written);
            }
            OtaEvent::Rebooting => {
                info!("OTA | rebooting");
            }
            OtaEvent::Rejected(e) => match e.class() {
                ErrorClass::Sink | ErrorClass::Platform => error!("OTA | failed | {}", e),
                ErrorClass::Malformed | ErrorClass::Sequence => {
                    warn!("OTA | rejected | {}", e);
                }
            },
            OtaEvent::OwnerDisconnected(conn_id) => {
                info!("OTA | owner conn={} disconnected, session kept", conn_id);
            }
            OtaEvent::OwnerAdopted(conn_id) => {
                info!("OTA | conn={} took over the open session", conn_id);
            }
        }
    }
}
