//! Receiver configuration parameters
//!
//! All tunable parameters for the update receiver.
//! Values can be overridden via NVS (non-volatile storage).

use serde::{Deserialize, Serialize};

use crate::adapters::utils::is_printable_ascii;
use crate::app::ports::ConfigError;
use crate::protocol::codec::{MAX_MESSAGE_LEN, MIN_INIT_LEN};

/// Longest GAP device name that fits a legacy advertising packet.
pub const MAX_DEVICE_NAME_LEN: usize = 29;
/// Largest static read payload served by the OTA characteristic.
pub const MAX_DIAGNOSTIC_LEN: usize = 64;

/// Core receiver configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiverConfig {
    // --- Transport ---
    /// Advertised GAP device name
    pub device_name: heapless::String<MAX_DEVICE_NAME_LEN>,
    /// 16-bit primary service UUID
    pub service_uuid: u16,
    /// 16-bit OTA characteristic UUID
    pub characteristic_uuid: u16,
    /// Largest accepted raw write, tag included
    pub max_message_len: u16,
    /// Static payload answered on characteristic read
    pub diagnostic_payload: heapless::String<MAX_DIAGNOSTIC_LEN>,

    // --- Session policy ---
    /// Progress milestone granularity (percent)
    pub progress_step_percent: u8,
    /// Honour END from the error state while a transaction is still open
    pub allow_salvage_finalize: bool,
    /// Refuse messages from other connections while one owns the session
    pub single_connection: bool,

    // --- Timing ---
    /// Main loop inbox poll period (milliseconds)
    pub poll_interval_ms: u32,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        let mut device_name = heapless::String::new();
        let _ = device_name.push_str("nimble");
        let mut diagnostic_payload = heapless::String::new();
        let _ = diagnostic_payload.push_str("Hello");

        Self {
            // Transport
            device_name,
            service_uuid: 0xFFF0,
            characteristic_uuid: 0xFFF1,
            max_message_len: MAX_MESSAGE_LEN as u16,
            diagnostic_payload,

            // Session policy
            progress_step_percent: 10,
            allow_salvage_finalize: true,
            single_connection: true,

            // Timing
            poll_interval_ms: 10,
        }
    }
}

impl ReceiverConfig {
    /// Range-check every field. Persisting adapters call this before saving.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device_name.is_empty() || !is_printable_ascii(&self.device_name) {
            return Err(ConfigError::ValidationFailed(
                "device_name must be non-empty printable ASCII",
            ));
        }
        if !is_printable_ascii(&self.diagnostic_payload) {
            return Err(ConfigError::ValidationFailed(
                "diagnostic_payload must be printable ASCII",
            ));
        }
        // Anything shorter than an INIT could never start a transfer.
        if !(MIN_INIT_LEN..=MAX_MESSAGE_LEN).contains(&usize::from(self.max_message_len)) {
            return Err(ConfigError::ValidationFailed(
                "max_message_len must be 5–512",
            ));
        }
        if !(1..=100).contains(&self.progress_step_percent) {
            return Err(ConfigError::ValidationFailed(
                "progress_step_percent must be 1–100",
            ));
        }
        if !(1..=1000).contains(&self.poll_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "poll_interval_ms must be 1–1000",
            ));
        }
        if self.service_uuid == 0 || self.characteristic_uuid == 0 {
            return Err(ConfigError::ValidationFailed("UUIDs must be non-zero"));
        }
        if self.service_uuid == self.characteristic_uuid {
            return Err(ConfigError::ValidationFailed(
                "service and characteristic UUIDs must differ",
            ));
        }
        Ok(())
    }

    pub fn max_message_len(&self) -> usize {
        usize::from(self.max_message_len)
    }
}
