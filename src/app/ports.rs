//! Port traits — the hexagonal boundary between the receiver core and the outside world.
//!
//! ```text
//!   Transport ──▶ Inbox ──▶ ReceiverService ──▶ UpdateSink / SystemControl
//!                                  │
//!                                  └──▶ EventSink
//! ```
//!
//! The flash partition subsystem, the restart primitive and the log
//! stream are external collaborators. The [`ReceiverService`](super::service::ReceiverService)
//! takes them as generics at call sites, so the session logic never
//! touches ESP-IDF directly and runs unchanged against host mocks.

use crate::config::ReceiverConfig;
use crate::error::SinkError;

// ───────────────────────────────────────────────────────────────
// Update sink (driven adapter: domain → flash update partition)
// ───────────────────────────────────────────────────────────────

/// Abstraction over the flash update partition.
///
/// Lifecycle: `begin` → `write`* → `finalize` → `commit`. A transaction
/// that will not be finalized is handed back through `abort`.
pub trait UpdateSink {
    /// An open write transaction against the selected partition.
    type Transaction;
    /// A finalized image awaiting boot-partition commit.
    type Image;

    /// Select the next update partition and open a transaction.
    /// `size_hint` is the total size announced by the sender.
    fn begin(&mut self, size_hint: u32) -> Result<Self::Transaction, SinkError>;

    /// Append `data` to the partition.
    fn write(&mut self, tx: &mut Self::Transaction, data: &[u8]) -> Result<(), SinkError>;

    /// Close the transaction and validate the written image.
    fn finalize(&mut self, tx: Self::Transaction) -> Result<Self::Image, SinkError>;

    /// Mark the image's partition as the next boot target.
    fn commit(&mut self, image: &mut Self::Image) -> Result<(), SinkError>;

    /// Release a transaction without finalizing it.
    fn abort(&mut self, tx: Self::Transaction);
}

// ───────────────────────────────────────────────────────────────
// System control (driven adapter: domain → SoC)
// ───────────────────────────────────────────────────────────────

pub trait SystemControl {
    /// Restart the device. Does not return on hardware.
    fn restart(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → log stream)
// ───────────────────────────────────────────────────────────────

/// The receiver emits [`OtaEvent`](super::events::OtaEvent)s through this
/// port. The log stream is the only operator-visible channel; the protocol
/// itself carries no acknowledgement.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::OtaEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists receiver configuration.
///
/// Implementations MUST call [`ReceiverConfig::validate`] before persisting.
pub trait ConfigPort {
    /// Load configuration; returns defaults if nothing is stored.
    fn load(&self) -> Result<ReceiverConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &ReceiverConfig) -> Result<(), ConfigError>;
}

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl From<ConfigError> for crate::error::Error {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::Corrupted => Self::Config("stored config corrupted"),
            ConfigError::ValidationFailed(msg) => Self::Config(msg),
            ConfigError::IoError => Self::Config("config storage I/O error"),
        }
    }
}
