//! Unified error types for the update receiver.
//!
//! Every rejection the receiver can produce funnels into [`Error`]. The
//! variants are `Copy` so they can be logged, emitted as events and
//! returned to the caller without allocation.
//!
//! | Class       | Source                                   | Effect on session          |
//! |-------------|------------------------------------------|----------------------------|
//! | `Malformed` | [`DecodeError`]                          | none                       |
//! | `Sequence`  | [`OtaError`] without a sink cause        | none                       |
//! | `Sink`      | [`OtaError::Sink`]                       | begin/write → `Error`      |

use core::fmt;

use crate::app::session::SessionState;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The raw write could not be decoded into a message.
    Decode(DecodeError),
    /// The message was valid but the session refused or failed it.
    Ota(OtaError),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
    /// Peripheral or stack initialisation failed.
    Init(&'static str),
}

/// Coarse classification used for logging and counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Malformed,
    Sequence,
    Sink,
    Platform,
}

impl Error {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Decode(_) => ErrorClass::Malformed,
            Self::Ota(OtaError::Sink { .. }) => ErrorClass::Sink,
            Self::Ota(_) => ErrorClass::Sequence,
            Self::Config(_) | Self::Init(_) => ErrorClass::Platform,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode(e) => write!(f, "decode: {e}"),
            Self::Ota(e) => write!(f, "ota: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Decode errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Zero-length write; rejected before the tag is inspected.
    Empty,
    /// Write exceeds the receive buffer.
    TooLong { len: usize, max: usize },
    /// INIT carried fewer than four size bytes.
    TruncatedInit { payload_len: usize },
    /// First byte is not a known message tag.
    UnknownTag(u8),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty message"),
            Self::TooLong { len, max } => write!(f, "message of {len} bytes exceeds {max}"),
            Self::TruncatedInit { payload_len } => {
                write!(f, "INIT too short ({payload_len} payload bytes, need 4)")
            }
            Self::UnknownTag(tag) => write!(f, "unknown command 0x{tag:02X}"),
        }
    }
}

impl From<DecodeError> for Error {
    fn from(e: DecodeError) -> Self {
        Self::Decode(e)
    }
}

// ---------------------------------------------------------------------------
// Update sink errors
// ---------------------------------------------------------------------------

/// Failures reported by an [`UpdateSink`](crate::app::ports::UpdateSink).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkError {
    /// No inactive update partition exists.
    NoPartition,
    /// The partition could not be opened for writing.
    OpenFailed,
    /// A flash write failed.
    WriteFailed,
    /// The written image failed validation on finalize.
    ImageInvalid,
    /// The boot partition pointer could not be updated.
    BootSetFailed,
    /// The image does not fit the update partition.
    OutOfSpace,
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoPartition => write!(f, "no update partition available"),
            Self::OpenFailed => write!(f, "partition open failed"),
            Self::WriteFailed => write!(f, "flash write failed"),
            Self::ImageInvalid => write!(f, "image validation failed"),
            Self::BootSetFailed => write!(f, "set boot partition failed"),
            Self::OutOfSpace => write!(f, "image exceeds partition size"),
        }
    }
}

/// Which sink call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkStage {
    Begin,
    Write,
    Finalize,
    Commit,
}

impl fmt::Display for SinkStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Begin => write!(f, "ota_begin"),
            Self::Write => write!(f, "ota_write"),
            Self::Finalize => write!(f, "ota_end"),
            Self::Commit => write!(f, "set_boot_partition"),
        }
    }
}

// ---------------------------------------------------------------------------
// Session errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtaError {
    /// CHUNK arrived while the session was not receiving.
    NotReceiving(SessionState),
    /// CHUNK or END arrived with no open sink transaction.
    NoTransaction,
    /// CHUNK would write past the size announced by INIT.
    Overflow { written: u32, len: u32, expected: u32 },
    /// END arrived in `Error` state and salvage finalize is disabled.
    SalvageDisabled,
    /// Another connection owns the active session.
    SessionBusy { owner: u16 },
    /// The update sink reported a failure.
    Sink { stage: SinkStage, cause: SinkError },
}

impl fmt::Display for OtaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotReceiving(state) => write!(f, "CHUNK received in invalid state ({state:?})"),
            Self::NoTransaction => write!(f, "no open update transaction"),
            Self::Overflow {
                written,
                len,
                expected,
            } => write!(
                f,
                "chunk of {len} bytes would exceed declared size ({written} / {expected})"
            ),
            Self::SalvageDisabled => write!(f, "END in error state refused (salvage disabled)"),
            Self::SessionBusy { owner } => write!(f, "session owned by connection {owner}"),
            Self::Sink { stage, cause } => write!(f, "{stage} failed: {cause}"),
        }
    }
}

impl From<OtaError> for Error {
    fn from(e: OtaError) -> Self {
        Self::Ota(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, Error>;
