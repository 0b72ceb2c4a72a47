//! Outbound receiver events.
//!
//! The [`ReceiverService`](super::service::ReceiverService) emits these
//! through the [`EventSink`](super::ports::EventSink) port. The log adapter
//! turns them into the operator-facing log stream.

use crate::app::session::SessionState;
use crate::error::Error;

use super::commands::ConnId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtaEvent {
    /// INIT accepted and a sink transaction opened.
    SessionStarted { conn_id: ConnId, expected_size: u32 },

    /// INIT replaced an in-flight transaction, which was aborted.
    SessionSuperseded { written: u32, expected: u32 },

    /// A CHUNK was written.
    ChunkWritten { len: u32, written: u32, expected: u32 },

    /// Progress crossed a reporting milestone.
    Progress { percent: u8, written: u32, expected: u32 },

    /// The session moved between states.
    StateChanged { from: SessionState, to: SessionState },

    /// END arrived in `Error` state and the partial image is being finalized.
    SalvageFinalize { written: u32, expected: u32 },

    /// Image finalized and committed as the next boot target.
    Committed { written: u32 },

    /// Restart requested.
    Rebooting,

    /// A message was refused or failed.
    Rejected(Error),

    /// The owning connection dropped.
    OwnerDisconnected(ConnId),

    /// A connection took over a transaction whose owner had dropped.
    OwnerAdopted(ConnId),
}
