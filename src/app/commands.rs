//! Inbound commands to the receiver service.
//!
//! The transport adapter produces these from GATT callbacks; the main loop
//! drains them from the [`Inbox`](crate::protocol::channels::Inbox) and hands
//! them to the [`ReceiverService`](super::service::ReceiverService) one at a
//! time.

use crate::protocol::codec::MAX_MESSAGE_LEN;

/// Transport connection handle.
pub type ConnId = u16;

/// One complete raw write on the OTA characteristic.
#[derive(Debug, Clone)]
pub struct InboundWrite {
    pub conn_id: ConnId,
    pub data: heapless::Vec<u8, MAX_MESSAGE_LEN>,
}

#[derive(Debug, Clone)]
pub enum ReceiverCommand {
    /// A client wrote a message.
    Write(InboundWrite),
    /// A client disconnected.
    Disconnected(ConnId),
}
