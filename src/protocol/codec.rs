//! OTA message codec.
//!
//! Wire format (one complete GATT write per message):
//! ```text
//! ┌──────────┬───────────────────────────────────────────────┐
//! │ Tag (1B) │ Payload                                       │
//! ├──────────┼───────────────────────────────────────────────┤
//! │ 0x01     │ INIT: total size, BE u32 (extra bytes ignored)│
//! │ 0x02     │ CHUNK: raw firmware bytes                     │
//! │ 0x03     │ END: none (trailing bytes ignored)            │
//! └──────────┴───────────────────────────────────────────────┘
//! ```
//!
//! There is no sequence number and no checksum; ordering and completeness
//! rely on the connection-oriented transport.

use log::trace;

use crate::error::DecodeError;

pub const TAG_INIT: u8 = 0x01;
pub const TAG_CHUNK: u8 = 0x02;
pub const TAG_END: u8 = 0x03;

/// Receive buffer size, tag included.
pub const MAX_MESSAGE_LEN: usize = 512;

/// Largest CHUNK payload that fits the receive buffer.
pub const MAX_CHUNK_LEN: usize = MAX_MESSAGE_LEN - 1;

const INIT_SIZE_LEN: usize = 4;

/// Shortest well-formed INIT write: tag plus the 4-byte size.
pub const MIN_INIT_LEN: usize = 1 + INIT_SIZE_LEN;

/// A decoded message borrowing its payload from the raw write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message<'a> {
    Init { total_size: u32 },
    Chunk(&'a [u8]),
    End,
}

impl<'a> Message<'a> {
    /// Decode with the default receive-buffer limit.
    pub fn decode(raw: &'a [u8]) -> Result<Self, DecodeError> {
        Self::decode_with_limit(raw, MAX_MESSAGE_LEN)
    }

    /// Decode a raw write, rejecting anything longer than `max_len`.
    pub fn decode_with_limit(raw: &'a [u8], max_len: usize) -> Result<Self, DecodeError> {
        let Some((&tag, payload)) = raw.split_first() else {
            return Err(DecodeError::Empty);
        };
        if raw.len() > max_len {
            return Err(DecodeError::TooLong {
                len: raw.len(),
                max: max_len,
            });
        }

        match tag {
            TAG_INIT => {
                let Some(size_bytes) = payload.first_chunk::<INIT_SIZE_LEN>() else {
                    return Err(DecodeError::TruncatedInit {
                        payload_len: payload.len(),
                    });
                };
                if payload.len() > INIT_SIZE_LEN {
                    trace!(
                        "codec: ignoring {} trailing INIT bytes",
                        payload.len() - INIT_SIZE_LEN
                    );
                }
                Ok(Self::Init {
                    total_size: u32::from_be_bytes(*size_bytes),
                })
            }
            TAG_CHUNK => Ok(Self::Chunk(payload)),
            TAG_END => Ok(Self::End),
            other => Err(DecodeError::UnknownTag(other)),
        }
    }

    pub fn tag(&self) -> u8 {
        match self {
            Self::Init { .. } => TAG_INIT,
            Self::Chunk(_) => TAG_CHUNK,
            Self::End => TAG_END,
        }
    }

    /// Number of bytes [`encode`](Self::encode) produces.
    pub fn encoded_len(&self) -> usize {
        1 + match self {
            Self::Init { .. } => INIT_SIZE_LEN,
            Self::Chunk(data) => data.len(),
            Self::End => 0,
        }
    }

    /// Encode into `out`. Returns the number of bytes written, or `None`
    /// if `out` is too small.
    pub fn encode(&self, out: &mut [u8]) -> Option<usize> {
        let total = self.encoded_len();
        let buf = out.get_mut(..total)?;
        buf[0] = self.tag();
        match self {
            Self::Init { total_size } => buf[1..].copy_from_slice(&total_size.to_be_bytes()),
            Self::Chunk(data) => buf[1..].copy_from_slice(data),
            Self::End => {}
        }
        Some(total)
    }
}
