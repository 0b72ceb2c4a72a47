//! Sender-side framing: firmware image → INIT, CHUNK…, END.
//!
//! Produces exactly the write sequence an uploader sends to the OTA
//! characteristic, one frame per GATT write.

use super::codec::{MAX_CHUNK_LEN, MAX_MESSAGE_LEN, Message};

/// Chunk size used by the reference uploader (fits a 185-byte ATT MTU).
pub const DEFAULT_CHUNK_SIZE: usize = 180;

/// One encoded write.
pub type Frame = heapless::Vec<u8, MAX_MESSAGE_LEN>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanError {
    /// Chunk size outside `1..=MAX_CHUNK_LEN`.
    InvalidChunkSize(usize),
    /// Image larger than the 32-bit size field.
    ImageTooLarge(usize),
}

impl core::fmt::Display for PlanError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidChunkSize(n) => {
                write!(f, "chunk size {n} outside 1..={MAX_CHUNK_LEN}")
            }
            Self::ImageTooLarge(n) => write!(f, "image of {n} bytes exceeds u32 size field"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Init,
    Chunks,
    End,
    Done,
}

/// Iterator over the frames that deliver `image`.
#[derive(Debug, Clone)]
pub struct UploadPlan<'a> {
    image: &'a [u8],
    chunk_size: usize,
    offset: usize,
    step: Step,
}

impl<'a> UploadPlan<'a> {
    pub fn new(image: &'a [u8], chunk_size: usize) -> Result<Self, PlanError> {
        if chunk_size == 0 || chunk_size > MAX_CHUNK_LEN {
            return Err(PlanError::InvalidChunkSize(chunk_size));
        }
        if u32::try_from(image.len()).is_err() {
            return Err(PlanError::ImageTooLarge(image.len()));
        }
        Ok(Self {
            image,
            chunk_size,
            offset: 0,
            step: Step::Init,
        })
    }

    pub fn with_default_chunks(image: &'a [u8]) -> Result<Self, PlanError> {
        Self::new(image, DEFAULT_CHUNK_SIZE)
    }

    /// Number of CHUNK frames the plan emits.
    pub fn chunk_count(&self) -> usize {
        self.image.len().div_ceil(self.chunk_size)
    }

    /// Total number of frames, INIT and END included.
    pub fn frame_count(&self) -> usize {
        self.chunk_count() + 2
    }

    fn frame(message: &Message<'_>) -> Frame {
        let mut frame = Frame::new();
        // Lengths are bounded by MAX_MESSAGE_LEN through the chunk-size check.
        let _ = frame.resize_default(message.encoded_len());
        let _ = message.encode(&mut frame);
        frame
    }
}

impl Iterator for UploadPlan<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        loop {
            match self.step {
                Step::Init => {
                    self.step = Step::Chunks;
                    let total_size = self.image.len() as u32;
                    return Some(Self::frame(&Message::Init { total_size }));
                }
                Step::Chunks => {
                    if self.offset >= self.image.len() {
                        self.step = Step::End;
                        continue;
                    }
                    let end = (self.offset + self.chunk_size).min(self.image.len());
                    let chunk = &self.image[self.offset..end];
                    self.offset = end;
                    return Some(Self::frame(&Message::Chunk(chunk)));
                }
                Step::End => {
                    self.step = Step::Done;
                    return Some(Self::frame(&Message::End));
                }
                Step::Done => return None,
            }
        }
    }
}
