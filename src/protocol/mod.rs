//! Wire protocol for the OTA characteristic.
//!
//! - [`codec`]: raw write ⇄ [`Message`](codec::Message)
//! - [`frames`]: firmware image → write sequence (sender side)
//! - [`channels`]: transport → main loop inbox

pub mod channels;
pub mod codec;
pub mod frames;
