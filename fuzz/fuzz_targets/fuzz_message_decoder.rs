//! Fuzz target: `Message::decode`
//!
//! Feeds arbitrary characteristic writes into the message decoder and
//! asserts that it never panics, never yields a CHUNK payload longer than
//! the write, and that accepted messages re-encode to a prefix of the input.
//!
//! cargo fuzz run fuzz_message_decoder

#![no_main]

use bleota::protocol::codec::{MAX_CHUNK_LEN, MAX_MESSAGE_LEN, Message};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(msg) = Message::decode(data) else {
        return;
    };
    assert!(data.len() <= MAX_MESSAGE_LEN);

    if let Message::Chunk(payload) = msg {
        assert!(payload.len() <= MAX_CHUNK_LEN);
        assert_eq!(payload.len() + 1, data.len());
    }

    // INIT and END drop trailing bytes; CHUNK keeps all of them.
    let mut out = [0u8; MAX_MESSAGE_LEN];
    let n = msg.encode(&mut out).expect("decoded message must re-encode");
    assert_eq!(&out[..n], &data[..n]);
});
