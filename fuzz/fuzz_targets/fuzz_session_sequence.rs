//! Fuzz target: `ReceiverService::handle_write`
//!
//! Splits the input into length-prefixed writes from two connections and
//! runs them through the receiver against the in-memory flash model. The
//! receiver must never panic, never count more bytes than were announced,
//! and must restart exactly once per committed image.
//!
//! cargo fuzz run fuzz_session_sequence

#![no_main]

use bleota::adapters::ota_sink::MemoryFlashSink;
use bleota::adapters::system::SimSystem;
use bleota::app::events::OtaEvent;
use bleota::app::ports::EventSink;
use bleota::app::service::ReceiverService;
use bleota::config::ReceiverConfig;
use libfuzzer_sys::fuzz_target;

struct Discard;

impl EventSink for Discard {
    fn emit(&mut self, _event: &OtaEvent) {}
}

fuzz_target!(|data: &[u8]| {
    let mut svc = ReceiverService::new(ReceiverConfig::default());
    let mut flash = MemoryFlashSink::new(16 * 1024);
    let mut sys = SimSystem::default();

    // [conn|len] [len bytes] ...
    let mut rest = data;
    while let Some((&header, tail)) = rest.split_first() {
        let conn = u16::from(header >> 7);
        let len = usize::from(header & 0x7F).min(tail.len());
        let (write, next) = tail.split_at(len);
        rest = next;

        let _ = svc.handle_write(conn, write, &mut flash, &mut sys, &mut Discard);

        let session = svc.session();
        assert!(session.written_size() <= session.expected_size());
        assert_eq!(flash.commits(), sys.restarts());
    }
});
