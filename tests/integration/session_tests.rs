//! Session semantics through the full receiver path.
//!
//! Every test feeds raw characteristic writes into [`ReceiverService`] and
//! checks what reached the sink, how often the device restarted and what
//! state the session ended in.

use bleota::app::events::OtaEvent;
use bleota::app::service::{Handled, ReceiverService};
use bleota::app::session::{SessionState, UpdateSession};
use bleota::config::ReceiverConfig;
use bleota::error::{DecodeError, Error, OtaError, SinkError, SinkStage};

use crate::mock_hw::{END, FailOn, LogSink, MockSink, MockSystem, SinkCall, chunk, init};

const CONN: u16 = 0;

struct Rig {
    svc: ReceiverService<MockSink>,
    sink: MockSink,
    sys: MockSystem,
    log: LogSink,
}

impl Rig {
    fn new() -> Self {
        Self::with_sink(MockSink::new())
    }

    fn with_sink(sink: MockSink) -> Self {
        Self {
            svc: ReceiverService::new(ReceiverConfig::default()),
            sink,
            sys: MockSystem::default(),
            log: LogSink::new(),
        }
    }

    fn send(&mut self, raw: &[u8]) -> Result<Handled, Error> {
        self.svc
            .handle_write(CONN, raw, &mut self.sink, &mut self.sys, &mut self.log)
    }
}

#[test]
fn round_trip_writes_image_in_order_and_restarts_once() {
    let mut rig = Rig::new();
    rig.send(&init(1024)).unwrap();
    rig.send(&chunk(&[0xAA; 511])).unwrap();
    rig.send(&chunk(&[0xAA])).unwrap();
    rig.send(&chunk(&[0xBB; 511])).unwrap();
    rig.send(&chunk(&[0xBB])).unwrap();
    let done = rig.send(&END).unwrap();

    let mut expected = vec![0xAA; 512];
    expected.extend_from_slice(&[0xBB; 512]);
    assert_eq!(rig.sink.written_bytes(), expected);
    assert_eq!(rig.sink.begins(), 1);
    assert_eq!(rig.sink.commits(), 1);
    assert_eq!(rig.sys.restarts, 1);
    assert!(matches!(done, Handled::Committed(o) if o.written == 1024 && !o.salvaged));
    assert_eq!(rig.svc.state(), SessionState::Idle);
}

#[test]
fn session_round_trip_with_full_size_chunks() {
    let mut sink = MockSink::new();
    let mut sys = MockSystem::default();
    let mut session: UpdateSession<MockSink> = UpdateSession::new();

    session.on_init(1024, &mut sink).unwrap();
    assert_eq!(session.on_chunk(&[0xAA; 512], &mut sink), Ok(512));
    assert_eq!(session.on_chunk(&[0xBB; 512], &mut sink), Ok(1024));
    session.on_end(&mut sink, &mut sys, true).unwrap();

    let mut expected = vec![0xAA; 512];
    expected.extend_from_slice(&[0xBB; 512]);
    assert_eq!(sink.written_bytes(), expected);
    assert_eq!(sink.commits(), 1);
    assert_eq!(sys.restarts, 1);
}

#[test]
fn begin_receives_announced_size() {
    let mut rig = Rig::new();
    rig.send(&init(0x0001_0000)).unwrap();
    assert_eq!(rig.sink.calls, [SinkCall::Begin { hint: 65536 }]);
    assert_eq!(rig.svc.session().expected_size(), 65536);
}

#[test]
fn chunk_in_idle_touches_nothing() {
    let mut rig = Rig::new();
    let err = rig.send(&chunk(&[1, 2, 3])).unwrap_err();
    assert_eq!(err, Error::Ota(OtaError::NotReceiving(SessionState::Idle)));
    assert!(rig.sink.calls.is_empty());
    assert_eq!(rig.svc.session().written_size(), 0);
    assert_eq!(rig.svc.stats().sequence_rejects, 1);
}

#[test]
fn write_failure_moves_to_error_and_blocks_later_chunks() {
    let mut rig = Rig::with_sink(MockSink::failing(FailOn::Write(2)));
    rig.send(&init(30)).unwrap();
    rig.send(&chunk(&[1; 10])).unwrap();

    let err = rig.send(&chunk(&[2; 10])).unwrap_err();
    assert_eq!(
        err,
        Error::Ota(OtaError::Sink {
            stage: SinkStage::Write,
            cause: SinkError::WriteFailed
        })
    );
    assert_eq!(rig.svc.state(), SessionState::Error);

    let err = rig.send(&chunk(&[3; 10])).unwrap_err();
    assert_eq!(err, Error::Ota(OtaError::NotReceiving(SessionState::Error)));
    assert_eq!(rig.sink.written_bytes(), [1; 10]);
    assert!(rig.log.has(|e| matches!(
        e,
        OtaEvent::StateChanged {
            from: SessionState::Receiving,
            to: SessionState::Error
        }
    )));
}

#[test]
fn end_without_init_does_nothing() {
    let mut rig = Rig::new();
    let err = rig.send(&END).unwrap_err();
    assert_eq!(err, Error::Ota(OtaError::NoTransaction));
    assert!(rig.sink.calls.is_empty());
    assert_eq!(rig.sys.restarts, 0);
}

#[test]
fn short_init_is_malformed() {
    let mut rig = Rig::new();
    let err = rig.send(&[0x01, 0x00, 0x10]).unwrap_err();
    assert_eq!(
        err,
        Error::Decode(DecodeError::TruncatedInit { payload_len: 2 })
    );
    assert_eq!(rig.svc.state(), SessionState::Idle);
    assert!(rig.sink.calls.is_empty());
    assert_eq!(rig.svc.stats().malformed, 1);
}

#[test]
fn short_init_mid_transfer_leaves_session_alone() {
    let mut rig = Rig::new();
    rig.send(&init(16)).unwrap();
    rig.send(&chunk(&[1, 2, 3, 4])).unwrap();
    let calls_before = rig.sink.calls.clone();

    let err = rig.send(&[0x01, 0x00, 0x10]).unwrap_err();
    assert_eq!(
        err,
        Error::Decode(DecodeError::TruncatedInit { payload_len: 2 })
    );
    assert_eq!(rig.svc.state(), SessionState::Receiving);
    assert_eq!(rig.svc.session().expected_size(), 16);
    assert_eq!(rig.svc.session().written_size(), 4);
    assert!(rig.svc.session().has_transaction());
    assert_eq!(rig.sink.calls, calls_before);
    assert_eq!(rig.sink.aborts(), 0);

    // The open transaction still takes data.
    rig.send(&chunk(&[5; 12])).unwrap();
    assert!(matches!(rig.send(&END), Ok(Handled::Committed(o)) if o.written == 16));
}

#[test]
fn unknown_tag_is_ignored() {
    let mut rig = Rig::new();
    rig.send(&init(4)).unwrap();
    let err = rig.send(&[0x09, 1, 2]).unwrap_err();
    assert_eq!(err, Error::Decode(DecodeError::UnknownTag(0x09)));
    assert_eq!(rig.svc.state(), SessionState::Receiving);
    assert_eq!(rig.sink.writes(), 0);
}

#[test]
fn empty_write_is_malformed() {
    let mut rig = Rig::new();
    assert_eq!(rig.send(&[]), Err(Error::Decode(DecodeError::Empty)));
    assert_eq!(rig.log.rejections(), 1);
}

#[test]
fn init_trailing_bytes_are_ignored() {
    let mut rig = Rig::new();
    let mut raw = init(8);
    raw.extend_from_slice(&[0xDE, 0xAD]);
    assert_eq!(rig.send(&raw), Ok(Handled::SessionStarted));
    assert_eq!(rig.svc.session().expected_size(), 8);
}

#[test]
fn empty_chunk_is_accepted() {
    let mut rig = Rig::new();
    rig.send(&init(4)).unwrap();
    assert_eq!(
        rig.send(&[0x02]),
        Ok(Handled::ChunkWritten { written: 0 })
    );
    assert_eq!(rig.svc.state(), SessionState::Receiving);
}

#[test]
fn zero_size_init_commits_empty_image() {
    let mut rig = Rig::new();
    rig.send(&init(0)).unwrap();
    assert!(matches!(rig.send(&END), Ok(Handled::Committed(o)) if o.written == 0));
    assert_eq!(rig.sink.commits(), 1);
    assert_eq!(rig.sys.restarts, 1);
}

#[test]
fn chunk_past_announced_size_is_refused() {
    let mut rig = Rig::new();
    rig.send(&init(4)).unwrap();
    rig.send(&chunk(&[1, 2, 3])).unwrap();
    let err = rig.send(&chunk(&[4, 5])).unwrap_err();
    assert_eq!(
        err,
        Error::Ota(OtaError::Overflow {
            written: 3,
            len: 2,
            expected: 4
        })
    );
    assert_eq!(rig.sink.written_bytes(), [1, 2, 3]);
    assert_eq!(rig.svc.state(), SessionState::Receiving);
}

#[test]
fn begin_failure_leaves_error_without_transaction() {
    let mut rig = Rig::with_sink(MockSink::failing(FailOn::Begin));
    let err = rig.send(&init(16)).unwrap_err();
    assert_eq!(
        err,
        Error::Ota(OtaError::Sink {
            stage: SinkStage::Begin,
            cause: SinkError::NoPartition
        })
    );
    assert_eq!(rig.svc.state(), SessionState::Error);
    assert!(!rig.svc.session().has_transaction());

    // END has nothing to salvage.
    assert_eq!(rig.send(&END), Err(Error::Ota(OtaError::NoTransaction)));
    assert_eq!(rig.sys.restarts, 0);

    // A fresh INIT recovers.
    assert_eq!(rig.send(&init(16)), Ok(Handled::SessionStarted));
    assert_eq!(rig.svc.state(), SessionState::Receiving);
}

#[test]
fn salvage_finalizes_partial_image_from_error() {
    let mut rig = Rig::with_sink(MockSink::failing(FailOn::Write(2)));
    rig.send(&init(20)).unwrap();
    rig.send(&chunk(&[7; 10])).unwrap();
    let _ = rig.send(&chunk(&[8; 10]));

    let done = rig.send(&END).unwrap();
    assert!(matches!(
        done,
        Handled::Committed(o) if o.salvaged && o.written == 10 && o.expected == 20
    ));
    assert_eq!(rig.sink.commits(), 1);
    assert_eq!(rig.sys.restarts, 1);
    assert_eq!(rig.svc.state(), SessionState::Idle);
}

#[test]
fn finalize_failure_does_not_restart() {
    let mut rig = Rig::with_sink(MockSink::failing(FailOn::Finalize));
    rig.send(&init(2)).unwrap();
    rig.send(&chunk(&[1, 2])).unwrap();

    let err = rig.send(&END).unwrap_err();
    assert_eq!(
        err,
        Error::Ota(OtaError::Sink {
            stage: SinkStage::Finalize,
            cause: SinkError::ImageInvalid
        })
    );
    assert_eq!(rig.sys.restarts, 0);
    assert_eq!(rig.sink.commits(), 0);
    assert_eq!(rig.svc.state(), SessionState::Receiving);
    assert!(!rig.svc.session().has_transaction());
    assert_eq!(rig.svc.stats().sink_failures, 1);
}

#[test]
fn commit_failure_does_not_restart() {
    let mut rig = Rig::with_sink(MockSink::failing(FailOn::Commit));
    rig.send(&init(1)).unwrap();
    rig.send(&chunk(&[9])).unwrap();

    assert!(matches!(
        rig.send(&END),
        Err(Error::Ota(OtaError::Sink {
            stage: SinkStage::Commit,
            ..
        }))
    ));
    assert_eq!(rig.sys.restarts, 0);
    assert!(!rig.log.has(|e| *e == OtaEvent::Rebooting));
}

#[test]
fn second_end_after_commit_is_refused() {
    let mut rig = Rig::new();
    rig.send(&init(1)).unwrap();
    rig.send(&chunk(&[1])).unwrap();
    rig.send(&END).unwrap();
    assert_eq!(rig.send(&END), Err(Error::Ota(OtaError::NoTransaction)));
    assert_eq!(rig.sink.commits(), 1);
    assert_eq!(rig.sys.restarts, 1);
}
