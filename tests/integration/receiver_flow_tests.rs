//! Receiver policy: admission, supersession, salvage gating, progress and
//! event ordering, all driven through the command inbox.

use bleota::app::commands::ReceiverCommand;
use bleota::app::events::OtaEvent;
use bleota::app::service::{Handled, ReceiverService};
use bleota::app::session::SessionState;
use bleota::config::ReceiverConfig;
use bleota::error::{Error, OtaError};
use bleota::protocol::channels::Inbox;

use crate::mock_hw::{END, FailOn, LogSink, MockSink, MockSystem, SinkCall, chunk, init};

fn service(config: ReceiverConfig) -> ReceiverService<MockSink> {
    ReceiverService::new(config)
}

// ── Supersession ──────────────────────────────────────────────

#[test]
fn reinit_aborts_stale_transaction_and_restarts_counters() {
    let mut svc = service(ReceiverConfig::default());
    let (mut sink, mut sys, mut log) = (MockSink::new(), MockSystem::default(), LogSink::new());

    svc.handle_write(1, &init(100), &mut sink, &mut sys, &mut log).unwrap();
    svc.handle_write(1, &chunk(&[1; 40]), &mut sink, &mut sys, &mut log).unwrap();

    let again = svc.handle_write(1, &init(8), &mut sink, &mut sys, &mut log);
    assert_eq!(again, Ok(Handled::SessionRestarted));
    assert_eq!(sink.aborts(), 1);
    assert_eq!(svc.session().written_size(), 0);
    assert_eq!(svc.session().expected_size(), 8);
    assert!(log.has(|e| *e == OtaEvent::SessionSuperseded {
        written: 40,
        expected: 100
    }));

    // The stale transaction is never written again.
    svc.handle_write(1, &chunk(&[2; 8]), &mut sink, &mut sys, &mut log).unwrap();
    svc.handle_write(1, &END, &mut sink, &mut sys, &mut log).unwrap();
    assert_eq!(
        sink.calls.last(),
        Some(&SinkCall::Commit { tx: 2 })
    );
    assert_eq!(svc.stats().sessions_started, 2);
}

#[test]
fn reinit_from_error_recovers() {
    let mut svc = service(ReceiverConfig::default());
    let mut sink = MockSink::failing(FailOn::Write(1));
    let (mut sys, mut log) = (MockSystem::default(), LogSink::new());

    svc.handle_write(1, &init(4), &mut sink, &mut sys, &mut log).unwrap();
    let _ = svc.handle_write(1, &chunk(&[0; 4]), &mut sink, &mut sys, &mut log);
    assert_eq!(svc.state(), SessionState::Error);

    svc.handle_write(1, &init(4), &mut sink, &mut sys, &mut log).unwrap();
    assert_eq!(svc.state(), SessionState::Receiving);
    svc.handle_write(1, &chunk(&[5; 4]), &mut sink, &mut sys, &mut log).unwrap();
    svc.handle_write(1, &END, &mut sink, &mut sys, &mut log).unwrap();
    assert_eq!(sink.written_bytes(), [5; 4]);
    assert_eq!(sys.restarts, 1);
}

// ── Salvage gating ────────────────────────────────────────────

#[test]
fn salvage_disabled_keeps_error_session() {
    let config = ReceiverConfig {
        allow_salvage_finalize: false,
        ..Default::default()
    };
    let mut svc = service(config);
    let mut sink = MockSink::failing(FailOn::Write(2));
    let (mut sys, mut log) = (MockSystem::default(), LogSink::new());

    svc.handle_write(1, &init(8), &mut sink, &mut sys, &mut log).unwrap();
    svc.handle_write(1, &chunk(&[1; 4]), &mut sink, &mut sys, &mut log).unwrap();
    let _ = svc.handle_write(1, &chunk(&[2; 4]), &mut sink, &mut sys, &mut log);

    let err = svc.handle_write(1, &END, &mut sink, &mut sys, &mut log);
    assert_eq!(err, Err(Error::Ota(OtaError::SalvageDisabled)));
    assert_eq!(sys.restarts, 0);
    assert_eq!(sink.commits(), 0);
    assert_eq!(svc.state(), SessionState::Error);
    assert!(svc.session().has_transaction());
    assert!(!log.has(|e| matches!(e, OtaEvent::SalvageFinalize { .. })));
}

// ── Admission ─────────────────────────────────────────────────

#[test]
fn second_central_is_refused_until_owner_leaves() {
    let mut svc = service(ReceiverConfig::default());
    let (mut sink, mut sys, mut log) = (MockSink::new(), MockSystem::default(), LogSink::new());

    svc.handle_write(1, &init(4), &mut sink, &mut sys, &mut log).unwrap();
    assert_eq!(svc.owner(), Some(1));

    for raw in [init(16), chunk(&[0xEE]), END.to_vec()] {
        let err = svc.handle_write(2, &raw, &mut sink, &mut sys, &mut log);
        assert_eq!(err, Err(Error::Ota(OtaError::SessionBusy { owner: 1 })));
    }
    assert_eq!(sink.begins(), 1);
    assert_eq!(sink.writes(), 0);
    assert_eq!(svc.stats().sequence_rejects, 3);

    svc.on_disconnect(1, &mut log);
    assert!(log.has(|e| *e == OtaEvent::OwnerDisconnected(1)));
    assert_eq!(svc.state(), SessionState::Receiving);

    svc.handle_write(2, &chunk(&[1, 2, 3, 4]), &mut sink, &mut sys, &mut log).unwrap();
    svc.handle_write(2, &END, &mut sink, &mut sys, &mut log).unwrap();
    assert_eq!(sys.restarts, 1);
}

#[test]
fn orphaned_session_goes_to_the_first_writer_only() {
    let mut svc = service(ReceiverConfig::default());
    let (mut sink, mut sys, mut log) = (MockSink::new(), MockSystem::default(), LogSink::new());

    svc.handle_write(1, &init(4), &mut sink, &mut sys, &mut log).unwrap();
    svc.on_disconnect(1, &mut log);
    assert_eq!(svc.owner(), None);

    assert_eq!(
        svc.handle_write(2, &chunk(&[0xAA, 0xAA]), &mut sink, &mut sys, &mut log),
        Ok(Handled::ChunkWritten { written: 2 })
    );
    assert_eq!(svc.owner(), Some(2));
    assert!(log.has(|e| *e == OtaEvent::OwnerAdopted(2)));

    let err = svc.handle_write(3, &chunk(&[0xBB, 0xBB]), &mut sink, &mut sys, &mut log);
    assert_eq!(err, Err(Error::Ota(OtaError::SessionBusy { owner: 2 })));
    assert_eq!(svc.handle_write(3, &END, &mut sink, &mut sys, &mut log), err);
    assert_eq!(sink.written_bytes(), [0xAA, 0xAA]);
    assert_eq!(sys.restarts, 0);

    svc.handle_write(2, &chunk(&[0xCC, 0xCC]), &mut sink, &mut sys, &mut log).unwrap();
    svc.handle_write(2, &END, &mut sink, &mut sys, &mut log).unwrap();
    assert_eq!(sink.written_bytes(), [0xAA, 0xAA, 0xCC, 0xCC]);
    assert_eq!(sys.restarts, 1);
}

#[test]
fn admission_open_when_single_connection_disabled() {
    let config = ReceiverConfig {
        single_connection: false,
        ..Default::default()
    };
    let mut svc = service(config);
    let (mut sink, mut sys, mut log) = (MockSink::new(), MockSystem::default(), LogSink::new());

    svc.handle_write(1, &init(2), &mut sink, &mut sys, &mut log).unwrap();
    svc.handle_write(2, &chunk(&[1]), &mut sink, &mut sys, &mut log).unwrap();
    svc.handle_write(3, &chunk(&[2]), &mut sink, &mut sys, &mut log).unwrap();
    assert_eq!(sink.written_bytes(), [1, 2]);
}

#[test]
fn non_owner_disconnect_is_silent() {
    let mut svc = service(ReceiverConfig::default());
    let (mut sink, mut sys, mut log) = (MockSink::new(), MockSystem::default(), LogSink::new());

    svc.handle_write(1, &init(2), &mut sink, &mut sys, &mut log).unwrap();
    let before = log.events.len();
    svc.on_disconnect(7, &mut log);
    assert_eq!(log.events.len(), before);
    assert_eq!(svc.owner(), Some(1));
}

// ── Limits and progress ───────────────────────────────────────

#[test]
fn configured_message_limit_is_enforced() {
    let config = ReceiverConfig {
        max_message_len: 64,
        ..Default::default()
    };
    let mut svc = service(config);
    let (mut sink, mut sys, mut log) = (MockSink::new(), MockSystem::default(), LogSink::new());

    svc.handle_write(1, &init(1000), &mut sink, &mut sys, &mut log).unwrap();
    assert!(svc.handle_write(1, &chunk(&[0; 63]), &mut sink, &mut sys, &mut log).is_ok());
    assert!(matches!(
        svc.handle_write(1, &chunk(&[0; 64]), &mut sink, &mut sys, &mut log),
        Err(Error::Decode(_))
    ));
    assert_eq!(svc.session().written_size(), 63);
}

#[test]
fn progress_follows_configured_step() {
    let config = ReceiverConfig {
        progress_step_percent: 25,
        ..Default::default()
    };
    let mut svc = service(config);
    let (mut sink, mut sys, mut log) = (MockSink::new(), MockSystem::default(), LogSink::new());

    svc.handle_write(1, &init(200), &mut sink, &mut sys, &mut log).unwrap();
    for _ in 0..10 {
        svc.handle_write(1, &chunk(&[0; 20]), &mut sink, &mut sys, &mut log).unwrap();
    }
    let milestones: Vec<u8> = log
        .events
        .iter()
        .filter_map(|e| match e {
            OtaEvent::Progress { percent, .. } => Some(*percent),
            _ => None,
        })
        .collect();
    assert_eq!(milestones, [25, 50, 75, 100]);
}

#[test]
fn end_events_precede_restart_in_order() {
    let mut svc = service(ReceiverConfig::default());
    let (mut sink, mut sys, mut log) = (MockSink::new(), MockSystem::default(), LogSink::new());

    svc.handle_write(1, &init(1), &mut sink, &mut sys, &mut log).unwrap();
    svc.handle_write(1, &chunk(&[1]), &mut sink, &mut sys, &mut log).unwrap();
    log.events.clear();
    svc.handle_write(1, &END, &mut sink, &mut sys, &mut log).unwrap();

    assert_eq!(
        log.events,
        [
            OtaEvent::StateChanged {
                from: SessionState::Receiving,
                to: SessionState::Idle
            },
            OtaEvent::Committed { written: 1 },
            OtaEvent::Rebooting,
        ]
    );
    assert_eq!(svc.owner(), None);
}

// ── Inbox dispatch ────────────────────────────────────────────

#[test]
fn commands_drain_in_arrival_order() {
    let inbox: Inbox<8> = Inbox::new();
    inbox.submit_write(3, &init(3)).unwrap();
    inbox.submit_write(3, &chunk(&[1, 2])).unwrap();
    inbox.submit_write(3, &chunk(&[3])).unwrap();
    inbox.submit_write(3, &END).unwrap();
    assert!(inbox.submit_disconnect(3));

    let mut svc = service(ReceiverConfig::default());
    let (mut sink, mut sys, mut log) = (MockSink::new(), MockSystem::default(), LogSink::new());
    let mut outcomes = Vec::new();
    let drained = inbox.drain(|cmd| {
        outcomes.push(svc.handle_command(cmd, &mut sink, &mut sys, &mut log));
    });

    assert_eq!(drained, 5);
    assert!(inbox.is_empty());
    assert_eq!(outcomes[0], Ok(Handled::SessionStarted));
    assert_eq!(outcomes[2], Ok(Handled::ChunkWritten { written: 3 }));
    assert!(matches!(outcomes[3], Ok(Handled::Committed(_))));
    assert_eq!(outcomes[4], Ok(Handled::Disconnected));
    assert_eq!(sink.written_bytes(), [1, 2, 3]);
}

#[test]
fn disconnect_command_releases_owner() {
    let mut svc = service(ReceiverConfig::default());
    let (mut sink, mut sys, mut log) = (MockSink::new(), MockSystem::default(), LogSink::new());

    svc.handle_write(4, &init(2), &mut sink, &mut sys, &mut log).unwrap();
    let out = svc.handle_command(
        ReceiverCommand::Disconnected(4),
        &mut sink,
        &mut sys,
        &mut log,
    );
    assert_eq!(out, Ok(Handled::Disconnected));
    assert_eq!(svc.owner(), None);
    assert!(svc.session().has_transaction());
}
