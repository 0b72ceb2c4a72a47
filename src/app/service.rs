//! Receiver service — the hexagonal core.
//!
//! [`ReceiverService`] owns the update session, the connection admission
//! state and the counters. Every raw write goes through the same path:
//!
//! ```text
//!  raw write ──▶ decode ──▶ admission ──▶ UpdateSession ──▶ UpdateSink
//!                  │            │               │
//!                  └────────────┴───────────────┴──▶ EventSink
//! ```
//!
//! All I/O flows through port traits injected at call sites, making the
//! entire service testable with mock adapters.

use crate::config::ReceiverConfig;
use crate::error::{Error, ErrorClass, OtaError};
use crate::protocol::codec::Message;

use super::commands::{ConnId, ReceiverCommand};
use super::events::OtaEvent;
use super::ports::{EventSink, SystemControl, UpdateSink};
use super::session::{EndOutcome, InitOutcome, SessionSnapshot, SessionState, UpdateSession};

/// What a successfully handled command did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    SessionStarted,
    /// INIT replaced an in-flight transfer.
    SessionRestarted,
    ChunkWritten { written: u32 },
    /// Image committed; a restart has been requested.
    Committed(EndOutcome),
    Disconnected,
}

/// Running counters since boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReceiverStats {
    pub messages: u32,
    pub malformed: u32,
    pub sequence_rejects: u32,
    pub sink_failures: u32,
    pub sessions_started: u32,
    pub bytes_written: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceSnapshot {
    pub session: SessionSnapshot,
    pub owner: Option<ConnId>,
    pub stats: ReceiverStats,
}

// ───────────────────────────────────────────────────────────────
// ReceiverService
// ───────────────────────────────────────────────────────────────

pub struct ReceiverService<S: UpdateSink> {
    config: ReceiverConfig,
    session: UpdateSession<S>,
    /// Connection whose INIT opened the current transaction.
    owner: Option<ConnId>,
    stats: ReceiverStats,
    /// Last progress milestone reported for the current transfer.
    reported_percent: u8,
}

impl<S: UpdateSink> ReceiverService<S> {
    pub fn new(config: ReceiverConfig) -> Self {
        Self {
            config,
            session: UpdateSession::new(),
            owner: None,
            stats: ReceiverStats::default(),
            reported_percent: 0,
        }
    }

    // ── Command handling ──────────────────────────────────────

    /// Process one command drained from the inbox.
    pub fn handle_command(
        &mut self,
        cmd: ReceiverCommand,
        sink: &mut S,
        system: &mut impl SystemControl,
        events: &mut impl EventSink,
    ) -> Result<Handled, Error> {
        match cmd {
            ReceiverCommand::Write(write) => {
                self.handle_write(write.conn_id, &write.data, sink, system, events)
            }
            ReceiverCommand::Disconnected(conn_id) => {
                self.on_disconnect(conn_id, events);
                Ok(Handled::Disconnected)
            }
        }
    }

    /// Decode and dispatch one raw write from `conn_id`.
    ///
    /// Rejections are counted, emitted as [`OtaEvent::Rejected`] and
    /// returned; none of them is fatal to the receiver.
    pub fn handle_write(
        &mut self,
        conn_id: ConnId,
        raw: &[u8],
        sink: &mut S,
        system: &mut impl SystemControl,
        events: &mut impl EventSink,
    ) -> Result<Handled, Error> {
        self.stats.messages = self.stats.messages.wrapping_add(1);

        let result = Message::decode_with_limit(raw, self.config.max_message_len())
            .map_err(Error::from)
            .and_then(|message| {
                self.admit(conn_id, events)?;
                self.dispatch(conn_id, message, sink, system, events)
            });

        if let Err(e) = result {
            self.record_rejection(e, events);
        }
        result
    }

    /// Release session ownership when the owning connection drops.
    ///
    /// The session itself is left as is. The next connection to write
    /// becomes the owner, whether it carries on or starts over with INIT.
    pub fn on_disconnect(&mut self, conn_id: ConnId, events: &mut impl EventSink) {
        if self.owner == Some(conn_id) {
            self.owner = None;
            events.emit(&OtaEvent::OwnerDisconnected(conn_id));
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn session(&self) -> &UpdateSession<S> {
        &self.session
    }

    pub fn owner(&self) -> Option<ConnId> {
        self.owner
    }

    pub fn stats(&self) -> ReceiverStats {
        self.stats
    }

    pub fn config(&self) -> &ReceiverConfig {
        &self.config
    }

    pub fn snapshot(&self) -> ServiceSnapshot {
        ServiceSnapshot {
            session: self.session.snapshot(),
            owner: self.owner,
            stats: self.stats,
        }
    }

    // ── Internal ──────────────────────────────────────────────

    /// Single-connection gate. An orphaned transaction is handed to the
    /// first connection that writes after the owner dropped.
    fn admit(&mut self, conn_id: ConnId, events: &mut impl EventSink) -> Result<(), OtaError> {
        if !self.config.single_connection || !self.session.has_transaction() {
            return Ok(());
        }
        match self.owner {
            Some(owner) if owner != conn_id => Err(OtaError::SessionBusy { owner }),
            Some(_) => Ok(()),
            None => {
                self.owner = Some(conn_id);
                events.emit(&OtaEvent::OwnerAdopted(conn_id));
                Ok(())
            }
        }
    }

    fn dispatch(
        &mut self,
        conn_id: ConnId,
        message: Message<'_>,
        sink: &mut S,
        system: &mut impl SystemControl,
        events: &mut impl EventSink,
    ) -> Result<Handled, Error> {
        let prev = self.session.state();

        match message {
            Message::Init { total_size } => {
                self.owner = Some(conn_id);
                self.reported_percent = 0;
                let result = self.session.on_init(total_size, sink);
                self.emit_transition(prev, events);
                let outcome = result?;

                self.stats.sessions_started = self.stats.sessions_started.wrapping_add(1);
                if let InitOutcome::Superseded { written, expected } = outcome {
                    events.emit(&OtaEvent::SessionSuperseded { written, expected });
                }
                events.emit(&OtaEvent::SessionStarted {
                    conn_id,
                    expected_size: total_size,
                });
                Ok(match outcome {
                    InitOutcome::Started => Handled::SessionStarted,
                    InitOutcome::Superseded { .. } => Handled::SessionRestarted,
                })
            }

            Message::Chunk(data) => {
                let result = self.session.on_chunk(data, sink);
                self.emit_transition(prev, events);
                let written = result?;

                let len = data.len() as u32;
                let expected = self.session.expected_size();
                self.stats.bytes_written += u64::from(len);
                events.emit(&OtaEvent::ChunkWritten {
                    len,
                    written,
                    expected,
                });
                self.report_progress(written, expected, events);
                Ok(Handled::ChunkWritten { written })
            }

            Message::End => {
                let allow_salvage = self.config.allow_salvage_finalize;
                if allow_salvage && self.session.salvage_pending() {
                    events.emit(&OtaEvent::SalvageFinalize {
                        written: self.session.written_size(),
                        expected: self.session.expected_size(),
                    });
                }

                let outcome = self
                    .session
                    .on_end_with(sink, system, allow_salvage, |outcome| {
                        events.emit(&OtaEvent::StateChanged {
                            from: prev,
                            to: SessionState::Idle,
                        });
                        events.emit(&OtaEvent::Committed {
                            written: outcome.written,
                        });
                        events.emit(&OtaEvent::Rebooting);
                    })?;
                self.owner = None;
                Ok(Handled::Committed(outcome))
            }
        }
    }

    fn emit_transition(&self, from: SessionState, events: &mut impl EventSink) {
        let to = self.session.state();
        if to != from {
            events.emit(&OtaEvent::StateChanged { from, to });
        }
    }

    /// Emit a progress event each time a `progress_step_percent` milestone
    /// is crossed.
    fn report_progress(&mut self, written: u32, expected: u32, events: &mut impl EventSink) {
        if expected == 0 {
            return;
        }
        let percent = (u64::from(written) * 100 / u64::from(expected)).min(100) as u8;
        let step = self.config.progress_step_percent.max(1);
        let milestone = percent - percent % step;
        if milestone > self.reported_percent {
            self.reported_percent = milestone;
            events.emit(&OtaEvent::Progress {
                percent: milestone,
                written,
                expected,
            });
        }
    }

    fn record_rejection(&mut self, error: Error, events: &mut impl EventSink) {
        let counter = match error.class() {
            ErrorClass::Malformed => &mut self.stats.malformed,
            ErrorClass::Sequence => &mut self.stats.sequence_rejects,
            ErrorClass::Sink | ErrorClass::Platform => &mut self.stats.sink_failures,
        };
        *counter = counter.wrapping_add(1);
        events.emit(&OtaEvent::Rejected(error));
    }
}
