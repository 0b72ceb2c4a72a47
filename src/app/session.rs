//! Update session state machine.
//!
//! ```text
//!            INIT (begin ok)            END (finalize + commit ok)
//!   Idle ───────────────────▶ Receiving ─────────────────────────▶ Idle + restart
//!    ▲                         │    ▲
//!    │ INIT                    │    │ INIT
//!    │                 write / │    │
//!    │                 begin   ▼    │
//!    └──────────────────────── Error
//! ```
//!
//! The session owns size accounting and the open sink transaction. It
//! never sees raw bytes from the transport, only decoded messages, and
//! every flash operation goes through the injected [`UpdateSink`].

use log::{debug, info, warn};

use crate::error::{OtaError, SinkStage};

use super::ports::{SystemControl, UpdateSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Receiving,
    Error,
}

/// Read-only view of the session counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub expected_size: u32,
    pub written_size: u32,
    pub has_transaction: bool,
}

/// What INIT replaced, if anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    Started,
    /// An in-flight transaction was aborted.
    Superseded { written: u32, expected: u32 },
}

/// Result of a finalized and committed image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndOutcome {
    pub written: u32,
    pub expected: u32,
    /// The image was finalized from `Error` state.
    pub salvaged: bool,
}

pub struct UpdateSession<S: UpdateSink> {
    state: SessionState,
    expected_size: u32,
    written_size: u32,
    transaction: Option<S::Transaction>,
}

impl<S: UpdateSink> UpdateSession<S> {
    pub const fn new() -> Self {
        Self {
            state: SessionState::Idle,
            expected_size: 0,
            written_size: 0,
            transaction: None,
        }
    }

    // ── Operations ────────────────────────────────────────────

    /// Start a new transfer of `total_size` bytes. Valid from any state.
    ///
    /// An open transaction from an earlier INIT is aborted first. If the
    /// sink cannot open the partition the session lands in `Error` with
    /// no transaction.
    pub fn on_init(&mut self, total_size: u32, sink: &mut S) -> Result<InitOutcome, OtaError> {
        let outcome = match self.transaction.take() {
            Some(stale) => {
                warn!(
                    "session: INIT supersedes open transaction ({} / {} bytes), aborting it",
                    self.written_size, self.expected_size
                );
                sink.abort(stale);
                InitOutcome::Superseded {
                    written: self.written_size,
                    expected: self.expected_size,
                }
            }
            None => InitOutcome::Started,
        };

        self.expected_size = total_size;
        self.written_size = 0;
        self.state = SessionState::Receiving;

        match sink.begin(total_size) {
            Ok(tx) => {
                self.transaction = Some(tx);
                info!("session: receiving {} bytes", total_size);
                Ok(outcome)
            }
            Err(cause) => {
                self.state = SessionState::Error;
                Err(OtaError::Sink {
                    stage: SinkStage::Begin,
                    cause,
                })
            }
        }
    }

    /// Append a firmware fragment. Returns the new written total.
    ///
    /// Refused without side effects unless the session is receiving with
    /// an open transaction and the fragment fits the announced size. A
    /// sink write failure moves the session to `Error`.
    pub fn on_chunk(&mut self, data: &[u8], sink: &mut S) -> Result<u32, OtaError> {
        if self.state != SessionState::Receiving {
            return Err(OtaError::NotReceiving(self.state));
        }
        let Some(tx) = self.transaction.as_mut() else {
            return Err(OtaError::NoTransaction);
        };

        let len = u32::try_from(data.len()).unwrap_or(u32::MAX);
        let fits = self
            .written_size
            .checked_add(len)
            .is_some_and(|total| total <= self.expected_size);
        if !fits {
            return Err(OtaError::Overflow {
                written: self.written_size,
                len,
                expected: self.expected_size,
            });
        }

        if let Err(cause) = sink.write(tx, data) {
            self.state = SessionState::Error;
            return Err(OtaError::Sink {
                stage: SinkStage::Write,
                cause,
            });
        }

        self.written_size += len;
        debug!(
            "session: chunk {} bytes ({} / {})",
            len, self.written_size, self.expected_size
        );
        Ok(self.written_size)
    }

    /// Finalize the open transaction and commit it as the next boot image.
    ///
    /// Runs from `Receiving`, or from `Error` when `allow_salvage` is set.
    /// On success the session returns to `Idle`; the caller is expected to
    /// restart. A finalize or commit failure leaves `state` untouched but
    /// the transaction is gone.
    pub fn finish(&mut self, sink: &mut S, allow_salvage: bool) -> Result<EndOutcome, OtaError> {
        if self.transaction.is_none() {
            return Err(OtaError::NoTransaction);
        }
        let salvaged = self.state == SessionState::Error;
        if salvaged && !allow_salvage {
            return Err(OtaError::SalvageDisabled);
        }
        let Some(tx) = self.transaction.take() else {
            return Err(OtaError::NoTransaction);
        };

        if salvaged {
            warn!(
                "session: finalizing partial image from error state ({} / {} bytes)",
                self.written_size, self.expected_size
            );
        } else if self.written_size != self.expected_size {
            warn!(
                "session: END before announced size ({} / {} bytes)",
                self.written_size, self.expected_size
            );
        }

        let mut image = sink.finalize(tx).map_err(|cause| OtaError::Sink {
            stage: SinkStage::Finalize,
            cause,
        })?;
        sink.commit(&mut image).map_err(|cause| OtaError::Sink {
            stage: SinkStage::Commit,
            cause,
        })?;

        self.state = SessionState::Idle;
        info!("session: image committed ({} bytes)", self.written_size);
        Ok(EndOutcome {
            written: self.written_size,
            expected: self.expected_size,
            salvaged,
        })
    }

    /// [`finish`](Self::finish), then restart the device.
    pub fn on_end(
        &mut self,
        sink: &mut S,
        system: &mut impl SystemControl,
        allow_salvage: bool,
    ) -> Result<EndOutcome, OtaError> {
        self.on_end_with(sink, system, allow_salvage, |_| {})
    }

    /// [`on_end`](Self::on_end) with a hook that runs after the commit and
    /// before the restart. The hook is skipped when the image is not
    /// committed.
    pub fn on_end_with(
        &mut self,
        sink: &mut S,
        system: &mut impl SystemControl,
        allow_salvage: bool,
        before_restart: impl FnOnce(&EndOutcome),
    ) -> Result<EndOutcome, OtaError> {
        let outcome = self.finish(sink, allow_salvage)?;
        before_restart(&outcome);
        info!("session: restarting into new image");
        system.restart();
        Ok(outcome)
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn expected_size(&self) -> u32 {
        self.expected_size
    }

    pub fn written_size(&self) -> u32 {
        self.written_size
    }

    pub fn has_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    /// END would take the salvage path.
    pub fn salvage_pending(&self) -> bool {
        self.state == SessionState::Error && self.transaction.is_some()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            expected_size: self.expected_size,
            written_size: self.written_size,
            has_transaction: self.transaction.is_some(),
        }
    }
}

impl<S: UpdateSink> Default for UpdateSession<S> {
    fn default() -> Self {
        Self::new()
    }
}
