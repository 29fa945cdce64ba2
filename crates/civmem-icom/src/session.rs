//! Memory channel sessions.
//!
//! A [`ChannelSession`] walks a range of memory channels, one request per
//! channel, and reports what happened to each. Per-channel failures
//! (rejections, silence, undecodable payloads) are recorded in the
//! [`SessionReport`] and the walk continues. Only link failures and engine
//! misuse end a session early with `Err`.
//!
//! Progress is published on a broadcast channel. Cancellation is checked
//! before each channel, so a cancelled session never leaves an exchange
//! half done.

use std::collections::HashSet;
use std::ops::RangeInclusive;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use civmem_core::error::{Error, Result};
use civmem_core::{ChannelRecord, FieldError};

use crate::commands::CivCommand;
use crate::engine::{CivEngine, ExchangeState};
use crate::fields::ChannelCodec;
use crate::models::IcomModel;

/// Capacity of the progress event channel.
const EVENT_CAPACITY: usize = 256;

/// Which NG replies to a read mean "this slot is empty".
///
/// Radios differ: some answer an unprogrammed slot with the `FF` sentinel
/// payload (always treated as empty), others refuse the read.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EmptySlotSignal {
    /// Any NG to a read is an empty slot.
    #[default]
    AnyRejection,
    /// Only an NG whose detail bytes equal these.
    Detail(Vec<u8>),
    /// NG never means empty.
    Never,
}

impl EmptySlotSignal {
    /// Returns `true` if an NG carrying `detail` marks an empty slot.
    pub fn matches(&self, detail: &[u8]) -> bool {
        match self {
            EmptySlotSignal::AnyRejection => true,
            EmptySlotSignal::Detail(expected) => expected == detail,
            EmptySlotSignal::Never => false,
        }
    }
}

/// What happened to one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelStatus {
    /// The channel was read and holds this record.
    Read(ChannelRecord),
    /// The slot is not programmed.
    Empty,
    /// The record was written (or the slot cleared) and acknowledged.
    Written,
    /// The radio refused the request.
    Rejected {
        /// NG detail bytes.
        detail: Vec<u8>,
    },
    /// No usable reply within the retry budget.
    ExhaustedRetries {
        /// Attempts made.
        attempts: u32,
        /// Bytes received during the last attempt.
        last_bytes: Vec<u8>,
    },
    /// The payload could not be decoded, or the record could not be encoded.
    FieldError(FieldError),
}

impl ChannelStatus {
    /// Returns `true` for read, empty and written channels.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            ChannelStatus::Read(_) | ChannelStatus::Empty | ChannelStatus::Written
        )
    }
}

/// Outcome for one channel of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelOutcome {
    /// Memory slot number.
    pub channel_number: u16,
    /// What happened.
    pub status: ChannelStatus,
}

/// Direction of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Radio to host.
    Download,
    /// Host to radio.
    Upload,
}

/// Result of a download, upload or clear.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    /// Which way the session went.
    pub direction: Direction,
    /// One outcome per channel processed, in order.
    pub outcomes: Vec<ChannelOutcome>,
    /// The session was cancelled before processing every channel.
    pub cancelled: bool,
}

impl SessionReport {
    /// Number of successful channels.
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.status.is_success()).count()
    }

    /// Number of failed channels.
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// Records read during this session, empty slots excluded.
    pub fn records(&self) -> impl Iterator<Item = &ChannelRecord> {
        self.outcomes.iter().filter_map(|o| match &o.status {
            ChannelStatus::Read(record) => Some(record),
            _ => None,
        })
    }

    /// Outcomes that did not succeed.
    pub fn failures(&self) -> impl Iterator<Item = &ChannelOutcome> {
        self.outcomes.iter().filter(|o| !o.status.is_success())
    }
}

/// Progress events published by a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A session began.
    Started {
        /// Direction of the session.
        direction: Direction,
        /// Channels to process.
        total: usize,
    },
    /// A channel finished, successfully or not.
    ChannelCompleted {
        /// Zero-based position within the session.
        index: usize,
        /// Channels to process.
        total: usize,
        /// What happened.
        outcome: ChannelOutcome,
    },
    /// The session ended without a link failure.
    Finished {
        /// Successful channels.
        succeeded: usize,
        /// Failed channels.
        failed: usize,
        /// The session stopped early on cancellation.
        cancelled: bool,
    },
}

/// One unit of work in a session walk.
enum Work {
    Read(u16),
    Write(ChannelRecord),
}

/// A memory channel session with one radio.
pub struct ChannelSession {
    engine: CivEngine,
    codec: ChannelCodec,
    model: IcomModel,
    empty_slot: EmptySlotSignal,
    records: Vec<ChannelRecord>,
    event_tx: broadcast::Sender<SessionEvent>,
    cancel: CancellationToken,
}

impl ChannelSession {
    /// Create a session. Usually reached through
    /// [`SessionBuilder`](crate::builder::SessionBuilder).
    pub fn new(
        engine: CivEngine,
        codec: ChannelCodec,
        model: IcomModel,
        empty_slot: EmptySlotSignal,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
        ChannelSession {
            engine,
            codec,
            model,
            empty_slot,
            records: Vec::new(),
            event_tx,
            cancel: CancellationToken::new(),
        }
    }

    /// Subscribe to progress events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// Token that cancels this session at the next channel boundary.
    ///
    /// Cancellation is permanent for the session.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Every record read or written so far, sorted by channel number.
    ///
    /// A failed re-read drops the channel's earlier record, since it can
    /// no longer be trusted to match the radio.
    pub fn records(&self) -> &[ChannelRecord] {
        &self.records
    }

    /// The radio model.
    pub fn model(&self) -> &IcomModel {
        &self.model
    }

    /// The channel codec.
    pub fn codec(&self) -> &ChannelCodec {
        &self.codec
    }

    /// Current exchange state of the engine.
    pub fn exchange_state(&self) -> ExchangeState {
        self.engine.state()
    }

    /// Read a single channel.
    pub async fn read_channel(&mut self, channel_number: u16) -> Result<ChannelStatus> {
        self.check_range(&(channel_number..=channel_number))?;
        match self.read_one(channel_number).await {
            Ok(status) => Ok(status),
            Err(e) => Err(self.abort(e).await),
        }
    }

    /// Read every channel in `range`.
    pub async fn download(&mut self, range: RangeInclusive<u16>) -> Result<SessionReport> {
        self.check_range(&range)?;
        info!(
            model = self.model.name,
            first = *range.start(),
            last = *range.end(),
            "downloading memory channels"
        );
        let work = range.map(Work::Read).collect();
        self.run(Direction::Download, work).await
    }

    /// Write `records` to the radio.
    ///
    /// Duplicate channel numbers are refused before anything is sent.
    /// Records that fail to encode are reported as
    /// [`ChannelStatus::FieldError`] without touching the radio.
    pub async fn upload(&mut self, records: &[ChannelRecord]) -> Result<SessionReport> {
        let mut seen = HashSet::new();
        if let Some(dup) = records.iter().find(|r| !seen.insert(r.channel_number)) {
            return Err(Error::InvalidParameter(format!(
                "channel {} appears more than once",
                dup.channel_number
            )));
        }

        info!(
            model = self.model.name,
            count = records.len(),
            "uploading memory channels"
        );
        let work = records.iter().cloned().map(Work::Write).collect();
        self.run(Direction::Upload, work).await
    }

    /// Clear every channel in `range`.
    pub async fn clear(&mut self, range: RangeInclusive<u16>) -> Result<SessionReport> {
        self.check_range(&range)?;
        let empties: Vec<ChannelRecord> = range.map(ChannelRecord::empty).collect();
        self.upload(&empties).await
    }

    /// Abandon any exchange in progress and drain the link.
    pub async fn recover(&mut self) -> Result<()> {
        self.engine.recover().await
    }

    /// Close the link to the radio.
    pub async fn close(&mut self) -> Result<()> {
        info!(model = self.model.name, "closing session");
        self.engine.close().await
    }

    fn check_range(&self, range: &RangeInclusive<u16>) -> Result<()> {
        let max = self.model.memory_channels;
        if range.is_empty() || *range.start() == 0 || *range.end() > max {
            return Err(Error::InvalidParameter(format!(
                "channel range {}..={} outside 1..={max}",
                range.start(),
                range.end()
            )));
        }
        Ok(())
    }

    async fn run(&mut self, direction: Direction, work: Vec<Work>) -> Result<SessionReport> {
        let total = work.len();
        self.emit(SessionEvent::Started { direction, total });

        let mut report = SessionReport {
            direction,
            outcomes: Vec::with_capacity(total),
            cancelled: false,
        };

        for (index, item) in work.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!(done = index, total, "session cancelled");
                report.cancelled = true;
                break;
            }

            let (channel_number, result) = match item {
                Work::Read(n) => (n, self.read_one(n).await),
                Work::Write(record) => (record.channel_number, self.write_one(record).await),
            };
            let status = match result {
                Ok(status) => status,
                Err(e) => return Err(self.abort(e).await),
            };
            let outcome = ChannelOutcome {
                channel_number,
                status,
            };
            self.emit(SessionEvent::ChannelCompleted {
                index,
                total,
                outcome: outcome.clone(),
            });
            report.outcomes.push(outcome);
        }

        let (succeeded, failed) = (report.succeeded(), report.failed());
        info!(succeeded, failed, cancelled = report.cancelled, "session finished");
        self.emit(SessionEvent::Finished {
            succeeded,
            failed,
            cancelled: report.cancelled,
        });
        Ok(report)
    }

    async fn read_one(&mut self, channel_number: u16) -> Result<ChannelStatus> {
        let reply = match self
            .engine
            .request(&CivCommand::read_memory(channel_number))
            .await
        {
            Ok(reply) => reply,
            Err(Error::Rejected { detail, .. }) if self.empty_slot.matches(&detail) => {
                debug!(channel_number, "read refused, slot is empty");
                self.store(ChannelRecord::empty(channel_number));
                return Ok(ChannelStatus::Empty);
            }
            Err(e) => {
                let status = classify(channel_number, e)?;
                self.forget(channel_number);
                return Ok(status);
            }
        };

        match self.codec.decode_channel(&reply.data, channel_number) {
            Ok(record) if record.is_empty() => {
                debug!(channel_number, "slot is empty");
                self.store(record);
                Ok(ChannelStatus::Empty)
            }
            Ok(record) => {
                debug!(channel_number, freq = record.frequency_hz, mode = %record.mode, "channel read");
                self.store(record.clone());
                Ok(ChannelStatus::Read(record))
            }
            Err(e) => {
                warn!(channel_number, error = %e, "undecodable memory payload");
                self.forget(channel_number);
                Ok(ChannelStatus::FieldError(e))
            }
        }
    }

    async fn write_one(&mut self, record: ChannelRecord) -> Result<ChannelStatus> {
        let channel_number = record.channel_number;
        let payload = match self.codec.encode_channel(&record) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(channel_number, error = %e, "record not written");
                return Ok(ChannelStatus::FieldError(e));
            }
        };

        match self
            .engine
            .request(&CivCommand::write_memory(&payload))
            .await
        {
            Ok(_) => {
                debug!(channel_number, empty = record.is_empty(), "channel written");
                self.store(record);
                Ok(ChannelStatus::Written)
            }
            Err(e) => classify(channel_number, e),
        }
    }

    /// Insert or replace a record, keeping the list sorted.
    fn store(&mut self, record: ChannelRecord) {
        match self
            .records
            .binary_search_by_key(&record.channel_number, |r| r.channel_number)
        {
            Ok(pos) => self.records[pos] = record,
            Err(pos) => self.records.insert(pos, record),
        }
    }

    fn forget(&mut self, channel_number: u16) {
        if let Ok(pos) = self
            .records
            .binary_search_by_key(&channel_number, |r| r.channel_number)
        {
            self.records.remove(pos);
        }
    }

    /// Close the link after a link failure and hand the error back.
    ///
    /// An outstanding request leaves the link open so the caller can
    /// [`recover`](Self::recover).
    async fn abort(&mut self, error: Error) -> Error {
        if error.is_fatal() && !matches!(error, Error::RequestOutstanding) {
            warn!(%error, "session aborted");
            if let Err(close_err) = self.engine.close().await {
                debug!(error = %close_err, "close after failure also failed");
            }
        }
        error
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.event_tx.send(event);
    }
}

/// Turn a non-fatal request error into a channel status.
fn classify(channel_number: u16, error: Error) -> Result<ChannelStatus> {
    match error {
        Error::Rejected { detail, .. } => {
            warn!(channel_number, ?detail, "radio rejected channel");
            Ok(ChannelStatus::Rejected { detail })
        }
        Error::ExhaustedRetries {
            attempts,
            last_bytes,
        } => {
            warn!(channel_number, attempts, "no reply for channel");
            Ok(ChannelStatus::ExhaustedRetries {
                attempts,
                last_bytes,
            })
        }
        Error::Field(e) => Ok(ChannelStatus::FieldError(e)),
        other => Err(other),
    }
}
