//! Request/response engine.
//!
//! [`CivEngine`] runs one CI-V exchange at a time over a [`CivLink`]:
//! send the request, wait for a correlated reply, retry on silence or
//! garbage, and give up after the configured number of attempts.
//!
//! ```text
//! Idle ──send──▶ Sent ──▶ AwaitingResponse ──┬─ reply    ──▶ Idle
//!                                            ├─ NG       ──▶ Idle
//!                                            └─ timeout  ──▶ Idle (retry)
//! ```
//!
//! A request future dropped while waiting leaves the engine out of `Idle`.
//! The next request then fails with [`Error::RequestOutstanding`] until
//! [`CivEngine::recover`] has drained the link, since a late reply to the
//! abandoned request could otherwise be taken for the new one.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace, warn};

use civmem_core::error::{Error, Result};

use crate::civ::{
    self, CONTROLLER_ADDR, CivFrame, DecodeResult, MAX_FRAME_LEN, RejectedFrame, TERMINATOR,
};
use crate::commands::CivCommand;
use crate::link::{CivLink, Received};

/// Default time to wait for a reply to one attempt.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

/// Default number of attempts per request, the first one included.
pub const DEFAULT_RETRY_BUDGET: u32 = 3;

/// Default pause between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// CI-V address of the radio.
    pub radio_address: u8,
    /// Our own CI-V address.
    pub controller_address: u8,
    /// Time to wait for a reply to one attempt.
    pub timeout: Duration,
    /// Total attempts per request. Must be at least 1.
    pub retry_budget: u32,
    /// Pause between attempts.
    pub retry_delay: Duration,
}

impl EngineConfig {
    /// Defaults for talking to the radio at `radio_address`.
    pub fn new(radio_address: u8) -> Self {
        EngineConfig {
            radio_address,
            controller_address: CONTROLLER_ADDR,
            timeout: DEFAULT_TIMEOUT,
            retry_budget: DEFAULT_RETRY_BUDGET,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// Where the engine is in an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    /// No request on the bus.
    Idle,
    /// Request written, nothing read yet.
    Sent,
    /// Reading the reply.
    AwaitingResponse,
}

/// How a single attempt ended without a usable reply.
enum AttemptEnd {
    TimedOut,
    Malformed,
}

/// CI-V request/response engine.
pub struct CivEngine {
    link: CivLink,
    config: EngineConfig,
    state: ExchangeState,
}

impl CivEngine {
    /// Create an engine driving `link`.
    pub fn new(link: CivLink, config: EngineConfig) -> Self {
        CivEngine {
            link,
            config,
            state: ExchangeState::Idle,
        }
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current exchange state.
    pub fn state(&self) -> ExchangeState {
        self.state
    }

    /// Whether the underlying transport is connected.
    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    /// Send `command` and return the correlated reply.
    ///
    /// Silence and malformed replies are retried up to the retry budget,
    /// after which [`Error::ExhaustedRetries`] carries the bytes seen on
    /// the last attempt. An NG reply is returned as [`Error::Rejected`]
    /// without retrying. Transport errors are returned as they occur.
    pub async fn request(&mut self, command: &CivCommand) -> Result<CivFrame> {
        if self.state != ExchangeState::Idle {
            return Err(Error::RequestOutstanding);
        }

        let frame = command.encode(self.config.radio_address, self.config.controller_address);
        if frame.len() > MAX_FRAME_LEN {
            return Err(Error::InvalidParameter(format!(
                "frame of {} bytes exceeds the {MAX_FRAME_LEN}-byte limit",
                frame.len()
            )));
        }

        let budget = self.config.retry_budget.max(1);
        let mut last_bytes = Vec::new();
        for attempt in 1..=budget {
            if attempt > 1 {
                debug!(attempt, budget, "CI-V request retry");
                tokio::time::sleep(self.config.retry_delay).await;
            }

            let mut seen = Vec::new();
            let result = self.attempt(command, &frame, &mut seen).await;
            self.state = ExchangeState::Idle;
            match result {
                Ok(Ok(reply)) => return Ok(reply),
                Ok(Err(AttemptEnd::TimedOut)) => {
                    debug!(attempt, received = seen.len(), "no reply before deadline");
                }
                Ok(Err(AttemptEnd::Malformed)) => {
                    debug!(attempt, "malformed reply");
                }
                Err(e) => return Err(e),
            }
            last_bytes = seen;
        }

        warn!(
            cmd = command.cmd,
            attempts = budget,
            "CI-V request exhausted its retries"
        );
        Err(Error::ExhaustedRetries {
            attempts: budget,
            last_bytes,
        })
    }

    /// Drain buffered input and return to [`ExchangeState::Idle`].
    pub async fn recover(&mut self) -> Result<()> {
        if self.state != ExchangeState::Idle {
            debug!(state = ?self.state, "recovering abandoned exchange");
        }
        self.link.drain_input().await?;
        self.state = ExchangeState::Idle;
        Ok(())
    }

    /// Close the link.
    pub async fn close(&mut self) -> Result<()> {
        self.state = ExchangeState::Idle;
        self.link.close().await
    }

    /// One send plus wait. The outer `Result` carries link errors and
    /// rejections; the inner one says whether a reply arrived.
    async fn attempt(
        &mut self,
        command: &CivCommand,
        frame: &[u8],
        seen: &mut Vec<u8>,
    ) -> Result<std::result::Result<CivFrame, AttemptEnd>> {
        self.link.send(frame).await?;
        self.state = ExchangeState::Sent;

        let deadline = Instant::now() + self.config.timeout;
        self.state = ExchangeState::AwaitingResponse;

        let mut pending: Vec<u8> = Vec::new();
        loop {
            match self.link.recv_until(TERMINATOR, deadline).await? {
                Received::Complete(bytes) => {
                    seen.extend_from_slice(&bytes);
                    pending.extend_from_slice(&bytes);
                }
                Received::TimedOut(bytes) => {
                    seen.extend_from_slice(&bytes);
                    return Ok(Err(AttemptEnd::TimedOut));
                }
            }

            loop {
                match civ::decode_frame(&pending) {
                    DecodeResult::Frame(reply, consumed) => {
                        pending.drain(..consumed);
                        if self.correlates(command, &reply) {
                            trace!(cmd = reply.cmd, len = reply.data.len(), "reply matched");
                            return Ok(Ok(reply));
                        }
                        debug!(
                            dst = reply.dst_addr,
                            src = reply.src_addr,
                            cmd = reply.cmd,
                            "skipping uncorrelated CI-V frame"
                        );
                    }
                    DecodeResult::Rejected(ng, consumed) => {
                        pending.drain(..consumed);
                        if self.rejection_correlates(command, &ng) {
                            debug!(cmd = command.cmd, detail = ?ng.detail, "radio rejected request");
                            return Err(Error::Rejected {
                                command: command.cmd,
                                detail: ng.detail,
                            });
                        }
                        debug!(
                            dst = ng.dst_addr,
                            src = ng.src_addr,
                            "skipping uncorrelated NG"
                        );
                    }
                    DecodeResult::Malformed(consumed) => {
                        pending.drain(..consumed);
                        return Ok(Err(AttemptEnd::Malformed));
                    }
                    DecodeResult::Incomplete => {
                        let noise = civ::noise_len(&pending);
                        if noise > 0 {
                            trace!(noise, "discarding bytes outside a frame");
                            pending.drain(..noise);
                        }
                        break;
                    }
                }
            }
        }
    }

    fn addressed_to_us(&self, dst: u8, src: u8) -> bool {
        dst == self.config.controller_address && src == self.config.radio_address
    }

    fn correlates(&self, command: &CivCommand, frame: &CivFrame) -> bool {
        self.addressed_to_us(frame.dst_addr, frame.src_addr) && command.matches_reply(frame)
    }

    fn rejection_correlates(&self, command: &CivCommand, ng: &RejectedFrame) -> bool {
        self.addressed_to_us(ng.dst_addr, ng.src_addr)
            && ng.command.is_none_or(|cmd| cmd == command.cmd)
    }
}
