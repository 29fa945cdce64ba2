//! SessionBuilder -- fluent builder for constructing [`ChannelSession`]s.
//!
//! Separates configuration from construction so that callers can set up
//! serial parameters, CI-V address overrides, retry policy and codec
//! options before the port is opened.
//!
//! # Example
//!
//! ```no_run
//! use civmem_icom::builder::SessionBuilder;
//! use civmem_icom::models::ic_7300;
//! use std::time::Duration;
//!
//! # async fn example() -> civmem_core::Result<()> {
//! let mut session = SessionBuilder::new(ic_7300())
//!     .serial_port("/dev/ttyUSB0")
//!     .command_timeout(Duration::from_millis(300))
//!     .build()
//!     .await?;
//! let report = session.download(1..=99).await?;
//! println!("{} channels read", report.succeeded());
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use civmem_core::error::{Error, Result};
use civmem_core::transport::Transport;
use civmem_transport::{SerialConfig, SerialTransport};

use crate::civ::CONTROLLER_ADDR;
use crate::engine::{
    CivEngine, DEFAULT_RETRY_BUDGET, DEFAULT_RETRY_DELAY, DEFAULT_TIMEOUT, EngineConfig,
};
use crate::fields::{ChannelCodec, NamePolicy};
use crate::link::CivLink;
use crate::models::IcomModel;
use crate::session::{ChannelSession, EmptySlotSignal};

/// Lowest byte that cannot be used as a CI-V address.
const FIRST_RESERVED_ADDR: u8 = 0xF0;

/// Fluent builder for [`ChannelSession`].
///
/// Everything defaults from the [`IcomModel`], so the simplest usage is:
///
/// ```ignore
/// let session = SessionBuilder::new(ic_7300())
///     .serial_port("/dev/ttyUSB0")
///     .build()
///     .await?;
/// ```
pub struct SessionBuilder {
    model: IcomModel,
    serial_port: Option<String>,
    baud_rate: Option<u32>,
    civ_address: Option<u8>,
    controller_address: u8,
    command_timeout: Duration,
    retry_budget: u32,
    retry_delay: Duration,
    echo_filter: bool,
    empty_slot: EmptySlotSignal,
    name_policy: NamePolicy,
}

impl SessionBuilder {
    /// Create a new builder for the given Icom model.
    pub fn new(model: IcomModel) -> Self {
        SessionBuilder {
            model,
            serial_port: None,
            baud_rate: None,
            civ_address: None,
            controller_address: CONTROLLER_ADDR,
            command_timeout: DEFAULT_TIMEOUT,
            retry_budget: DEFAULT_RETRY_BUDGET,
            retry_delay: DEFAULT_RETRY_DELAY,
            echo_filter: true,
            empty_slot: EmptySlotSignal::default(),
            name_policy: NamePolicy::default(),
        }
    }

    /// Set the serial port path (e.g. `/dev/ttyUSB0` or `COM3`).
    pub fn serial_port(mut self, port: &str) -> Self {
        self.serial_port = Some(port.to_string());
        self
    }

    /// Override the default baud rate for this model.
    pub fn baud_rate(mut self, baud: u32) -> Self {
        self.baud_rate = Some(baud);
        self
    }

    /// Override the default CI-V address for this model.
    ///
    /// Use this when the radio's CI-V address has been changed from the
    /// factory default in its menu.
    pub fn civ_address(mut self, addr: u8) -> Self {
        self.civ_address = Some(addr);
        self
    }

    /// Override the controller address (default `0xE0`).
    pub fn controller_address(mut self, addr: u8) -> Self {
        self.controller_address = addr;
        self
    }

    /// Set the time to wait for a reply to one attempt (default: 500ms).
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Set the total attempts per request, first one included (default: 3).
    pub fn retry_budget(mut self, attempts: u32) -> Self {
        self.retry_budget = attempts;
        self
    }

    /// Set the pause between attempts (default: 50ms).
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Enable or disable removal of our own echoed frames (default: true).
    ///
    /// Turn it off for interfaces that do not echo; correlation still
    /// ignores self-echo, the filter only saves decoding it.
    pub fn echo_filter(mut self, enabled: bool) -> Self {
        self.echo_filter = enabled;
        self
    }

    /// Choose which NG replies to a read mean an empty slot.
    pub fn empty_slot_signal(mut self, signal: EmptySlotSignal) -> Self {
        self.empty_slot = signal;
        self
    }

    /// Choose what happens to names longer than the radio allows.
    pub fn name_policy(mut self, policy: NamePolicy) -> Self {
        self.name_policy = policy;
        self
    }

    /// Build a [`ChannelSession`] with a caller-provided transport.
    ///
    /// This is the entry point for testing (pass a `MockTransport` from
    /// `civmem-test-harness`) and for callers that manage the transport
    /// themselves.
    pub async fn build_with_transport(self, transport: Box<dyn Transport>) -> Result<ChannelSession> {
        let radio_address = self.civ_address.unwrap_or(self.model.default_civ_address);

        if self.retry_budget == 0 {
            return Err(Error::InvalidParameter(
                "retry_budget must be at least 1".into(),
            ));
        }
        if self.command_timeout.is_zero() {
            return Err(Error::InvalidParameter(
                "command_timeout must be non-zero".into(),
            ));
        }
        for (what, addr) in [
            ("civ_address", radio_address),
            ("controller_address", self.controller_address),
        ] {
            if addr >= FIRST_RESERVED_ADDR {
                return Err(Error::InvalidParameter(format!(
                    "{what} 0x{addr:02X} is a reserved CI-V byte"
                )));
            }
        }
        if radio_address == self.controller_address {
            return Err(Error::InvalidParameter(format!(
                "civ_address and controller_address are both 0x{radio_address:02X}"
            )));
        }

        let config = EngineConfig {
            radio_address,
            controller_address: self.controller_address,
            timeout: self.command_timeout,
            retry_budget: self.retry_budget,
            retry_delay: self.retry_delay,
        };
        let engine = CivEngine::new(CivLink::new(transport, self.echo_filter), config);
        let codec = ChannelCodec::new(&self.model).with_name_policy(self.name_policy);

        Ok(ChannelSession::new(engine, codec, self.model, self.empty_slot))
    }

    /// Build a [`ChannelSession`] over a serial port.
    ///
    /// Requires that [`serial_port()`](Self::serial_port) has been called.
    /// The baud rate defaults to the model's default if not overridden.
    pub async fn build(self) -> Result<ChannelSession> {
        let port = self
            .serial_port
            .as_ref()
            .ok_or_else(|| Error::InvalidParameter("serial_port is required for build()".into()))?;
        let config = SerialConfig {
            baud_rate: self.baud_rate.unwrap_or(self.model.default_baud_rate),
            ..SerialConfig::default()
        };

        let transport = SerialTransport::open_with_config(port, config).await?;
        self.build_with_transport(Box::new(transport)).await
    }
}
