//! Serial transport for civmem.
//!
//! This crate provides [`SerialTransport`], the concrete implementation of
//! the [`Transport`](civmem_core::Transport) trait used to reach a radio's
//! CI-V port, either through the built-in USB virtual COM port or an
//! external CI-V level converter.
//!
//! # Example
//!
//! ```no_run
//! use civmem_transport::SerialTransport;
//! use civmem_core::transport::Transport;
//! use std::time::Duration;
//!
//! # async fn example() -> civmem_core::Result<()> {
//! let mut transport = SerialTransport::open("/dev/ttyUSB0", 115_200).await?;
//!
//! // Read memory channel 1 of an IC-7300
//! transport.send(&[0xFE, 0xFE, 0x94, 0xE0, 0x1A, 0x00, 0x00, 0x01, 0xFD]).await?;
//!
//! let mut buf = [0u8; 64];
//! let n = transport.receive(&mut buf, Duration::from_millis(500)).await?;
//! # Ok(())
//! # }
//! ```

pub mod serial;

pub use serial::{CIV_BAUD_RATES, Parity, SerialConfig, SerialTransport, StopBits};
