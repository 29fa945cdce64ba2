//! Transport trait for radio communication.
//!
//! The [`Transport`] trait abstracts over the physical link to a transceiver.
//! The serial implementation lives in `civmem-transport`; a scripted mock for
//! tests lives in `civmem-test-harness`.
//!
//! The CI-V link layer in `civmem-icom` (echo filtering, terminator-delimited
//! reads) operates on a `Box<dyn Transport>` rather than directly on a serial
//! port, so the whole request/response engine can be exercised without
//! hardware.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Asynchronous byte-level transport to a radio.
///
/// Implementations move raw bytes only. CI-V framing, echo handling and
/// retries belong to the protocol layer.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send raw bytes to the radio.
    ///
    /// Implementations should block until all bytes have been written to
    /// the underlying link (serial TX buffer flushed).
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive bytes from the radio into the provided buffer.
    ///
    /// Returns the number of bytes actually read. Will wait up to `timeout`
    /// for data to arrive; returns [`Error::Timeout`](crate::error::Error::Timeout)
    /// if no data is received within the deadline.
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Discard any bytes received but not yet read.
    ///
    /// Used to resynchronise the bus after an exchange was abandoned.
    async fn discard_input(&mut self) -> Result<()>;

    /// Close the transport connection.
    ///
    /// After calling `close()`, subsequent `send()` and `receive()` calls
    /// should return [`Error::NotConnected`](crate::error::Error::NotConnected).
    async fn close(&mut self) -> Result<()>;

    /// Check whether the transport is currently connected.
    fn is_connected(&self) -> bool;
}
