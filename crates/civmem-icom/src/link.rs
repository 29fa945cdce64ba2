//! CI-V link layer.
//!
//! Wraps a [`Transport`] with the two things every exchange on a CI-V bus
//! needs: removal of our own transmission when the interface echoes it
//! back, and reads that stop at a frame terminator or a deadline.
//!
//! The echo filter works byte by byte. After each `send` the link expects
//! the sent bytes to come back first. Bytes that match are swallowed. On
//! the first mismatch the filter disarms and the matched prefix is handed
//! back together with the mismatching byte, so nothing that was not an
//! exact echo is lost.

use tokio::time::Instant;
use tracing::{debug, trace};

use civmem_core::error::{Error, Result};
use civmem_core::transport::Transport;

/// Size of a single read from the transport.
const READ_CHUNK: usize = 64;

/// Outcome of [`CivLink::recv_until`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// Bytes up to and including the terminator.
    Complete(Vec<u8>),
    /// The deadline passed first; whatever arrived is returned.
    TimedOut(Vec<u8>),
}

/// Byte-level CI-V link over a boxed transport.
pub struct CivLink {
    transport: Box<dyn Transport>,
    echo_filter: bool,
    echo: Vec<u8>,
    echo_pos: usize,
    /// Bytes read past the last terminator, returned by the next read.
    held: Vec<u8>,
}

impl CivLink {
    /// Wrap `transport`. With `echo_filter` set, each sent frame is removed
    /// from the received stream when it comes back unchanged.
    pub fn new(transport: Box<dyn Transport>, echo_filter: bool) -> Self {
        CivLink {
            transport,
            echo_filter,
            echo: Vec::new(),
            echo_pos: 0,
            held: Vec::new(),
        }
    }

    /// Whether echo filtering is enabled.
    pub fn echo_filter(&self) -> bool {
        self.echo_filter
    }

    /// Send raw bytes and arm the echo filter for them.
    ///
    /// Bytes held over from an earlier read belong to an exchange that is
    /// over and are dropped.
    pub async fn send(&mut self, data: &[u8]) -> Result<()> {
        if !self.held.is_empty() {
            debug!(len = self.held.len(), "dropping stale bytes before send");
            self.held.clear();
        }
        self.disarm_echo();

        trace!(bytes = ?data, "tx");
        self.transport.send(data).await?;

        if self.echo_filter {
            self.echo.extend_from_slice(data);
        }
        Ok(())
    }

    /// Read until `terminator` has been received or `deadline` passes.
    ///
    /// Bytes after the terminator in the same read are kept for the next
    /// call. A transport timeout is not an error here; it ends the read
    /// with [`Received::TimedOut`].
    pub async fn recv_until(&mut self, terminator: u8, deadline: Instant) -> Result<Received> {
        let mut out = Vec::new();

        let held = std::mem::take(&mut self.held);
        if self.absorb(&held, &mut out, terminator) {
            return Ok(Received::Complete(out));
        }

        let mut buf = [0u8; READ_CHUNK];
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Ok(Received::TimedOut(out));
            }

            match self.transport.receive(&mut buf, deadline - now).await {
                Ok(n) => {
                    trace!(bytes = ?&buf[..n], "rx");
                    if self.absorb(&buf[..n], &mut out, terminator) {
                        return Ok(Received::Complete(out));
                    }
                }
                Err(Error::Timeout) => return Ok(Received::TimedOut(out)),
                Err(e) => return Err(e),
            }
        }
    }

    /// Discard everything buffered on both sides of the transport.
    pub async fn drain_input(&mut self) -> Result<()> {
        self.held.clear();
        self.disarm_echo();
        self.transport.discard_input().await
    }

    /// Close the underlying transport.
    pub async fn close(&mut self) -> Result<()> {
        self.held.clear();
        self.disarm_echo();
        self.transport.close().await
    }

    /// Whether the underlying transport is connected.
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Feed `chunk` through the echo filter into `out`, stopping at the
    /// terminator. Returns `true` if the terminator was reached; any bytes
    /// after it are moved to `held`.
    fn absorb(&mut self, chunk: &[u8], out: &mut Vec<u8>, terminator: u8) -> bool {
        let mut emitted = Vec::with_capacity(chunk.len());
        for (i, &byte) in chunk.iter().enumerate() {
            self.filter_byte(byte, &mut emitted);
            if let Some(pos) = emitted.iter().position(|&b| b == terminator) {
                out.extend_from_slice(&emitted[..=pos]);
                let mut rest = emitted.split_off(pos + 1);
                rest.extend_from_slice(&chunk[i + 1..]);
                self.held = rest;
                return true;
            }
            out.append(&mut emitted);
        }
        false
    }

    fn filter_byte(&mut self, byte: u8, emitted: &mut Vec<u8>) {
        if self.echo_pos < self.echo.len() {
            if self.echo[self.echo_pos] == byte {
                self.echo_pos += 1;
                if self.echo_pos == self.echo.len() {
                    trace!("echo consumed");
                    self.disarm_echo();
                }
                return;
            }
            debug!(
                matched = self.echo_pos,
                byte, "received bytes diverge from echo, passing through"
            );
            emitted.extend_from_slice(&self.echo[..self.echo_pos]);
            self.disarm_echo();
        }
        emitted.push(byte);
    }

    fn disarm_echo(&mut self) {
        self.echo.clear();
        self.echo_pos = 0;
    }
}
