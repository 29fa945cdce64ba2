//! Mock transport for deterministic testing of the CI-V link and engine.
//!
//! [`MockTransport`] implements the [`Transport`] trait with pre-loaded
//! request/response pairs. Received bytes sit in a single FIFO, like a
//! serial driver's input buffer, so a test can also model the bus echo,
//! noise injected before a reply and replies delivered in small chunks.
//!
//! # Example
//!
//! ```
//! use civmem_test_harness::MockTransport;
//!
//! let mut mock = MockTransport::new();
//! mock.set_echo(true);
//! // Read channel 1: the radio answers with the empty-slot sentinel.
//! mock.expect(
//!     &[0xFE, 0xFE, 0x94, 0xE0, 0x1A, 0x00, 0x00, 0x01, 0xFD],
//!     &[0xFE, 0xFE, 0xE0, 0x94, 0x1A, 0x00, 0x00, 0x01, 0xFF, 0xFD],
//! );
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;

use civmem_core::error::{Error, Result};
use civmem_core::transport::Transport;

/// A pre-loaded request/response pair.
#[derive(Debug, Clone)]
struct Expectation {
    request: Vec<u8>,
    /// Empty when the radio stays silent.
    response: Vec<u8>,
}

/// A mock [`Transport`] for testing protocol layers without hardware.
///
/// Expectations are consumed in order. Each `send()` must match the next
/// expectation exactly; its response is then appended to the receive FIFO.
/// `receive()` drains the FIFO and reports [`Error::Timeout`] when it is
/// empty, by default without actually waiting.
#[derive(Debug)]
pub struct MockTransport {
    expectations: VecDeque<Expectation>,
    rx: VecDeque<u8>,
    connected: bool,
    echo: bool,
    max_chunk: Option<usize>,
    honor_timeouts: bool,
    sent_log: Vec<Vec<u8>>,
    discards: usize,
}

impl MockTransport {
    /// Create a new mock transport in the connected state, without echo.
    pub fn new() -> Self {
        MockTransport {
            expectations: VecDeque::new(),
            rx: VecDeque::new(),
            connected: true,
            echo: false,
            max_chunk: None,
            honor_timeouts: false,
            sent_log: Vec::new(),
            discards: 0,
        }
    }

    /// Add an expected request and the bytes the radio answers with.
    pub fn expect(&mut self, request: &[u8], response: &[u8]) {
        self.expectations.push_back(Expectation {
            request: request.to_vec(),
            response: response.to_vec(),
        });
    }

    /// Add an expected request the radio does not answer.
    pub fn expect_silence(&mut self, request: &[u8]) {
        self.expect(request, &[]);
    }

    /// Place bytes in the receive FIFO as if they arrived unprompted.
    pub fn inject(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes);
    }

    /// Echo every sent byte back ahead of the scripted response, as a
    /// single-wire CI-V bus does.
    pub fn set_echo(&mut self, echo: bool) {
        self.echo = echo;
    }

    /// Limit how many bytes one `receive()` call returns.
    pub fn set_max_chunk(&mut self, max_chunk: usize) {
        self.max_chunk = Some(max_chunk.max(1));
    }

    /// Make `receive()` on an empty FIFO wait out its timeout before
    /// reporting [`Error::Timeout`], so a caller can be interrupted while
    /// it is waiting for a reply.
    pub fn set_honor_timeouts(&mut self, honor: bool) {
        self.honor_timeouts = honor;
    }

    /// Return all data sent through this transport, one entry per `send()`.
    pub fn sent_data(&self) -> &[Vec<u8>] {
        &self.sent_log
    }

    /// Return the number of expectations that have not yet been consumed.
    pub fn remaining_expectations(&self) -> usize {
        self.expectations.len()
    }

    /// Return the number of bytes waiting in the receive FIFO.
    pub fn pending_rx(&self) -> usize {
        self.rx.len()
    }

    /// Return how many times `discard_input()` was called.
    pub fn discard_count(&self) -> usize {
        self.discards
    }

    /// Set the connected state of the mock transport.
    ///
    /// When set to `false`, subsequent calls return [`Error::NotConnected`].
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(Error::NotConnected);
        }

        self.sent_log.push(data.to_vec());

        let Some(expectation) = self.expectations.pop_front() else {
            return Err(Error::Protocol(format!(
                "no more expectations in mock transport, got {data:02X?}"
            )));
        };
        if data != expectation.request.as_slice() {
            return Err(Error::Protocol(format!(
                "unexpected send data: expected {:02X?}, got {:02X?}",
                expectation.request, data
            )));
        }

        if self.echo {
            self.rx.extend(data);
        }
        self.rx.extend(expectation.response);
        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        if self.rx.is_empty() {
            if self.honor_timeouts {
                tokio::time::sleep(timeout).await;
            }
            return Err(Error::Timeout);
        }

        let limit = self.max_chunk.unwrap_or(usize::MAX);
        let n = self.rx.len().min(buf.len()).min(limit);
        for (slot, byte) in buf.iter_mut().zip(self.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    async fn discard_input(&mut self) -> Result<()> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        self.discards += 1;
        self.rx.clear();
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.connected = false;
        self.rx.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
