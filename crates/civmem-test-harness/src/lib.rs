//! civmem-test-harness: mock transport for deterministic civmem tests.
//!
//! [`MockTransport`] scripts what a radio would put on the CI-V bus in
//! answer to each request, including the bus echo, line noise and replies
//! that arrive split across several reads.

pub mod mock_serial;

pub use mock_serial::MockTransport;
