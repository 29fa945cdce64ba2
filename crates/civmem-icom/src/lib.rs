//! Icom CI-V memory channel backend for civmem.
//!
//! This crate moves memory channels between a host and an Icom transceiver
//! over the CI-V (Communication Interface V) bus. It provides:
//!
//! - **Frame codec** ([`civ`]) -- encode and decode CI-V frames, resync
//!   after noise and truncated frames, recognise OK/NG replies.
//! - **Field codec** ([`fields`]) -- BCD primitives and the 41-byte memory
//!   contents payload, to and from [`ChannelRecord`](civmem_core::ChannelRecord).
//! - **Command builders** ([`commands`]) -- read, write and clear memory
//!   requests and the replies they expect.
//! - **Model definitions** ([`models`]) -- address, baud rate and memory
//!   limits for the IC-7300, IC-7300MK2 and IC-7610.
//! - **Link and engine** ([`link`], [`engine`]) -- echo filtering,
//!   terminator-delimited reads, one request at a time with retries.
//! - **ChannelSession** ([`session`]) -- download, upload and clear ranges
//!   of channels with per-channel outcomes, progress events and
//!   cancellation.
//! - **SessionBuilder** ([`builder`]) -- fluent configuration of a session.
//!
//! # Example
//!
//! ```
//! use civmem_icom::civ::{decode_frame, DecodeResult};
//! use civmem_icom::commands::cmd_read_memory;
//!
//! // Read memory channel 1 of an IC-7300
//! let cmd = cmd_read_memory(0x94, 1);
//! assert_eq!(cmd, vec![0xFE, 0xFE, 0x94, 0xE0, 0x1A, 0x00, 0x00, 0x01, 0xFD]);
//!
//! // The radio reports the slot as empty
//! let response = vec![0xFE, 0xFE, 0xE0, 0x94, 0x1A, 0x00, 0x00, 0x01, 0xFF, 0xFD];
//! if let DecodeResult::Frame(frame, _) = decode_frame(&response) {
//!     assert_eq!(frame.data, vec![0x00, 0x01, 0xFF]);
//! }
//! ```

pub mod builder;
pub mod civ;
pub mod commands;
pub mod engine;
pub mod fields;
pub mod link;
pub mod models;
pub mod session;

pub use builder::SessionBuilder;
pub use fields::{ChannelCodec, NamePolicy};
pub use models::{IcomModel, model_by_name};
pub use session::{
    ChannelOutcome, ChannelSession, ChannelStatus, Direction, EmptySlotSignal, SessionEvent,
    SessionReport,
};
