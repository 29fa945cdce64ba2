//! civmem-core: Core traits, types, and error definitions for civmem.
//!
//! This crate defines the radio-agnostic pieces shared by the CI-V codec,
//! the serial transport and the command-line tool: the memory channel data
//! model, the byte-level [`Transport`] trait and the error taxonomy.
//!
//! # Key types
//!
//! - [`ChannelRecord`] -- one memory slot, the unit exchanged with exporters
//! - [`Transport`] -- byte-level communication channel
//! - [`Error`] / [`FieldError`] / [`Result`] -- error handling

pub mod band;
pub mod channel;
pub mod error;
pub mod helpers;
pub mod tones;
pub mod transport;

// Re-export key types at crate root for ergonomic `use civmem_core::*`.
pub use band::{Band, BandRange, ParseBandError};
pub use channel::{
    ChannelMode, ChannelRecord, FilterWidth, ParseFilterError, ParseModeError, ToneSquelch,
    is_name_char,
};
pub use error::{Error, FieldError, Result};
pub use helpers::{format_freq_mhz, format_offset_khz};
pub use transport::Transport;
