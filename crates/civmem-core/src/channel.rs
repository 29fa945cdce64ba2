//! Memory channel data model.
//!
//! [`ChannelRecord`] is the unit exchanged between the CI-V codec and the
//! outside world (file importers/exporters, the CLI). It is deliberately
//! radio-agnostic: wire widths and byte layouts live in the codec, while the
//! record only carries values and the invariants that hold for every Icom
//! memory layout.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Operating mode stored in a memory channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelMode {
    /// Lower sideband.
    Lsb,
    /// Upper sideband.
    Usb,
    /// Amplitude modulation.
    Am,
    /// CW (Morse), normal sideband.
    Cw,
    /// RTTY (FSK).
    Rtty,
    /// Frequency modulation.
    Fm,
    /// CW on the reverse sideband.
    CwR,
    /// RTTY with reversed mark/space.
    RttyR,
    /// A mode byte this codec does not model, kept verbatim.
    ///
    /// Newer firmware may report modes that are not listed above. They are
    /// preserved on download but cannot be written back.
    Unknown(u8),
    /// The slot is not programmed.
    Empty,
}

impl fmt::Display for ChannelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelMode::Lsb => write!(f, "LSB"),
            ChannelMode::Usb => write!(f, "USB"),
            ChannelMode::Am => write!(f, "AM"),
            ChannelMode::Cw => write!(f, "CW"),
            ChannelMode::Rtty => write!(f, "RTTY"),
            ChannelMode::Fm => write!(f, "FM"),
            ChannelMode::CwR => write!(f, "CW-R"),
            ChannelMode::RttyR => write!(f, "RTTY-R"),
            ChannelMode::Unknown(raw) => write!(f, "?(0x{raw:02X})"),
            ChannelMode::Empty => write!(f, "EMPTY"),
        }
    }
}

/// Error returned when a string cannot be parsed into a [`ChannelMode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseModeError(String);

impl fmt::Display for ParseModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown mode: '{}'", self.0)
    }
}

impl std::error::Error for ParseModeError {}

/// Parses the names printed by `Display`, case-insensitively. `_` is
/// accepted in place of `-` so serde names (`CW_R`) parse too, and the
/// `?(0x17)` form of [`ChannelMode::Unknown`] reads back unchanged.
impl FromStr for ChannelMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase().replace('_', "-");
        let mode = match upper.as_str() {
            "LSB" => ChannelMode::Lsb,
            "USB" => ChannelMode::Usb,
            "AM" => ChannelMode::Am,
            "CW" => ChannelMode::Cw,
            "RTTY" => ChannelMode::Rtty,
            "FM" => ChannelMode::Fm,
            "CW-R" => ChannelMode::CwR,
            "RTTY-R" => ChannelMode::RttyR,
            "EMPTY" => ChannelMode::Empty,
            other => other
                .strip_prefix("?(0X")
                .and_then(|rest| rest.strip_suffix(')'))
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
                .map(ChannelMode::Unknown)
                .ok_or_else(|| ParseModeError(s.to_string()))?,
        };
        Ok(mode)
    }
}

/// IF filter selection stored with the mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterWidth {
    /// FIL1, the widest filter.
    #[default]
    Fil1,
    /// FIL2.
    Fil2,
    /// FIL3, the narrowest filter.
    Fil3,
}

impl fmt::Display for FilterWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterWidth::Fil1 => write!(f, "FIL1"),
            FilterWidth::Fil2 => write!(f, "FIL2"),
            FilterWidth::Fil3 => write!(f, "FIL3"),
        }
    }
}

/// Error returned when a string cannot be parsed into a [`FilterWidth`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFilterError(String);

impl fmt::Display for ParseFilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown filter: '{}' (expected FIL1, FIL2 or FIL3)", self.0)
    }
}

impl std::error::Error for ParseFilterError {}

impl FromStr for FilterWidth {
    type Err = ParseFilterError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        match upper.strip_prefix("FIL").unwrap_or(&upper) {
            "1" => Ok(FilterWidth::Fil1),
            "2" => Ok(FilterWidth::Fil2),
            "3" => Ok(FilterWidth::Fil3),
            _ => Err(ParseFilterError(s.to_string())),
        }
    }
}

/// Sub-audible tone or digital code attached to a channel.
///
/// CTCSS values are in tenths of a hertz, see [`crate::tones`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToneSquelch {
    /// Transmit a CTCSS tone (repeater access), no receive squelch.
    Tone(u16),
    /// Transmit and squelch on a CTCSS tone.
    Tsql(u16),
    /// Digital coded squelch.
    Dtcs(u16),
}

impl fmt::Display for ToneSquelch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToneSquelch::Tone(t) => write!(f, "TONE {}.{}", t / 10, t % 10),
            ToneSquelch::Tsql(t) => write!(f, "TSQL {}.{}", t / 10, t % 10),
            ToneSquelch::Dtcs(c) => write!(f, "DTCS {c:03}"),
        }
    }
}

/// One memory channel slot.
///
/// Records are values: the core never edits one in place. A freshly
/// downloaded record replaces any earlier record with the same
/// `channel_number`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRecord {
    /// Memory slot number, starting at 1.
    pub channel_number: u16,
    /// Receive frequency in hertz.
    pub frequency_hz: u64,
    /// Operating mode, or [`ChannelMode::Empty`] for an unprogrammed slot.
    pub mode: ChannelMode,
    /// IF filter selection.
    #[serde(default)]
    pub filter_width: FilterWidth,
    /// Data sub-mode (e.g. USB-D) enabled.
    #[serde(default)]
    pub data_mode: bool,
    /// Transmit offset from the receive frequency in hertz; zero is simplex.
    #[serde(default)]
    pub duplex_offset_hz: i64,
    /// Tone squelch setting, `None` when off.
    #[serde(default)]
    pub tone_squelch: Option<ToneSquelch>,
    /// Memory scan select group (0 = not selected).
    #[serde(default)]
    pub scan_select: u8,
    /// Channel name.
    #[serde(default)]
    pub name: String,
}

impl ChannelRecord {
    /// A programmed channel with default settings (FIL1, simplex, no tone,
    /// no name).
    pub fn new(channel_number: u16, frequency_hz: u64, mode: ChannelMode) -> Self {
        ChannelRecord {
            channel_number,
            frequency_hz,
            mode,
            filter_width: FilterWidth::Fil1,
            data_mode: false,
            duplex_offset_hz: 0,
            tone_squelch: None,
            scan_select: 0,
            name: String::new(),
        }
    }

    /// The canonical record for an unprogrammed slot.
    pub fn empty(channel_number: u16) -> Self {
        ChannelRecord::new(channel_number, 0, ChannelMode::Empty)
    }

    /// Returns `true` if this record describes an unprogrammed slot.
    pub fn is_empty(&self) -> bool {
        self.mode == ChannelMode::Empty
    }

    /// Returns `true` if the channel transmits on a different frequency.
    pub fn is_duplex(&self) -> bool {
        self.duplex_offset_hz != 0
    }

    /// Transmit frequency, or `None` if the offset would make it negative.
    pub fn tx_frequency_hz(&self) -> Option<u64> {
        self.frequency_hz.checked_add_signed(self.duplex_offset_hz)
    }

    /// Set the name, returning the updated record.
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Set the duplex offset, returning the updated record.
    pub fn with_offset(mut self, offset_hz: i64) -> Self {
        self.duplex_offset_hz = offset_hz;
        self
    }

    /// Set the tone squelch, returning the updated record.
    pub fn with_tone(mut self, tone: ToneSquelch) -> Self {
        self.tone_squelch = Some(tone);
        self
    }
}

/// Punctuation accepted in channel names besides letters, digits and space.
pub const NAME_PUNCTUATION: &str = "!#$%&'()*+,-./:;<=>?@[]^_";

/// Returns `true` if `c` may appear in a channel name as stored by the radio.
pub fn is_name_char(c: char) -> bool {
    c.is_ascii_uppercase() || c.is_ascii_digit() || c == ' ' || NAME_PUNCTUATION.contains(c)
}
