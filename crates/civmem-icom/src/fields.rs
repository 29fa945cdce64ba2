//! Memory channel payload codec.
//!
//! Converts between the payload of a CI-V "memory contents" frame
//! (command `0x1A`, sub-command `0x00`) and a [`ChannelRecord`].
//!
//! # Payload layout
//!
//! Offsets are relative to the first byte after the sub-command.
//!
//! ```text
//!  0..2   channel number, 4-digit BCD, big-endian       00 12
//!  2      split (bit 4) | scan select (low nibble)      10
//!  3..8   RX frequency, 10-digit BCD, LSB first         00 00 20 07 00
//!  8      mode                                          05
//!  9      filter                                        01
//! 10      data mode (high nibble) | tone type (low)     02
//! 11..14  repeater tone, BCD tenths of Hz               00 08 85
//! 14..17  TSQL tone, or DTCS [polarity, code BCD]       00 10 00
//! 17..31  TX block: frequency, mode, filter, data/tone, tone, TSQL
//! 31..41  name, ASCII, space padded
//! ```
//!
//! An unprogrammed slot is reported, and cleared, with the three-byte
//! sentinel `<ch hi> <ch lo> FF`.

use civmem_core::channel::is_name_char;
use civmem_core::tones::{DEFAULT_TONE, is_ctcss_tone, is_dtcs_code};
use civmem_core::{BandRange, ChannelMode, ChannelRecord, FieldError, FilterWidth, ToneSquelch};

use crate::models::IcomModel;

/// Length of a programmed channel payload.
pub const PAYLOAD_LEN: usize = 41;

/// Width of the name field.
pub const NAME_LEN: usize = 10;

/// Byte following the channel number in an empty-slot payload.
pub const EMPTY_MARKER: u8 = 0xFF;

const OFF_SELECT: usize = 2;
const OFF_RX: usize = 3;
const OFF_TX: usize = 17;
const OFF_NAME: usize = 31;

/// Width of one RX or TX block: frequency, mode, filter, data/tone, two tones.
const BLOCK_LEN: usize = 14;

const SPLIT_BIT: u8 = 0x10;
const MAX_SCAN_SELECT: u8 = 3;

const TONE_OFF: u8 = 0;
const TONE_TONE: u8 = 1;
const TONE_TSQL: u8 = 2;
const TONE_DTCS: u8 = 3;

/// What to do with a name the radio cannot store verbatim.
///
/// The radio keeps [`NAME_LEN`] upper case characters and pads with
/// spaces, so lower case letters come back upper cased and trailing spaces
/// come back stripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NamePolicy {
    /// Upper case the name, drop trailing spaces, and keep the first
    /// [`NAME_LEN`] characters with a warning.
    #[default]
    Truncate,
    /// Fail the channel with [`FieldError::NameTooLong`] or
    /// [`FieldError::NonCanonicalName`] instead of altering the name.
    Reject,
}

/// Encodes and decodes memory channel payloads for one radio model.
#[derive(Debug, Clone)]
pub struct ChannelCodec {
    memory_channels: u16,
    frequency_range: BandRange,
    name_policy: NamePolicy,
}

impl ChannelCodec {
    /// Create a codec using the channel count and frequency range of `model`.
    pub fn new(model: &IcomModel) -> Self {
        ChannelCodec {
            memory_channels: model.memory_channels,
            frequency_range: model.frequency_range,
            name_policy: NamePolicy::default(),
        }
    }

    /// Set the policy for over-long names.
    pub fn with_name_policy(mut self, policy: NamePolicy) -> Self {
        self.name_policy = policy;
        self
    }

    /// The configured name policy.
    pub fn name_policy(&self) -> NamePolicy {
        self.name_policy
    }

    /// Highest channel number this codec accepts.
    pub fn memory_channels(&self) -> u16 {
        self.memory_channels
    }

    /// Decode a memory payload read back for `channel_number`.
    ///
    /// Fails without producing any record if a numeric field holds a
    /// non-BCD nibble, the payload length is wrong, or the payload belongs
    /// to another channel. Unknown mode bytes are kept as
    /// [`ChannelMode::Unknown`].
    pub fn decode_channel(
        &self,
        payload: &[u8],
        channel_number: u16,
    ) -> Result<ChannelRecord, FieldError> {
        let Some(number) = payload.get(..2) else {
            return Err(FieldError::PayloadLength {
                expected: PAYLOAD_LEN,
                actual: payload.len(),
            });
        };
        let found = decode_bcd_be(number, 0)? as u16;
        if found != channel_number {
            return Err(FieldError::ChannelMismatch {
                expected: channel_number,
                found,
            });
        }

        if payload.get(OFF_SELECT) == Some(&EMPTY_MARKER) {
            return Ok(ChannelRecord::empty(channel_number));
        }
        if payload.len() != PAYLOAD_LEN {
            return Err(FieldError::PayloadLength {
                expected: PAYLOAD_LEN,
                actual: payload.len(),
            });
        }

        let select = payload[OFF_SELECT];
        let split = select & SPLIT_BIT != 0;
        let scan_select = select & 0x0F;
        if scan_select > MAX_SCAN_SELECT {
            return Err(FieldError::InvalidScanSelect(scan_select));
        }

        let rx = decode_block(payload, OFF_RX)?;
        let tx = decode_block(payload, OFF_TX)?;

        let duplex_offset_hz = if split {
            tx.frequency_hz as i64 - rx.frequency_hz as i64
        } else {
            0
        };

        Ok(ChannelRecord {
            channel_number,
            frequency_hz: rx.frequency_hz,
            mode: rx.mode,
            filter_width: rx.filter_width,
            data_mode: rx.data_mode,
            duplex_offset_hz,
            tone_squelch: rx.tone_squelch,
            scan_select,
            name: decode_name(&payload[OFF_NAME..])?,
        })
    }

    /// Encode a record into a memory payload.
    ///
    /// An [`ChannelMode::Empty`] record encodes to the empty-slot sentinel,
    /// which makes the radio clear the slot.
    ///
    /// Under [`NamePolicy::Truncate`] the name is normalized as the radio
    /// would store it, so decoding the payload yields the upper cased,
    /// right-trimmed and truncated name. Every other field reads back
    /// unchanged.
    pub fn encode_channel(&self, record: &ChannelRecord) -> Result<Vec<u8>, FieldError> {
        let number = record.channel_number;
        if number == 0 || number > self.memory_channels {
            return Err(FieldError::ChannelOutOfRange(number));
        }

        let mut payload = Vec::with_capacity(PAYLOAD_LEN);
        payload.extend_from_slice(&encode_bcd_be::<2>(u64::from(number)));

        if record.is_empty() {
            payload.push(EMPTY_MARKER);
            return Ok(payload);
        }

        let mode = mode_to_byte(record.mode)?;
        if !self.frequency_range.contains(record.frequency_hz) {
            return Err(FieldError::FrequencyOutOfRange(record.frequency_hz));
        }
        let tx_hz = record
            .tx_frequency_hz()
            .filter(|hz| self.frequency_range.contains(*hz))
            .ok_or(FieldError::OffsetOutOfRange(record.duplex_offset_hz))?;
        if record.scan_select > MAX_SCAN_SELECT {
            return Err(FieldError::InvalidScanSelect(record.scan_select));
        }
        validate_tone(record.tone_squelch)?;
        let name = encode_name(&record.name, self.name_policy)?;

        let split = if record.is_duplex() { SPLIT_BIT } else { 0 };
        payload.push(split | record.scan_select);
        for hz in [record.frequency_hz, tx_hz] {
            encode_block(&mut payload, hz, mode, record);
        }
        payload.extend_from_slice(&name);

        debug_assert_eq!(payload.len(), PAYLOAD_LEN);
        Ok(payload)
    }
}

/// Decoded contents of one RX or TX block.
struct Block {
    frequency_hz: u64,
    mode: ChannelMode,
    filter_width: FilterWidth,
    data_mode: bool,
    tone_squelch: Option<ToneSquelch>,
}

fn decode_block(payload: &[u8], at: usize) -> Result<Block, FieldError> {
    let block = &payload[at..at + BLOCK_LEN];

    let frequency_hz = decode_bcd_le(&block[0..5], at)?;
    let mode = mode_from_byte(block[5]);
    let filter_width = filter_from_byte(block[6])?;
    let data_mode = block[7] >> 4 != 0;
    let tone_type = block[7] & 0x0F;

    let repeater_tone = decode_bcd_be(&block[8..11], at + 8)? as u16;
    let tone_squelch = match tone_type {
        TONE_OFF => {
            decode_bcd_be(&block[11..14], at + 11)?;
            None
        }
        TONE_TONE => {
            decode_bcd_be(&block[11..14], at + 11)?;
            Some(ToneSquelch::Tone(repeater_tone))
        }
        TONE_TSQL => Some(ToneSquelch::Tsql(
            decode_bcd_be(&block[11..14], at + 11)? as u16,
        )),
        TONE_DTCS => {
            // Polarity is not modelled; it only has to be well formed.
            decode_bcd_be(&block[11..12], at + 11)?;
            Some(ToneSquelch::Dtcs(
                decode_bcd_be(&block[12..14], at + 12)? as u16,
            ))
        }
        other => return Err(FieldError::InvalidToneType(other)),
    };
    validate_tone(tone_squelch)?;

    Ok(Block {
        frequency_hz,
        mode,
        filter_width,
        data_mode,
        tone_squelch,
    })
}

fn encode_block(out: &mut Vec<u8>, frequency_hz: u64, mode: u8, record: &ChannelRecord) {
    let (tone_type, repeater_tone, squelch) = match record.tone_squelch {
        None => (TONE_OFF, DEFAULT_TONE, DEFAULT_TONE),
        Some(ToneSquelch::Tone(t)) => (TONE_TONE, t, DEFAULT_TONE),
        Some(ToneSquelch::Tsql(t)) => (TONE_TSQL, DEFAULT_TONE, t),
        // Normal polarity; the code sits in the low two bytes.
        Some(ToneSquelch::Dtcs(c)) => (TONE_DTCS, DEFAULT_TONE, c),
    };

    out.extend_from_slice(&encode_bcd_le::<5>(frequency_hz));
    out.push(mode);
    out.push(filter_to_byte(record.filter_width));
    out.push((u8::from(record.data_mode) << 4) | tone_type);
    out.extend_from_slice(&encode_bcd_be::<3>(u64::from(repeater_tone)));
    out.extend_from_slice(&encode_bcd_be::<3>(u64::from(squelch)));
}

fn validate_tone(tone: Option<ToneSquelch>) -> Result<(), FieldError> {
    match tone {
        Some(ToneSquelch::Tone(t) | ToneSquelch::Tsql(t)) if !is_ctcss_tone(t) => {
            Err(FieldError::InvalidTone(t))
        }
        Some(ToneSquelch::Dtcs(c)) if !is_dtcs_code(c) => Err(FieldError::InvalidDtcs(c)),
        _ => Ok(()),
    }
}

/// Map a wire mode byte to a [`ChannelMode`].
pub fn mode_from_byte(byte: u8) -> ChannelMode {
    match byte {
        0x00 => ChannelMode::Lsb,
        0x01 => ChannelMode::Usb,
        0x02 => ChannelMode::Am,
        0x03 => ChannelMode::Cw,
        0x04 => ChannelMode::Rtty,
        0x05 => ChannelMode::Fm,
        0x07 => ChannelMode::CwR,
        0x08 => ChannelMode::RttyR,
        other => ChannelMode::Unknown(other),
    }
}

/// Map a [`ChannelMode`] to its wire byte.
pub fn mode_to_byte(mode: ChannelMode) -> Result<u8, FieldError> {
    match mode {
        ChannelMode::Lsb => Ok(0x00),
        ChannelMode::Usb => Ok(0x01),
        ChannelMode::Am => Ok(0x02),
        ChannelMode::Cw => Ok(0x03),
        ChannelMode::Rtty => Ok(0x04),
        ChannelMode::Fm => Ok(0x05),
        ChannelMode::CwR => Ok(0x07),
        ChannelMode::RttyR => Ok(0x08),
        ChannelMode::Unknown(raw) => Err(FieldError::UnsupportedMode(raw)),
        ChannelMode::Empty => Err(FieldError::EmptyMode),
    }
}

fn filter_from_byte(byte: u8) -> Result<FilterWidth, FieldError> {
    match byte {
        0x01 => Ok(FilterWidth::Fil1),
        0x02 => Ok(FilterWidth::Fil2),
        0x03 => Ok(FilterWidth::Fil3),
        other => Err(FieldError::InvalidFilter(other)),
    }
}

fn filter_to_byte(filter: FilterWidth) -> u8 {
    match filter {
        FilterWidth::Fil1 => 0x01,
        FilterWidth::Fil2 => 0x02,
        FilterWidth::Fil3 => 0x03,
    }
}

fn decode_name(bytes: &[u8]) -> Result<String, FieldError> {
    let end = bytes
        .iter()
        .rposition(|&b| b != b' ' && b != 0x00)
        .map_or(0, |pos| pos + 1);
    bytes[..end]
        .iter()
        .map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                Ok(char::from(b))
            } else {
                Err(FieldError::InvalidNameByte(b))
            }
        })
        .collect()
}

fn encode_name(name: &str, policy: NamePolicy) -> Result<[u8; NAME_LEN], FieldError> {
    let upper = name.to_ascii_uppercase();
    if let Some(bad) = upper.chars().find(|&c| !is_name_char(c)) {
        return Err(FieldError::InvalidNameChar(bad));
    }
    if policy == NamePolicy::Reject && (upper != name || name.ends_with(' ')) {
        return Err(FieldError::NonCanonicalName(name.to_string()));
    }

    // Every accepted character is ASCII, so bytes and chars line up.
    let bytes = upper.as_bytes();
    if bytes.len() > NAME_LEN {
        match policy {
            NamePolicy::Reject => {
                return Err(FieldError::NameTooLong {
                    len: bytes.len(),
                    max: NAME_LEN,
                });
            }
            NamePolicy::Truncate => {
                tracing::warn!(
                    name = %name,
                    kept = &upper[..NAME_LEN],
                    "channel name truncated to {NAME_LEN} characters"
                );
            }
        }
    }

    let mut out = [b' '; NAME_LEN];
    for (slot, &b) in out.iter_mut().zip(bytes) {
        *slot = b;
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// BCD primitives
// ---------------------------------------------------------------------------

/// Encode `value` as `N` bytes of packed BCD, least significant byte first.
///
/// Digits that do not fit are dropped; callers range-check first.
///
/// ```
/// use civmem_icom::fields::encode_bcd_le;
///
/// assert_eq!(encode_bcd_le::<5>(7_200_000), [0x00, 0x00, 0x20, 0x07, 0x00]);
/// ```
pub fn encode_bcd_le<const N: usize>(value: u64) -> [u8; N] {
    let mut result = [0u8; N];
    let mut rest = value;
    for byte in &mut result {
        let lo = (rest % 10) as u8;
        rest /= 10;
        let hi = (rest % 10) as u8;
        rest /= 10;
        *byte = (hi << 4) | lo;
    }
    result
}

/// Encode `value` as `N` bytes of packed BCD, most significant byte first.
///
/// ```
/// use civmem_icom::fields::encode_bcd_be;
///
/// assert_eq!(encode_bcd_be::<3>(885), [0x00, 0x08, 0x85]);
/// ```
pub fn encode_bcd_be<const N: usize>(value: u64) -> [u8; N] {
    let mut result = encode_bcd_le::<N>(value);
    result.reverse();
    result
}

/// Decode packed BCD, least significant byte first.
///
/// `offset` is the position of `bytes` within the payload and is only used
/// to report where a bad nibble was found.
pub fn decode_bcd_le(bytes: &[u8], offset: usize) -> Result<u64, FieldError> {
    let mut value: u64 = 0;
    for (i, &byte) in bytes.iter().enumerate().rev() {
        value = value * 100 + u64::from(bcd_byte(byte, offset + i)?);
    }
    Ok(value)
}

/// Decode packed BCD, most significant byte first.
pub fn decode_bcd_be(bytes: &[u8], offset: usize) -> Result<u64, FieldError> {
    let mut value: u64 = 0;
    for (i, &byte) in bytes.iter().enumerate() {
        value = value * 100 + u64::from(bcd_byte(byte, offset + i)?);
    }
    Ok(value)
}

fn bcd_byte(byte: u8, offset: usize) -> Result<u8, FieldError> {
    let hi = byte >> 4;
    let lo = byte & 0x0F;
    if hi > 9 || lo > 9 {
        return Err(FieldError::InvalidBcd { offset, byte });
    }
    Ok(hi * 10 + lo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ic_7300;

    fn codec() -> ChannelCodec {
        ChannelCodec::new(&ic_7300())
    }

    /// Channel 12: a 10m FM repeater with a -100 kHz split and 88.5 Hz tone.
    fn repeater_payload() -> Vec<u8> {
        let mut p = vec![
            0x00, 0x12, // channel
            0x10, // split, no scan select
            0x00, 0x00, 0x62, 0x29, 0x00, // RX 29.620 MHz
            0x05, 0x01, 0x01, // FM, FIL1, tone
            0x00, 0x08, 0x85, // repeater tone 88.5
            0x00, 0x08, 0x85, // TSQL 88.5
            0x00, 0x00, 0x52, 0x29, 0x00, // TX 29.520 MHz
            0x05, 0x01, 0x01, 0x00, 0x08, 0x85, 0x00, 0x08, 0x85,
        ];
        p.extend_from_slice(b"10M RPT   ");
        p
    }

    fn repeater_record() -> ChannelRecord {
        ChannelRecord::new(12, 29_620_000, ChannelMode::Fm)
            .with_offset(-100_000)
            .with_tone(ToneSquelch::Tone(885))
            .with_name("10M RPT")
    }

    // ---------------------------------------------------------------
    // BCD primitives
    // ---------------------------------------------------------------

    #[test]
    fn bcd_frequency_examples() {
        assert_eq!(encode_bcd_le::<5>(14_250_000), [0x00, 0x00, 0x25, 0x14, 0x00]);
        assert_eq!(encode_bcd_le::<5>(1_800_000), [0x00, 0x00, 0x80, 0x01, 0x00]);
        assert_eq!(decode_bcd_le(&[0x00, 0x00, 0x10, 0x50, 0x00], 0), Ok(50_100_000));
        assert_eq!(encode_bcd_le::<5>(9_999_999_999), [0x99; 5]);
        assert_eq!(decode_bcd_le(&[0x23, 0x41, 0x07, 0x14, 0x00], 0), Ok(14_074_123));
    }

    #[test]
    fn bcd_big_endian_examples() {
        assert_eq!(encode_bcd_be::<2>(99), [0x00, 0x99]);
        assert_eq!(encode_bcd_be::<3>(2541), [0x00, 0x25, 0x41]);
        assert_eq!(decode_bcd_be(&[0x00, 0x08, 0x85], 0), Ok(885));
        assert_eq!(decode_bcd_be(&[], 0), Ok(0));
    }

    #[test]
    fn bcd_rejects_nibbles_above_nine() {
        assert_eq!(
            decode_bcd_le(&[0x00, 0x0A], 3),
            Err(FieldError::InvalidBcd {
                offset: 4,
                byte: 0x0A
            })
        );
        assert_eq!(
            decode_bcd_be(&[0xA0], 11),
            Err(FieldError::InvalidBcd {
                offset: 11,
                byte: 0xA0
            })
        );
    }

    // ---------------------------------------------------------------
    // Decoding
    // ---------------------------------------------------------------

    #[test]
    fn decode_repeater_channel() {
        let record = codec().decode_channel(&repeater_payload(), 12).unwrap();
        assert_eq!(record, repeater_record());
        assert_eq!(record.tx_frequency_hz(), Some(29_520_000));
    }

    #[test]
    fn decode_empty_sentinel() {
        let record = codec().decode_channel(&[0x00, 0x05, 0xFF], 5).unwrap();
        assert_eq!(record, ChannelRecord::empty(5));
    }

    #[test]
    fn decode_wrong_channel() {
        let err = codec().decode_channel(&repeater_payload(), 13).unwrap_err();
        assert_eq!(
            err,
            FieldError::ChannelMismatch {
                expected: 13,
                found: 12
            }
        );
    }

    #[test]
    fn decode_short_payload() {
        let payload = repeater_payload();
        assert_eq!(
            codec().decode_channel(&payload[..20], 12),
            Err(FieldError::PayloadLength {
                expected: PAYLOAD_LEN,
                actual: 20
            })
        );
        assert_eq!(
            codec().decode_channel(&[0x00], 12),
            Err(FieldError::PayloadLength {
                expected: PAYLOAD_LEN,
                actual: 1
            })
        );
    }

    #[test]
    fn decode_invalid_bcd_in_frequency() {
        let mut payload = repeater_payload();
        payload[5] = 0x6A;
        assert_eq!(
            codec().decode_channel(&payload, 12),
            Err(FieldError::InvalidBcd {
                offset: 5,
                byte: 0x6A
            })
        );
    }

    #[test]
    fn decode_invalid_bcd_anywhere_numeric() {
        // Every numeric byte of the RX and TX blocks plus the channel number.
        let numeric: Vec<usize> = [0, 1]
            .into_iter()
            .chain(OFF_RX..OFF_RX + 5)
            .chain(OFF_RX + 8..OFF_RX + 14)
            .chain(OFF_TX..OFF_TX + 5)
            .chain(OFF_TX + 8..OFF_TX + 14)
            .collect();
        for offset in numeric {
            let mut payload = repeater_payload();
            payload[offset] = 0x0A;
            let result = codec().decode_channel(&payload, 12);
            assert!(
                matches!(result, Err(FieldError::InvalidBcd { .. })),
                "offset {offset}: {result:?}"
            );
        }
    }

    #[test]
    fn decode_unknown_mode_is_kept() {
        let mut payload = repeater_payload();
        payload[8] = 0x17;
        let record = codec().decode_channel(&payload, 12).unwrap();
        assert_eq!(record.mode, ChannelMode::Unknown(0x17));
        assert_eq!(
            codec().encode_channel(&record),
            Err(FieldError::UnsupportedMode(0x17))
        );
    }

    #[test]
    fn decode_dtcs_and_tsql() {
        let mut payload = repeater_payload();
        payload[10] = 0x03;
        payload[14..17].copy_from_slice(&[0x01, 0x07, 0x54]);
        payload[24] = 0x03;
        payload[28..31].copy_from_slice(&[0x01, 0x07, 0x54]);
        let record = codec().decode_channel(&payload, 12).unwrap();
        assert_eq!(record.tone_squelch, Some(ToneSquelch::Dtcs(754)));

        let mut payload = repeater_payload();
        payload[10] = 0x12; // data mode on, TSQL
        payload[14..17].copy_from_slice(&[0x00, 0x10, 0x00]);
        let record = codec().decode_channel(&payload, 12).unwrap();
        assert!(record.data_mode);
        assert_eq!(record.tone_squelch, Some(ToneSquelch::Tsql(1000)));
    }

    #[test]
    fn decode_non_standard_tone() {
        let mut payload = repeater_payload();
        payload[11..14].copy_from_slice(&[0x00, 0x08, 0x80]);
        assert_eq!(
            codec().decode_channel(&payload, 12),
            Err(FieldError::InvalidTone(880))
        );
    }

    #[test]
    fn decode_bad_selectors() {
        let mut payload = repeater_payload();
        payload[9] = 0x04;
        assert_eq!(
            codec().decode_channel(&payload, 12),
            Err(FieldError::InvalidFilter(0x04))
        );

        let mut payload = repeater_payload();
        payload[10] = 0x07;
        assert_eq!(
            codec().decode_channel(&payload, 12),
            Err(FieldError::InvalidToneType(0x07))
        );

        let mut payload = repeater_payload();
        payload[2] = 0x05;
        assert_eq!(
            codec().decode_channel(&payload, 12),
            Err(FieldError::InvalidScanSelect(5))
        );
    }

    #[test]
    fn decode_name_trims_padding() {
        let mut payload = repeater_payload();
        payload[OFF_NAME..].copy_from_slice(b"FT8\0\0\0\0\0\0\0");
        let record = codec().decode_channel(&payload, 12).unwrap();
        assert_eq!(record.name, "FT8");

        payload[OFF_NAME..].copy_from_slice(b"          ");
        let record = codec().decode_channel(&payload, 12).unwrap();
        assert_eq!(record.name, "");

        payload[OFF_NAME] = 0x07;
        assert_eq!(
            codec().decode_channel(&payload, 12),
            Err(FieldError::InvalidNameByte(0x07))
        );
    }

    #[test]
    fn simplex_ignores_tx_frequency() {
        let mut payload = repeater_payload();
        payload[2] = 0x02; // split off, scan select 2
        let record = codec().decode_channel(&payload, 12).unwrap();
        assert_eq!(record.duplex_offset_hz, 0);
        assert_eq!(record.scan_select, 2);
    }

    // ---------------------------------------------------------------
    // Encoding
    // ---------------------------------------------------------------

    #[test]
    fn encode_repeater_channel() {
        let payload = codec().encode_channel(&repeater_record()).unwrap();
        assert_eq!(payload, repeater_payload());
    }

    #[test]
    fn encode_empty_is_clear_sentinel() {
        let payload = codec().encode_channel(&ChannelRecord::empty(99)).unwrap();
        assert_eq!(payload, vec![0x00, 0x99, 0xFF]);
    }

    #[test]
    fn encode_channel_range() {
        let c = codec();
        for n in [0, 100, 1000] {
            let r = ChannelRecord::new(n, 7_074_000, ChannelMode::Usb);
            assert_eq!(c.encode_channel(&r), Err(FieldError::ChannelOutOfRange(n)));
        }
    }

    #[test]
    fn encode_frequency_limits() {
        let c = codec();
        let r = ChannelRecord::new(1, 144_000_000, ChannelMode::Fm);
        assert_eq!(
            c.encode_channel(&r),
            Err(FieldError::FrequencyOutOfRange(144_000_000))
        );

        let r = ChannelRecord::new(1, 74_700_000, ChannelMode::Fm).with_offset(600_000);
        assert_eq!(
            c.encode_channel(&r),
            Err(FieldError::OffsetOutOfRange(600_000))
        );

        let r = ChannelRecord::new(1, 50_000, ChannelMode::Am).with_offset(-100_000);
        assert_eq!(
            c.encode_channel(&r),
            Err(FieldError::OffsetOutOfRange(-100_000))
        );
    }

    #[test]
    fn encode_rejects_bad_tones() {
        let r = ChannelRecord::new(1, 29_600_000, ChannelMode::Fm).with_tone(ToneSquelch::Tsql(1001));
        assert_eq!(codec().encode_channel(&r), Err(FieldError::InvalidTone(1001)));

        let r = ChannelRecord::new(1, 29_600_000, ChannelMode::Fm).with_tone(ToneSquelch::Dtcs(24));
        assert_eq!(codec().encode_channel(&r), Err(FieldError::InvalidDtcs(24)));
    }

    #[test]
    fn encode_name_uppercases_and_checks_charset() {
        let r = ChannelRecord::new(3, 7_074_000, ChannelMode::Usb).with_name("ft8 40m");
        let payload = codec().encode_channel(&r).unwrap();
        assert_eq!(&payload[OFF_NAME..], b"FT8 40M   ");

        let r = ChannelRecord::new(3, 7_074_000, ChannelMode::Usb).with_name("café");
        assert!(matches!(
            codec().encode_channel(&r),
            Err(FieldError::InvalidNameChar(_))
        ));
    }

    #[test]
    fn names_normalize_unless_rejected() {
        let lower = ChannelRecord::new(3, 7_074_000, ChannelMode::Usb).with_name("abc");
        let padded = ChannelRecord::new(4, 7_074_000, ChannelMode::Usb).with_name("AB ");

        let c = codec();
        let back = c.decode_channel(&c.encode_channel(&lower).unwrap(), 3).unwrap();
        assert_eq!(back.name, "ABC");
        let back = c.decode_channel(&c.encode_channel(&padded).unwrap(), 4).unwrap();
        assert_eq!(back.name, "AB");

        let strict = codec().with_name_policy(NamePolicy::Reject);
        assert_eq!(
            strict.encode_channel(&lower),
            Err(FieldError::NonCanonicalName("abc".to_string()))
        );
        assert_eq!(
            strict.encode_channel(&padded),
            Err(FieldError::NonCanonicalName("AB ".to_string()))
        );

        let exact = ChannelRecord::new(5, 7_074_000, ChannelMode::Usb).with_name("FT8 40M");
        let back = strict
            .decode_channel(&strict.encode_channel(&exact).unwrap(), 5)
            .unwrap();
        assert_eq!(back, exact);
    }

    #[test]
    fn long_name_follows_policy() {
        let r = ChannelRecord::new(3, 7_074_000, ChannelMode::Usb).with_name("WSPR 40 METERS");

        let truncated = codec().encode_channel(&r).unwrap();
        let back = codec().decode_channel(&truncated, 3).unwrap();
        assert_eq!(back.name, "WSPR 40 ME");

        let strict = codec().with_name_policy(NamePolicy::Reject);
        assert_eq!(
            strict.encode_channel(&r),
            Err(FieldError::NameTooLong { len: 14, max: 10 })
        );
    }

    // ---------------------------------------------------------------
    // Round trips
    // ---------------------------------------------------------------

    #[test]
    fn round_trip_varied_records() {
        let c = codec();
        let records = vec![
            ChannelRecord::new(1, 1_840_000, ChannelMode::Lsb),
            ChannelRecord::new(2, 7_074_000, ChannelMode::Usb).with_name("FT8"),
            ChannelRecord {
                data_mode: true,
                filter_width: FilterWidth::Fil2,
                scan_select: 3,
                ..ChannelRecord::new(3, 14_074_001, ChannelMode::Usb)
            },
            ChannelRecord::new(4, 10_106_000, ChannelMode::CwR),
            ChannelRecord {
                filter_width: FilterWidth::Fil3,
                ..ChannelRecord::new(5, 14_080_000, ChannelMode::RttyR)
            },
            ChannelRecord::new(6, 5_000_000, ChannelMode::Am).with_name("WWV 5"),
            ChannelRecord::new(7, 51_500_000, ChannelMode::Fm)
                .with_offset(500_000)
                .with_tone(ToneSquelch::Tsql(1514)),
            ChannelRecord::new(8, 29_600_000, ChannelMode::Fm).with_tone(ToneSquelch::Dtcs(23)),
            ChannelRecord::new(9, 70_450_000, ChannelMode::Fm).with_name("4M CALL!?"),
            ChannelRecord::new(10, 3_573_000, ChannelMode::Rtty).with_name("[A-Z]^_@#$%"),
            ChannelRecord::new(99, 30_000, ChannelMode::Cw).with_tone(ToneSquelch::Tone(2541)),
            ChannelRecord::empty(42),
        ];
        for record in records {
            let payload = c.encode_channel(&record).unwrap_or_else(|e| {
                panic!("encode channel {}: {e}", record.channel_number)
            });
            let decoded = c.decode_channel(&payload, record.channel_number).unwrap();
            if record.name.chars().count() > NAME_LEN {
                assert_eq!(decoded.name, record.name[..NAME_LEN]);
            } else {
                assert_eq!(decoded, record);
            }
        }
    }

    #[test]
    fn every_channel_number_round_trips() {
        let c = codec();
        for n in 1..=c.memory_channels() {
            let record = ChannelRecord::new(n, 14_200_000, ChannelMode::Usb);
            let payload = c.encode_channel(&record).unwrap();
            assert_eq!(c.decode_channel(&payload, n).unwrap().channel_number, n);

            let empty = c.encode_channel(&ChannelRecord::empty(n)).unwrap();
            assert_eq!(c.decode_channel(&empty, n).unwrap(), ChannelRecord::empty(n));
        }
    }
}
