//! CI-V frame encoder/decoder.
//!
//! The Icom CI-V (Communication Interface V) protocol uses binary frames on a
//! half-duplex bus. This module handles the pure byte-level encoding and
//! decoding of CI-V frames. It knows nothing about what the payload means;
//! memory channel payloads are handled by [`crate::fields`].
//!
//! # Frame format
//!
//! ```text
//! 0xFE 0xFE <dst> <src> <cmd> [<sub>] [<data>...] 0xFD
//! ```
//!
//! - Preamble: two `0xFE` bytes
//! - `dst`: target CI-V address (e.g. `0x94` for IC-7300)
//! - `src`: sender address (`0xE0` for the controller)
//! - `cmd`: command byte
//! - `sub`: optional sub-command byte
//! - `data`: variable-length payload, position delimited
//! - Terminator: `0xFD`
//!
//! There is no length field and no checksum. A frame ends at the first
//! terminator, and a frame that would grow past [`MAX_FRAME_LEN`] is garbage.

use bytes::{BufMut, BytesMut};

/// Preamble byte repeated twice at the start of every CI-V frame.
pub const PREAMBLE: u8 = 0xFE;

/// Frame terminator byte.
pub const TERMINATOR: u8 = 0xFD;

/// Standard PC controller CI-V address.
pub const CONTROLLER_ADDR: u8 = 0xE0;

/// OK reply: the radio accepted a command.
pub const ACK: u8 = 0xFB;

/// NG reply: the radio refused a command.
pub const NAK: u8 = 0xFA;

/// Collision indicator byte on the CI-V bus.
///
/// When two devices transmit simultaneously the radio jams the bus with
/// `0xFC`. A frame containing it cannot be trusted.
pub const COLLISION: u8 = 0xFC;

/// Longest frame the radios emit or accept, preamble and terminator included.
pub const MAX_FRAME_LEN: usize = 64;

/// Addresses at or above this value are reserved framing bytes.
const FIRST_RESERVED: u8 = 0xF0;

/// A parsed CI-V frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CivFrame {
    /// Destination CI-V address.
    pub dst_addr: u8,
    /// Source CI-V address.
    pub src_addr: u8,
    /// Command byte.
    pub cmd: u8,
    /// Optional sub-command byte.
    ///
    /// The decoder cannot tell a sub-command from the first data byte, so it
    /// always splits the first byte after `cmd` off into this field. Callers
    /// that know the command has no sub-command use [`CivFrame::payload`].
    pub sub_cmd: Option<u8>,
    /// Payload data bytes (may be empty).
    pub data: Vec<u8>,
}

impl CivFrame {
    /// Returns `true` if this frame is an OK reply.
    pub fn is_ack(&self) -> bool {
        self.cmd == ACK
    }

    /// Everything after the command byte, with the sub-command rejoined.
    pub fn payload(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.data.len() + 1);
        out.extend(self.sub_cmd);
        out.extend_from_slice(&self.data);
        out
    }
}

/// An NG reply from the radio.
///
/// The radio may echo the refused command after the `0xFA` byte; anything
/// after that is kept as `detail` for matching against a configured
/// empty-slot signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedFrame {
    /// Destination CI-V address.
    pub dst_addr: u8,
    /// Source CI-V address.
    pub src_addr: u8,
    /// The refused command, when the radio echoes it.
    pub command: Option<u8>,
    /// Remaining bytes after the echoed command.
    pub detail: Vec<u8>,
}

/// Encode a CI-V frame into raw bytes ready for transmission.
///
/// # Example
///
/// ```
/// use civmem_icom::civ::{encode_frame, CONTROLLER_ADDR};
///
/// // Read memory channel 12 of an IC-7300 (addr 0x94)
/// let bytes = encode_frame(0x94, CONTROLLER_ADDR, 0x1A, Some(0x00), &[0x00, 0x12]);
/// assert_eq!(bytes, vec![0xFE, 0xFE, 0x94, 0xE0, 0x1A, 0x00, 0x00, 0x12, 0xFD]);
/// ```
pub fn encode_frame(
    dst_addr: u8,
    src_addr: u8,
    cmd: u8,
    sub_cmd: Option<u8>,
    data: &[u8],
) -> Vec<u8> {
    let capacity = 5 + sub_cmd.is_some() as usize + data.len() + 1;
    let mut buf = BytesMut::with_capacity(capacity);
    buf.put_u8(PREAMBLE);
    buf.put_u8(PREAMBLE);
    buf.put_u8(dst_addr);
    buf.put_u8(src_addr);
    buf.put_u8(cmd);
    if let Some(sub) = sub_cmd {
        buf.put_u8(sub);
    }
    buf.put_slice(data);
    buf.put_u8(TERMINATOR);
    buf.to_vec()
}

/// Result of attempting to decode a frame from a byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeResult {
    /// A complete frame. The `usize` is the number of bytes consumed from
    /// the input buffer, leading noise included.
    Frame(CivFrame, usize),

    /// A complete NG frame, with the number of bytes consumed.
    Rejected(RejectedFrame, usize),

    /// No complete frame yet; wait for more bytes.
    Incomplete,

    /// The bytes at the front of the buffer can never form a valid frame.
    /// The `usize` is the number of bytes to discard before decoding again;
    /// it is always at least one.
    Malformed(usize),
}

/// Attempt to decode one CI-V frame from a byte buffer.
///
/// Bytes before the first preamble pair are noise and are skipped, as are
/// extra `0xFE` bytes after it. The terminator is searched for within
/// [`MAX_FRAME_LEN`] bytes of the preamble; if the window is still open the
/// result is [`DecodeResult::Incomplete`], if it is full the frame is
/// [`DecodeResult::Malformed`]. A preamble byte inside the body means the
/// frame was cut short and a new one started, which is also malformed.
///
/// This function never panics.
///
/// # Example
///
/// ```
/// use civmem_icom::civ::{decode_frame, DecodeResult};
///
/// // OK from IC-7300 (0x94) to controller (0xE0), after line noise
/// let buf = [0x00, 0x13, 0xFE, 0xFE, 0xE0, 0x94, 0xFB, 0xFD];
/// match decode_frame(&buf) {
///     DecodeResult::Frame(frame, consumed) => {
///         assert!(frame.is_ack());
///         assert_eq!(consumed, 8);
///     }
///     other => panic!("expected a frame, got {other:?}"),
/// }
/// ```
pub fn decode_frame(buf: &[u8]) -> DecodeResult {
    let Some(preamble_pos) = find_preamble(buf) else {
        return DecodeResult::Incomplete;
    };

    let mut body_start = preamble_pos + 2;
    while buf.get(body_start) == Some(&PREAMBLE) {
        body_start += 1;
    }
    let frame_start = body_start - 2;
    let window_end = frame_start.saturating_add(MAX_FRAME_LEN);

    let mut term_pos = None;
    for (pos, &byte) in buf
        .iter()
        .enumerate()
        .take(window_end)
        .skip(body_start)
    {
        match byte {
            TERMINATOR => {
                term_pos = Some(pos);
                break;
            }
            PREAMBLE => return DecodeResult::Malformed(pos),
            _ => {}
        }
    }

    let Some(term_pos) = term_pos else {
        if buf.len() >= window_end {
            return DecodeResult::Malformed(window_end);
        }
        return DecodeResult::Incomplete;
    };

    let consumed = term_pos + 1;
    let body = &buf[body_start..term_pos];
    let [dst_addr, src_addr, cmd, rest @ ..] = body else {
        return DecodeResult::Malformed(consumed);
    };
    let (dst_addr, src_addr, cmd) = (*dst_addr, *src_addr, *cmd);

    if dst_addr >= FIRST_RESERVED || src_addr >= FIRST_RESERVED || body.contains(&COLLISION) {
        return DecodeResult::Malformed(consumed);
    }

    if cmd == NAK {
        let rejected = RejectedFrame {
            dst_addr,
            src_addr,
            command: rest.first().copied(),
            detail: rest.get(1..).unwrap_or_default().to_vec(),
        };
        return DecodeResult::Rejected(rejected, consumed);
    }

    // OK replies carry no sub-command; for everything else the first
    // extra byte is split off generically.
    let (sub_cmd, data) = match rest {
        _ if cmd == ACK => (None, rest.to_vec()),
        [sub, data @ ..] => (Some(*sub), data.to_vec()),
        [] => (None, Vec::new()),
    };

    let frame = CivFrame {
        dst_addr,
        src_addr,
        cmd,
        sub_cmd,
        data,
    };
    DecodeResult::Frame(frame, consumed)
}

/// Number of leading bytes that can never become part of a frame.
///
/// After [`decode_frame`] reports [`DecodeResult::Incomplete`], a caller can
/// drop this many bytes without losing the start of a frame still in
/// flight. A trailing lone `0xFE` is kept since it may be half a preamble.
pub fn noise_len(buf: &[u8]) -> usize {
    match find_preamble(buf) {
        Some(pos) => {
            let mut end = pos + 2;
            while buf.get(end) == Some(&PREAMBLE) {
                end += 1;
            }
            end - 2
        }
        None if buf.last() == Some(&PREAMBLE) => buf.len() - 1,
        None => buf.len(),
    }
}

/// Find the position of the first CI-V preamble (`0xFE 0xFE`) in a buffer.
fn find_preamble(buf: &[u8]) -> Option<usize> {
    buf.windows(2)
        .position(|w| w[0] == PREAMBLE && w[1] == PREAMBLE)
}
