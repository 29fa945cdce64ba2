//! CI-V memory command builders.
//!
//! Every memory operation uses command `0x1A` sub-command `0x00`
//! ("memory contents"). What distinguishes a read from a write is the data:
//! a read carries only the 2-byte BCD channel number, a write carries the
//! full channel payload, and a clear carries the empty-slot sentinel.
//!
//! [`CivCommand`] pairs the request with the reply it expects so the engine
//! can correlate responses. The `cmd_*` functions produce ready-to-send
//! frames for callers that drive a transport themselves.

use civmem_core::FieldError;

use crate::civ::{CONTROLLER_ADDR, CivFrame, encode_frame};
use crate::fields::{EMPTY_MARKER, decode_bcd_be, encode_bcd_be};

/// Memory contents command (cmd 0x1A).
pub const CMD_MEMORY_CONTENTS: u8 = 0x1A;

/// Memory contents sub-command (sub 0x00).
pub const SUB_MEMORY_CONTENTS: u8 = 0x00;

/// The reply a request is waiting for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpectedReply {
    /// An OK (`0xFB`) frame.
    Ack,
    /// A frame echoing the request's command and sub-command whose data
    /// starts with `prefix`.
    Data {
        /// Leading data bytes that identify the reply (e.g. the channel).
        prefix: Vec<u8>,
    },
}

/// A request to send to the radio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CivCommand {
    /// Command byte.
    pub cmd: u8,
    /// Sub-command byte, if the command has one.
    pub sub_cmd: Option<u8>,
    /// Data bytes after the sub-command.
    pub data: Vec<u8>,
    /// What a matching reply looks like.
    pub reply: ExpectedReply,
}

impl CivCommand {
    /// Read memory channel `channel`.
    pub fn read_memory(channel: u16) -> Self {
        let number = channel_to_bcd(channel).to_vec();
        CivCommand {
            cmd: CMD_MEMORY_CONTENTS,
            sub_cmd: Some(SUB_MEMORY_CONTENTS),
            data: number.clone(),
            reply: ExpectedReply::Data { prefix: number },
        }
    }

    /// Write an encoded channel payload. The payload starts with the
    /// channel number, see [`crate::fields`].
    pub fn write_memory(payload: &[u8]) -> Self {
        CivCommand {
            cmd: CMD_MEMORY_CONTENTS,
            sub_cmd: Some(SUB_MEMORY_CONTENTS),
            data: payload.to_vec(),
            reply: ExpectedReply::Ack,
        }
    }

    /// Clear memory channel `channel`.
    pub fn clear_memory(channel: u16) -> Self {
        let mut payload = channel_to_bcd(channel).to_vec();
        payload.push(EMPTY_MARKER);
        CivCommand::write_memory(&payload)
    }

    /// Encode the request as a frame from `src_addr` to `dst_addr`.
    pub fn encode(&self, dst_addr: u8, src_addr: u8) -> Vec<u8> {
        encode_frame(dst_addr, src_addr, self.cmd, self.sub_cmd, &self.data)
    }

    /// Returns `true` if `frame` is the reply this request is waiting for.
    ///
    /// Addresses are not checked here.
    pub fn matches_reply(&self, frame: &CivFrame) -> bool {
        match &self.reply {
            ExpectedReply::Ack => frame.is_ack(),
            ExpectedReply::Data { prefix } => {
                frame.cmd == self.cmd
                    && (self.sub_cmd.is_none() || frame.sub_cmd == self.sub_cmd)
                    && frame.data.starts_with(prefix)
            }
        }
    }
}

/// Build a read-memory frame for the radio at `addr`.
pub fn cmd_read_memory(addr: u8, channel: u16) -> Vec<u8> {
    CivCommand::read_memory(channel).encode(addr, CONTROLLER_ADDR)
}

/// Build a write-memory frame for the radio at `addr`.
pub fn cmd_write_memory(addr: u8, payload: &[u8]) -> Vec<u8> {
    CivCommand::write_memory(payload).encode(addr, CONTROLLER_ADDR)
}

/// Build a clear-memory frame for the radio at `addr`.
pub fn cmd_clear_memory(addr: u8, channel: u16) -> Vec<u8> {
    CivCommand::clear_memory(channel).encode(addr, CONTROLLER_ADDR)
}

/// Channel number as 2-byte BCD, most significant byte first.
pub fn channel_to_bcd(channel: u16) -> [u8; 2] {
    encode_bcd_be::<2>(u64::from(channel))
}

/// Parse a 2-byte BCD channel number.
pub fn bcd_to_channel(bytes: [u8; 2]) -> Result<u16, FieldError> {
    decode_bcd_be(&bytes, 0).map(|n| n as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    const IC7300_ADDR: u8 = 0x94;

    #[test]
    fn read_memory_bytes() {
        assert_eq!(
            cmd_read_memory(IC7300_ADDR, 12),
            vec![0xFE, 0xFE, 0x94, 0xE0, 0x1A, 0x00, 0x00, 0x12, 0xFD]
        );
        assert_eq!(
            cmd_read_memory(IC7300_ADDR, 99),
            vec![0xFE, 0xFE, 0x94, 0xE0, 0x1A, 0x00, 0x00, 0x99, 0xFD]
        );
    }

    #[test]
    fn clear_memory_bytes() {
        assert_eq!(
            cmd_clear_memory(0x98, 5),
            vec![0xFE, 0xFE, 0x98, 0xE0, 0x1A, 0x00, 0x00, 0x05, 0xFF, 0xFD]
        );
    }

    #[test]
    fn write_memory_wraps_payload() {
        let payload = [0x00, 0x01, 0x00, 0xAA];
        let bytes = cmd_write_memory(IC7300_ADDR, &payload);
        assert_eq!(&bytes[..6], &[0xFE, 0xFE, 0x94, 0xE0, 0x1A, 0x00]);
        assert_eq!(&bytes[6..10], &payload);
        assert_eq!(bytes[10], 0xFD);
    }

    #[test]
    fn channel_bcd() {
        assert_eq!(channel_to_bcd(1), [0x00, 0x01]);
        assert_eq!(channel_to_bcd(42), [0x00, 0x42]);
        assert_eq!(channel_to_bcd(101), [0x01, 0x01]);
        assert_eq!(bcd_to_channel([0x00, 0x99]), Ok(99));
        assert!(bcd_to_channel([0x00, 0x9A]).is_err());
    }

    #[test]
    fn read_reply_correlation() {
        let cmd = CivCommand::read_memory(12);
        let reply = CivFrame {
            dst_addr: CONTROLLER_ADDR,
            src_addr: IC7300_ADDR,
            cmd: 0x1A,
            sub_cmd: Some(0x00),
            data: vec![0x00, 0x12, 0xFF],
        };
        assert!(cmd.matches_reply(&reply));

        let other_channel = CivFrame {
            data: vec![0x00, 0x13, 0xFF],
            ..reply.clone()
        };
        assert!(!cmd.matches_reply(&other_channel));

        let ack = CivFrame {
            cmd: 0xFB,
            sub_cmd: None,
            data: vec![],
            ..reply
        };
        assert!(!cmd.matches_reply(&ack));
    }

    #[test]
    fn write_expects_ack() {
        let cmd = CivCommand::clear_memory(3);
        let ack = CivFrame {
            dst_addr: CONTROLLER_ADDR,
            src_addr: IC7300_ADDR,
            cmd: 0xFB,
            sub_cmd: None,
            data: vec![],
        };
        assert!(cmd.matches_reply(&ack));

        // Our own request echoed back is not an ACK.
        let echo = CivFrame {
            dst_addr: IC7300_ADDR,
            src_addr: CONTROLLER_ADDR,
            cmd: 0x1A,
            sub_cmd: Some(0x00),
            data: vec![0x00, 0x03, 0xFF],
        };
        assert!(!cmd.matches_reply(&echo));
    }
}
