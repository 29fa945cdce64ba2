//! Error types for civmem.
//!
//! All fallible operations across the workspace return [`Result<T>`], which
//! uses [`Error`] as the error type. Field-level codec failures have their own
//! [`FieldError`] type so a channel session can record them per channel
//! without aborting the rest of a download or upload.

/// The error type for all civmem operations.
///
/// Variants fall into three groups:
///
/// - **link failures** ([`Transport`](Error::Transport), [`Io`](Error::Io),
///   [`NotConnected`](Error::NotConnected),
///   [`ConnectionLost`](Error::ConnectionLost)) abort a whole session;
/// - **per-exchange failures** ([`Rejected`](Error::Rejected),
///   [`ExhaustedRetries`](Error::ExhaustedRetries), [`Field`](Error::Field))
///   are recovered by the session and recorded against one channel;
/// - **misuse** ([`RequestOutstanding`](Error::RequestOutstanding),
///   [`InvalidParameter`](Error::InvalidParameter)) is a caller bug.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A transport-level error (serial port could not be opened, configured).
    #[error("transport error: {0}")]
    Transport(String),

    /// A protocol-level error that is not tied to one frame.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Timed out waiting for bytes from the radio.
    ///
    /// Returned by [`Transport::receive`](crate::Transport::receive). The
    /// request engine turns repeated timeouts into
    /// [`ExhaustedRetries`](Error::ExhaustedRetries).
    #[error("timeout waiting for response")]
    Timeout,

    /// An invalid parameter was passed to a session or builder.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// No connection to the radio has been established, or it was closed.
    #[error("not connected")]
    NotConnected,

    /// The connection to the radio was lost unexpectedly.
    #[error("connection lost")]
    ConnectionLost,

    /// A channel payload could not be encoded or decoded.
    #[error("field error: {0}")]
    Field(#[from] FieldError),

    /// The radio answered a request with NG (`0xFA`).
    ///
    /// `command` is the command byte of the request that was refused;
    /// `detail` holds any bytes the radio appended after the echoed command.
    #[error("radio rejected command 0x{command:02X}")]
    Rejected {
        /// Command byte of the refused request.
        command: u8,
        /// Trailing bytes of the NG frame, if any.
        detail: Vec<u8>,
    },

    /// Every attempt of a request timed out or produced a malformed reply.
    #[error("no valid response after {attempts} attempts")]
    ExhaustedRetries {
        /// Number of attempts made (the configured retry budget).
        attempts: u32,
        /// The bytes seen during the last attempt, for diagnostics.
        last_bytes: Vec<u8>,
    },

    /// A request was issued while another exchange was still outstanding.
    ///
    /// The CI-V bus is half-duplex. This only happens when a previous
    /// request future was dropped mid-exchange; call `recover()` on the
    /// session to drain the link before issuing new requests.
    #[error("a request is already outstanding on this link")]
    RequestOutstanding,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` if this error must abort a whole channel session.
    ///
    /// Link failures and misuse are fatal. Timeouts, rejections, exhausted
    /// retries and field errors only affect the channel being processed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Transport(_)
                | Error::Io(_)
                | Error::NotConnected
                | Error::ConnectionLost
                | Error::RequestOutstanding
                | Error::Protocol(_)
        )
    }
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure to map between a wire-format channel payload and a
/// [`ChannelRecord`](crate::ChannelRecord).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    /// A BCD nibble held a value greater than 9.
    #[error("invalid BCD digit at payload offset {offset}: 0x{byte:02X}")]
    InvalidBcd {
        /// Offset of the offending byte within the payload.
        offset: usize,
        /// The raw byte.
        byte: u8,
    },

    /// The payload is shorter or longer than the memory layout.
    #[error("payload length {actual}, expected {expected}")]
    PayloadLength {
        /// Length required by the memory layout.
        expected: usize,
        /// Length actually received.
        actual: usize,
    },

    /// The payload describes a different channel than the one requested.
    #[error("payload is for channel {found}, expected {expected}")]
    ChannelMismatch {
        /// The channel that was requested.
        expected: u16,
        /// The channel number found in the payload.
        found: u16,
    },

    /// The channel number is outside the radio's memory range.
    #[error("channel {0} is out of range")]
    ChannelOutOfRange(u16),

    /// The frequency cannot be stored by this radio.
    #[error("frequency {0} Hz is out of range")]
    FrequencyOutOfRange(u64),

    /// The duplex offset puts the transmit frequency out of range.
    #[error("duplex offset {0} Hz is out of range")]
    OffsetOutOfRange(i64),

    /// The mode is not one the codec can write back to the radio.
    #[error("mode byte 0x{0:02X} cannot be encoded")]
    UnsupportedMode(u8),

    /// Empty slots carry no programmable content.
    #[error("an empty slot has no channel content")]
    EmptyMode,

    /// The filter byte is not one of FIL1..FIL3.
    #[error("invalid filter byte 0x{0:02X}")]
    InvalidFilter(u8),

    /// The tone type nibble is not recognised.
    #[error("invalid tone type 0x{0:X}")]
    InvalidToneType(u8),

    /// A CTCSS tone (in tenths of a hertz) that is not a standard tone.
    #[error("{}.{} Hz is not a standard CTCSS tone", .0 / 10, .0 % 10)]
    InvalidTone(u16),

    /// A DTCS code that is not a standard code.
    #[error("{0:03} is not a standard DTCS code")]
    InvalidDtcs(u16),

    /// The scan select group is not 0..=3.
    #[error("invalid scan select group {0}")]
    InvalidScanSelect(u8),

    /// The name is longer than the radio's name field and the name policy
    /// does not allow truncation.
    #[error("name is {len} characters, at most {max} allowed")]
    NameTooLong {
        /// Length of the supplied name.
        len: usize,
        /// Width of the name field.
        max: usize,
    },

    /// The name contains a character outside the radio's character set.
    #[error("character {0:?} is not allowed in a channel name")]
    InvalidNameChar(char),

    /// The name would read back differently from the radio: it has lower
    /// case letters or trailing spaces.
    #[error("name {0:?} is not stored verbatim (use upper case, no trailing spaces)")]
    NonCanonicalName(String),

    /// The name field received from the radio holds a non-printable byte.
    #[error("invalid name byte 0x{0:02X}")]
    InvalidNameByte(u8),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_transport() {
        let e = Error::Transport("port busy".into());
        assert_eq!(e.to_string(), "transport error: port busy");
    }

    #[test]
    fn error_display_rejected() {
        let e = Error::Rejected {
            command: 0x1A,
            detail: vec![],
        };
        assert_eq!(e.to_string(), "radio rejected command 0x1A");
    }

    #[test]
    fn error_display_exhausted() {
        let e = Error::ExhaustedRetries {
            attempts: 3,
            last_bytes: vec![0xFE, 0xFE],
        };
        assert_eq!(e.to_string(), "no valid response after 3 attempts");
    }

    #[test]
    fn error_from_field_error() {
        let e: Error = FieldError::ChannelOutOfRange(120).into();
        assert!(matches!(e, Error::Field(FieldError::ChannelOutOfRange(120))));
        assert_eq!(e.to_string(), "field error: channel 120 is out of range");
    }

    #[test]
    fn error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broken");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::Io(_)));
        assert!(e.to_string().contains("pipe broken"));
    }

    #[test]
    fn fatal_classification() {
        assert!(Error::Transport("x".into()).is_fatal());
        assert!(Error::ConnectionLost.is_fatal());
        assert!(Error::NotConnected.is_fatal());
        assert!(Error::RequestOutstanding.is_fatal());

        assert!(!Error::Timeout.is_fatal());
        assert!(
            !Error::Rejected {
                command: 0x1A,
                detail: vec![]
            }
            .is_fatal()
        );
        assert!(
            !Error::ExhaustedRetries {
                attempts: 3,
                last_bytes: vec![]
            }
            .is_fatal()
        );
        assert!(!Error::Field(FieldError::EmptyMode).is_fatal());
    }

    #[test]
    fn field_error_display_tone() {
        assert_eq!(
            FieldError::InvalidTone(886).to_string(),
            "88.6 Hz is not a standard CTCSS tone"
        );
        assert_eq!(
            FieldError::InvalidDtcs(24).to_string(),
            "024 is not a standard DTCS code"
        );
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
