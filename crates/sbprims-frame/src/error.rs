/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The buffer does not start with the frame preamble.
    #[error("invalid frame preamble 0x{0:02x} (expected 0x55)")]
    InvalidPreamble(u8),

    /// The payload exceeds what the one-byte length field can carry.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A complete frame was received but its CRC does not match.
    #[error("checksum mismatch for message type 0x{msg_type:04x} (transmitted 0x{expected:04x}, computed 0x{computed:04x})")]
    ChecksumMismatch {
        msg_type: u16,
        expected: u16,
        computed: u16,
    },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The byte source or sink was closed.
    #[error("connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
