//! Preamble-synchronized, CRC-checked message framing for SBP byte streams.
//!
//! Every message on the wire is framed as:
//! - A 1-byte preamble (`0x55`) for stream synchronization
//! - A 2-byte little-endian message type and a 2-byte little-endian sender ID
//! - A 1-byte payload length followed by up to 255 payload bytes
//! - A 2-byte little-endian CRC-16 over everything after the preamble
//!
//! [`FrameDecoder`] turns an arbitrarily chunked, possibly noisy byte stream
//! into validated frames. [`encode_frame`] builds them.

pub mod codec;
pub mod crc;
pub mod decoder;
pub mod error;
pub mod msg_type;
pub mod reader;
pub mod writer;

pub use codec::{
    decode_frame, encode, encode_frame, Frame, FrameConfig, CRC_SIZE, HEADER_SIZE, MAX_FRAME_SIZE,
    MAX_PAYLOAD, PREAMBLE,
};
pub use crc::{crc16, Crc16};
pub use decoder::{
    ChecksumMismatch, DecodeEvent, DecoderState, DecoderStats, FrameDecoder, ResyncPolicy,
};
pub use error::{FrameError, Result};
pub use msg_type::{MsgTypeRange, DEFAULT_SENDER_ID};
pub use reader::FrameReader;
pub use writer::FrameWriter;
