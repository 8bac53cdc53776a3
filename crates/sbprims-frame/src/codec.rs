use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::crc::Crc16;
use crate::decoder::ResyncPolicy;
use crate::error::{FrameError, Result};

/// Start-of-frame sentinel.
pub const PREAMBLE: u8 = 0x55;

/// Frame header after the preamble: type (2) + sender (2) + length (1) = 5 bytes.
pub const HEADER_SIZE: usize = 5;

/// Trailing CRC size.
pub const CRC_SIZE: usize = 2;

/// Largest payload the one-byte length field can describe.
pub const MAX_PAYLOAD: usize = u8::MAX as usize;

/// Largest possible frame on the wire: preamble + header + payload + CRC.
pub const MAX_FRAME_SIZE: usize = 1 + HEADER_SIZE + MAX_PAYLOAD + CRC_SIZE;

/// A single protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Message type identifier.
    pub msg_type: u16,
    /// Identifier of the originating device.
    pub sender_id: u16,
    /// The message payload, opaque to the framing layer.
    pub payload: Bytes,
    /// CRC over type, sender, length and payload.
    pub crc: u16,
}

impl Frame {
    /// Create a new frame with a freshly computed CRC.
    pub fn new(msg_type: u16, sender_id: u16, payload: impl Into<Bytes>) -> Result<Self> {
        let payload = payload.into();
        check_payload_len(payload.len())?;
        let crc = compute_crc(msg_type, sender_id, &payload);
        Ok(Self {
            msg_type,
            sender_id,
            payload,
            crc,
        })
    }

    /// Assemble a frame from already-known fields without recomputing the CRC.
    ///
    /// Payloads longer than [`MAX_PAYLOAD`] cannot be represented by the
    /// length field and are rejected.
    pub fn from_parts(
        msg_type: u16,
        sender_id: u16,
        payload: impl Into<Bytes>,
        crc: u16,
    ) -> Result<Self> {
        let payload = payload.into();
        check_payload_len(payload.len())?;
        Ok(Self::from_wire(msg_type, sender_id, payload, crc))
    }

    /// Build a frame whose payload length was read from a length field.
    pub(crate) fn from_wire(msg_type: u16, sender_id: u16, payload: Bytes, crc: u16) -> Self {
        Self {
            msg_type,
            sender_id,
            payload,
            crc,
        }
    }

    /// Value of the length field, or `PayloadTooLarge` if the payload has
    /// been replaced with one the field cannot carry.
    pub fn payload_len(&self) -> Result<u8> {
        u8::try_from(self.payload.len()).map_err(|_| FrameError::PayloadTooLarge {
            size: self.payload.len(),
            max: MAX_PAYLOAD,
        })
    }

    /// Returns true if the stored CRC matches the frame contents.
    pub fn is_valid(&self) -> bool {
        self.payload.len() <= MAX_PAYLOAD
            && compute_crc(self.msg_type, self.sender_id, &self.payload) == self.crc
    }

    /// The total wire size of this frame.
    pub fn wire_size(&self) -> usize {
        1 + HEADER_SIZE + self.payload.len() + CRC_SIZE
    }

    /// Append this frame, with its stored CRC, to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        check_payload_len(self.payload.len())?;
        dst.reserve(self.wire_size());
        put_header(self.msg_type, self.sender_id, &self.payload, dst);
        dst.put_u16_le(self.crc);
        Ok(())
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────┬───────────┬───────────┬─────────┬─────────────┬───────────┐
/// │ Preamble │ Msg type  │ Sender ID │ Length  │ Payload     │ CRC       │
/// │ 0x55     │ (2B LE)   │ (2B LE)   │ (1B)    │ (0-255B)    │ (2B LE)   │
/// └──────────┴───────────┴───────────┴─────────┴─────────────┴───────────┘
///             └──────────────── covered by CRC ─────────────┘
/// ```
///
/// Oversized payloads are rejected before anything is written to `dst`.
pub fn encode_frame(msg_type: u16, sender_id: u16, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    check_payload_len(payload.len())?;
    dst.reserve(1 + HEADER_SIZE + payload.len() + CRC_SIZE);
    put_header(msg_type, sender_id, payload, dst);
    dst.put_u16_le(compute_crc(msg_type, sender_id, payload));
    Ok(())
}

/// Encode a single frame into a fresh buffer.
pub fn encode(msg_type: u16, sender_id: u16, payload: &[u8]) -> Result<Bytes> {
    let mut dst = BytesMut::new();
    encode_frame(msg_type, sender_id, payload, &mut dst)?;
    Ok(dst.freeze())
}

/// Decode a frame from a buffer positioned at a preamble.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet;
/// nothing is consumed in that case. A complete frame is consumed from the
/// buffer whether or not its CRC validates.
pub fn decode_frame(src: &mut BytesMut) -> Result<Option<Frame>> {
    let Some(&first) = src.first() else {
        return Ok(None);
    };
    if first != PREAMBLE {
        return Err(FrameError::InvalidPreamble(first));
    }
    if src.len() < 1 + HEADER_SIZE {
        return Ok(None);
    }

    let payload_len = src[HEADER_SIZE] as usize;
    let total = 1 + HEADER_SIZE + payload_len + CRC_SIZE;
    if src.len() < total {
        return Ok(None);
    }

    src.advance(1);
    let header = src.split_to(HEADER_SIZE);
    let payload = src.split_to(payload_len).freeze();
    let expected = src.get_u16_le();

    let mut digest = Crc16::new();
    digest.update(&header);
    digest.update(&payload);
    let computed = digest.finalize();

    let msg_type = u16::from_le_bytes([header[0], header[1]]);
    let sender_id = u16::from_le_bytes([header[2], header[3]]);

    if computed != expected {
        return Err(FrameError::ChecksumMismatch {
            msg_type,
            expected,
            computed,
        });
    }

    Ok(Some(Frame::from_wire(msg_type, sender_id, payload, expected)))
}

/// Configuration for frame decoding.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// What to do with a frame's bytes after its CRC fails. Default: continue.
    pub resync: ResyncPolicy,
    /// Bytes requested per `read` call by [`crate::FrameReader`]. Default: 4 KiB.
    pub read_chunk_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            resync: ResyncPolicy::default(),
            read_chunk_size: 4 * 1024,
        }
    }
}

pub(crate) fn compute_crc(msg_type: u16, sender_id: u16, payload: &[u8]) -> u16 {
    let mut digest = Crc16::new();
    digest.update(&msg_type.to_le_bytes());
    digest.update(&sender_id.to_le_bytes());
    digest.update(&[payload.len() as u8]);
    digest.update(payload);
    digest.finalize()
}

fn check_payload_len(len: usize) -> Result<()> {
    if len > MAX_PAYLOAD {
        return Err(FrameError::PayloadTooLarge {
            size: len,
            max: MAX_PAYLOAD,
        });
    }
    Ok(())
}

fn put_header(msg_type: u16, sender_id: u16, payload: &[u8], dst: &mut BytesMut) {
    dst.put_u8(PREAMBLE);
    dst.put_u16_le(msg_type);
    dst.put_u16_le(sender_id);
    dst.put_u8(payload.len() as u8);
    dst.put_slice(payload);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msg_type::DEFAULT_SENDER_ID;

    const SCENARIO_WIRE: [u8; 11] = [
        0x55, 0x00, 0x01, 0x2A, 0x00, 0x03, 0x01, 0x02, 0x03, 0x86, 0xF1,
    ];

    #[test]
    fn test_encode_known_bytes() {
        let wire = encode(0x0100, 42, &[0x01, 0x02, 0x03]).unwrap();
        assert_eq!(wire.as_ref(), &SCENARIO_WIRE);
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut buf = BytesMut::new();
        let payload = b"hello, sbprims!";

        encode_frame(0x0102, 0x1234, payload, &mut buf).unwrap();
        assert_eq!(buf.len(), 1 + HEADER_SIZE + payload.len() + CRC_SIZE);

        let frame = decode_frame(&mut buf).unwrap().unwrap();
        assert_eq!(frame.msg_type, 0x0102);
        assert_eq!(frame.sender_id, 0x1234);
        assert_eq!(frame.payload.as_ref(), payload);
        assert!(frame.is_valid());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_incomplete_header() {
        let mut buf = BytesMut::from(&[PREAMBLE, 0x00, 0x01][..]);
        assert!(decode_frame(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn test_decode_incomplete_payload() {
        let mut buf = BytesMut::new();
        encode_frame(1, 2, b"hello", &mut buf).unwrap();
        buf.truncate(1 + HEADER_SIZE + 2);

        assert!(decode_frame(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_decode_invalid_preamble() {
        let mut buf = BytesMut::from(&[0xFF, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00][..]);
        let result = decode_frame(&mut buf);
        assert!(matches!(result, Err(FrameError::InvalidPreamble(0xFF))));
    }

    #[test]
    fn test_decode_checksum_mismatch_consumes_frame() {
        let mut buf = BytesMut::from(&SCENARIO_WIRE[..]);
        buf[10] ^= 0x01;
        encode_frame(7, 7, b"next", &mut buf).unwrap();

        let result = decode_frame(&mut buf);
        assert!(matches!(
            result,
            Err(FrameError::ChecksumMismatch {
                msg_type: 0x0100,
                expected: 0xF086,
                computed: 0xF186
            })
        ));

        let next = decode_frame(&mut buf).unwrap().unwrap();
        assert_eq!(next.msg_type, 7);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_payload_too_large_writes_nothing() {
        let mut buf = BytesMut::new();
        let payload = vec![0u8; MAX_PAYLOAD + 1];

        let result = encode_frame(1, 1, &payload, &mut buf);
        assert!(matches!(
            result,
            Err(FrameError::PayloadTooLarge { size: 256, max: 255 })
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_max_payload_accepted() {
        let payload = vec![0xA5u8; MAX_PAYLOAD];
        let wire = encode(0xFFFF, 0xFFFF, &payload).unwrap();
        assert_eq!(wire.len(), MAX_FRAME_SIZE);

        let frame = decode_frame(&mut BytesMut::from(wire.as_ref())).unwrap().unwrap();
        assert_eq!(frame.payload_len().unwrap(), 255);
    }

    #[test]
    fn test_from_parts_rejects_oversized_payload() {
        let err = Frame::from_parts(1, 1, vec![0u8; 300], 0).unwrap_err();
        assert!(matches!(
            err,
            FrameError::PayloadTooLarge { size: 300, max: MAX_PAYLOAD }
        ));

        let frame = Frame::from_parts(1, 1, vec![0u8; 3], 0xBEEF).unwrap();
        assert_eq!(frame.payload_len().unwrap(), 3);
        assert_eq!(frame.crc, 0xBEEF);
    }

    #[test]
    fn test_payload_len_reports_oversized_payload() {
        let mut frame = Frame::new(1, 1, vec![0u8; 3]).unwrap();
        frame.payload = Bytes::from(vec![0u8; 300]);
        assert!(matches!(
            frame.payload_len(),
            Err(FrameError::PayloadTooLarge { size: 300, .. })
        ));
    }

    #[test]
    fn test_empty_payload() {
        let mut buf = BytesMut::new();
        encode_frame(0xFFFF, DEFAULT_SENDER_ID, b"", &mut buf).unwrap();
        assert_eq!(buf.as_ref(), &[0x55, 0xFF, 0xFF, 0x42, 0x00, 0x00, 0xC1, 0x62]);

        let frame = decode_frame(&mut buf).unwrap().unwrap();
        assert_eq!(frame.msg_type, 0xFFFF);
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn test_frame_new_and_encode_match_encode_frame() {
        let frame = Frame::new(0x0100, 42, vec![1u8, 2, 3]).unwrap();
        assert_eq!(frame.crc, 0xF186);
        assert_eq!(frame.wire_size(), SCENARIO_WIRE.len());

        let mut buf = BytesMut::new();
        frame.encode(&mut buf).unwrap();
        assert_eq!(buf.as_ref(), &SCENARIO_WIRE);
    }

    #[test]
    fn test_is_valid_detects_tampering() {
        let mut frame = Frame::new(0x0100, 42, vec![1u8, 2, 3]).unwrap();
        assert!(frame.is_valid());

        frame.sender_id = 43;
        assert!(!frame.is_valid());
    }

    #[test]
    fn test_frame_new_rejects_oversized() {
        let result = Frame::new(1, 1, vec![0u8; 300]);
        assert!(matches!(result, Err(FrameError::PayloadTooLarge { size: 300, .. })));
    }
}
