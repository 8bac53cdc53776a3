//! CRC-16 used to protect every frame.
//!
//! The protocol uses CRC-CCITT with polynomial 0x1021 and a zero initial
//! value, catalogued as CRC-16/XMODEM.

use std::fmt;

static CRC_CCITT: crc::Crc<u16> = crc::Crc::<u16>::new(&crc::CRC_16_XMODEM);

/// Compute the frame CRC over a complete buffer.
pub fn crc16(bytes: &[u8]) -> u16 {
    CRC_CCITT.checksum(bytes)
}

/// Incremental frame CRC.
///
/// Feeding the same bytes through any sequence of [`Crc16::update`] calls
/// yields the same value as [`crc16`] over the concatenation.
#[derive(Clone)]
pub struct Crc16 {
    digest: crc::Digest<'static, u16>,
}

impl Crc16 {
    pub fn new() -> Self {
        Self {
            digest: CRC_CCITT.digest(),
        }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.digest.update(bytes);
    }

    /// Current CRC value without consuming the digest.
    pub fn value(&self) -> u16 {
        self.digest.clone().finalize()
    }

    pub fn finalize(self) -> u16 {
        self.digest.finalize()
    }
}

impl Default for Crc16 {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Crc16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Crc16")
            .field("value", &format_args!("0x{:04x}", self.value()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Bitwise reference, one byte at a time, MSB first.
    fn reference_crc(bytes: &[u8]) -> u16 {
        let mut crc = 0u16;
        for &byte in bytes {
            crc ^= u16::from(byte) << 8;
            for _ in 0..8 {
                crc = if crc & 0x8000 != 0 {
                    (crc << 1) ^ 0x1021
                } else {
                    crc << 1
                };
            }
        }
        crc
    }

    #[test]
    fn check_value() {
        assert_eq!(crc16(b"123456789"), 0x31C3);
    }

    #[test]
    fn empty_input_is_initial_value() {
        assert_eq!(crc16(&[]), 0x0000);
        assert_eq!(Crc16::new().finalize(), 0x0000);
    }

    #[test]
    fn matches_bitwise_reference() {
        let data: Vec<u8> = (0..=255u8).collect();
        assert_eq!(crc16(&data), reference_crc(&data));

        let header_and_payload = [0x00, 0x01, 0x2A, 0x00, 0x03, 0x01, 0x02, 0x03];
        assert_eq!(crc16(&header_and_payload), reference_crc(&header_and_payload));
        assert_eq!(crc16(&header_and_payload), 0xF186);
    }

    #[test]
    fn incremental_matches_whole_buffer() {
        let data = b"the quick brown fox jumps over the lazy dog";
        let whole = crc16(data);

        for split in 0..=data.len() {
            let mut digest = Crc16::new();
            digest.update(&data[..split]);
            digest.update(&data[split..]);
            assert_eq!(digest.finalize(), whole, "split at {split}");
        }

        let mut bytewise = Crc16::new();
        for byte in data.iter() {
            bytewise.update(std::slice::from_ref(byte));
        }
        assert_eq!(bytewise.value(), whole);
        assert_eq!(bytewise.finalize(), whole);
    }

    #[test]
    fn value_does_not_consume() {
        let mut digest = Crc16::new();
        digest.update(b"1234");
        let partial = digest.value();
        digest.update(b"56789");
        assert_eq!(partial, crc16(b"1234"));
        assert_eq!(digest.finalize(), 0x31C3);
    }
}
