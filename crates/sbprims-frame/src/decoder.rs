//! Incremental frame decoder.
//!
//! [`FrameDecoder`] accepts bytes in chunks of any size and reports each
//! complete frame as a [`DecodeEvent`]. Bytes outside a frame are skipped
//! until the next preamble. The decoder never buffers more than one frame.

use bytes::{Buf, BufMut, BytesMut};
use tracing::{debug, trace, warn};

use crate::codec::{Frame, FrameConfig, CRC_SIZE, HEADER_SIZE, MAX_FRAME_SIZE, PREAMBLE};
use crate::crc::Crc16;

/// What the decoder does with a frame's bytes after its CRC fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResyncPolicy {
    /// Resume scanning at the next unread byte. The rejected bytes are dropped.
    #[default]
    Continue,
    /// Replay the rejected header, payload and CRC bytes through the decoder,
    /// so a preamble inside a corrupted frame can start a new one.
    Rescan,
}

/// Decoder stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    AwaitingPreamble,
    ReadingHeader,
    ReadingPayload,
    ReadingChecksum,
}

/// A complete frame whose transmitted CRC did not match its contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumMismatch {
    pub msg_type: u16,
    pub sender_id: u16,
    pub length: u8,
    /// CRC carried on the wire.
    pub expected: u16,
    /// CRC computed over the received bytes.
    pub computed: u16,
}

/// Outcome of a completed frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeEvent {
    Frame(Frame),
    ChecksumMismatch(ChecksumMismatch),
}

/// Running counters for one decoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// Frames that passed CRC validation.
    pub frames: u64,
    /// Frames rejected for a CRC mismatch.
    pub checksum_failures: u64,
    /// Fed bytes skipped while waiting for a preamble. Bytes of a rejected
    /// frame that are re-examined under [`ResyncPolicy::Rescan`] were
    /// already counted as part of that frame and are not counted again.
    pub discarded_bytes: u64,
}

/// Byte-stream to frame state machine. One instance per stream.
#[derive(Debug)]
pub struct FrameDecoder {
    state: DecoderState,
    remaining: usize,
    buf: BytesMut,
    crc: Crc16,
    config: FrameConfig,
    stats: DecoderStats,
}

impl FrameDecoder {
    /// Create a new decoder with default configuration.
    pub fn new() -> Self {
        Self::with_config(FrameConfig::default())
    }

    /// Create a new decoder with explicit configuration.
    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            state: DecoderState::AwaitingPreamble,
            remaining: 1,
            buf: BytesMut::with_capacity(MAX_FRAME_SIZE),
            crc: Crc16::new(),
            config,
            stats: DecoderStats::default(),
        }
    }

    /// Feed bytes and collect every event they complete, in order.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<DecodeEvent> {
        let mut events = Vec::new();
        self.feed_with(bytes, |event| events.push(event));
        events
    }

    /// Feed bytes, handing each event to `on_event` as soon as it completes.
    ///
    /// Splitting the same byte sequence across any number of calls produces
    /// the same events in the same order.
    pub fn feed_with<F>(&mut self, bytes: &[u8], mut on_event: F)
    where
        F: FnMut(DecodeEvent),
    {
        let discarded_before = self.stats.discarded_bytes;
        for &byte in bytes {
            self.consume(byte, false, &mut on_event);
        }

        let discarded = self.stats.discarded_bytes - discarded_before;
        if discarded > 0 {
            trace!(discarded, "skipped bytes while awaiting preamble");
        }
    }

    /// Abandon any partially received frame.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.crc = Crc16::new();
        self.state = DecoderState::AwaitingPreamble;
        self.remaining = 1;
    }

    /// Current stage.
    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Bytes still needed to complete the current stage.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Bytes accumulated for the frame in progress, excluding the preamble.
    pub fn buffered(&self) -> &[u8] {
        &self.buf
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    fn consume<F>(&mut self, byte: u8, replayed: bool, on_event: &mut F)
    where
        F: FnMut(DecodeEvent),
    {
        let Some((event, replay)) = self.step(byte, replayed) else {
            return;
        };
        on_event(event);

        // Replayed bytes are strictly fewer than the frame that produced
        // them, so nested replays terminate.
        if let Some(replay) = replay {
            for &byte in replay.iter() {
                self.consume(byte, true, on_event);
            }
        }
    }

    fn step(&mut self, byte: u8, replayed: bool) -> Option<(DecodeEvent, Option<BytesMut>)> {
        match self.state {
            DecoderState::AwaitingPreamble => {
                if byte == PREAMBLE {
                    self.enter(DecoderState::ReadingHeader, HEADER_SIZE);
                } else if !replayed {
                    self.stats.discarded_bytes += 1;
                }
                None
            }
            DecoderState::ReadingHeader => {
                self.accumulate(byte, true);
                if self.remaining == 0 {
                    match self.buf[HEADER_SIZE - 1] as usize {
                        0 => self.enter(DecoderState::ReadingChecksum, CRC_SIZE),
                        len => self.enter(DecoderState::ReadingPayload, len),
                    }
                }
                None
            }
            DecoderState::ReadingPayload => {
                self.accumulate(byte, true);
                if self.remaining == 0 {
                    self.enter(DecoderState::ReadingChecksum, CRC_SIZE);
                }
                None
            }
            DecoderState::ReadingChecksum => {
                self.accumulate(byte, false);
                if self.remaining == 0 {
                    Some(self.finish_frame())
                } else {
                    None
                }
            }
        }
    }

    fn enter(&mut self, state: DecoderState, needed: usize) {
        self.state = state;
        self.remaining = needed;
    }

    fn accumulate(&mut self, byte: u8, covered: bool) {
        self.buf.put_u8(byte);
        if covered {
            self.crc.update(&[byte]);
        }
        self.remaining -= 1;
    }

    fn finish_frame(&mut self) -> (DecodeEvent, Option<BytesMut>) {
        let mut frame_bytes = self.buf.split();
        let computed = std::mem::take(&mut self.crc).finalize();
        self.enter(DecoderState::AwaitingPreamble, 1);

        let msg_type = u16::from_le_bytes([frame_bytes[0], frame_bytes[1]]);
        let sender_id = u16::from_le_bytes([frame_bytes[2], frame_bytes[3]]);
        let length = frame_bytes[4];
        let crc_at = frame_bytes.len() - CRC_SIZE;
        let expected = u16::from_le_bytes([frame_bytes[crc_at], frame_bytes[crc_at + 1]]);

        if computed != expected {
            self.stats.checksum_failures += 1;
            warn!(
                msg_type,
                sender_id,
                length,
                expected,
                computed,
                "checksum mismatch, frame discarded"
            );
            let mismatch = ChecksumMismatch {
                msg_type,
                sender_id,
                length,
                expected,
                computed,
            };
            let replay = match self.config.resync {
                ResyncPolicy::Continue => None,
                ResyncPolicy::Rescan => Some(frame_bytes),
            };
            return (DecodeEvent::ChecksumMismatch(mismatch), replay);
        }

        self.stats.frames += 1;
        debug!(msg_type, sender_id, length, "frame decoded");

        frame_bytes.truncate(crc_at);
        frame_bytes.advance(HEADER_SIZE);
        let frame = Frame::from_wire(msg_type, sender_id, frame_bytes.freeze(), expected);
        (DecodeEvent::Frame(frame), None)
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode;

    fn scenario_wire() -> Vec<u8> {
        encode(0x0100, 42, &[0x01, 0x02, 0x03]).unwrap().to_vec()
    }

    fn frames(events: &[DecodeEvent]) -> Vec<&Frame> {
        events
            .iter()
            .filter_map(|event| match event {
                DecodeEvent::Frame(frame) => Some(frame),
                DecodeEvent::ChecksumMismatch(_) => None,
            })
            .collect()
    }

    #[test]
    fn decodes_single_frame() {
        let mut decoder = FrameDecoder::new();
        let events = decoder.feed(&scenario_wire());

        assert_eq!(events.len(), 1);
        let DecodeEvent::Frame(frame) = &events[0] else {
            panic!("expected frame, got {events:?}");
        };
        assert_eq!(frame.msg_type, 0x0100);
        assert_eq!(frame.sender_id, 42);
        assert_eq!(frame.payload.as_ref(), &[1, 2, 3]);
        assert_eq!(frame.crc, 0xF186);
        assert!(frame.is_valid());
        assert_eq!(decoder.state(), DecoderState::AwaitingPreamble);
        assert!(decoder.buffered().is_empty());
    }

    #[test]
    fn split_feeds_yield_one_frame() {
        let wire = scenario_wire();
        let mut decoder = FrameDecoder::new();

        assert!(decoder.feed(&wire[..2]).is_empty());
        assert_eq!(decoder.state(), DecoderState::ReadingHeader);
        assert!(decoder.feed(&wire[2..7]).is_empty());
        assert_eq!(decoder.state(), DecoderState::ReadingPayload);
        let events = decoder.feed(&wire[7..]);

        assert_eq!(frames(&events).len(), 1);
        assert_eq!(frames(&events)[0].payload.as_ref(), &[1, 2, 3]);
    }

    #[test]
    fn tracks_stage_and_remaining() {
        let wire = scenario_wire();
        let mut decoder = FrameDecoder::new();
        assert_eq!(decoder.state(), DecoderState::AwaitingPreamble);
        assert_eq!(decoder.remaining(), 1);

        decoder.feed(&wire[..1]);
        assert_eq!(decoder.state(), DecoderState::ReadingHeader);
        assert_eq!(decoder.remaining(), HEADER_SIZE);

        decoder.feed(&wire[1..4]);
        assert_eq!(decoder.remaining(), 2);
        assert_eq!(decoder.buffered(), &wire[1..4]);

        decoder.feed(&wire[4..6]);
        assert_eq!(decoder.state(), DecoderState::ReadingPayload);
        assert_eq!(decoder.remaining(), 3);

        decoder.feed(&wire[6..9]);
        assert_eq!(decoder.state(), DecoderState::ReadingChecksum);
        assert_eq!(decoder.remaining(), CRC_SIZE);
    }

    #[test]
    fn zero_length_payload_skips_to_checksum() {
        let wire = encode(0xFFFF, 0x42, b"").unwrap();
        let mut decoder = FrameDecoder::new();

        decoder.feed(&wire[..1 + HEADER_SIZE]);
        assert_eq!(decoder.state(), DecoderState::ReadingChecksum);

        let events = decoder.feed(&wire[1 + HEADER_SIZE..]);
        let decoded = frames(&events);
        assert_eq!(decoded.len(), 1);
        assert!(decoded[0].payload.is_empty());
    }

    #[test]
    fn corrupted_checksum_then_valid_frame() {
        let mut corrupted = scenario_wire();
        let last = corrupted.len() - 1;
        corrupted[last] ^= 0x01;
        let valid = encode(0x0200, 7, b"ok").unwrap();

        let mut decoder = FrameDecoder::new();
        let first = decoder.feed(&corrupted);
        assert_eq!(
            first,
            vec![DecodeEvent::ChecksumMismatch(ChecksumMismatch {
                msg_type: 0x0100,
                sender_id: 42,
                length: 3,
                expected: 0xF086,
                computed: 0xF186,
            })]
        );

        let second = decoder.feed(&valid);
        assert_eq!(frames(&second).len(), 1);
        assert_eq!(frames(&second)[0].msg_type, 0x0200);

        let stats = decoder.stats();
        assert_eq!(stats.frames, 1);
        assert_eq!(stats.checksum_failures, 1);
    }

    #[test]
    fn noise_before_frame_is_discarded_silently() {
        let mut stream: Vec<u8> = (0..1000u32)
            .map(|i| (i.wrapping_mul(31) % 256) as u8)
            .map(|b| if b == PREAMBLE { 0x00 } else { b })
            .collect();
        stream.extend_from_slice(&scenario_wire());

        let mut decoder = FrameDecoder::new();
        let events = decoder.feed(&stream);

        assert_eq!(events.len(), 1);
        assert_eq!(frames(&events).len(), 1);
        assert_eq!(decoder.stats().discarded_bytes, 1000);
        assert_eq!(decoder.stats().checksum_failures, 0);
    }

    #[test]
    fn partial_frame_persists_across_calls() {
        let wire = scenario_wire();
        let mut decoder = FrameDecoder::new();

        for &byte in &wire[..wire.len() - 1] {
            assert!(decoder.feed(&[byte]).is_empty());
        }
        assert_eq!(decoder.state(), DecoderState::ReadingChecksum);
        assert_eq!(decoder.remaining(), 1);

        let events = decoder.feed(&wire[wire.len() - 1..]);
        assert_eq!(frames(&events).len(), 1);
    }

    #[test]
    fn reset_abandons_partial_frame() {
        let wire = scenario_wire();
        let mut decoder = FrameDecoder::new();

        decoder.feed(&wire[..6]);
        decoder.reset();
        assert_eq!(decoder.state(), DecoderState::AwaitingPreamble);
        assert!(decoder.buffered().is_empty());

        // Tail of the abandoned frame contains no preamble and is skipped.
        assert!(decoder.feed(&wire[6..]).is_empty());

        let events = decoder.feed(&wire);
        assert_eq!(frames(&events).len(), 1);
    }

    #[test]
    fn feed_with_reports_events_in_order() {
        let mut stream = scenario_wire();
        stream.extend_from_slice(&encode(0x0101, 1, b"a").unwrap());
        stream.extend_from_slice(&encode(0x0102, 2, b"bc").unwrap());

        let mut seen = Vec::new();
        let mut decoder = FrameDecoder::new();
        decoder.feed_with(&stream, |event| {
            if let DecodeEvent::Frame(frame) = event {
                seen.push(frame.msg_type);
            }
        });

        assert_eq!(seen, vec![0x0100, 0x0101, 0x0102]);
    }

    fn frame_wrapping_another() -> Vec<u8> {
        let inner = scenario_wire();
        let mut outer = encode(0x0001, 0, &inner).unwrap().to_vec();
        let last = outer.len() - 1;
        outer[last] ^= 0x01;
        outer
    }

    #[test]
    fn continue_policy_drops_embedded_frame() {
        let mut decoder = FrameDecoder::new();
        let events = decoder.feed(&frame_wrapping_another());

        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            DecodeEvent::ChecksumMismatch(ChecksumMismatch { msg_type: 0x0001, .. })
        ));
    }

    #[test]
    fn rescan_policy_recovers_embedded_frame() {
        let config = FrameConfig {
            resync: ResyncPolicy::Rescan,
            ..FrameConfig::default()
        };
        let wire = frame_wrapping_another();

        let mut decoder = FrameDecoder::with_config(config.clone());
        let events = decoder.feed(&wire);

        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], DecodeEvent::ChecksumMismatch(_)));
        let DecodeEvent::Frame(inner) = &events[1] else {
            panic!("expected embedded frame, got {events:?}");
        };
        assert_eq!(inner.msg_type, 0x0100);
        assert_eq!(inner.sender_id, 42);

        let mut bytewise = FrameDecoder::with_config(config);
        let mut bytewise_events = Vec::new();
        for byte in &wire {
            bytewise_events.extend(bytewise.feed(std::slice::from_ref(byte)));
        }
        assert_eq!(bytewise_events, events);
    }

    #[test]
    fn rescan_does_not_recount_replayed_bytes() {
        let mut wire = scenario_wire();
        for _ in 0..30 {
            let mut outer = encode(0x0001, 0, &wire).unwrap().to_vec();
            let last = outer.len() - 1;
            outer[last] ^= 0x01;
            wire = outer;
        }
        let mut stream = vec![0x01, 0x02, 0x03];
        stream.extend_from_slice(&wire);

        let mut decoder = FrameDecoder::with_config(FrameConfig {
            resync: ResyncPolicy::Rescan,
            ..FrameConfig::default()
        });
        let events = decoder.feed(&stream);

        assert!(events
            .iter()
            .any(|event| matches!(event, DecodeEvent::Frame(frame) if frame.msg_type == 0x0100)));
        assert!(decoder.stats().checksum_failures >= 30);
        assert_eq!(decoder.stats().discarded_bytes, 3);
    }
}
