use std::collections::VecDeque;
use std::io::{ErrorKind, Read};

use tracing::warn;

use crate::codec::{Frame, FrameConfig};
use crate::decoder::{DecodeEvent, DecoderStats, FrameDecoder};
use crate::error::{FrameError, Result};

/// Reads complete frames from any `Read` byte source.
///
/// Handles partial reads, noise and corrupted frames internally. Callers
/// always get complete, validated frames.
pub struct FrameReader<T> {
    inner: T,
    decoder: FrameDecoder,
    pending: VecDeque<DecodeEvent>,
    chunk: Vec<u8>,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        let chunk = vec![0u8; config.read_chunk_size.max(1)];
        Self {
            inner,
            decoder: FrameDecoder::with_config(config),
            pending: VecDeque::new(),
            chunk,
        }
    }

    /// Read the next validated frame (blocking).
    ///
    /// Frames that fail their CRC are logged and skipped.
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            match self.read_event()? {
                DecodeEvent::Frame(frame) => return Ok(frame),
                DecodeEvent::ChecksumMismatch(mismatch) => {
                    warn!(
                        msg_type = mismatch.msg_type,
                        sender_id = mismatch.sender_id,
                        "skipping frame with bad checksum"
                    );
                }
            }
        }
    }

    /// Read the next decoder event (blocking), including checksum failures.
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached. A
    /// partially received frame at EOF is left in the decoder.
    pub fn read_event(&mut self) -> Result<DecodeEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(event);
            }

            let read = match self.inner.read(&mut self.chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            let pending = &mut self.pending;
            self.decoder
                .feed_with(&self.chunk[..read], |event| pending.push_back(event));
        }
    }

    /// Decoder counters accumulated so far.
    pub fn stats(&self) -> DecoderStats {
        self.decoder.stats()
    }

    /// Borrow the underlying byte source.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying byte source.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner byte source.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        self.decoder.config()
    }
}
