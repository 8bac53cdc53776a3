use std::sync::Arc;

use sbprims_frame::{ChecksumMismatch, DecodeEvent, DecoderStats, Frame, FrameConfig, FrameDecoder};
use tracing::{trace, warn};

use crate::dispatcher::{Dispatcher, Handle, Payload, Subscription};
use crate::error::{CallbackError, CallbackFailure, DecodeError, DispatchError, Result};
use crate::registry::MessageRegistry;

/// Something that went wrong while processing fed bytes.
///
/// None of these stop the session; they are reported for observability.
#[derive(Debug)]
pub enum FailureReport {
    /// A complete frame was discarded because its CRC did not match.
    ChecksumMismatch(ChecksumMismatch),
    /// The registry's decoder rejected a valid frame's payload. The frame
    /// was still dispatched with its raw payload.
    Decode {
        msg_type: u16,
        sender_id: u16,
        error: DecodeError,
    },
    /// A callback returned an error.
    Callback(CallbackFailure),
}

/// Result of one [`Session::feed`] call.
#[derive(Debug, Default)]
pub struct FeedReport {
    /// Every frame that validated, in stream order.
    pub frames: Vec<Frame>,
    /// Every failure, in the order it occurred.
    pub failures: Vec<FailureReport>,
}

impl FeedReport {
    /// True if nothing failed.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of frames rejected for a CRC mismatch.
    pub fn checksum_failures(&self) -> usize {
        self.failures
            .iter()
            .filter(|failure| matches!(failure, FailureReport::ChecksumMismatch(_)))
            .count()
    }
}

/// Decoder, dispatcher and registry for one byte stream.
///
/// A session assumes exclusive access: callers feeding it from several
/// threads must serialize the calls themselves.
#[derive(Debug)]
pub struct Session<M> {
    decoder: FrameDecoder,
    dispatcher: Dispatcher<M>,
    registry: Arc<MessageRegistry<M>>,
}

impl<M> Session<M> {
    /// Create a session with default decoder configuration.
    pub fn new(registry: Arc<MessageRegistry<M>>) -> Self {
        Self::with_config(registry, FrameConfig::default())
    }

    /// Create a session with explicit decoder configuration.
    pub fn with_config(registry: Arc<MessageRegistry<M>>, config: FrameConfig) -> Self {
        Self {
            decoder: FrameDecoder::with_config(config),
            dispatcher: Dispatcher::new(),
            registry,
        }
    }

    /// Register a callback for a message type or for every frame.
    pub fn register<F>(&mut self, subscription: Subscription, callback: F) -> Handle
    where
        F: FnMut(&Frame, Payload<'_, M>) -> std::result::Result<(), CallbackError> + Send + 'static,
    {
        self.dispatcher.register(subscription, callback)
    }

    /// Remove a callback.
    pub fn deregister(&mut self, handle: Handle) -> Result<()> {
        self.dispatcher.deregister(handle)
    }

    /// Feed bytes from the stream.
    ///
    /// Each frame completed by these bytes is decoded through the registry
    /// and dispatched before the next byte is examined. Incomplete frames
    /// are kept for the next call.
    pub fn feed(&mut self, bytes: &[u8]) -> FeedReport {
        let mut report = FeedReport::default();
        let Self {
            decoder,
            dispatcher,
            registry,
        } = self;

        decoder.feed_with(bytes, |event| match event {
            DecodeEvent::Frame(frame) => {
                deliver(dispatcher, registry, &frame, &mut report.failures);
                report.frames.push(frame);
            }
            DecodeEvent::ChecksumMismatch(mismatch) => {
                report
                    .failures
                    .push(FailureReport::ChecksumMismatch(mismatch));
            }
        });

        report
    }

    /// Abandon any partially received frame. Callbacks stay registered.
    pub fn reset(&mut self) {
        self.decoder.reset();
    }

    pub fn stats(&self) -> DecoderStats {
        self.decoder.stats()
    }

    pub fn decoder(&self) -> &FrameDecoder {
        &self.decoder
    }

    pub fn dispatcher(&self) -> &Dispatcher<M> {
        &self.dispatcher
    }

    pub fn registry(&self) -> &Arc<MessageRegistry<M>> {
        &self.registry
    }
}

fn deliver<M>(
    dispatcher: &mut Dispatcher<M>,
    registry: &MessageRegistry<M>,
    frame: &Frame,
    failures: &mut Vec<FailureReport>,
) {
    let decoded = match registry.decode(frame.msg_type, &frame.payload) {
        Some(Ok(message)) => Some(message),
        Some(Err(error)) => {
            warn!(msg_type = frame.msg_type, %error, "payload decode failed");
            failures.push(FailureReport::Decode {
                msg_type: frame.msg_type,
                sender_id: frame.sender_id,
                error,
            });
            None
        }
        None => {
            trace!(msg_type = frame.msg_type, "no decoder registered");
            None
        }
    };

    let payload = match &decoded {
        Some(message) => Payload::Decoded(message),
        None => Payload::Raw(&frame.payload),
    };

    match dispatcher.dispatch(frame, payload) {
        Ok(_) => {}
        Err(DispatchError::Callbacks(callback_failures)) => {
            failures.extend(callback_failures.into_iter().map(FailureReport::Callback));
        }
        Err(other) => warn!(error = %other, "dispatch failed"),
    }
}
