use std::collections::HashMap;
use std::fmt;

use bytes::BytesMut;
use sbprims_frame::Frame;
use tracing::debug;

use crate::error::{DecodeError, EncodeError};

/// Turns a raw payload into a message value.
pub type DecodeFn<M> = Box<dyn Fn(&[u8]) -> Result<M, DecodeError> + Send + Sync>;

/// A message type with a fixed type identifier and a payload layout.
pub trait Message: Sized {
    /// Wire identifier of this message type.
    const MSG_TYPE: u16;
    /// Human-readable name, e.g. `MSG_FILEIO_READ_REQ`.
    const NAME: &'static str;

    /// Decode this message from a frame payload.
    fn from_payload(payload: &[u8]) -> Result<Self, DecodeError>;

    /// Append this message's payload bytes to `dst`.
    fn write_payload(&self, dst: &mut BytesMut) -> Result<(), EncodeError>;

    /// Build a frame carrying this message.
    ///
    /// Fails with [`EncodeError::Frame`] if the payload exceeds the frame's
    /// 255-byte limit.
    fn to_frame(&self, sender_id: u16) -> Result<Frame, EncodeError> {
        let mut payload = BytesMut::new();
        self.write_payload(&mut payload)?;
        Ok(Frame::new(Self::MSG_TYPE, sender_id, payload.freeze())?)
    }
}

struct Entry<M> {
    name: &'static str,
    decode: DecodeFn<M>,
}

/// Message-type-keyed registry of payload decoders.
///
/// Types without an entry are not an error: their frames are still
/// dispatched with the raw payload.
pub struct MessageRegistry<M> {
    entries: HashMap<u16, Entry<M>>,
}

impl<M> MessageRegistry<M> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register a decode function for a message type, replacing any previous one.
    pub fn register_decoder<F>(&mut self, msg_type: u16, name: &'static str, decode: F)
    where
        F: Fn(&[u8]) -> Result<M, DecodeError> + Send + Sync + 'static,
    {
        let previous = self.entries.insert(
            msg_type,
            Entry {
                name,
                decode: Box::new(decode),
            },
        );
        if let Some(previous) = previous {
            debug!(
                msg_type,
                replaced = previous.name,
                name,
                "replaced message decoder"
            );
        }
    }

    /// Register a [`Message`] type under its own identifier.
    pub fn register<T>(&mut self)
    where
        T: Message + Into<M> + 'static,
    {
        self.register_decoder(T::MSG_TYPE, T::NAME, |payload| {
            T::from_payload(payload).map(Into::into)
        });
    }

    /// Decode a payload. Returns `None` if no decoder is registered for the type.
    pub fn decode(&self, msg_type: u16, payload: &[u8]) -> Option<Result<M, DecodeError>> {
        self.entries
            .get(&msg_type)
            .map(|entry| (entry.decode)(payload))
    }

    /// Check if a message type has a registered decoder.
    pub fn contains(&self, msg_type: u16) -> bool {
        self.entries.contains_key(&msg_type)
    }

    /// Registered name of a message type.
    pub fn name(&self, msg_type: u16) -> Option<&'static str> {
        self.entries.get(&msg_type).map(|entry| entry.name)
    }

    /// Message types that have registered decoders, ascending.
    pub fn msg_types(&self) -> Vec<u16> {
        let mut msg_types: Vec<u16> = self.entries.keys().copied().collect();
        msg_types.sort_unstable();
        msg_types
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<M> Default for MessageRegistry<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> fmt::Debug for MessageRegistry<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entries: Vec<(u16, &str)> = self
            .entries
            .iter()
            .map(|(msg_type, entry)| (*msg_type, entry.name))
            .collect();
        entries.sort_unstable();
        f.debug_struct("MessageRegistry")
            .field("entries", &entries)
            .finish()
    }
}
