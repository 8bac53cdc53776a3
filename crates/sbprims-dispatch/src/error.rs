use sbprims_frame::FrameError;

use crate::dispatcher::Handle;

/// Error type callbacks return to signal failure.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Errors produced by payload decode functions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The payload is shorter than the message layout requires.
    #[error("payload truncated (needed {needed} bytes, got {available})")]
    Truncated { needed: usize, available: usize },

    /// The payload has the right size but invalid contents.
    #[error("invalid payload: {0}")]
    Invalid(String),
}

/// Errors produced while turning a message value into a frame.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// A fixed-width field cannot hold the value.
    #[error("field {field} is {len} bytes, max {max}")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    /// The encoded payload does not fit in a frame.
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// A callback that returned an error during dispatch.
#[derive(Debug, thiserror::Error)]
#[error("callback {handle} failed on message type 0x{msg_type:04x}: {source}")]
pub struct CallbackFailure {
    pub handle: Handle,
    pub msg_type: u16,
    pub sender_id: u16,
    #[source]
    pub source: CallbackError,
}

/// Errors that can occur while registering or invoking callbacks.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The handle was never issued by this dispatcher or was already removed.
    #[error("no callback registered for handle {0}")]
    UnknownHandle(Handle),

    /// One or more callbacks failed. Every callback still ran.
    #[error("{} callback(s) failed", .0.len())]
    Callbacks(Vec<CallbackFailure>),
}

pub type Result<T> = std::result::Result<T, DispatchError>;
