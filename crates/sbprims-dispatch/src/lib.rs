//! Message-type routing of validated SBP frames.
//!
//! A [`Session`] owns the decoder for one byte stream, the callbacks
//! registered against it, and a shared [`MessageRegistry`] that turns
//! payloads into typed messages. Nothing here is process-global: each
//! stream gets its own session.

pub mod dispatcher;
pub mod error;
pub mod registry;
pub mod session;

pub use dispatcher::{Callback, Dispatcher, Handle, Payload, Subscription};
pub use error::{
    CallbackError, CallbackFailure, DecodeError, DispatchError, EncodeError, Result,
};
pub use registry::{DecodeFn, Message, MessageRegistry};
pub use session::{FailureReport, FeedReport, Session};
