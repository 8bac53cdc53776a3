use std::collections::HashMap;
use std::fmt;

use sbprims_frame::Frame;
use tracing::warn;

use crate::error::{CallbackError, CallbackFailure, DispatchError, Result};

/// Which frames a callback receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subscription {
    /// Frames of exactly this message type.
    Type(u16),
    /// Every frame, after the type-specific callbacks have run.
    Wildcard,
}

/// Identifies one callback registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    id: u64,
    subscription: Subscription,
}

impl Handle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn subscription(&self) -> Subscription {
        self.subscription
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.subscription {
            Subscription::Type(msg_type) => write!(f, "#{} (0x{msg_type:04x})", self.id),
            Subscription::Wildcard => write!(f, "#{} (*)", self.id),
        }
    }
}

/// Payload handed to callbacks: the registry's decoded message when one
/// exists, the raw bytes otherwise.
#[derive(Debug)]
pub enum Payload<'a, M> {
    Decoded(&'a M),
    Raw(&'a [u8]),
}

impl<'a, M> Payload<'a, M> {
    pub fn decoded(&self) -> Option<&'a M> {
        match self {
            Self::Decoded(message) => Some(message),
            Self::Raw(_) => None,
        }
    }

    pub fn is_decoded(&self) -> bool {
        matches!(self, Self::Decoded(_))
    }
}

impl<M> Clone for Payload<'_, M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M> Copy for Payload<'_, M> {}

/// A registered frame handler.
///
/// Callbacks run on the thread that feeds the stream and must not block.
/// Returning `Err` reports a failure without stopping the other callbacks.
pub type Callback<M> =
    Box<dyn FnMut(&Frame, Payload<'_, M>) -> std::result::Result<(), CallbackError> + Send>;

struct Registration<M> {
    handle: Handle,
    callback: Callback<M>,
}

/// Routes frames to callbacks by message type.
pub struct Dispatcher<M> {
    next_id: u64,
    by_type: HashMap<u16, Vec<Registration<M>>>,
    wildcard: Vec<Registration<M>>,
}

impl<M> Dispatcher<M> {
    /// Create a dispatcher with no callbacks.
    pub fn new() -> Self {
        Self {
            next_id: 0,
            by_type: HashMap::new(),
            wildcard: Vec::new(),
        }
    }

    /// Register a callback. Callbacks with the same subscription run in
    /// registration order.
    pub fn register<F>(&mut self, subscription: Subscription, callback: F) -> Handle
    where
        F: FnMut(&Frame, Payload<'_, M>) -> std::result::Result<(), CallbackError> + Send + 'static,
    {
        let handle = Handle {
            id: self.next_id,
            subscription,
        };
        self.next_id += 1;

        let registration = Registration {
            handle,
            callback: Box::new(callback),
        };
        match subscription {
            Subscription::Type(msg_type) => {
                self.by_type.entry(msg_type).or_default().push(registration)
            }
            Subscription::Wildcard => self.wildcard.push(registration),
        }
        handle
    }

    /// Remove a callback.
    pub fn deregister(&mut self, handle: Handle) -> Result<()> {
        let removed = match handle.subscription {
            Subscription::Type(msg_type) => {
                let Some(registrations) = self.by_type.get_mut(&msg_type) else {
                    return Err(DispatchError::UnknownHandle(handle));
                };
                let removed = remove_handle(registrations, handle);
                if registrations.is_empty() {
                    self.by_type.remove(&msg_type);
                }
                removed
            }
            Subscription::Wildcard => remove_handle(&mut self.wildcard, handle),
        };

        if removed {
            Ok(())
        } else {
            Err(DispatchError::UnknownHandle(handle))
        }
    }

    /// Invoke the callbacks for a frame: type-specific ones first, then
    /// wildcards. Returns how many callbacks ran.
    ///
    /// All callbacks run even if some fail; failures are returned together
    /// as [`DispatchError::Callbacks`].
    pub fn dispatch(&mut self, frame: &Frame, payload: Payload<'_, M>) -> Result<usize> {
        let mut invoked = 0usize;
        let mut failures = Vec::new();

        let typed = self.by_type.get_mut(&frame.msg_type).into_iter().flatten();
        for registration in typed.chain(self.wildcard.iter_mut()) {
            invoked += 1;
            if let Err(source) = (registration.callback)(frame, payload) {
                warn!(
                    handle = %registration.handle,
                    msg_type = frame.msg_type,
                    error = %source,
                    "frame callback failed"
                );
                failures.push(CallbackFailure {
                    handle: registration.handle,
                    msg_type: frame.msg_type,
                    sender_id: frame.sender_id,
                    source,
                });
            }
        }

        if failures.is_empty() {
            Ok(invoked)
        } else {
            Err(DispatchError::Callbacks(failures))
        }
    }

    /// Number of callbacks registered for a subscription.
    pub fn callback_count(&self, subscription: Subscription) -> usize {
        match subscription {
            Subscription::Type(msg_type) => self.by_type.get(&msg_type).map_or(0, Vec::len),
            Subscription::Wildcard => self.wildcard.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty() && self.wildcard.is_empty()
    }

    /// Remove every callback. Handles issued earlier become unknown.
    pub fn clear(&mut self) {
        self.by_type.clear();
        self.wildcard.clear();
    }
}

impl<M> Default for Dispatcher<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> fmt::Debug for Dispatcher<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let typed: usize = self.by_type.values().map(Vec::len).sum();
        f.debug_struct("Dispatcher")
            .field("typed_callbacks", &typed)
            .field("wildcard_callbacks", &self.wildcard.len())
            .finish()
    }
}

fn remove_handle<M>(registrations: &mut Vec<Registration<M>>, handle: Handle) -> bool {
    let before = registrations.len();
    registrations.retain(|registration| registration.handle != handle);
    registrations.len() != before
}
