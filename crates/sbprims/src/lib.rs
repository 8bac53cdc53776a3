//! Swift Binary Protocol framing, decoding and dispatch.
//!
//! sbprims turns an arbitrarily chunked byte stream into validated SBP
//! frames and routes each frame to the callbacks registered for its
//! message type.
//!
//! # Crate Structure
//!
//! - [`frame`]: wire format, CRC, incremental decoder, encoder and
//!   blocking reader/writer adapters
//! - [`dispatch`]: message registry, callback dispatcher and the
//!   per-stream session that ties decoder and dispatcher together

/// Re-export frame types.
pub mod frame {
    pub use sbprims_frame::*;
}

/// Re-export dispatch types.
pub mod dispatch {
    pub use sbprims_dispatch::*;
}
