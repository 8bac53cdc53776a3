//! Message type ranges and well-known identifiers.
//!
//! Message types 0x0000-0x00FF are implementation-defined and intended for
//! internal use between a device and its host tooling.
//! Message types 0x0100-0xFFFF belong to the standard catalog.

/// Sender ID used by host tooling when no origin is given.
pub const DEFAULT_SENDER_ID: u16 = 0x42;

/// Last message type in the implementation-defined range.
pub const IMPLEMENTATION_DEFINED_END: u16 = 0x00FF;

/// Onboard file system: read request.
pub const MSG_FILEIO_READ_REQ: u16 = 0x00A8;

/// Onboard file system: read response.
pub const MSG_FILEIO_READ_RESP: u16 = 0x00A3;

/// Onboard file system: directory listing request.
pub const MSG_FILEIO_READ_DIR_REQ: u16 = 0x00A9;

/// Onboard file system: directory listing response.
pub const MSG_FILEIO_READ_DIR_RESP: u16 = 0x00AA;

/// Onboard file system: delete a file.
pub const MSG_FILEIO_REMOVE: u16 = 0x00AC;

/// Onboard file system: write request.
pub const MSG_FILEIO_WRITE_REQ: u16 = 0x00AD;

/// Onboard file system: write response.
pub const MSG_FILEIO_WRITE_RESP: u16 = 0x00AB;

/// The namespace a message type belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgTypeRange {
    ImplementationDefined,
    Standard,
}

impl MsgTypeRange {
    pub fn of(msg_type: u16) -> Self {
        if msg_type <= IMPLEMENTATION_DEFINED_END {
            Self::ImplementationDefined
        } else {
            Self::Standard
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::ImplementationDefined => "IMPLEMENTATION",
            Self::Standard => "STANDARD",
        }
    }
}

/// Returns true if the message type is in the implementation-defined range.
pub fn is_implementation_defined(msg_type: u16) -> bool {
    MsgTypeRange::of(msg_type) == MsgTypeRange::ImplementationDefined
}
