//! Error kinds for the control protocol.

use thiserror::Error;

use crate::record::RecordError;

/// Failure modes when sending or receiving a control frame.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The underlying frame buffer failed (stopped, interrupted, timed out).
    #[error(transparent)]
    Frame(#[from] frame::FrameError),
    /// The line did not look like `#TYPE:payload[#chk]`.
    #[error("malformed control frame: {0}")]
    Malformed(String),
    /// The `TYPE` token did not match any [`crate::MessageType`].
    #[error("unknown control frame type {0:?}")]
    UnknownType(String),
    /// The trailing checksum did not match the payload.
    #[error("checksum mismatch: expected {expected}, found {found}")]
    Checksum {
        /// The checksum computed from the received payload.
        expected: String,
        /// The checksum actually present on the wire.
        found: String,
    },
    /// A structured payload was missing or malformed a required field.
    #[error(transparent)]
    Record(#[from] RecordError),
    /// Writing to the terminal stdout failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
