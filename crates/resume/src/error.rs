//! Error kinds for the prefix-hash resume engine.

use thiserror::Error;

use control::{ControlError, MessageType};

/// Failure modes of [`crate::sender::walk_prefix_hash`] and
/// [`crate::receiver::verify_prefix_hash`].
#[derive(Debug, Error)]
pub enum ResumeError {
    /// Reading or writing a control frame failed.
    #[error(transparent)]
    Control(#[from] ControlError),
    /// Reading or seeking the local file failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// The peer sent a frame of the wrong type for the current phase.
    #[error("expected a {expected} frame, got {found}")]
    UnexpectedFrame {
        /// The frame type this phase required.
        expected: MessageType,
        /// The frame type actually received.
        found: MessageType,
    },
    /// The peer acknowledged a step past the negotiated prefix size
    /// (`spec.md` §4.4: "on `step > size`, cancel with an invariant-violation
    /// error").
    #[error("peer acknowledged step {0} past the negotiated prefix size")]
    InvariantViolation(u64),
    /// A structured payload was missing a required field.
    #[error(transparent)]
    Record(#[from] control::RecordError),
}
