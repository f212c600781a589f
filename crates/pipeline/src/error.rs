//! Error kinds for the staged data pipeline.

use thiserror::Error;

use control::{ControlError, MessageType};

/// Failure modes of the sender and receiver pipelines.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Sending or receiving a control frame failed.
    #[error(transparent)]
    Control(#[from] ControlError),
    /// A codec (escape/base64/zstd) rejected a chunk.
    #[error("codec error: {0}")]
    Codec(String),
    /// Reading from or writing to the file handle failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// The peer sent a frame type the current phase did not expect.
    #[error("expected a {expected} frame, got {found}")]
    UnexpectedFrame {
        /// The frame type this phase required.
        expected: MessageType,
        /// The frame type actually received.
        found: MessageType,
    },
    /// An ack's length did not match the chunk that was sent, violating
    /// invariant I2 (`spec.md` §3).
    #[error("ack length mismatch: sent {expected} bytes, acked {found}")]
    AckMismatch {
        /// Bytes actually sent in the frame being acknowledged.
        expected: u64,
        /// Bytes the peer's ack reported.
        found: u64,
    },
    /// A `SUCC` payload was not a parseable byte count.
    #[error("malformed ack payload: {0:?}")]
    MalformedAck(String),
    /// The pipeline was cancelled, either locally or by the peer.
    #[error("pipeline cancelled: {0}")]
    Cancelled(String),
    /// A pipeline worker thread panicked.
    #[error("{0} stage thread panicked")]
    ThreadPanicked(&'static str),
}
