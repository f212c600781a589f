//! The staged, bounded-channel data pipeline that moves one file's bytes
//! across the wire once the control handshake and (optional) resume walk
//! have settled on a starting offset (`spec.md` §4.5).
//!
//! [`sender::run_sender`] and [`receiver::run_receiver`] are the two entry
//! points; both take a shared [`PipelineContext`] so either side's first
//! error cancels the whole file transfer.

#![deny(unsafe_code)]

mod codec_mode;
mod error;
pub mod receiver;
pub mod sender;
mod state;
mod window;

pub use codec_mode::{DataEncoding, EncodedChunk, TransferMode};
pub use error::PipelineError;
pub use state::{PipelineContext, INITIAL_BUFFER_SIZE, MAX_BUFFER_CHUNK};
pub use window::{next_buffer_size, RttTracker, DEFAULT_TARGET_RTT, MIN_BUFFER_CHUNK};
