//! Ties the wire codec (`control`, `frame`), the resume engine (`resume`),
//! the data-plane pipeline (`pipeline`), and the directory archiver
//! (`archive`) into the end-to-end transfer lifecycle `spec.md` describes.
//!
//! A session is built from a [`FrameWriter`](control::FrameWriter)/
//! [`FrameReader`](control::FrameReader) pair and a [`Platform`], then
//! driven through [`Session::run_sender`] or [`Session::run_receiver`].

mod config;
mod error;
mod file_meta;
mod platform;
mod session;
mod state;

pub use config::{Encoding, TransferConfig};
pub use error::{ExitKind, TrzszError};
pub use file_meta::{FileSink, FileSource, SourceFile, TargetFile};
pub use platform::{Platform, SystemPlatform};
pub use session::{default_timeout, Session};
pub use state::SessionState;
