//! The typed `#TYPE:payload[#chk]\n` control protocol trzsz multiplexes
//! over the same duplex channel as file data (`spec.md` §4.3).
//!
//! [`MessageType`] is the closed set of frame kinds; [`Record`] is the
//! generic ordered key=value payload carried by most of them; [`FrameWriter`]
//! and [`FrameReader`] serialize/parse frames, including the MD5 trailer
//! that guards every frame except `DATA`.

#![deny(unsafe_code)]

mod checksum;
mod error;
mod frame_io;
mod message;
mod record;

pub use error::ControlError;
pub use frame_io::{FrameReader, FrameWriter, Newline};
pub use message::MessageType;
pub use record::{Record, RecordError};
