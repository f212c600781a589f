//! Prefix-hash resumption (`spec.md` §4.4): when a partial file already
//! exists at the receiver, this walk proves how much of its prefix is
//! byte-identical to the source before the data plane sends anything,
//! without either side reading the whole file over the wire.
//!
//! [`sender::walk_prefix_hash`] drives the hash side; [`receiver::verify_prefix_hash`]
//! drives the verifying ack side. Both speak the same `HASH`/`SUCC` frames
//! through the [`control`] crate.

#![deny(unsafe_code)]

mod error;
mod hash;
pub mod receiver;
pub mod sender;
mod truncatable;

pub use error::ResumeError;
pub use sender::PREFIX_HASH_CHUNK;
pub use truncatable::Truncatable;
