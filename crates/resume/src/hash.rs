//! Hex-formatting helper shared by the sender and receiver walks.

use std::fmt::Write as _;

use digest::Digest;
use md5::Md5;

/// Renders a running MD5 digest's current state as lowercase hex, without
/// consuming the hasher, so the caller can keep feeding it further bytes.
#[must_use]
pub fn running_hex(hasher: &Md5) -> String {
    let digest = hasher.clone().finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        write!(&mut hex, "{byte:02x}").expect("write! to String cannot fail");
    }
    hex
}
