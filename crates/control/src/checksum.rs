//! Payload-integrity trailer: `#` followed by the first 8 hex digits of
//! MD5(payload), carried by every non-`DATA` control frame (`spec.md` §4.3).

use std::fmt::Write as _;

use digest::Digest;
use md5::Md5;

/// Computes the 8 leading hex digits of the MD5 digest of `payload`.
#[must_use]
pub fn trailer_for(payload: &[u8]) -> String {
    let digest = Md5::digest(payload);
    let mut hex = String::with_capacity(8);
    for byte in &digest[..4] {
        write!(&mut hex, "{byte:02x}").expect("write! to String cannot fail");
    }
    hex
}
