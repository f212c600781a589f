//! A minimal truncation capability, since neither [`std::io::Read`] nor
//! [`std::io::Seek`] exposes one and `spec.md` §4.4 requires the receiver to
//! truncate a partial file at the verified prefix.

use std::io::{self, Cursor, Read, Seek};

/// A file-like handle that can also be shortened in place.
pub trait Truncatable: Read + Seek {
    /// Shortens (or the caller guarantees: never lengthens) the handle to
    /// exactly `len` bytes.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the underlying handle can't be resized.
    fn set_len(&mut self, len: u64) -> io::Result<()>;
}

impl Truncatable for std::fs::File {
    fn set_len(&mut self, len: u64) -> io::Result<()> {
        std::fs::File::set_len(self, len)
    }
}

impl Truncatable for Cursor<Vec<u8>> {
    fn set_len(&mut self, len: u64) -> io::Result<()> {
        let len = usize::try_from(len).unwrap_or(usize::MAX);
        self.get_mut().truncate(len);
        Ok(())
    }
}
