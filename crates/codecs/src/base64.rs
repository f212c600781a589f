//! Standard-alphabet base64 streaming codec used for the text-mode data
//! plane, per `spec.md` §4.2.

use std::io::{self, Write};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

/// Errors raised while decoding a base64 stream.
#[derive(Debug, Error)]
pub enum Base64Error {
    /// The final group was not a valid, fully-padded base64 quantum.
    #[error("base64 stream ended on an incomplete quantum")]
    IncompleteQuantum,
    /// The base64 crate rejected a quantum as malformed.
    #[error("invalid base64 data: {0}")]
    Decode(#[from] base64::DecodeError),
    /// The underlying sink failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Streaming base64 encoder. Buffers input to 3-byte groups so encoding is
/// correct regardless of how the caller chunks its `write` calls.
pub struct Base64Encoder<W: Write> {
    inner: W,
    carry: Vec<u8>,
}

impl<W: Write> Base64Encoder<W> {
    /// Wraps `inner`, base64-encoding bytes written to this encoder before
    /// they reach it.
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            carry: Vec::with_capacity(2),
        }
    }

    /// Consumes the encoder, flushing any partial group (with standard
    /// padding) and returning the inner sink.
    ///
    /// # Errors
    ///
    /// Returns an I/O error from the inner sink.
    pub fn finish(mut self) -> io::Result<W> {
        if !self.carry.is_empty() {
            let encoded = STANDARD.encode(&self.carry);
            self.inner.write_all(encoded.as_bytes())?;
        }
        Ok(self.inner)
    }
}

impl<W: Write> Write for Base64Encoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.carry.extend_from_slice(buf);
        let whole_groups = self.carry.len() / 3;
        let take = whole_groups * 3;
        if take > 0 {
            let encoded = STANDARD.encode(&self.carry[..take]);
            self.inner.write_all(encoded.as_bytes())?;
            self.carry.drain(..take);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Streaming base64 decoder. Buffers input to 4-character groups so it
/// tolerates encoded text split arbitrarily across `write` calls (spec.md
/// §8 scenario 1: `d`, `HJ`, `6c3`, `o`, `=`).
pub struct Base64Decoder<W: Write> {
    inner: W,
    carry: Vec<u8>,
}

impl<W: Write> Base64Decoder<W> {
    /// Wraps `inner`, writing decoded bytes to it as base64 text arrives.
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            carry: Vec::with_capacity(3),
        }
    }

    /// Feeds `buf` (base64 text) through the decoder.
    ///
    /// # Errors
    ///
    /// Returns [`Base64Error`] if a complete 4-character group fails to
    /// decode.
    pub fn write(&mut self, buf: &[u8]) -> Result<(), Base64Error> {
        self.carry.extend_from_slice(buf);
        let whole_groups = self.carry.len() / 4;
        let take = whole_groups * 4;
        if take > 0 {
            let decoded = STANDARD.decode(&self.carry[..take])?;
            self.inner.write_all(&decoded)?;
            self.carry.drain(..take);
        }
        Ok(())
    }

    /// Consumes the decoder, decoding any remaining (necessarily
    /// padding-complete) final group.
    ///
    /// # Errors
    ///
    /// Returns [`Base64Error::IncompleteQuantum`] if a trailing partial
    /// group remains, or a decode/I/O error.
    pub fn finish(mut self) -> Result<W, Base64Error> {
        if !self.carry.is_empty() {
            if self.carry.len() % 4 != 0 {
                return Err(Base64Error::IncompleteQuantum);
            }
            let decoded = STANDARD.decode(&self.carry)?;
            self.inner.write_all(&decoded)?;
        }
        Ok(self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_trzsz_to_known_payload() {
        // scenario 1 from spec.md §8.
        let mut encoder = Base64Encoder::new(Vec::new());
        encoder.write_all(b"trzsz").unwrap();
        let encoded = encoder.finish().unwrap();
        assert_eq!(encoded, b"dHJ6c3o=");
    }

    #[test]
    fn decodes_when_split_across_arbitrary_chunks() {
        let mut decoder = Base64Decoder::new(Vec::new());
        for chunk in [&b"d"[..], b"HJ", b"6c3", b"o", b"="] {
            decoder.write(chunk).unwrap();
        }
        let decoded = decoder.finish().unwrap();
        assert_eq!(decoded, b"trzsz");
    }

    #[test]
    fn round_trips_arbitrary_bytes() {
        let input: Vec<u8> = (0..=255u8).collect();
        let mut encoder = Base64Encoder::new(Vec::new());
        encoder.write_all(&input).unwrap();
        let encoded = encoder.finish().unwrap();

        let mut decoder = Base64Decoder::new(Vec::new());
        decoder.write(&encoded).unwrap();
        let decoded = decoder.finish().unwrap();
        assert_eq!(decoded, input);
    }

    #[test]
    fn incomplete_trailing_group_errors() {
        let mut decoder = Base64Decoder::new(Vec::new());
        decoder.write(b"dHJ").unwrap();
        assert!(matches!(
            decoder.finish(),
            Err(Base64Error::IncompleteQuantum)
        ));
    }

    use proptest::prelude::*;

    proptest! {
        // P1: round-trip identity for arbitrary bytes, fed through the
        // encoder/decoder split across arbitrary chunk boundaries.
        #[test]
        fn round_trips_arbitrary_bytes_across_arbitrary_chunk_splits(
            input in proptest::collection::vec(any::<u8>(), 0..512),
            split_sizes in proptest::collection::vec(1usize..37, 0..32),
        ) {
            let mut encoder = Base64Encoder::new(Vec::new());
            encoder.write_all(&input).unwrap();
            let encoded = encoder.finish().unwrap();

            let mut decoder = Base64Decoder::new(Vec::new());
            let mut offset = 0;
            for size in &split_sizes {
                if offset >= encoded.len() {
                    break;
                }
                let end = (offset + size).min(encoded.len());
                decoder.write(&encoded[offset..end]).unwrap();
                offset = end;
            }
            if offset < encoded.len() {
                decoder.write(&encoded[offset..]).unwrap();
            }
            let decoded = decoder.finish().unwrap();
            prop_assert_eq!(decoded, input);
        }
    }
}
