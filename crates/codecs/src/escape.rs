//! Escape-table codec: substitutes bytes that would confuse a terminal
//! (newline, carriage return, `ESC`, and the escape marker itself) for a
//! two-byte `0xEE <second>` sequence, per `spec.md` §4.2.

use std::io::{self, Write};

use thiserror::Error;

/// The byte that introduces a two-byte escape sequence on the wire.
pub const ESCAPE_MARKER: u8 = 0xEE;

/// Errors raised while decoding an escaped stream.
#[derive(Debug, Error)]
pub enum EscapeError {
    /// `0xEE` was followed by a byte that is neither `0xEE` nor a known
    /// second byte.
    #[error("invalid escape sequence 0xEE 0x{0:02x}")]
    InvalidEscape(u8),
    /// The stream ended with a dangling `0xEE` marker and no following byte.
    #[error("stream ended with a truncated escape sequence")]
    TruncatedEscape,
    /// The underlying sink failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Which bytes get escaped: `escape_all` additionally escapes every other
/// ASCII control byte (`0x00..=0x1f`, `0x7f`), not just the bytes that would
/// otherwise break framing.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct EscapeConfig {
    /// Escape every control byte rather than only the minimal unsafe set.
    pub escape_all: bool,
}

/// Forward and inverse substitution tables built from an [`EscapeConfig`].
#[derive(Clone)]
pub struct EscapeTables {
    forward: [Option<u8>; 256],
    inverse: [Option<u8>; 256],
}

impl EscapeTables {
    /// Builds the tables for `config`.
    #[must_use]
    pub fn new(config: EscapeConfig) -> Self {
        let mut forward = [None; 256];
        forward[ESCAPE_MARKER as usize] = Some(ESCAPE_MARKER);
        forward[b'\n' as usize] = Some(b'N');
        forward[b'\r' as usize] = Some(b'R');
        forward[0x1b] = Some(b'E');

        if config.escape_all {
            for c in 0u8..=0x1f {
                let idx = c as usize;
                if forward[idx].is_none() {
                    forward[idx] = Some(c | 0x80);
                }
            }
            if forward[0x7f].is_none() {
                forward[0x7f] = Some(0x7f | 0x80);
            }
        }

        let mut inverse = [None; 256];
        for (original, second) in forward.iter().enumerate() {
            if let Some(second) = second {
                inverse[*second as usize] = Some(original as u8);
            }
        }

        Self { forward, inverse }
    }

    fn forward(&self, byte: u8) -> Option<u8> {
        self.forward[byte as usize]
    }

    fn inverse(&self, second: u8) -> Option<u8> {
        self.inverse[second as usize]
    }
}

/// Streaming escape encoder. Stateless across calls: every input byte maps
/// to one or two output bytes independent of its neighbors.
pub struct EscapeEncoder<W: Write> {
    inner: W,
    tables: EscapeTables,
    bytes_written: u64,
}

impl<W: Write> EscapeEncoder<W> {
    /// Wraps `inner`, escaping bytes written to this encoder before they
    /// reach it.
    pub fn new(inner: W, config: EscapeConfig) -> Self {
        Self {
            inner,
            tables: EscapeTables::new(config),
            bytes_written: 0,
        }
    }

    /// Total encoded bytes written to the inner sink so far.
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Consumes the encoder, returning the inner sink.
    pub fn finish(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for EscapeEncoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for &byte in buf {
            match self.tables.forward(byte) {
                Some(second) => {
                    self.inner.write_all(&[ESCAPE_MARKER, second])?;
                    self.bytes_written += 2;
                }
                None => {
                    self.inner.write_all(&[byte])?;
                    self.bytes_written += 1;
                }
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Streaming escape decoder. Carries a pending-marker flag across `write`
/// calls so an `0xEE` split across two buffers still decodes correctly.
pub struct EscapeDecoder<W: Write> {
    inner: W,
    tables: EscapeTables,
    pending_marker: bool,
}

impl<W: Write> EscapeDecoder<W> {
    /// Wraps `inner`, writing decoded bytes to it as escaped bytes arrive.
    pub fn new(inner: W, config: EscapeConfig) -> Self {
        Self {
            inner,
            tables: EscapeTables::new(config),
            pending_marker: false,
        }
    }

    /// Feeds `buf` (wire bytes) through the decoder.
    ///
    /// # Errors
    ///
    /// Returns [`EscapeError::InvalidEscape`] if a marker is followed by an
    /// unrecognized byte, or an I/O error from the inner sink.
    pub fn write(&mut self, buf: &[u8]) -> Result<(), EscapeError> {
        for &byte in buf {
            if self.pending_marker {
                self.pending_marker = false;
                match self.tables.inverse(byte) {
                    Some(original) => self.inner.write_all(&[original])?,
                    None => return Err(EscapeError::InvalidEscape(byte)),
                }
            } else if byte == ESCAPE_MARKER {
                self.pending_marker = true;
            } else {
                self.inner.write_all(&[byte])?;
            }
        }
        Ok(())
    }

    /// Consumes the decoder, returning the inner sink.
    ///
    /// # Errors
    ///
    /// Returns [`EscapeError::TruncatedEscape`] if the stream ended with a
    /// dangling `0xEE` marker.
    pub fn finish(self) -> Result<W, EscapeError> {
        if self.pending_marker {
            return Err(EscapeError::TruncatedEscape);
        }
        Ok(self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(input: &[u8], escape_all: bool) -> Vec<u8> {
        let config = EscapeConfig { escape_all };
        let mut encoder = EscapeEncoder::new(Vec::new(), config);
        encoder.write_all(input).unwrap();
        let encoded = encoder.finish();

        let mut decoder = EscapeDecoder::new(Vec::new(), config);
        decoder.write(&encoded).unwrap();
        decoder.finish().unwrap()
    }

    #[test]
    fn marker_byte_round_trips() {
        // scenario 2 from spec.md §8: 0xEE 0xEE 0xEE -> encoded doubles each
        // marker byte, decodes back to the original three bytes.
        let input = [0xEE, 0xEE, 0xEE];
        let config = EscapeConfig::default();
        let mut encoder = EscapeEncoder::new(Vec::new(), config);
        encoder.write_all(&input).unwrap();
        let encoded = encoder.finish();
        assert_eq!(encoded, vec![0xEE, 0xEE, 0xEE, 0xEE, 0xEE, 0xEE]);

        let mut decoder = EscapeDecoder::new(Vec::new(), config);
        decoder.write(&encoded).unwrap();
        assert_eq!(decoder.finish().unwrap(), input);
    }

    #[test]
    fn newline_and_escape_round_trip_minimal() {
        let input = b"line1\nline2\resc\x1bend";
        assert_eq!(round_trip(input, false), input);
    }

    #[test]
    fn escape_all_protects_every_control_byte() {
        let input: Vec<u8> = (0u8..=0x1f).chain([0x7f]).collect();
        assert_eq!(round_trip(&input, true), input);
    }

    #[test]
    fn escape_state_carries_across_write_calls() {
        let config = EscapeConfig::default();
        let mut decoder = EscapeDecoder::new(Vec::new(), config);
        decoder.write(&[ESCAPE_MARKER]).unwrap();
        decoder.write(&[b'N']).unwrap();
        assert_eq!(decoder.finish().unwrap(), vec![b'\n']);
    }

    #[test]
    fn dangling_marker_errors_on_finish() {
        let config = EscapeConfig::default();
        let mut decoder = EscapeDecoder::new(Vec::new(), config);
        decoder.write(&[ESCAPE_MARKER]).unwrap();
        assert!(matches!(decoder.finish(), Err(EscapeError::TruncatedEscape)));
    }

    #[test]
    fn unknown_second_byte_errors() {
        let config = EscapeConfig::default();
        let mut decoder = EscapeDecoder::new(Vec::new(), config);
        let err = decoder.write(&[ESCAPE_MARKER, b'Z']).unwrap_err();
        assert!(matches!(err, EscapeError::InvalidEscape(b'Z')));
    }

    use proptest::prelude::*;

    proptest! {
        // P1: round-trip identity for arbitrary bytes, both escape-table modes.
        #[test]
        fn round_trips_arbitrary_bytes(
            input in proptest::collection::vec(any::<u8>(), 0..512),
            escape_all in any::<bool>(),
        ) {
            prop_assert_eq!(round_trip(&input, escape_all), input);
        }
    }
}
