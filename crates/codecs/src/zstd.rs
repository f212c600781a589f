//! Zstandard streaming codec, applied to the file-data stream before the
//! escape/base64 framing layer when `TransferConfig::compress` is set.
//!
//! Mirrors the counting-writer shape of the teacher workspace's
//! `compress::zstd` module so bandwidth accounting can reuse the same code
//! path regardless of whether compression is active.

use std::io::{self, Write};

/// Default compression level, matching zstd's own default.
pub const DEFAULT_LEVEL: i32 = 3;

/// Wraps a [`Write`] sink, counting the bytes actually written to it.
struct CountingWriter<W> {
    inner: W,
    count: u64,
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Streaming zstd encoder that records the number of compressed bytes
/// produced.
pub struct ZstdEncoder<W: Write> {
    inner: zstd::stream::write::Encoder<'static, CountingWriter<W>>,
}

impl<W: Write> ZstdEncoder<W> {
    /// Wraps `inner`, compressing bytes written to this encoder before they
    /// reach it.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the zstd context fails to initialize.
    pub fn new(inner: W, level: i32) -> io::Result<Self> {
        let counting = CountingWriter { inner, count: 0 };
        let encoder = zstd::stream::write::Encoder::new(counting, level)?;
        Ok(Self { inner: encoder })
    }

    /// Number of compressed bytes produced so far.
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.inner.get_ref().count
    }

    /// Flushes the zstd frame and returns the inner sink.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the final frame cannot be flushed.
    pub fn finish(self) -> io::Result<W> {
        let counting = self.inner.finish()?;
        Ok(counting.inner)
    }
}

impl<W: Write> Write for ZstdEncoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Streaming zstd decoder: bytes written to it are decompressed and
/// forwarded to the inner sink.
pub struct ZstdDecoder<W: Write> {
    inner: zstd::stream::write::Decoder<'static, W>,
}

impl<W: Write> ZstdDecoder<W> {
    /// Wraps `inner`, decompressing bytes written to this decoder before
    /// they reach it.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the zstd context fails to initialize.
    pub fn new(inner: W) -> io::Result<Self> {
        let inner = zstd::stream::write::Decoder::new(inner)?;
        Ok(Self { inner })
    }

    /// Consumes the decoder, returning the inner sink.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the trailing frame cannot be flushed.
    pub fn finish(mut self) -> io::Result<W> {
        self.inner.flush()?;
        Ok(self.inner.into_inner())
    }
}

impl<W: Write> Write for ZstdDecoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_compressible_data() {
        let input = b"trzsz trzsz trzsz trzsz trzsz trzsz trzsz".repeat(8);

        let mut encoder = ZstdEncoder::new(Vec::new(), DEFAULT_LEVEL).unwrap();
        encoder.write_all(&input).unwrap();
        let compressed = encoder.finish().unwrap();
        assert!(compressed.len() < input.len());

        let mut decoder = ZstdDecoder::new(Vec::new()).unwrap();
        decoder.write_all(&compressed).unwrap();
        let decompressed = decoder.finish().unwrap();
        assert_eq!(decompressed, input);
    }

    #[test]
    fn round_trips_when_split_across_writes() {
        let input = b"some file contents that span more than one chunk boundary".to_vec();
        let mut encoder = ZstdEncoder::new(Vec::new(), DEFAULT_LEVEL).unwrap();
        for chunk in input.chunks(5) {
            encoder.write_all(chunk).unwrap();
        }
        let compressed = encoder.finish().unwrap();

        let mut decoder = ZstdDecoder::new(Vec::new()).unwrap();
        for chunk in compressed.chunks(7) {
            decoder.write_all(chunk).unwrap();
        }
        let decompressed = decoder.finish().unwrap();
        assert_eq!(decompressed, input);
    }
}
