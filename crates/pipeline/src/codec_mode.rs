//! Per-chunk encode/decode: wires the `codecs` crate's streaming
//! encoders/decoders up as one-shot transforms over a single data-plane
//! chunk, plus the optional zstd compression layer underneath them
//! (`spec.md` §4.2, §4.5 "Encode").

use std::io::Write as _;

use codecs::{Base64Decoder, Base64Encoder, EscapeConfig, EscapeDecoder, EscapeEncoder};
use control::{FrameReader, FrameWriter, MessageType};

use crate::error::PipelineError;

/// Which substitution keeps file bytes safe on the wire. `Raw` is only
/// valid when the negotiated transfer is in binary mode, where the
/// terminal channel itself is assumed 8-bit clean.
#[derive(Clone, Debug)]
pub enum DataEncoding {
    /// No substitution: bytes are framed as-is via a length-prefixed
    /// binary `DATA` frame.
    Raw,
    /// The `0xEE`-marker escape table, also framed as length-prefixed
    /// binary (its output is not guaranteed to be valid UTF-8).
    Escape(EscapeConfig),
    /// Standard base64, framed inline as the `DATA` frame's text payload.
    Base64,
}

/// The negotiated data-plane wire format for one file transfer.
#[derive(Clone, Debug)]
pub struct TransferMode {
    /// Which of [`DataEncoding`]'s three substitutions frames a chunk.
    pub encoding: DataEncoding,
    /// Whether chunks are zstd-compressed before `encoding` is applied.
    pub compress: bool,
}

impl TransferMode {
    /// The common case: no substitution and no compression, assuming a
    /// binary-clean channel.
    #[must_use]
    pub const fn binary() -> Self {
        Self {
            encoding: DataEncoding::Raw,
            compress: false,
        }
    }

    /// Base64 framing, the default for a terminal channel that is not
    /// known to be binary-clean.
    #[must_use]
    pub const fn text(compress: bool) -> Self {
        Self {
            encoding: DataEncoding::Base64,
            compress,
        }
    }
}

/// A chunk after [`encode_chunk`] has applied compression and framing
/// substitution, ready to hand to a [`FrameWriter`].
pub enum EncodedChunk {
    /// Sent via `FrameWriter::send(MessageType::Data, ..)`.
    Text(String),
    /// Sent via `FrameWriter::send_data_binary(..)`.
    Bytes(Vec<u8>),
}

fn compress_if_enabled(mode: &TransferMode, raw: &[u8]) -> Result<Vec<u8>, PipelineError> {
    if !mode.compress {
        return Ok(raw.to_vec());
    }
    #[cfg(feature = "zstd")]
    {
        let mut encoder = codecs::ZstdEncoder::new(Vec::new(), codecs::zstd::DEFAULT_LEVEL)
            .map_err(|e| PipelineError::Codec(e.to_string()))?;
        encoder
            .write_all(raw)
            .map_err(|e| PipelineError::Codec(e.to_string()))?;
        encoder.finish().map_err(|e| PipelineError::Codec(e.to_string()))
    }
    #[cfg(not(feature = "zstd"))]
    {
        Err(PipelineError::Codec(
            "compress was requested but the zstd feature is not enabled".to_string(),
        ))
    }
}

fn decompress_if_enabled(mode: &TransferMode, bytes: Vec<u8>) -> Result<Vec<u8>, PipelineError> {
    if !mode.compress {
        return Ok(bytes);
    }
    #[cfg(feature = "zstd")]
    {
        let mut decoder =
            codecs::ZstdDecoder::new(Vec::new()).map_err(|e| PipelineError::Codec(e.to_string()))?;
        decoder
            .write_all(&bytes)
            .map_err(|e| PipelineError::Codec(e.to_string()))?;
        decoder.finish().map_err(|e| PipelineError::Codec(e.to_string()))
    }
    #[cfg(not(feature = "zstd"))]
    {
        Err(PipelineError::Codec(
            "compress was requested but the zstd feature is not enabled".to_string(),
        ))
    }
}

/// Applies compression (if configured) then `mode.encoding`'s framing
/// substitution to one data-plane chunk.
///
/// # Errors
///
/// Returns [`PipelineError::Codec`] if compression is requested without the
/// `zstd` feature, or if the escape/base64 encoder fails.
pub fn encode_chunk(mode: &TransferMode, raw: &[u8]) -> Result<EncodedChunk, PipelineError> {
    let bytes = compress_if_enabled(mode, raw)?;
    match &mode.encoding {
        DataEncoding::Raw => Ok(EncodedChunk::Bytes(bytes)),
        DataEncoding::Escape(config) => {
            let mut encoder = EscapeEncoder::new(Vec::new(), *config);
            encoder
                .write_all(&bytes)
                .map_err(|e| PipelineError::Codec(e.to_string()))?;
            Ok(EncodedChunk::Bytes(encoder.finish()))
        }
        DataEncoding::Base64 => {
            let mut encoder = Base64Encoder::new(Vec::new());
            encoder
                .write_all(&bytes)
                .map_err(|e| PipelineError::Codec(e.to_string()))?;
            let out = encoder.finish().map_err(|e| PipelineError::Codec(e.to_string()))?;
            let text = String::from_utf8(out).expect("base64 output is always ASCII");
            Ok(EncodedChunk::Text(text))
        }
    }
}

/// Writes one already-[`encode_chunk`]-ed chunk as a `DATA` frame.
///
/// # Errors
///
/// Returns [`PipelineError::Control`] if the underlying writer fails.
pub fn send_encoded<W: std::io::Write>(
    writer: &mut FrameWriter<W>,
    encoded: &EncodedChunk,
) -> Result<(), PipelineError> {
    match encoded {
        EncodedChunk::Text(text) => writer.send(MessageType::Data, text)?,
        EncodedChunk::Bytes(bytes) => writer.send_data_binary(bytes)?,
    }
    Ok(())
}

/// Reads one `DATA` frame's payload per `mode.encoding` and reverses
/// compression, yielding the original file bytes. `header_payload` is the
/// string [`FrameReader::recv`] already returned alongside `MessageType::Data`.
///
/// # Errors
///
/// Returns [`PipelineError::Control`] if reading the binary tail fails,
/// [`PipelineError::MalformedAck`] if a binary-mode length header isn't a
/// valid integer, or [`PipelineError::Codec`] if decoding fails.
pub fn recv_encoded(
    mode: &TransferMode,
    header_payload: &str,
    reader: &FrameReader<'_>,
) -> Result<Vec<u8>, PipelineError> {
    let bytes = match &mode.encoding {
        DataEncoding::Raw => {
            let len: usize = header_payload
                .trim()
                .parse()
                .map_err(|_| PipelineError::MalformedAck(header_payload.to_string()))?;
            reader.recv_data_binary(len)?
        }
        DataEncoding::Escape(config) => {
            let len: usize = header_payload
                .trim()
                .parse()
                .map_err(|_| PipelineError::MalformedAck(header_payload.to_string()))?;
            let raw = reader.recv_data_binary(len)?;
            let mut decoder = EscapeDecoder::new(Vec::new(), *config);
            decoder.write(&raw).map_err(|e| PipelineError::Codec(e.to_string()))?;
            decoder.finish().map_err(|e| PipelineError::Codec(e.to_string()))?
        }
        DataEncoding::Base64 => {
            let mut decoder = Base64Decoder::new(Vec::new());
            decoder
                .write(header_payload.as_bytes())
                .map_err(|e| PipelineError::Codec(e.to_string()))?;
            decoder.finish().map_err(|e| PipelineError::Codec(e.to_string()))?
        }
    };
    decompress_if_enabled(mode, bytes)
}
