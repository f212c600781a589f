//! The negotiated per-session `TransferConfig` (`spec.md` §3) and its
//! `CFG` frame wire encoding (`SPEC_FULL.md` §4.3).

use control::{Newline as WireNewline, Record, RecordError};

/// Which substitution the data plane uses for a non-binary-clean channel,
/// mirroring [`pipeline::DataEncoding`] without carrying its 256-byte
/// table — the table is reconstructed from `escape_all` when a
/// [`pipeline::TransferMode`] is built.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Encoding {
    /// The channel is 8-bit clean; bytes are framed as-is.
    Binary,
    /// The `0xEE`-marker escape table.
    Escape,
    /// Standard base64.
    Base64,
}

impl Encoding {
    const fn code(self) -> &'static str {
        match self {
            Encoding::Binary => "binary",
            Encoding::Escape => "escape",
            Encoding::Base64 => "base64",
        }
    }

    fn parse(code: &str) -> Result<Self, RecordError> {
        match code {
            "binary" => Ok(Encoding::Binary),
            "escape" => Ok(Encoding::Escape),
            "base64" => Ok(Encoding::Base64),
            other => Err(RecordError::InvalidValue("encoding", other.to_string())),
        }
    }
}

/// Negotiated once per session, before the first file's `NAME` frame
/// (`spec.md` §3 `TransferConfig`).
#[derive(Clone, Debug)]
pub struct TransferConfig {
    /// 2–4, per `spec.md` §3.
    pub protocol_version: u8,
    /// Which [`Encoding`] frames the data plane.
    pub encoding: Encoding,
    /// Only meaningful when `encoding` is [`Encoding::Escape`]: whether
    /// every byte is substituted, not just the marker byte.
    pub escape_all: bool,
    /// Whether chunks are zstd-compressed before `encoding` is applied.
    pub compress: bool,
    /// Initial adaptive-window size in bytes.
    pub buffer_size: u64,
    /// Idle-read timeout, in seconds, for both the handshake and data
    /// phases (a real session would widen this for the data phase via
    /// `FrameBuffer::set_new_timeout`).
    pub timeout_secs: u64,
    /// Ceiling the adaptive window never grows past.
    pub max_buffer_chunk: u64,
    /// Whether the remote tmux pane is known to repaint junk characters,
    /// requiring the Windows-style de-junk line reader even on a Unix
    /// peer.
    pub tmux_output_junk: bool,
    /// The enclosing tmux pane's column width, if known.
    pub tmux_pane_columns: Option<u32>,
    /// Which line terminator frames this session's frames.
    pub newline: WireNewline,
}

impl TransferConfig {
    /// A reasonable default for a binary-clean Unix pipe: raw framing, no
    /// compression, the spec's default 1 KiB initial window and 10 MiB
    /// ceiling.
    #[must_use]
    pub const fn binary_defaults() -> Self {
        Self {
            protocol_version: 4,
            encoding: Encoding::Binary,
            escape_all: false,
            compress: false,
            buffer_size: pipeline::INITIAL_BUFFER_SIZE,
            timeout_secs: 20,
            max_buffer_chunk: pipeline::MAX_BUFFER_CHUNK,
            tmux_output_junk: false,
            tmux_pane_columns: None,
            newline: WireNewline::Unix,
        }
    }

    /// Renders this config as a `CFG` frame's payload.
    #[must_use]
    pub fn to_record(&self) -> Record {
        let mut record = Record::builder()
            .with("protocol_version", self.protocol_version)
            .with("encoding", self.encoding.code())
            .with("escape_all", self.escape_all)
            .with("compress", self.compress)
            .with("buffer_size", self.buffer_size)
            .with("timeout_secs", self.timeout_secs)
            .with("max_buffer_chunk", self.max_buffer_chunk)
            .with("tmux_output_junk", self.tmux_output_junk)
            .with(
                "newline",
                match self.newline {
                    WireNewline::Unix => "unix",
                    WireNewline::Windows => "windows",
                },
            );
        if let Some(columns) = self.tmux_pane_columns {
            record = record.with("tmux_pane_columns", columns);
        }
        record
    }

    /// Parses a `CFG` frame's payload back into a [`TransferConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] if a required field is missing or
    /// unparsable.
    pub fn from_record(record: &Record) -> Result<Self, RecordError> {
        let newline = match record.field("newline")? {
            "unix" => WireNewline::Unix,
            "windows" => WireNewline::Windows,
            other => return Err(RecordError::InvalidValue("newline", other.to_string())),
        };
        Ok(Self {
            protocol_version: record.parsed("protocol_version")?,
            encoding: Encoding::parse(record.field("encoding")?)?,
            escape_all: record.bool_or_false("escape_all")?,
            compress: record.bool_or_false("compress")?,
            buffer_size: record.parsed("buffer_size")?,
            timeout_secs: record.parsed("timeout_secs")?,
            max_buffer_chunk: record.parsed("max_buffer_chunk")?,
            tmux_output_junk: record.bool_or_false("tmux_output_junk")?,
            tmux_pane_columns: record.parsed("tmux_pane_columns").ok(),
            newline,
        })
    }

    /// Builds the [`pipeline::TransferMode`] this config currently
    /// describes.
    #[must_use]
    pub fn transfer_mode(&self) -> pipeline::TransferMode {
        let data_encoding = match self.encoding {
            Encoding::Binary => pipeline::DataEncoding::Raw,
            Encoding::Escape => pipeline::DataEncoding::Escape(codecs::EscapeConfig {
                escape_all: self.escape_all,
            }),
            Encoding::Base64 => pipeline::DataEncoding::Base64,
        };
        pipeline::TransferMode {
            encoding: data_encoding,
            compress: self.compress,
        }
    }
}
