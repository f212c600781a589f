//! Assembling and disassembling `#TYPE:payload[#chk]\n` wire frames on top
//! of a [`frame::FrameBuffer`] (`spec.md` §4.3, §6).

use std::io::Write;
use std::time::Duration;

use frame::FrameBuffer;

use crate::checksum;
use crate::error::ControlError;
use crate::message::MessageType;

/// Which line terminator closes a frame. Windows duplex sessions use `!`
/// immediately before the newline so the [`frame::windows`] scanner on the
/// peer's side can tell a control line apart from terminal echo.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Newline {
    /// Plain `\n`.
    Unix,
    /// `!\n`, stripped back out by [`frame::FrameBuffer::read_line_windows`].
    Windows,
}

impl Newline {
    const fn terminator(self) -> &'static str {
        match self {
            Newline::Unix => "\n",
            Newline::Windows => "!\n",
        }
    }
}

/// Serializes control frames onto any byte sink, typically the terminal's
/// stdout in duplex mode.
pub struct FrameWriter<W: Write> {
    inner: W,
    newline: Newline,
}

impl<W: Write> FrameWriter<W> {
    /// Wraps `inner`, terminating every frame the way `newline` dictates.
    pub const fn new(inner: W, newline: Newline) -> Self {
        Self { inner, newline }
    }

    /// Sends a frame carrying a string payload (`Name`, `Succ`, `Fail`,
    /// `Size`, `Numb`, `Hash`, `Exit`, `Done`, `Cfg`, or `Data` in text
    /// mode). Appends the MD5 trailer unless `ty` is exempt.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::Io`] if the underlying writer fails.
    pub fn send(&mut self, ty: MessageType, payload: &str) -> Result<(), ControlError> {
        let mut line = format!("#{}:{payload}", ty.code());
        if ty.carries_checksum_trailer() {
            line.push('#');
            line.push_str(&checksum::trailer_for(payload.as_bytes()));
        }
        line.push_str(self.newline.terminator());
        logging::debug_log!(Control, 2, "send {ty} ({} byte payload)", payload.len());
        self.inner.write_all(line.as_bytes())?;
        self.inner.flush()?;
        Ok(())
    }

    /// Sends a binary `Data` frame: a `#DATA:<n>` header line followed by
    /// exactly `n` raw bytes, with no checksum trailer and no escaping
    /// (binary mode skips the escape codec entirely, `spec.md` §4.1).
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::Io`] if the underlying writer fails.
    pub fn send_data_binary(&mut self, raw: &[u8]) -> Result<(), ControlError> {
        let mut header = format!("#{}:{}", MessageType::Data.code(), raw.len());
        header.push_str(self.newline.terminator());
        self.inner.write_all(header.as_bytes())?;
        self.inner.write_all(raw)?;
        self.inner.flush()?;
        Ok(())
    }

    /// Unwraps the writer, e.g. to hand stdout back after the session ends.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Parses control frames back out of a [`frame::FrameBuffer`].
pub struct FrameReader<'a> {
    buffer: &'a FrameBuffer,
    newline: Newline,
    timeout: Duration,
}

impl<'a> FrameReader<'a> {
    /// Reads frames out of `buffer`, expecting `newline`-style termination
    /// and failing a read after `timeout` of silence.
    pub const fn new(buffer: &'a FrameBuffer, newline: Newline, timeout: Duration) -> Self {
        Self {
            buffer,
            newline,
            timeout,
        }
    }

    /// Reads and parses the next frame's header line. For a `Data` frame in
    /// binary mode, the returned payload is the decimal byte count; the
    /// caller must follow up with [`FrameReader::recv_data_binary`].
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::Frame`] on timeout/interrupt/stop,
    /// [`ControlError::Malformed`]/[`ControlError::UnknownType`] if the line
    /// isn't a well-formed control frame, or [`ControlError::Checksum`] if
    /// the trailer doesn't match the payload.
    pub fn recv(&self) -> Result<(MessageType, String), ControlError> {
        let line = match self.newline {
            Newline::Unix => self.buffer.read_line(true, self.timeout)?,
            Newline::Windows => self.buffer.read_line_windows(self.timeout)?,
        };
        let (ty, payload) = Self::parse_line(&line)?;
        logging::debug_log!(Control, 2, "recv {ty} ({} byte payload)", payload.len());
        Ok((ty, payload))
    }

    /// Reads exactly `len` raw bytes following a binary `Data` header.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::Frame`] on timeout/interrupt/stop.
    pub fn recv_data_binary(&self, len: usize) -> Result<Vec<u8>, ControlError> {
        Ok(self.buffer.read_binary(len, self.timeout)?)
    }

    fn parse_line(line: &[u8]) -> Result<(MessageType, String), ControlError> {
        let text = std::str::from_utf8(line)
            .map_err(|_| ControlError::Malformed("frame is not valid utf-8".to_string()))?;
        let rest = text
            .strip_prefix('#')
            .ok_or_else(|| ControlError::Malformed(format!("missing '#' prefix: {text:?}")))?;
        let (ty_code, remainder) = rest
            .split_once(':')
            .ok_or_else(|| ControlError::Malformed(format!("missing ':' separator: {text:?}")))?;
        let ty = MessageType::from_code(ty_code)
            .ok_or_else(|| ControlError::UnknownType(ty_code.to_string()))?;

        if !ty.carries_checksum_trailer() {
            return Ok((ty, remainder.to_string()));
        }

        let (payload, trailer) = remainder
            .rsplit_once('#')
            .ok_or_else(|| ControlError::Malformed(format!("missing checksum trailer: {text:?}")))?;
        let expected = checksum::trailer_for(payload.as_bytes());
        if trailer != expected {
            return Err(ControlError::Checksum {
                expected,
                found: trailer.to_string(),
            });
        }
        Ok((ty, payload.to_string()))
    }
}
