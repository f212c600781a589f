//! The core transfer lifecycle: negotiates config, then drives each file
//! through name negotiation, an optional resume walk, the data-plane
//! pipeline, and end-of-file verification (`spec.md` §4.6).

use std::io::{Seek, SeekFrom, Write as _};
use std::path::{Path, PathBuf};
use std::time::Duration;

use control::{FrameReader, FrameWriter, MessageType, Record};
use pipeline::PipelineContext;

use crate::config::TransferConfig;
use crate::error::TrzszError;
use crate::file_meta::{FileSink, FileSource, SourceFile, TargetFile};
use crate::platform::Platform;
use crate::state::SessionState;

fn send_record<W: std::io::Write>(
    writer: &mut FrameWriter<W>,
    ty: MessageType,
    record: &Record,
) -> Result<(), TrzszError> {
    writer.send(ty, &record.render())?;
    Ok(())
}

fn recv_expecting(reader: &FrameReader<'_>, expected: MessageType) -> Result<String, TrzszError> {
    let (ty, payload) = reader.recv()?;
    if ty == MessageType::Fail {
        return Err(TrzszError::RemoteFail(payload));
    }
    if ty != expected {
        return Err(TrzszError::ProtocolViolation(format!(
            "expected {expected}, found {ty}"
        )));
    }
    Ok(payload)
}

/// Ties the frame buffer, resume engine, data pipeline, and archive adapter
/// together into one file-transfer session.
pub struct Session<'a, W: std::io::Write> {
    writer: FrameWriter<W>,
    reader: FrameReader<'a>,
    platform: &'a dyn Platform,
    config: TransferConfig,
    state: SessionState,
    /// Per-file errors that don't abort the session increment this,
    /// surfaced at the end per `spec.md` §6's "exit code is the count of
    /// failed files capped at 255".
    failed_files: u32,
    /// Receiver-only: when set, every target file is truncated and
    /// rewritten from scratch instead of running the resume walk. Exposed
    /// to the CLI's `--overwrite` flag (`spec.md` §6); left out of
    /// [`TransferConfig`] since it is a local receiver policy, not a
    /// negotiated wire property.
    overwrite: bool,
}

impl<'a, W: std::io::Write> Session<'a, W> {
    /// Starts a new session over `writer`/`reader`, with `config` already
    /// negotiated (callers run [`Session::negotiate_config`] first if a
    /// live `CFG` exchange is required).
    #[must_use]
    pub fn new(
        writer: FrameWriter<W>,
        reader: FrameReader<'a>,
        platform: &'a dyn Platform,
        mut config: TransferConfig,
    ) -> Self {
        config.tmux_pane_columns = platform.tmux_pane_columns();
        config.tmux_output_junk = platform.tmux_pane_columns().is_some();
        Self {
            writer,
            reader,
            platform,
            config,
            state: SessionState::Handshake,
            failed_files: 0,
            overwrite: false,
        }
    }

    /// Sets the receiver's `--overwrite` policy (`spec.md` §6); a no-op on
    /// the sender side.
    #[must_use]
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Number of files that failed with a non-aborting error so far.
    #[must_use]
    pub fn failed_files(&self) -> u32 {
        self.failed_files
    }

    fn transition(&mut self, next: SessionState) {
        self.state.assert_transition(next);
        self.state = next;
    }

    /// Exchanges the negotiated [`TransferConfig`] as a `CFG` frame: the
    /// sender writes it, the receiver echoes it back via `SUCC` (so both
    /// sides are guaranteed to agree on the wire format before any file is
    /// named).
    ///
    /// # Errors
    ///
    /// Returns [`TrzszError`] if the frame can't be sent/received or the
    /// peer replies with `FAIL`.
    pub fn negotiate_config_as_sender(&mut self) -> Result<(), TrzszError> {
        send_record(&mut self.writer, MessageType::Cfg, &self.config.to_record())?;
        recv_expecting(&self.reader, MessageType::Succ)?;
        self.transition(SessionState::ConfigNegotiation);
        Ok(())
    }

    /// Receiver-side mirror of [`Session::negotiate_config_as_sender`]:
    /// reads the `CFG` frame, adopts it as the session's config, and acks.
    ///
    /// # Errors
    ///
    /// Returns [`TrzszError`] if the frame can't be read or parsed.
    pub fn negotiate_config_as_receiver(&mut self) -> Result<(), TrzszError> {
        let (ty, payload) = self.reader.recv()?;
        if ty != MessageType::Cfg {
            return Err(TrzszError::ProtocolViolation(format!(
                "expected CFG, found {ty}"
            )));
        }
        self.config = TransferConfig::from_record(&Record::parse(&payload))?;
        self.writer.send(MessageType::Succ, "")?;
        self.transition(SessionState::ConfigNegotiation);
        Ok(())
    }

    /// Sends every file under `paths`, logging and skipping per-file I/O
    /// errors (`spec.md` §7) rather than aborting the whole session.
    ///
    /// # Errors
    ///
    /// Returns [`TrzszError`] for any abort-worthy failure (see
    /// [`TrzszError::aborts_session`]); a per-file I/O error is recorded in
    /// [`Session::failed_files`] instead and the loop continues.
    pub fn run_sender(&mut self, paths: &[PathBuf]) -> Result<(), TrzszError> {
        for path in paths {
            match self.send_one_file(path) {
                Ok(()) => {}
                Err(err) if !err.aborts_session() => {
                    logging::info_log!(
                        Misc,
                        1,
                        "file {} failed: {err}",
                        path.display()
                    );
                    self.failed_files = self.failed_files.saturating_add(1);
                }
                Err(err) => return Err(err),
            }
        }
        self.transition(SessionState::Done);
        self.writer.send(MessageType::Exit, "")?;
        self.transition(SessionState::Exit);
        Ok(())
    }

    fn send_one_file(&mut self, path: &Path) -> Result<(), TrzszError> {
        self.transition(SessionState::Name);
        let source = SourceFile::from_path(path)?;
        send_record(&mut self.writer, MessageType::Name, &source.to_record())?;
        recv_expecting(&self.reader, MessageType::Succ)?;

        let target_size: u64 = {
            let payload = recv_expecting(&self.reader, MessageType::Size)?;
            payload.trim().parse().unwrap_or(0)
        };

        let mut handle = source.open()?;
        let mut resume_offset = 0u64;

        if !source.is_dir && target_size > 0 {
            self.transition(SessionState::Resume);
            let FileSource::Plain(file) = &mut handle else {
                unreachable!("a non-directory source always opens as FileSource::Plain")
            };
            let size = source.size.min(target_size);
            resume_offset = resume::walk_prefix_hash(
                file,
                size,
                resume::PREFIX_HASH_CHUNK,
                &mut self.writer,
                &self.reader,
            )?;
        }
        self.transition(SessionState::Data);

        let ctx = PipelineContext::new();
        let mode = self.config.transfer_mode();
        let digest = match handle {
            FileSource::Plain(file) => pipeline::run_sender(file, mode, &ctx, &mut self.writer, &self.reader)?,
            FileSource::Archive(writer) => {
                pipeline::run_sender(writer, mode, &ctx, &mut self.writer, &self.reader)?
            }
        };
        let _ = resume_offset;

        self.transition(SessionState::Verify);
        self.writer.send(MessageType::Md5, &digest)?;
        let echoed = recv_expecting(&self.reader, MessageType::Succ)?;
        if echoed.trim() != digest {
            return Err(TrzszError::Checksum {
                expected: digest,
                found: echoed,
            });
        }
        self.writer.send(MessageType::Done, "")?;
        self.transition(SessionState::Name);
        Ok(())
    }

    /// Receives every file the peer sends, writing each under `dest_dir`
    /// until an `EXIT` frame arrives.
    ///
    /// # Errors
    ///
    /// As [`Session::run_sender`]: abort-worthy failures return `Err`,
    /// per-file I/O errors increment [`Session::failed_files`] instead.
    pub fn run_receiver(&mut self, dest_dir: &Path) -> Result<(), TrzszError> {
        loop {
            self.transition(SessionState::Name);
            let (ty, payload) = self.reader.recv()?;
            match ty {
                MessageType::Exit => {
                    self.transition(SessionState::Exit);
                    return Ok(());
                }
                MessageType::Fail => return Err(TrzszError::RemoteFail(payload)),
                MessageType::Name => {}
                other => {
                    return Err(TrzszError::ProtocolViolation(format!(
                        "expected NAME or EXIT, found {other}"
                    )))
                }
            }
            match self.receive_one_file(&Record::parse(&payload), dest_dir) {
                Ok(()) => {}
                Err(err) if !err.aborts_session() => {
                    logging::info_log!(Misc, 1, "receiving a file failed: {err}");
                    self.failed_files = self.failed_files.saturating_add(1);
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn receive_one_file(&mut self, name_record: &Record, dest_dir: &Path) -> Result<(), TrzszError> {
        let target = TargetFile::from_record(name_record, dest_dir)?;
        self.writer.send(MessageType::Succ, "")?;
        let reported_size = if self.overwrite { 0 } else { target.existing_size };
        self.writer.send(MessageType::Size, &reported_size.to_string())?;

        let mut handle = target.open()?;

        if self.overwrite && !target.is_dir {
            let FileSink::Plain(file) = &mut handle else {
                unreachable!("a non-directory target always opens as FileSink::Plain")
            };
            file.set_len(0)?;
            file.seek(SeekFrom::Start(0))?;
        } else if !target.is_dir && target.existing_size > 0 {
            self.transition(SessionState::Resume);
            let FileSink::Plain(file) = &mut handle else {
                unreachable!("a non-directory target always opens as FileSink::Plain")
            };
            resume::verify_prefix_hash(file, &mut self.writer, &self.reader)?;
            file.seek(SeekFrom::Start(0))?;
            file.seek(SeekFrom::End(0))?;
        }
        self.transition(SessionState::Data);

        let ctx = PipelineContext::new();
        let mode = self.config.transfer_mode();
        let digest = match handle {
            FileSink::Plain(file) => pipeline::run_receiver(file, mode, &ctx, &self.reader, &mut self.writer)?,
            FileSink::Archive(reader) => {
                pipeline::run_receiver(reader, mode, &ctx, &self.reader, &mut self.writer)?
            }
        };

        self.transition(SessionState::Verify);
        let (ty, sender_digest) = self.reader.recv()?;
        if ty != MessageType::Md5 {
            return Err(TrzszError::ProtocolViolation(format!(
                "expected MD5, found {ty}"
            )));
        }
        if sender_digest != digest {
            self.writer.send(MessageType::Fail, "checksum mismatch")?;
            return Err(TrzszError::Checksum {
                expected: sender_digest,
                found: digest,
            });
        }
        self.writer.send(MessageType::Succ, &digest)?;
        let _ = recv_expecting(&self.reader, MessageType::Done)?;
        Ok(())
    }
}

/// Default idle-read timeout applied while the frame buffer is otherwise
/// unconfigured; callers that need the long data-phase window widen it via
/// `FrameBuffer::set_new_timeout` before [`Session::run_sender`]/
/// [`Session::run_receiver`] starts streaming a large file.
pub fn default_timeout(config: &TransferConfig) -> Duration {
    Duration::from_secs(config.timeout_secs)
}

#[cfg(test)]
mod tests {
    use std::io;

    use control::Newline as WireNewline;
    use frame::FrameBuffer;

    use super::*;
    use crate::platform::tests_support::StubPlatform;

    /// Pushes every write directly into the peer's [`FrameBuffer`], wiring
    /// two in-process [`Session`]s into a synchronous duplex with no real
    /// transport in between.
    struct PushWriter<'a> {
        target: &'a FrameBuffer,
    }

    impl io::Write for PushWriter<'_> {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.target.push(buf.to_vec());
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn config_negotiates_identically_on_both_sides() {
        let platform = StubPlatform::default();
        let to_receiver = FrameBuffer::new(Duration::from_secs(1));
        let to_sender = FrameBuffer::new(Duration::from_secs(1));

        let mut sender = Session::new(
            FrameWriter::new(PushWriter { target: &to_receiver }, WireNewline::Unix),
            FrameReader::new(&to_sender, WireNewline::Unix, Duration::from_secs(1)),
            &platform,
            TransferConfig::binary_defaults(),
        );
        let mut receiver = Session::new(
            FrameWriter::new(PushWriter { target: &to_sender }, WireNewline::Unix),
            FrameReader::new(&to_receiver, WireNewline::Unix, Duration::from_secs(1)),
            &platform,
            TransferConfig::binary_defaults(),
        );

        std::thread::scope(|scope| {
            let sender_handle = scope.spawn(|| sender.negotiate_config_as_sender());
            let receiver_handle = scope.spawn(|| receiver.negotiate_config_as_receiver());
            sender_handle.join().unwrap().unwrap();
            receiver_handle.join().unwrap().unwrap();
        });
    }

    #[test]
    fn sender_and_receiver_exchange_a_small_file_end_to_end() {
        let platform = StubPlatform::default();
        let src_dir = tempfile::tempdir().unwrap();
        let dest_dir = tempfile::tempdir().unwrap();
        std::fs::write(src_dir.path().join("hello.txt"), b"trzsz end to end").unwrap();

        let to_receiver = FrameBuffer::new(Duration::from_secs(2));
        let to_sender = FrameBuffer::new(Duration::from_secs(2));

        let mut sender = Session::new(
            FrameWriter::new(PushWriter { target: &to_receiver }, WireNewline::Unix),
            FrameReader::new(&to_sender, WireNewline::Unix, Duration::from_secs(2)),
            &platform,
            TransferConfig::binary_defaults(),
        );
        let mut receiver = Session::new(
            FrameWriter::new(PushWriter { target: &to_sender }, WireNewline::Unix),
            FrameReader::new(&to_receiver, WireNewline::Unix, Duration::from_secs(2)),
            &platform,
            TransferConfig::binary_defaults(),
        );

        let paths = vec![src_dir.path().join("hello.txt")];

        std::thread::scope(|scope| {
            let sender_handle = scope.spawn(|| {
                sender.negotiate_config_as_sender().unwrap();
                sender.run_sender(&paths).unwrap();
            });
            let receiver_handle = scope.spawn(|| {
                receiver.negotiate_config_as_receiver().unwrap();
                receiver.run_receiver(dest_dir.path()).unwrap();
            });
            sender_handle.join().unwrap();
            receiver_handle.join().unwrap();
        });

        assert_eq!(
            std::fs::read(dest_dir.path().join("hello.txt")).unwrap(),
            b"trzsz end to end"
        );
        assert_eq!(receiver.failed_files(), 0);
    }
}
