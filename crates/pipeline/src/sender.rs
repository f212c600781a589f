//! Sender-side pipeline: read → encode → transmit, with a concurrent MD5
//! digest stage (`spec.md` §4.5 "Sender pipeline").
//!
//! The read and digest stages are independent OS threads connected by
//! bounded `crossbeam_channel`s. The encode and transmit stages are fused
//! onto the calling thread: both need the borrowed [`FrameWriter`]/
//! [`FrameReader`] pair, which isn't `'static` and so can't cross a
//! `thread::spawn` boundary.

use std::io::Read;
use std::thread;
use std::time::{Duration, Instant};

use control::{FrameReader, FrameWriter, MessageType};
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use digest::Digest;
use md5::Md5;

use crate::codec_mode::{encode_chunk, send_encoded, TransferMode};
use crate::error::PipelineError;
use crate::state::PipelineContext;
use crate::window::{next_buffer_size, RttTracker, DEFAULT_TARGET_RTT};

/// Largest slice the read stage pulls from the file per iteration
/// (`spec.md` §4.5: "reads the file in slices no larger than 32 KiB").
const READ_CHUNK: usize = 32 * 1024;

const CHANNEL_DEPTH: usize = 8;
const POLL_TICK: Duration = Duration::from_millis(50);

/// Drives one file's sender pipeline to completion and returns its MD5 hex
/// digest.
///
/// # Errors
///
/// Returns [`PipelineError::Io`] if reading the file fails,
/// [`PipelineError::Control`]/[`PipelineError::UnexpectedFrame`] if framing
/// the data plane fails, [`PipelineError::AckMismatch`] if invariant I2 is
/// violated, or [`PipelineError::Cancelled`] if another stage already
/// cancelled `ctx`.
pub fn run_sender<F, W>(
    file: F,
    mode: TransferMode,
    ctx: &PipelineContext,
    writer: &mut FrameWriter<W>,
    reader: &FrameReader<'_>,
) -> Result<String, PipelineError>
where
    F: Read + Send + 'static,
    W: std::io::Write,
{
    let (file_data_tx, file_data_rx) = bounded::<Vec<u8>>(CHANNEL_DEPTH);
    let (md5_tx, md5_rx) = bounded::<Vec<u8>>(CHANNEL_DEPTH);

    let read_ctx = ctx.clone();
    let read_handle = thread::spawn(move || read_stage(file, &read_ctx, file_data_tx, md5_tx));
    let digest_handle = thread::spawn(move || digest_stage(md5_rx));

    let transmit_result = encode_transmit_stage(&file_data_rx, &mode, ctx, writer, reader);

    let read_result = read_handle
        .join()
        .map_err(|_| PipelineError::ThreadPanicked("read"))?;
    let digest_hex = digest_handle
        .join()
        .map_err(|_| PipelineError::ThreadPanicked("digest"))?;

    if transmit_result.is_err() {
        ctx.cancel(transmit_result.as_ref().unwrap_err().to_string());
    }
    transmit_result?;
    read_result?;
    Ok(digest_hex)
}

fn read_stage<F: Read>(
    mut file: F,
    ctx: &PipelineContext,
    file_data_tx: Sender<Vec<u8>>,
    md5_tx: Sender<Vec<u8>>,
) -> Result<(), PipelineError> {
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = match file.read(&mut buf) {
            Ok(n) => n,
            Err(err) => {
                let err = PipelineError::from(err);
                ctx.cancel(err.to_string());
                return Err(err);
            }
        };
        if n == 0 {
            break;
        }
        let chunk = buf[..n].to_vec();
        if file_data_tx.send(chunk.clone()).is_err() || md5_tx.send(chunk).is_err() {
            break;
        }
    }
    Ok(())
}

fn digest_stage(md5_rx: crossbeam_channel::Receiver<Vec<u8>>) -> String {
    let mut hasher = Md5::new();
    while let Ok(chunk) = md5_rx.recv() {
        hasher.update(&chunk);
    }
    let digest = hasher.finalize();
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

fn encode_transmit_stage<W: std::io::Write>(
    file_data_rx: &crossbeam_channel::Receiver<Vec<u8>>,
    mode: &TransferMode,
    ctx: &PipelineContext,
    writer: &mut FrameWriter<W>,
    reader: &FrameReader<'_>,
) -> Result<(), PipelineError> {
    let mut pending: Vec<u8> = Vec::new();
    let mut rtt_tracker = RttTracker::new();
    let mut target_rtt = DEFAULT_TARGET_RTT;

    loop {
        if ctx.is_cancelled() {
            return Err(PipelineError::Cancelled(ctx.cause().unwrap_or_default()));
        }
        match file_data_rx.recv_timeout(POLL_TICK) {
            Ok(chunk) => {
                pending.extend_from_slice(&chunk);
                let target = usize::try_from(ctx.buffer_size()).unwrap_or(usize::MAX).max(1);
                while pending.len() >= target {
                    let send_chunk: Vec<u8> = pending.drain(..target).collect();
                    send_and_ack(&send_chunk, mode, ctx, writer, reader, &mut rtt_tracker, &mut target_rtt)?;
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                if ctx.is_cancelled() {
                    return Err(PipelineError::Cancelled(ctx.cause().unwrap_or_default()));
                }
                break;
            }
        }
    }

    if !pending.is_empty() {
        let chunk = std::mem::take(&mut pending);
        send_and_ack(&chunk, mode, ctx, writer, reader, &mut rtt_tracker, &mut target_rtt)?;
    }

    send_and_ack(&[], mode, ctx, writer, reader, &mut rtt_tracker, &mut target_rtt)
}

fn send_and_ack<W: std::io::Write>(
    chunk: &[u8],
    mode: &TransferMode,
    ctx: &PipelineContext,
    writer: &mut FrameWriter<W>,
    reader: &FrameReader<'_>,
    rtt_tracker: &mut RttTracker,
    target_rtt: &mut Duration,
) -> Result<(), PipelineError> {
    let encoded = encode_chunk(mode, chunk)?;
    let start = Instant::now();
    send_encoded(writer, &encoded)?;

    let (ty, payload) = reader.recv()?;
    if ty != MessageType::Succ {
        return Err(PipelineError::UnexpectedFrame {
            expected: MessageType::Succ,
            found: ty,
        });
    }
    let acked_len: u64 = payload
        .trim()
        .parse()
        .map_err(|_| PipelineError::MalformedAck(payload.clone()))?;
    if acked_len != chunk.len() as u64 {
        return Err(PipelineError::AckMismatch {
            expected: chunk.len() as u64,
            found: acked_len,
        });
    }

    let sample = start.elapsed();
    *target_rtt = rtt_tracker.update(sample);
    let next = next_buffer_size(ctx.buffer_size(), sample, *target_rtt, crate::state::MAX_BUFFER_CHUNK);
    ctx.set_buffer_size(next);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use control::Newline;
    use frame::FrameBuffer;

    use super::*;

    fn push_succ(buffer: &FrameBuffer, len: usize) {
        let mut wire = Vec::new();
        FrameWriter::new(&mut wire, Newline::Unix)
            .send(MessageType::Succ, &len.to_string())
            .unwrap();
        buffer.push(wire);
    }

    #[test]
    fn transfers_a_small_file_and_returns_its_digest() {
        let body = b"trzsz pipeline smoke test body".to_vec();
        let file = Cursor::new(body.clone());
        let peer = FrameBuffer::new(Duration::from_secs(1));
        // one data ack for the whole body (fits under the initial 1 KiB
        // window) plus one for the zero-length terminator.
        push_succ(&peer, body.len());
        push_succ(&peer, 0);

        let ctx = PipelineContext::new();
        let mut out = Vec::new();
        let mut writer = FrameWriter::new(&mut out, Newline::Unix);
        let reader = FrameReader::new(&peer, Newline::Unix, Duration::from_secs(1));

        let digest = run_sender(file, TransferMode::text(false), &ctx, &mut writer, &reader).unwrap();
        assert_eq!(digest.len(), 32);

        let wire = String::from_utf8(out).unwrap();
        assert!(wire.contains("#DATA:"));
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk yanked"))
        }
    }

    #[test]
    fn a_local_read_failure_cancels_instead_of_faking_a_success_terminator() {
        let peer = FrameBuffer::new(Duration::from_secs(1));

        let ctx = PipelineContext::new();
        let mut out = Vec::new();
        let mut writer = FrameWriter::new(&mut out, Newline::Unix);
        let reader = FrameReader::new(&peer, Newline::Unix, Duration::from_secs(1));

        let err = run_sender(FailingReader, TransferMode::text(false), &ctx, &mut writer, &reader).unwrap_err();
        assert!(matches!(err, PipelineError::Io(_) | PipelineError::Cancelled(_)));
        assert!(ctx.is_cancelled());

        let wire = String::from_utf8(out).unwrap();
        assert!(
            !wire.contains("#DATA:"),
            "a failed local read must never reach the wire as a data frame"
        );
    }

    #[test]
    fn ack_length_mismatch_cancels_the_context() {
        let file = Cursor::new(b"abc".to_vec());
        let peer = FrameBuffer::new(Duration::from_secs(1));
        push_succ(&peer, 999);

        let ctx = PipelineContext::new();
        let mut out = Vec::new();
        let mut writer = FrameWriter::new(&mut out, Newline::Unix);
        let reader = FrameReader::new(&peer, Newline::Unix, Duration::from_secs(1));

        let err = run_sender(file, TransferMode::text(false), &ctx, &mut writer, &reader).unwrap_err();
        assert!(matches!(err, PipelineError::AckMismatch { .. }));
        assert!(ctx.is_cancelled());
    }
}
