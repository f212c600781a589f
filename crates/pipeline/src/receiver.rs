//! Receiver-side pipeline: receive → decode → write, with a concurrent MD5
//! digest stage (`spec.md` §4.5 "Receiver pipeline").
//!
//! As in [`crate::sender`], the write and digest stages are independent OS
//! threads; the frame-reading/ack-sending half stays on the calling thread
//! since it holds the borrowed [`FrameReader`]/[`FrameWriter`] pair.

use std::io::Write;
use std::thread;

use control::{FrameReader, FrameWriter, MessageType};
use crossbeam_channel::{bounded, Receiver, Sender};
use digest::Digest;
use md5::Md5;

use crate::codec_mode::{recv_encoded, TransferMode};
use crate::error::PipelineError;
use crate::state::PipelineContext;

const CHANNEL_DEPTH: usize = 8;

/// Drives one file's receiver pipeline to completion and returns its MD5
/// hex digest, for the caller to compare against the sender's reported
/// digest (`spec.md` §4.5 "End of file").
///
/// # Errors
///
/// Returns [`PipelineError::Io`] if writing the file fails,
/// [`PipelineError::Control`]/[`PipelineError::UnexpectedFrame`] if a frame
/// can't be read or is the wrong type, or [`PipelineError::Cancelled`] if
/// `ctx` was already cancelled by another stage.
pub fn run_receiver<F, W>(
    file: F,
    mode: TransferMode,
    ctx: &PipelineContext,
    reader: &FrameReader<'_>,
    writer: &mut FrameWriter<W>,
) -> Result<String, PipelineError>
where
    F: Write + Send + 'static,
    W: std::io::Write,
{
    let (write_tx, write_rx) = bounded::<Vec<u8>>(CHANNEL_DEPTH);
    let (md5_tx, md5_rx) = bounded::<Vec<u8>>(CHANNEL_DEPTH);

    let write_handle = thread::spawn(move || write_stage(file, write_rx));
    let digest_handle = thread::spawn(move || digest_stage(md5_rx));

    let recv_result = recv_decode_stage(&mode, ctx, reader, writer, &write_tx, &md5_tx);
    drop(write_tx);
    drop(md5_tx);

    let write_result = write_handle
        .join()
        .map_err(|_| PipelineError::ThreadPanicked("write"))?;
    let digest_hex = digest_handle
        .join()
        .map_err(|_| PipelineError::ThreadPanicked("digest"))?;

    if recv_result.is_err() {
        ctx.cancel(recv_result.as_ref().unwrap_err().to_string());
    }
    recv_result?;
    write_result?;
    Ok(digest_hex)
}

fn write_stage<F: Write>(mut file: F, write_rx: Receiver<Vec<u8>>) -> Result<(), PipelineError> {
    while let Ok(chunk) = write_rx.recv() {
        file.write_all(&chunk)?;
    }
    file.flush()?;
    Ok(())
}

fn digest_stage(md5_rx: Receiver<Vec<u8>>) -> String {
    let mut hasher = Md5::new();
    while let Ok(chunk) = md5_rx.recv() {
        hasher.update(&chunk);
    }
    let digest = hasher.finalize();
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

fn recv_decode_stage<W: std::io::Write>(
    mode: &TransferMode,
    ctx: &PipelineContext,
    reader: &FrameReader<'_>,
    writer: &mut FrameWriter<W>,
    write_tx: &Sender<Vec<u8>>,
    md5_tx: &Sender<Vec<u8>>,
) -> Result<(), PipelineError> {
    loop {
        if ctx.is_cancelled() {
            return Err(PipelineError::Cancelled(ctx.cause().unwrap_or_default()));
        }
        let (ty, payload) = reader.recv()?;
        if ty != MessageType::Data {
            return Err(PipelineError::UnexpectedFrame {
                expected: MessageType::Data,
                found: ty,
            });
        }

        let bytes = recv_encoded(mode, &payload, reader)?;
        if bytes.is_empty() {
            writer.send(MessageType::Succ, "0")?;
            return Ok(());
        }

        if write_tx.send(bytes.clone()).is_err() {
            let cause = "write stage exited before the file was fully received".to_string();
            ctx.cancel(cause.clone());
            return Err(PipelineError::Cancelled(cause));
        }
        if md5_tx.send(bytes).is_err() {
            let cause = "digest stage exited before the file was fully received".to_string();
            ctx.cancel(cause.clone());
            return Err(PipelineError::Cancelled(cause));
        }
        writer.send(MessageType::Succ, &bytes.len().to_string())?;
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::time::Duration;

    use control::Newline;
    use frame::FrameBuffer;

    use super::*;

    fn push_data(buffer: &FrameBuffer, payload: &str) {
        let mut wire = Vec::new();
        FrameWriter::new(&mut wire, Newline::Unix)
            .send(MessageType::Data, payload)
            .unwrap();
        buffer.push(wire);
    }

    #[test]
    fn writes_decoded_chunks_and_acks_each_one() {
        let peer = FrameBuffer::new(Duration::from_secs(1));
        push_data(&peer, "dHJ6c3o="); // "trzsz"
        push_data(&peer, "");

        let ctx = PipelineContext::new();
        let mut out = Vec::new();
        let mut writer = FrameWriter::new(&mut out, Newline::Unix);
        let reader = FrameReader::new(&peer, Newline::Unix, Duration::from_secs(1));

        let file = Cursor::new(Vec::new());
        let digest = run_receiver(file, TransferMode::text(false), &ctx, &reader, &mut writer).unwrap();
        assert_eq!(digest.len(), 32);

        let wire = String::from_utf8(out).unwrap();
        assert!(wire.contains("#SUCC:5"));
        assert!(wire.contains("#SUCC:0"));
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn a_local_write_failure_cancels_instead_of_faking_a_succ_ack() {
        let peer = FrameBuffer::new(Duration::from_secs(1));
        // More chunks than the inter-stage channel's bounded capacity, so the
        // write stage's exit is guaranteed to close the channel before every
        // chunk has been handed off, regardless of thread scheduling.
        for _ in 0..32 {
            push_data(&peer, "dHJ6c3o="); // "trzsz"
        }
        push_data(&peer, "");

        let ctx = PipelineContext::new();
        let mut out = Vec::new();
        let mut writer = FrameWriter::new(&mut out, Newline::Unix);
        let reader = FrameReader::new(&peer, Newline::Unix, Duration::from_secs(1));

        let err = run_receiver(FailingWriter, TransferMode::text(false), &ctx, &reader, &mut writer).unwrap_err();
        assert!(matches!(err, PipelineError::Io(_) | PipelineError::Cancelled(_)));
        assert!(ctx.is_cancelled());

        let wire = String::from_utf8(out).unwrap();
        assert!(
            !wire.contains("#SUCC:0"),
            "a failed local write must never be followed by a success terminator ack"
        );
    }

    #[test]
    fn unexpected_frame_type_is_rejected() {
        let peer = FrameBuffer::new(Duration::from_secs(1));
        let mut wire = Vec::new();
        FrameWriter::new(&mut wire, Newline::Unix)
            .send(MessageType::Exit, "")
            .unwrap();
        peer.push(wire);

        let ctx = PipelineContext::new();
        let mut out = Vec::new();
        let mut writer = FrameWriter::new(&mut out, Newline::Unix);
        let reader = FrameReader::new(&peer, Newline::Unix, Duration::from_secs(1));

        let file = Cursor::new(Vec::new());
        let err = run_receiver(file, TransferMode::text(false), &ctx, &reader, &mut writer).unwrap_err();
        assert!(matches!(err, PipelineError::UnexpectedFrame { .. }));
    }
}
