//! Sender side of the prefix-hash resume walk (`spec.md` §4.4).

use std::io::{Read, Seek, SeekFrom, Write};

use control::{FrameReader, FrameWriter, MessageType, Record};
use digest::Digest;
use md5::Md5;

use crate::error::ResumeError;
use crate::hash::running_hex;

/// Default chunk size the hash producer reads between `HASH` frames.
/// Overridable so tests can force tiny chunks (`spec.md` §8 scenario 4 uses
/// 50 bytes).
pub const PREFIX_HASH_CHUNK: u64 = 10 * 1024 * 1024;

/// Walks the first `size` bytes of `file`, exchanging `HASH`/`SUCC` frames
/// with the peer until either the whole prefix is confirmed identical or a
/// mismatch is reported. Leaves `file`'s cursor positioned at the returned
/// offset, ready for the data-plane phase to continue from there.
///
/// # Errors
///
/// Returns [`ResumeError::Io`] if reading or seeking the file fails,
/// [`ResumeError::Control`] if a frame can't be sent or parsed,
/// [`ResumeError::UnexpectedFrame`] if the peer replies with anything but
/// `SUCC`, and [`ResumeError::InvariantViolation`] if the peer acknowledges
/// a step past `size`.
pub fn walk_prefix_hash<F, W>(
    file: &mut F,
    size: u64,
    chunk_size: u64,
    writer: &mut FrameWriter<W>,
    reader: &FrameReader<'_>,
) -> Result<u64, ResumeError>
where
    F: Read + Seek,
    W: Write,
{
    let mut hasher = Md5::new();
    let mut cumulative: u64 = 0;
    let mut last_matching_step: u64 = 0;

    while cumulative < size {
        let chunk_len = chunk_size.min(size - cumulative);
        let mut chunk = vec![0u8; usize::try_from(chunk_len).unwrap_or(usize::MAX)];
        file.read_exact(&mut chunk)?;
        hasher.update(&chunk);
        cumulative += chunk_len;

        let record = Record::builder()
            .with("step", cumulative)
            .with("hash", running_hex(&hasher));
        writer.send(MessageType::Hash, &record.render())?;

        let (ty, payload) = reader.recv()?;
        if ty != MessageType::Succ {
            return Err(ResumeError::UnexpectedFrame {
                expected: MessageType::Succ,
                found: ty,
            });
        }
        let ack = Record::parse(&payload);
        let step: u64 = ack.parsed("step")?;
        let matched: bool = ack.parsed("match")?;

        if step > size {
            return Err(ResumeError::InvariantViolation(step));
        }

        if !matched {
            let match_step = last_matching_step;
            logging::debug_log!(Resume, 1, "peer reported a mismatch, rewinding to step {match_step}");
            file.seek(SeekFrom::Start(match_step))?;
            return Ok(match_step);
        }
        last_matching_step = step;
    }

    let over = Record::builder().with("over", true);
    writer.send(MessageType::Hash, &over.render())?;
    Ok(size)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::time::Duration;

    use control::Newline;
    use frame::FrameBuffer;

    use super::*;

    fn peer_buffer() -> FrameBuffer {
        FrameBuffer::new(Duration::from_secs(1))
    }

    fn push_succ(buffer: &FrameBuffer, step: u64, matched: bool) {
        let record = Record::builder().with("step", step).with("match", matched);
        let mut wire = Vec::new();
        FrameWriter::new(&mut wire, Newline::Unix)
            .send(MessageType::Succ, &record.render())
            .unwrap();
        buffer.push(wire);
    }

    #[test]
    fn full_match_reaches_size_and_sends_over() {
        let data = b"trzsz-resume-body".to_vec();
        let mut file = Cursor::new(data.clone());
        let peer = peer_buffer();
        push_succ(&peer, data.len() as u64, true);

        let mut out = Vec::new();
        let mut writer = FrameWriter::new(&mut out, Newline::Unix);
        let reader = FrameReader::new(&peer, Newline::Unix, Duration::from_secs(1));

        let result = walk_prefix_hash(&mut file, data.len() as u64, 4096, &mut writer, &reader);
        assert_eq!(result.unwrap(), data.len() as u64);
        assert!(String::from_utf8(out).unwrap().contains("over=true"));
    }

    #[test]
    fn mismatch_rewinds_to_last_matching_step() {
        let mut file = Cursor::new(vec![b'a'; 200]);
        let peer = peer_buffer();
        push_succ(&peer, 50, true);
        push_succ(&peer, 100, false);

        let mut out = Vec::new();
        let mut writer = FrameWriter::new(&mut out, Newline::Unix);
        let reader = FrameReader::new(&peer, Newline::Unix, Duration::from_secs(1));

        let result = walk_prefix_hash(&mut file, 200, 50, &mut writer, &reader);
        assert_eq!(result.unwrap(), 50);
        assert_eq!(file.stream_position().unwrap(), 50);
    }

    #[test]
    fn step_past_size_is_an_invariant_violation() {
        let mut file = Cursor::new(vec![b'a'; 50]);
        let peer = peer_buffer();
        push_succ(&peer, 999, true);

        let mut out = Vec::new();
        let mut writer = FrameWriter::new(&mut out, Newline::Unix);
        let reader = FrameReader::new(&peer, Newline::Unix, Duration::from_secs(1));

        let err = walk_prefix_hash(&mut file, 50, 50, &mut writer, &reader).unwrap_err();
        assert!(matches!(err, ResumeError::InvariantViolation(999)));
    }
}
