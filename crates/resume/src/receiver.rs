//! Receiver side of the prefix-hash resume walk (`spec.md` §4.4).

use std::io::{Read, Seek, SeekFrom, Write};

use control::{FrameReader, FrameWriter, MessageType, Record};
use digest::Digest;
use md5::Md5;

use crate::error::ResumeError;
use crate::hash::running_hex;
use crate::truncatable::Truncatable;

/// Reads `HASH` frames from the peer, verifying each against the local
/// file's prefix, until the terminal `over=true` frame arrives. Truncates
/// `file` at the last confirmed-matching offset and returns it.
///
/// # Errors
///
/// Returns [`ResumeError::Io`] if reading, seeking, or truncating the file
/// fails, [`ResumeError::Control`] if a frame can't be sent or parsed, and
/// [`ResumeError::UnexpectedFrame`] if the peer sends anything but `HASH`.
pub fn verify_prefix_hash<F, W>(
    file: &mut F,
    writer: &mut FrameWriter<W>,
    reader: &FrameReader<'_>,
) -> Result<u64, ResumeError>
where
    F: Truncatable,
    W: Write,
{
    let mut hasher = Md5::new();
    let mut prev_step: u64 = 0;
    let mut match_step: u64 = 0;
    let mut mismatched = false;

    loop {
        let (ty, payload) = reader.recv()?;
        if ty != MessageType::Hash {
            return Err(ResumeError::UnexpectedFrame {
                expected: MessageType::Hash,
                found: ty,
            });
        }
        let record = Record::parse(&payload);
        if record.bool_or_false("over")? {
            break;
        }
        let step: u64 = record.parsed("step")?;
        let expected_hash: String = record.field("hash")?.to_string();

        if mismatched {
            let ack = Record::builder().with("step", step).with("match", false);
            writer.send(MessageType::Succ, &ack.render())?;
            continue;
        }

        let want = usize::try_from(step - prev_step).unwrap_or(usize::MAX);
        let mut chunk = vec![0u8; want];
        file.read_exact(&mut chunk)?;
        hasher.update(&chunk);
        let matched = running_hex(&hasher) == expected_hash;

        let ack = Record::builder().with("step", step).with("match", matched);
        writer.send(MessageType::Succ, &ack.render())?;

        if matched {
            prev_step = step;
            match_step = step;
        } else {
            mismatched = true;
            match_step = prev_step;
        }
    }

    logging::debug_log!(Resume, 1, "prefix hash settled at step {match_step}, truncating to it");
    file.seek(SeekFrom::Start(match_step))?;
    file.set_len(match_step)?;
    Ok(match_step)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::time::Duration;

    use control::Newline;
    use frame::FrameBuffer;

    use super::*;

    fn hash_frame_wire(payload: &str) -> Vec<u8> {
        let mut wire = Vec::new();
        FrameWriter::new(&mut wire, Newline::Unix)
            .send(MessageType::Hash, payload)
            .unwrap();
        wire
    }

    #[test]
    fn full_match_truncates_at_full_length() {
        let body = b"abcdefghij".to_vec();
        let mut file = Cursor::new(body.clone());
        let peer = FrameBuffer::new(Duration::from_secs(1));

        let mut hasher = Md5::new();
        hasher.update(&body);
        let hash = running_hex(&hasher);
        let record = Record::builder().with("step", body.len() as u64).with("hash", hash);
        peer.push(hash_frame_wire(&record.render()));
        peer.push(hash_frame_wire(&Record::builder().with("over", true).render()));

        let mut out = Vec::new();
        let mut writer = FrameWriter::new(&mut out, Newline::Unix);
        let reader = FrameReader::new(&peer, Newline::Unix, Duration::from_secs(1));

        let result = verify_prefix_hash(&mut file, &mut writer, &reader);
        assert_eq!(result.unwrap(), body.len() as u64);
    }

    #[test]
    fn mismatch_truncates_at_last_matching_step() {
        let mut file = Cursor::new(vec![b'x'; 200]);
        let peer = FrameBuffer::new(Duration::from_secs(1));

        let mut hasher = Md5::new();
        hasher.update(vec![b'x'; 50]);
        let good_hash = running_hex(&hasher);
        peer.push(hash_frame_wire(
            &Record::builder().with("step", 50u64).with("hash", good_hash).render(),
        ));
        peer.push(hash_frame_wire(
            &Record::builder()
                .with("step", 100u64)
                .with("hash", "deadbeefdeadbeefdeadbeefdeadbeef")
                .render(),
        ));
        peer.push(hash_frame_wire(&Record::builder().with("over", true).render()));

        let mut out = Vec::new();
        let mut writer = FrameWriter::new(&mut out, Newline::Unix);
        let reader = FrameReader::new(&peer, Newline::Unix, Duration::from_secs(1));

        let result = verify_prefix_hash(&mut file, &mut writer, &reader);
        assert_eq!(result.unwrap(), 50);
        assert_eq!(file.get_ref().len(), 50);
    }
}
