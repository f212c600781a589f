#![deny(unsafe_code)]

//! Byte-stream → protocol-frame buffering.
//!
//! [`FrameBuffer`] sits between the raw terminal byte stream and the
//! [`control`](../control/index.html) protocol decoder. A producer thread
//! (whatever reads the peer's stdout/stdin) calls [`FrameBuffer::push`] as
//! bytes arrive; a single consumer calls [`FrameBuffer::read_line`],
//! [`FrameBuffer::read_binary`], or [`FrameBuffer::read_line_windows`] to
//! pull out whole frames regardless of how the underlying stream happened to
//! chunk them.
//!
//! ```text
//!  producer thread                 consumer (protocol decoder)
//!  ────────────────                ───────────────────────────
//!  terminal stdin  ──push(chunk)──▶  pending: VecDeque<u8>
//!                                    read_line / read_binary
//! ```

mod windows;

pub use windows::{TRZSZ_LETTERS, is_trzsz_letter};

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};

/// Default bounded capacity of the chunk queue (`spec.md` §4.1).
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// Granularity at which a blocking read re-checks the stop flag and the
/// current timeout value, so [`FrameBuffer::set_new_timeout`] can take
/// effect without truly interrupting an in-flight wait.
const POLL_TICK: Duration = Duration::from_millis(20);

/// Errors raised while extracting frames from the byte stream.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// [`FrameBuffer::stop`] was called; no further reads will succeed.
    #[error("frame buffer stopped")]
    Stopped,
    /// Ctrl+C (`\x03`) was observed in the stream.
    #[error("interrupted by Ctrl+C")]
    Interrupted,
    /// No complete frame arrived before the configured timeout elapsed.
    #[error("timed out waiting for data")]
    Timeout,
    /// A line exceeded [`FrameBuffer::MAX_LINE_BYTES`] without a terminator.
    #[error("frame exceeded the maximum line size of {0} bytes")]
    FrameTooLarge(usize),
}

/// Byte-stream → frame buffer described in `spec.md` §4.1.
pub struct FrameBuffer {
    sender: Sender<Vec<u8>>,
    receiver: Receiver<Vec<u8>>,
    pending: Mutex<VecDeque<u8>>,
    stopped: AtomicBool,
    timeout: Mutex<Duration>,
}

impl FrameBuffer {
    /// A line (or unterminated windows CSI garbage) longer than this is
    /// treated as a protocol error rather than buffered forever.
    pub const MAX_LINE_BYTES: usize = 1024 * 1024;

    /// Creates a buffer with the default queue capacity.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY, timeout)
    }

    /// Creates a buffer with an explicit bounded queue capacity (tests use a
    /// small capacity to exercise back-pressure).
    #[must_use]
    pub fn with_capacity(capacity: usize, timeout: Duration) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            pending: Mutex::new(VecDeque::new()),
            stopped: AtomicBool::new(false),
            timeout: Mutex::new(timeout),
        }
    }

    /// Producer side: appends a chunk to the queue. Blocks if the bounded
    /// queue is full (the documented back-pressure behavior); fails
    /// silently once the buffer has been [`stop`](Self::stop)ped.
    pub fn push(&self, bytes: Vec<u8>) {
        if self.stopped.load(Ordering::Acquire) {
            return;
        }
        let _ = self.sender.send(bytes);
    }

    /// Signals readers to fail with [`FrameError::Stopped`] on their next
    /// blocking call.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    /// Discards all queued chunks and the carry-over buffer, used at
    /// teardown so a lingering producer does not leak memory.
    pub fn drain(&self) {
        while self.receiver.try_recv().is_ok() {}
        self.pending.lock().expect("pending mutex poisoned").clear();
    }

    /// Atomically swaps the pending timeout. Takes effect on the next wait
    /// iteration rather than interrupting one already in flight.
    pub fn set_new_timeout(&self, timeout: Duration) {
        *self.timeout.lock().expect("timeout mutex poisoned") = timeout;
    }

    /// Reads bytes up to but not including the next `\n`.
    ///
    /// When `may_have_junk` is true, a trailing `\r` is stripped and
    /// zero-length lines (stray newlines injected by terminal redraws) are
    /// silently skipped rather than returned.
    pub fn read_line(&self, may_have_junk: bool, timeout: Duration) -> Result<Vec<u8>, FrameError> {
        self.set_new_timeout(timeout);
        loop {
            if let Some(mut line) = self.take_delimited(b'\n')? {
                if may_have_junk {
                    if line.last() == Some(&b'\r') {
                        line.pop();
                    }
                    if line.is_empty() {
                        continue;
                    }
                }
                return Ok(line);
            }
            self.fill_pending()?;
        }
    }

    /// Reads exactly `n` bytes.
    pub fn read_binary(&self, n: usize, timeout: Duration) -> Result<Vec<u8>, FrameError> {
        self.set_new_timeout(timeout);
        loop {
            {
                let mut pending = self.pending.lock().expect("pending mutex poisoned");
                if pending.len() >= n {
                    return Ok(pending.drain(..n).collect());
                }
            }
            self.fill_pending()?;
        }
    }

    /// Reads one `!`-terminated, VT100-de-junked Windows-mode frame. See
    /// [`windows`] for the CSI-stripping state machine.
    pub fn read_line_windows(&self, timeout: Duration) -> Result<Vec<u8>, FrameError> {
        self.set_new_timeout(timeout);
        let mut scanner = windows::WindowsScanner::new();
        loop {
            {
                let mut pending = self.pending.lock().expect("pending mutex poisoned");
                if let Some(line) = scanner.feed(&mut pending)? {
                    return Ok(line);
                }
                if pending.len() > Self::MAX_LINE_BYTES {
                    return Err(FrameError::FrameTooLarge(Self::MAX_LINE_BYTES));
                }
            }
            self.fill_pending()?;
        }
    }

    /// Looks for `delim` in the pending buffer and, if found, removes and
    /// returns everything before it (the delimiter itself is discarded).
    fn take_delimited(&self, delim: u8) -> Result<Option<Vec<u8>>, FrameError> {
        let mut pending = self.pending.lock().expect("pending mutex poisoned");
        let (front, back) = pending.as_slices();
        let pos = memchr::memchr(delim, front).or_else(|| {
            memchr::memchr(delim, back).map(|p| p + front.len())
        });
        match pos {
            Some(pos) => {
                if pos > Self::MAX_LINE_BYTES {
                    return Err(FrameError::FrameTooLarge(Self::MAX_LINE_BYTES));
                }
                let line: Vec<u8> = pending.drain(..pos).collect();
                pending.pop_front(); // drop the delimiter itself
                Ok(Some(line))
            }
            None => Ok(None),
        }
    }

    /// Blocks (in small ticks, so timeout extension can land between them)
    /// until at least one more chunk is appended to `pending`.
    fn fill_pending(&self) -> Result<(), FrameError> {
        let deadline_from = Instant::now();
        loop {
            if self.stopped.load(Ordering::Acquire) {
                return Err(FrameError::Stopped);
            }
            match self.receiver.recv_timeout(POLL_TICK) {
                Ok(chunk) => {
                    self.pending
                        .lock()
                        .expect("pending mutex poisoned")
                        .extend(chunk);
                    return Ok(());
                }
                Err(RecvTimeoutError::Timeout) => {
                    let configured = *self.timeout.lock().expect("timeout mutex poisoned");
                    if deadline_from.elapsed() >= configured {
                        logging::debug_log!(Frame, 1, "no data within {configured:?}, timing out");
                        return Err(FrameError::Timeout);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => return Err(FrameError::Stopped),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_line_assembles_across_chunks() {
        let buf = FrameBuffer::new(Duration::from_secs(1));
        buf.push(b"#DA".to_vec());
        buf.push(b"TA:abc".to_vec());
        buf.push(b"\n".to_vec());
        let line = buf.read_line(false, Duration::from_secs(1)).unwrap();
        assert_eq!(line, b"#DATA:abc");
    }

    #[test]
    fn read_line_strips_carriage_return_when_junk_allowed() {
        let buf = FrameBuffer::new(Duration::from_secs(1));
        buf.push(b"#SUCC:1\r\n".to_vec());
        let line = buf.read_line(true, Duration::from_secs(1)).unwrap();
        assert_eq!(line, b"#SUCC:1");
    }

    #[test]
    fn read_line_skips_empty_junk_lines() {
        let buf = FrameBuffer::new(Duration::from_secs(1));
        buf.push(b"\n\n#NAME:f\n".to_vec());
        let line = buf.read_line(true, Duration::from_secs(1)).unwrap();
        assert_eq!(line, b"#NAME:f");
    }

    #[test]
    fn read_binary_reads_exact_length() {
        let buf = FrameBuffer::new(Duration::from_secs(1));
        buf.push(vec![1, 2, 3, 4, 5]);
        let data = buf.read_binary(3, Duration::from_secs(1)).unwrap();
        assert_eq!(data, vec![1, 2, 3]);
        let rest = buf.read_binary(2, Duration::from_secs(1)).unwrap();
        assert_eq!(rest, vec![4, 5]);
    }

    #[test]
    fn stop_fails_pending_read() {
        let buf = FrameBuffer::new(Duration::from_millis(200));
        buf.stop();
        let err = buf.read_line(false, Duration::from_millis(50));
        assert!(matches!(err, Err(FrameError::Stopped)));
    }

    #[test]
    fn read_times_out_without_data() {
        let buf = FrameBuffer::new(Duration::from_millis(50));
        let err = buf.read_line(false, Duration::from_millis(50));
        assert!(matches!(err, Err(FrameError::Timeout)));
    }

    #[test]
    fn drain_discards_queued_chunks() {
        let buf = FrameBuffer::new(Duration::from_secs(1));
        buf.push(b"partial".to_vec());
        buf.drain();
        let err = buf.read_line(false, Duration::from_millis(50));
        assert!(matches!(err, Err(FrameError::Timeout)));
    }
}
