//! Windows-mode line reader: strips VT100/CSI escape sequences and the
//! duplicate characters legacy Windows terminals inject when they repaint a
//! line via a cursor-home sequence, per `spec.md` §4.1.

use std::collections::VecDeque;

use crate::FrameError;

/// The lexical alphabet control-protocol payloads are built from. Anything
/// else arriving on a Windows-mode stream is terminal noise, not payload.
pub const TRZSZ_LETTERS: &str =
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789#:+/=";

/// Returns whether `byte` belongs to the [`TRZSZ_LETTERS`] alphabet.
#[must_use]
pub fn is_trzsz_letter(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'#' | b':' | b'+' | b'/' | b'=')
}

/// Incremental CSI-stripping, duplicate-suppressing scanner for one
/// `!`-terminated Windows-mode frame. Feed it pending bytes as they arrive;
/// it consumes what it can use and leaves the rest (including anything past
/// the terminator) in the queue for the caller.
#[derive(Default)]
pub(crate) struct WindowsScanner {
    in_escape: bool,
    escape_had_digit: bool,
    may_duplicate: bool,
    last_accepted: Option<u8>,
    output: Vec<u8>,
}

impl WindowsScanner {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Consumes bytes from the front of `pending` until either the `!`
    /// terminator is found (returns the decoded line) or the buffer runs
    /// dry (returns `None`, preserving state for the next call).
    pub(crate) fn feed(
        &mut self,
        pending: &mut VecDeque<u8>,
    ) -> Result<Option<Vec<u8>>, FrameError> {
        while let Some(&byte) = pending.front() {
            if byte == 0x03 {
                return Err(FrameError::Interrupted);
            }
            pending.pop_front();

            if self.in_escape {
                if byte.is_ascii_digit() {
                    self.escape_had_digit = true;
                }
                if byte.is_ascii_alphabetic() {
                    self.in_escape = false;
                    if byte == b'H' && self.escape_had_digit {
                        self.may_duplicate = true;
                    }
                    self.escape_had_digit = false;
                }
                continue;
            }

            if byte == 0x1b {
                self.in_escape = true;
                self.escape_had_digit = false;
                continue;
            }

            if byte == b'!' {
                // Swallow an immediately-available `\r`/`\n` so the next
                // frame starts clean, without blocking for bytes that have
                // not arrived yet.
                if pending.front() == Some(&b'\r') {
                    pending.pop_front();
                }
                if pending.front() == Some(&b'\n') {
                    pending.pop_front();
                }
                return Ok(Some(std::mem::take(&mut self.output)));
            }

            if is_trzsz_letter(byte) {
                if self.may_duplicate && self.last_accepted == Some(byte) {
                    self.may_duplicate = false;
                    continue;
                }
                self.may_duplicate = false;
                self.last_accepted = Some(byte);
                self.output.push(byte);
            }
            // Any other byte (stray `\n`, literal space, etc.) is terminal
            // junk and is dropped.
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_all(input: &[u8]) -> Vec<u8> {
        let mut pending: VecDeque<u8> = input.iter().copied().collect();
        let mut scanner = WindowsScanner::new();
        loop {
            if let Some(line) = scanner.feed(&mut pending).unwrap() {
                return line;
            }
            if pending.is_empty() {
                panic!("scanner starved without finding a terminator");
            }
        }
    }

    #[test]
    fn strips_csi_and_terminates_on_bang() {
        let input = b"\x1b[01;32mABC\x1b[01;34mdef!\x1b[00m";
        assert_eq!(scan_all(input), b"ABCdef");
    }

    #[test]
    fn interrupted_on_ctrl_c() {
        let mut pending: VecDeque<u8> = b"AB\x03CD!".iter().copied().collect();
        let mut scanner = WindowsScanner::new();
        let err = scanner.feed(&mut pending).unwrap_err();
        assert!(matches!(err, FrameError::Interrupted));
    }

    #[test]
    fn cursor_home_duplicate_is_dropped() {
        // Cursor-home with a digit parameter marks the next repeated letter
        // as a repaint duplicate; it should be suppressed exactly once.
        let input = b"A\x1b[1HA!";
        assert_eq!(scan_all(input), b"A");
    }

    #[test]
    fn cursor_home_without_digit_does_not_suppress() {
        let input = b"A\x1b[HA!";
        assert_eq!(scan_all(input), b"AA");
    }

    use proptest::prelude::*;

    proptest! {
        // P4: after passing through the Windows frame buffer, the payload
        // contains only bytes in the trzsz letter set (`spec.md` §8).
        #[test]
        fn decoded_line_only_contains_trzsz_letters(
            mut bytes in proptest::collection::vec(
                any::<u8>().prop_filter("no ctrl-c", |b| *b != 0x03),
                0..256,
            )
        ) {
            bytes.push(b'!');
            let line = scan_all(&bytes);
            prop_assert!(line.iter().all(|&b| is_trzsz_letter(b)));
        }
    }
}
