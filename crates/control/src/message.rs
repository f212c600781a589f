//! The `TYPE` half of a `#TYPE:payload` control frame.

use std::fmt;

/// The closed set of control-frame types recognized by the session state
/// machine (`spec.md` §4.3).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum MessageType {
    /// Name negotiation for the next file.
    Name,
    /// Positive acknowledgement (data-chunk ack, prefix-hash ack, or final
    /// MD5 ack, depending on session phase).
    Succ,
    /// A human-readable failure report from the peer.
    Fail,
    /// One chunk of file data.
    Data,
    /// The size of the next file.
    Size,
    /// Count of files in a directory manifest.
    Numb,
    /// One prefix-hash step, or the terminal `over=true` marker.
    Hash,
    /// Clean session termination.
    Exit,
    /// A single file finished successfully.
    Done,
    /// Negotiated transfer configuration, carried as a [`crate::Record`].
    Cfg,
    /// The sender's end-of-file MD5 hex digest, for the receiver to verify
    /// against its own (`spec.md` §4.5 "End of file", §6 wire sequence).
    Md5,
}

impl MessageType {
    const ALL: [MessageType; 10 + 1] = [
        MessageType::Name,
        MessageType::Succ,
        MessageType::Fail,
        MessageType::Data,
        MessageType::Size,
        MessageType::Numb,
        MessageType::Hash,
        MessageType::Exit,
        MessageType::Done,
        MessageType::Cfg,
        MessageType::Md5,
    ];

    /// The wire token (the text between `#` and `:`).
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            MessageType::Name => "NAME",
            MessageType::Succ => "SUCC",
            MessageType::Fail => "FAIL",
            MessageType::Data => "DATA",
            MessageType::Size => "SIZE",
            MessageType::Numb => "NUMB",
            MessageType::Hash => "HASH",
            MessageType::Exit => "EXIT",
            MessageType::Done => "DONE",
            MessageType::Cfg => "CFG",
            MessageType::Md5 => "MD5",
        }
    }

    /// Parses a wire token back into a [`MessageType`].
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        MessageType::ALL.into_iter().find(|ty| ty.code() == code)
    }

    /// `DATA` frames rely on the per-file MD5 rather than a per-frame
    /// checksum trailer (`spec.md` §4.3).
    #[must_use]
    pub const fn carries_checksum_trailer(self) -> bool {
        !matches!(self, MessageType::Data)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_type_round_trips_through_its_code() {
        for ty in MessageType::ALL {
            assert_eq!(MessageType::from_code(ty.code()), Some(ty));
        }
    }

    #[test]
    fn unknown_code_is_none() {
        assert_eq!(MessageType::from_code("NOPE"), None);
    }

    #[test]
    fn only_data_skips_the_checksum_trailer() {
        assert!(!MessageType::Data.carries_checksum_trailer());
        assert!(MessageType::Hash.carries_checksum_trailer());
    }
}
