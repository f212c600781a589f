//! The session-layer error type every lower crate's errors fold into
//! (`spec.md` §7).

use thiserror::Error;

use control::MessageType;

/// The process-exit-code-shaped classification of a [`TrzszError`],
/// analogous to a teacher crate's own `ExitCode` enum: every error kind
/// maps to exactly one of these, and the binary translates that straight
/// into `std::process::exit`'s argument.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[repr(i32)]
pub enum ExitKind {
    /// The transfer completed with no failed files.
    Success = 0,
    /// A local filesystem error affected one or more files.
    Io = 1,
    /// The peer violated the wire protocol (bad frame, bad state).
    Protocol = 2,
    /// An end-of-file MD5 comparison failed.
    Checksum = 3,
    /// The peer reported `FAIL` for the whole session.
    RemoteFail = 4,
    /// Ctrl+C was observed in the stream.
    Interrupted = 130,
    /// The session was torn down locally, or a pipeline was cancelled.
    Cancelled = 131,
}

impl ExitKind {
    /// The bare integer, ready to hand to `std::process::exit`.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// A short human-readable label for log lines and CLI diagnostics.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            ExitKind::Success => "success",
            ExitKind::Io => "local I/O error",
            ExitKind::Protocol => "protocol violation",
            ExitKind::Checksum => "checksum mismatch",
            ExitKind::RemoteFail => "remote reported failure",
            ExitKind::Interrupted => "interrupted",
            ExitKind::Cancelled => "cancelled",
        }
    }
}

/// Every failure mode the session engine can surface, aggregating each
/// lower crate's own error enum (`spec.md` §7's error kinds).
#[derive(Debug, Error)]
pub enum TrzszError {
    /// Ctrl+C (`\x03`) was observed in the stream.
    #[error("interrupted")]
    Interrupted,
    /// The session was torn down locally (`FrameBuffer::stop` fired).
    #[error("session stopped")]
    Stopped,
    /// No complete frame arrived before the configured timeout elapsed.
    #[error("timed out waiting to receive data")]
    ReceiveDataTimeout,
    /// A frame could not be parsed, or was the wrong type for the current
    /// state.
    #[error("frame decode error: {0}")]
    FrameDecode(String),
    /// A peer-reported value violated a protocol invariant (e.g. a
    /// prefix-hash step past the file size).
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
    /// A local filesystem or archive-adapter operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// An end-of-file MD5 comparison between sender and receiver failed.
    #[error("checksum mismatch: expected {expected}, found {found}")]
    Checksum { expected: String, found: String },
    /// The peer sent `FAIL` for the whole session.
    #[error("remote reported failure: {0}")]
    RemoteFail(String),
    /// A pipeline or resume-walk context was cancelled.
    #[error("cancelled: {0}")]
    Cancelled(String),
}

impl TrzszError {
    /// Classifies this error into the exit-code-shaped bucket the CLI
    /// binary reports.
    #[must_use]
    pub const fn kind(&self) -> ExitKind {
        match self {
            TrzszError::Interrupted => ExitKind::Interrupted,
            TrzszError::Stopped | TrzszError::Cancelled(_) => ExitKind::Cancelled,
            TrzszError::ReceiveDataTimeout
            | TrzszError::FrameDecode(_)
            | TrzszError::ProtocolViolation(_) => ExitKind::Protocol,
            TrzszError::Io(_) => ExitKind::Io,
            TrzszError::Checksum { .. } => ExitKind::Checksum,
            TrzszError::RemoteFail(_) => ExitKind::RemoteFail,
        }
    }

    /// Whether this error should abort the whole session rather than just
    /// the file currently in flight (`spec.md` §7: "Per-file errors do not
    /// abort the session unless they are `Stopped`, `Cancelled`,
    /// `RemoteFail`, or a protocol-level frame decode error").
    #[must_use]
    pub const fn aborts_session(&self) -> bool {
        !matches!(self, TrzszError::Io(_))
    }
}

fn unexpected_frame(expected: MessageType, found: MessageType) -> TrzszError {
    TrzszError::ProtocolViolation(format!("expected {expected}, found {found}"))
}

impl From<frame::FrameError> for TrzszError {
    fn from(err: frame::FrameError) -> Self {
        logging::debug_log!(Frame, 1, "frame error at session boundary: {err}");
        match err {
            frame::FrameError::Stopped => TrzszError::Stopped,
            frame::FrameError::Interrupted => TrzszError::Interrupted,
            frame::FrameError::Timeout => TrzszError::ReceiveDataTimeout,
            frame::FrameError::FrameTooLarge(n) => {
                TrzszError::FrameDecode(format!("line exceeded {n} bytes"))
            }
        }
    }
}

impl From<control::ControlError> for TrzszError {
    fn from(err: control::ControlError) -> Self {
        logging::debug_log!(Control, 1, "control error at session boundary: {err}");
        match err {
            control::ControlError::Frame(err) => err.into(),
            control::ControlError::Io(err) => TrzszError::Io(err),
            other => TrzszError::FrameDecode(other.to_string()),
        }
    }
}

impl From<control::RecordError> for TrzszError {
    fn from(err: control::RecordError) -> Self {
        logging::debug_log!(Control, 1, "record error at session boundary: {err}");
        TrzszError::FrameDecode(err.to_string())
    }
}

impl From<resume::ResumeError> for TrzszError {
    fn from(err: resume::ResumeError) -> Self {
        logging::debug_log!(Resume, 1, "resume error at session boundary: {err}");
        match err {
            resume::ResumeError::Control(err) => err.into(),
            resume::ResumeError::Io(err) => TrzszError::Io(err),
            resume::ResumeError::Record(err) => err.into(),
            resume::ResumeError::UnexpectedFrame { expected, found } => {
                unexpected_frame(expected, found)
            }
            resume::ResumeError::InvariantViolation(step) => {
                TrzszError::ProtocolViolation(format!("prefix-hash step {step} exceeds file size"))
            }
        }
    }
}

impl From<pipeline::PipelineError> for TrzszError {
    fn from(err: pipeline::PipelineError) -> Self {
        logging::debug_log!(Pipeline, 1, "pipeline error at session boundary: {err}");
        match err {
            pipeline::PipelineError::Control(err) => err.into(),
            pipeline::PipelineError::Io(err) => TrzszError::Io(err),
            pipeline::PipelineError::Cancelled(cause) => TrzszError::Cancelled(cause),
            pipeline::PipelineError::UnexpectedFrame { expected, found } => {
                unexpected_frame(expected, found)
            }
            other => TrzszError::ProtocolViolation(other.to_string()),
        }
    }
}

impl From<archive::ArchiveError> for TrzszError {
    fn from(err: archive::ArchiveError) -> Self {
        logging::debug_log!(Archive, 1, "archive error at session boundary: {err}");
        match err {
            archive::ArchiveError::Io(err) => TrzszError::Io(err),
            other => TrzszError::ProtocolViolation(other.to_string()),
        }
    }
}
