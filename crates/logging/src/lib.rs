#![deny(unsafe_code)]

//! Leveled info/debug verbosity system shared across the trzsz workspace.
//!
//! Every crate that wants to report progress or diagnostics goes through
//! [`info_log!`] or [`debug_log!`] rather than calling `println!`/`eprintln!`
//! directly. Each call names an [`InfoFlag`] or [`DebugFlag`] and a minimum
//! level; the call is a no-op unless the active [`VerbosityConfig`] has that
//! flag configured at or above the requested level.
//!
//! Two sinks are available:
//!
//! - an in-process event buffer, drained with [`drain_events`], used by unit
//!   and integration tests that want to assert on what would have been
//!   logged without capturing stdout/stderr;
//! - when the `tracing` feature is enabled, events are additionally (or
//!   instead, for binaries that never call `init`) forwarded to the
//!   [`tracing`] crate so real runs get structured, leveled output through
//!   whatever subscriber the binary installs.

use std::sync::{Mutex, OnceLock};

/// Info-level categories a caller can gate a message on.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum InfoFlag {
    /// Per-file name as it starts or finishes transferring.
    Name,
    /// Coarse progress updates (bytes transferred, percentage).
    Progress,
    /// End-of-session summary statistics.
    Stats,
    /// Prefix-hash resume negotiation outcome.
    Resume,
    /// Miscellaneous session-lifecycle notices.
    Misc,
}

impl InfoFlag {
    /// Canonical lowercase name used by [`VerbosityConfig::apply_info_flag`].
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            InfoFlag::Name => "name",
            InfoFlag::Progress => "progress",
            InfoFlag::Stats => "stats",
            InfoFlag::Resume => "resume",
            InfoFlag::Misc => "misc",
        }
    }

    const ALL: [InfoFlag; 5] = [
        InfoFlag::Name,
        InfoFlag::Progress,
        InfoFlag::Stats,
        InfoFlag::Resume,
        InfoFlag::Misc,
    ];
}

/// Debug-level categories a caller can gate a message on.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum DebugFlag {
    /// Frame-buffer framing decisions (line boundaries, CSI stripping).
    Frame,
    /// Codec encode/decode internals (escape table, base64, zstd).
    Codec,
    /// Data-pipeline stage lifecycle and adaptive-window adjustments.
    Pipeline,
    /// Prefix-hash resume engine step-by-step trace.
    Resume,
    /// Control-protocol frame send/recv trace.
    Control,
    /// Directory-archive manifest read/write trace.
    Archive,
}

impl DebugFlag {
    /// Canonical lowercase name used by [`VerbosityConfig::apply_debug_flag`].
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            DebugFlag::Frame => "frame",
            DebugFlag::Codec => "codec",
            DebugFlag::Pipeline => "pipeline",
            DebugFlag::Resume => "resume",
            DebugFlag::Control => "control",
            DebugFlag::Archive => "archive",
        }
    }

    const ALL: [DebugFlag; 6] = [
        DebugFlag::Frame,
        DebugFlag::Codec,
        DebugFlag::Pipeline,
        DebugFlag::Resume,
        DebugFlag::Control,
        DebugFlag::Archive,
    ];
}

/// Per-category info verbosity levels, 0 (silent) upward.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct InfoFlags {
    /// Level configured for [`InfoFlag::Name`].
    pub name: u8,
    /// Level configured for [`InfoFlag::Progress`].
    pub progress: u8,
    /// Level configured for [`InfoFlag::Stats`].
    pub stats: u8,
    /// Level configured for [`InfoFlag::Resume`].
    pub resume: u8,
    /// Level configured for [`InfoFlag::Misc`].
    pub misc: u8,
}

impl InfoFlags {
    fn get(&self, flag: InfoFlag) -> u8 {
        match flag {
            InfoFlag::Name => self.name,
            InfoFlag::Progress => self.progress,
            InfoFlag::Stats => self.stats,
            InfoFlag::Resume => self.resume,
            InfoFlag::Misc => self.misc,
        }
    }

    fn set(&mut self, flag: InfoFlag, level: u8) {
        match flag {
            InfoFlag::Name => self.name = level,
            InfoFlag::Progress => self.progress = level,
            InfoFlag::Stats => self.stats = level,
            InfoFlag::Resume => self.resume = level,
            InfoFlag::Misc => self.misc = level,
        }
    }

    /// Sets every flag to `level` at once (used for the `ALL`/`NONE` keywords).
    pub fn set_all(&mut self, level: u8) {
        for flag in InfoFlag::ALL {
            self.set(flag, level);
        }
    }
}

/// Per-category debug verbosity levels, 0 (silent) upward.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DebugFlags {
    /// Level configured for [`DebugFlag::Frame`].
    pub frame: u8,
    /// Level configured for [`DebugFlag::Codec`].
    pub codec: u8,
    /// Level configured for [`DebugFlag::Pipeline`].
    pub pipeline: u8,
    /// Level configured for [`DebugFlag::Resume`].
    pub resume: u8,
    /// Level configured for [`DebugFlag::Control`].
    pub control: u8,
    /// Level configured for [`DebugFlag::Archive`].
    pub archive: u8,
}

impl DebugFlags {
    fn get(&self, flag: DebugFlag) -> u8 {
        match flag {
            DebugFlag::Frame => self.frame,
            DebugFlag::Codec => self.codec,
            DebugFlag::Pipeline => self.pipeline,
            DebugFlag::Resume => self.resume,
            DebugFlag::Control => self.control,
            DebugFlag::Archive => self.archive,
        }
    }

    fn set(&mut self, flag: DebugFlag, level: u8) {
        match flag {
            DebugFlag::Frame => self.frame = level,
            DebugFlag::Codec => self.codec = level,
            DebugFlag::Pipeline => self.pipeline = level,
            DebugFlag::Resume => self.resume = level,
            DebugFlag::Control => self.control = level,
            DebugFlag::Archive => self.archive = level,
        }
    }

    /// Sets every flag to `level` at once (used for the `ALL`/`NONE` keywords).
    pub fn set_all(&mut self, level: u8) {
        for flag in DebugFlag::ALL {
            self.set(flag, level);
        }
    }
}

/// Complete verbosity configuration for a session.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct VerbosityConfig {
    /// Info-category levels.
    pub info: InfoFlags,
    /// Debug-category levels.
    pub debug: DebugFlags,
}

/// Error returned when parsing an unrecognized `--info`/`--debug` token.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("unrecognized verbosity flag {0:?}")]
pub struct UnknownFlag(pub String);

impl VerbosityConfig {
    /// Builds the configuration implied by a plain `-v` repeat count, the
    /// way upstream trigger strings map `-v`/`-vv`/`-vvv` onto progressively
    /// richer output.
    #[must_use]
    pub fn from_verbose_level(level: u8) -> Self {
        let mut config = Self::default();
        if level >= 1 {
            config.info.set_all(1);
        }
        if level >= 2 {
            config.info.set_all(2);
            config.debug.set_all(1);
        }
        if level >= 3 {
            config.debug.set_all(2);
        }
        config
    }

    /// Applies one `--info=FLAG[LEVEL]` token (e.g. `"name"`, `"progress2"`).
    ///
    /// # Errors
    ///
    /// Returns [`UnknownFlag`] if `token` does not name an [`InfoFlag`].
    pub fn apply_info_flag(&mut self, token: &str) -> Result<(), UnknownFlag> {
        let (name, level) = split_level(token);
        for flag in InfoFlag::ALL {
            if flag.name() == name {
                self.info.set(flag, level);
                return Ok(());
            }
        }
        Err(UnknownFlag(token.to_string()))
    }

    /// Applies one `--debug=FLAG[LEVEL]` token.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownFlag`] if `token` does not name a [`DebugFlag`].
    pub fn apply_debug_flag(&mut self, token: &str) -> Result<(), UnknownFlag> {
        let (name, level) = split_level(token);
        for flag in DebugFlag::ALL {
            if flag.name() == name {
                self.debug.set(flag, level);
                return Ok(());
            }
        }
        Err(UnknownFlag(token.to_string()))
    }
}

/// Splits a token like `"progress2"` into `("progress", 2)`, defaulting to
/// level 1 when no trailing digit is present (`"progress"` -> `("progress", 1)`).
fn split_level(token: &str) -> (&str, u8) {
    let digits_at = token
        .char_indices()
        .find(|(_, c)| c.is_ascii_digit())
        .map(|(i, _)| i);
    match digits_at {
        Some(i) => {
            let level = token[i..].parse().unwrap_or(1);
            (&token[..i], level)
        }
        None => (token, 1),
    }
}

/// One recorded event, captured for tests via [`drain_events`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LogEvent {
    /// `"info"` or `"debug"`.
    pub kind: &'static str,
    /// Canonical flag name, e.g. `"progress"`.
    pub flag: &'static str,
    /// The level the caller requested.
    pub level: u8,
    /// The rendered message.
    pub message: String,
}

static CONFIG: OnceLock<Mutex<VerbosityConfig>> = OnceLock::new();
static EVENTS: OnceLock<Mutex<Vec<LogEvent>>> = OnceLock::new();

fn config_cell() -> &'static Mutex<VerbosityConfig> {
    CONFIG.get_or_init(|| Mutex::new(VerbosityConfig::default()))
}

fn events_cell() -> &'static Mutex<Vec<LogEvent>> {
    EVENTS.get_or_init(|| Mutex::new(Vec::new()))
}

/// Installs `config` as the active verbosity configuration for this process.
pub fn init(config: VerbosityConfig) {
    *config_cell().lock().expect("logging config mutex poisoned") = config;
}

/// Returns whether `flag` is configured at or above `level`.
#[must_use]
pub fn info_gte(flag: InfoFlag, level: u8) -> bool {
    config_cell()
        .lock()
        .expect("logging config mutex poisoned")
        .info
        .get(flag)
        >= level
}

/// Returns whether `flag` is configured at or above `level`.
#[must_use]
pub fn debug_gte(flag: DebugFlag, level: u8) -> bool {
    config_cell()
        .lock()
        .expect("logging config mutex poisoned")
        .debug
        .get(flag)
        >= level
}

/// Records an event in the in-process buffer (and, with the `tracing`
/// feature, forwards it to `tracing` as well). Not intended to be called
/// directly; use [`info_log!`]/[`debug_log!`].
#[doc(hidden)]
pub fn record(kind: &'static str, flag: &'static str, level: u8, message: String) {
    #[cfg(feature = "tracing")]
    {
        if kind == "info" {
            tracing::info!(flag, level, "{}", message);
        } else {
            tracing::debug!(flag, level, "{}", message);
        }
    }
    events_cell()
        .lock()
        .expect("logging events mutex poisoned")
        .push(LogEvent {
            kind,
            flag,
            level,
            message,
        });
}

/// Drains and returns all events recorded so far, for test assertions.
pub fn drain_events() -> Vec<LogEvent> {
    std::mem::take(
        &mut *events_cell()
            .lock()
            .expect("logging events mutex poisoned"),
    )
}

/// Logs a message gated on an [`InfoFlag`] and minimum level.
#[macro_export]
macro_rules! info_log {
    ($flag:ident, $level:expr, $($arg:tt)*) => {{
        let flag = $crate::InfoFlag::$flag;
        if $crate::info_gte(flag, $level) {
            $crate::record("info", flag.name(), $level, ::std::format!($($arg)*));
        }
    }};
}

/// Logs a message gated on a [`DebugFlag`] and minimum level.
#[macro_export]
macro_rules! debug_log {
    ($flag:ident, $level:expr, $($arg:tt)*) => {{
        let flag = $crate::DebugFlag::$flag;
        if $crate::debug_gte(flag, $level) {
            $crate::record("debug", flag.name(), $level, ::std::format!($($arg)*));
        }
    }};
}
