//! Injected environment/TTY capability, so the session, frame buffer, and
//! resume engine never read `std::env`/`cfg!(windows)` directly
//! (`spec.md` §9 "Global state"; `SPEC_FULL.md` §3 "Platform capability").

use std::time::Instant;

/// What the session needs to know about the host it's running on, supplied
/// by the caller instead of read from global state. Real runs use
/// [`SystemPlatform`]; tests supply their own implementation.
pub trait Platform {
    /// The current instant, for timestamping log lines and ack latency at
    /// the session boundary.
    fn now(&self) -> Instant;

    /// Whether the local side should negotiate Windows-mode framing
    /// (`!\n` terminators, VT100-stripping line reads).
    fn is_windows(&self) -> bool;

    /// The width of the enclosing tmux pane, if running inside tmux and it
    /// can be determined — used to size `tmux_output_junk` detection.
    fn tmux_pane_columns(&self) -> Option<u32>;
}

/// The real implementation: reads actual process/environment state.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemPlatform;

impl Platform for SystemPlatform {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn is_windows(&self) -> bool {
        cfg!(windows)
    }

    fn tmux_pane_columns(&self) -> Option<u32> {
        if std::env::var_os("TMUX").is_none() {
            return None;
        }
        std::env::var("TMUX_PANE_WIDTH").ok()?.parse().ok()
    }
}

#[cfg(test)]
pub(crate) mod tests_support {
    use super::{Instant, Platform};

    /// A deterministic stand-in for tests, with every answer fixed at
    /// construction time.
    pub struct StubPlatform {
        pub is_windows: bool,
        pub tmux_pane_columns: Option<u32>,
    }

    impl Default for StubPlatform {
        fn default() -> Self {
            Self {
                is_windows: false,
                tmux_pane_columns: None,
            }
        }
    }

    impl Platform for StubPlatform {
        fn now(&self) -> Instant {
            Instant::now()
        }

        fn is_windows(&self) -> bool {
            self.is_windows
        }

        fn tmux_pane_columns(&self) -> Option<u32> {
            self.tmux_pane_columns
        }
    }
}
