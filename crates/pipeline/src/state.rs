//! Shared cancellation context and adaptive window state, read and written
//! lock-free by every pipeline stage (`spec.md` §3 `PipelineContext`, §5
//! "Shared resources").

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Initial data-plane chunk size (`spec.md` §3: "initial 1 KiB").
pub const INITIAL_BUFFER_SIZE: u64 = 1024;

/// Upper bound the adaptive window never exceeds (`spec.md` §3 default).
pub const MAX_BUFFER_CHUNK: u64 = 10 * 1024 * 1024;

/// A shared, clonable handle to one file transfer's cancellation state and
/// adaptive buffer size. `spec.md` §5: "any stage's first error cancels the
/// context with that error as cause."
#[derive(Clone)]
pub struct PipelineContext {
    inner: Arc<PipelineState>,
}

struct PipelineState {
    cancelled: AtomicBool,
    cause: Mutex<Option<String>>,
    buffer_size: AtomicU64,
}

impl PipelineContext {
    /// Starts a fresh, uncancelled context with the data plane's initial
    /// buffer size.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(PipelineState {
                cancelled: AtomicBool::new(false),
                cause: Mutex::new(None),
                buffer_size: AtomicU64::new(INITIAL_BUFFER_SIZE),
            }),
        }
    }

    /// Cancels the context. Idempotent: only the first call's `cause` is
    /// recorded, matching "the first error wins".
    pub fn cancel(&self, cause: impl Into<String>) {
        if !self.inner.cancelled.swap(true, Ordering::SeqCst) {
            let cause = cause.into();
            logging::debug_log!(Pipeline, 1, "pipeline cancelled: {cause}");
            *self.inner.cause.lock().expect("cause mutex poisoned") = Some(cause);
        }
    }

    /// Whether any stage has cancelled the context.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// The first cancellation's cause, if any.
    #[must_use]
    pub fn cause(&self) -> Option<String> {
        self.inner.cause.lock().expect("cause mutex poisoned").clone()
    }

    /// The current adaptive chunk size, in bytes.
    #[must_use]
    pub fn buffer_size(&self) -> u64 {
        self.inner.buffer_size.load(Ordering::Relaxed)
    }

    /// Updates the adaptive chunk size.
    pub fn set_buffer_size(&self, size: u64) {
        self.inner.buffer_size.store(size, Ordering::Relaxed);
    }
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self::new()
    }
}
