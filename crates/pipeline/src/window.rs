//! Adaptive window sizing (`spec.md` §4.5 "Adaptive window").

use std::time::Duration;

/// Floor the adaptive window never shrinks below.
pub const MIN_BUFFER_CHUNK: u64 = 1024;

/// Default target round-trip time the EMA tracker seeds itself with.
pub const DEFAULT_TARGET_RTT: Duration = Duration::from_millis(50);

/// Doubles `current` (capped at `max`) if `rtt` arrived within half of
/// `target_rtt`; halves it (floored at [`MIN_BUFFER_CHUNK`]) if `rtt`
/// arrived past double `target_rtt`; otherwise leaves it unchanged.
#[must_use]
pub fn next_buffer_size(current: u64, rtt: Duration, target_rtt: Duration, max: u64) -> u64 {
    if rtt <= target_rtt / 2 {
        (current.saturating_mul(2)).min(max)
    } else if rtt >= target_rtt * 2 {
        (current / 2).max(MIN_BUFFER_CHUNK)
    } else {
        current
    }
}

/// Tracks an exponential moving average of inter-ack intervals, used as the
/// adaptive window's target RTT (`spec.md` §4.5: "recomputed as the EMA of
/// inter-ack intervals").
pub struct RttTracker {
    ema: Duration,
    alpha: f64,
}

impl RttTracker {
    /// Starts tracking, seeded at [`DEFAULT_TARGET_RTT`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            ema: DEFAULT_TARGET_RTT,
            alpha: 0.25,
        }
    }

    /// Folds in one more RTT sample and returns the updated EMA.
    pub fn update(&mut self, sample: Duration) -> Duration {
        let ema_secs = self.ema.as_secs_f64();
        let sample_secs = sample.as_secs_f64();
        let next = ema_secs + self.alpha * (sample_secs - ema_secs);
        self.ema = Duration::from_secs_f64(next.max(0.0));
        self.ema
    }
}

impl Default for RttTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fast_ack_doubles_the_window() {
        let target = Duration::from_millis(100);
        let next = next_buffer_size(4096, Duration::from_millis(10), target, MAX_BUFFER_CHUNK_TEST);
        assert_eq!(next, 8192);
    }

    #[test]
    fn slow_ack_halves_the_window() {
        let target = Duration::from_millis(100);
        let next = next_buffer_size(4096, Duration::from_millis(500), target, MAX_BUFFER_CHUNK_TEST);
        assert_eq!(next, 2048);
    }

    #[test]
    fn middling_ack_leaves_the_window_unchanged() {
        let target = Duration::from_millis(100);
        let next = next_buffer_size(4096, Duration::from_millis(100), target, MAX_BUFFER_CHUNK_TEST);
        assert_eq!(next, 4096);
    }

    #[test]
    fn window_never_exceeds_the_cap() {
        let target = Duration::from_millis(100);
        let next = next_buffer_size(MAX_BUFFER_CHUNK_TEST, Duration::from_millis(1), target, MAX_BUFFER_CHUNK_TEST);
        assert_eq!(next, MAX_BUFFER_CHUNK_TEST);
    }

    #[test]
    fn window_never_drops_below_the_floor() {
        let target = Duration::from_millis(100);
        let next = next_buffer_size(1024, Duration::from_secs(1), target, MAX_BUFFER_CHUNK_TEST);
        assert_eq!(next, MIN_BUFFER_CHUNK);
    }

    #[test]
    fn ema_converges_toward_repeated_samples() {
        let mut tracker = RttTracker::new();
        let mut last = tracker.update(Duration::from_millis(10));
        for _ in 0..20 {
            last = tracker.update(Duration::from_millis(10));
        }
        assert!(last.as_millis() < 20);
    }

    const MAX_BUFFER_CHUNK_TEST: u64 = 10 * 1024 * 1024;

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn next_buffer_size_never_leaves_the_configured_range(
            current in MIN_BUFFER_CHUNK..=MAX_BUFFER_CHUNK_TEST,
            rtt_millis in 0u64..2000,
            target_millis in 1u64..500,
        ) {
            let next = next_buffer_size(
                current,
                Duration::from_millis(rtt_millis),
                Duration::from_millis(target_millis),
                MAX_BUFFER_CHUNK_TEST,
            );
            prop_assert!(next >= MIN_BUFFER_CHUNK);
            prop_assert!(next <= MAX_BUFFER_CHUNK_TEST);
        }
    }
}
