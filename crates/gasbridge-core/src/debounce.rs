//! Edge-event debouncing.
//!
//! Reed contacts bounce; a genuine meter revolution takes seconds. Events
//! closer together than the window are suppressed before they reach the
//! counter.

use serde::{Deserialize, Serialize};

/// Default minimum spacing between counted edges.
pub const DEFAULT_DEBOUNCE_MS: u64 = 1000;

/// How the comparison timestamp is advanced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebounceMode {
    /// Re-anchor the window on every raw event, accepted or rejected.
    /// A burst of bounces keeps pushing the window out, so the next
    /// counted edge must be a full window away from the *last* bounce.
    #[default]
    Sliding,
    /// Re-anchor only on accepted events: a fixed dead-time after each
    /// counted pulse.
    Fixed,
}

/// Suppresses edge events that arrive within the configured window.
#[derive(Debug)]
pub struct DebounceFilter {
    window_ms: u64,
    mode: DebounceMode,
    last_event_ms: u64,
}

impl DebounceFilter {
    pub fn new(window_ms: u64, mode: DebounceMode) -> Self {
        Self {
            window_ms,
            mode,
            last_event_ms: 0,
        }
    }

    /// Monotonic timestamp (ms) of the last event considered, per mode.
    pub fn last_event_ms(&self) -> u64 {
        self.last_event_ms
    }

    /// Returns `true` when the event is far enough from the previous one
    /// to be counted.
    pub fn accept(&mut self, event_ts_ms: u64) -> bool {
        let accepted = event_ts_ms.saturating_sub(self.last_event_ms) >= self.window_ms;
        match self.mode {
            DebounceMode::Sliding => self.last_event_ms = event_ts_ms,
            DebounceMode::Fixed => {
                if accepted {
                    self.last_event_ms = event_ts_ms;
                }
            }
        }
        accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sliding() -> DebounceFilter {
        DebounceFilter::new(DEFAULT_DEBOUNCE_MS, DebounceMode::Sliding)
    }

    #[test]
    fn accepts_spaced_events() {
        let mut filter = sliding();
        assert!(filter.accept(1_000));
        assert!(filter.accept(2_500));
    }

    #[test]
    fn rejects_rapid_events_and_resets_window() {
        let mut filter = sliding();
        // Both inside the window measured from the previous raw event.
        assert!(!filter.accept(300));
        assert!(!filter.accept(800));
        assert_eq!(filter.last_event_ms(), 800);
    }

    #[test]
    fn sliding_rejection_re_anchors_the_window() {
        let mut filter = sliding();
        assert!(!filter.accept(500));
        // 999 ms after the previous raw event: still rejected, window moves.
        assert!(!filter.accept(1_499));
        // 999 ms again: the window keeps sliding.
        assert!(!filter.accept(2_498));
        // A full window after the last bounce finally counts.
        assert!(filter.accept(3_498));
    }

    #[test]
    fn fixed_mode_measures_from_last_accepted() {
        let mut filter = DebounceFilter::new(DEFAULT_DEBOUNCE_MS, DebounceMode::Fixed);
        assert!(filter.accept(2_000));
        // Bounces do not move the anchor in fixed mode.
        assert!(!filter.accept(2_600));
        assert!(filter.accept(3_200));
    }
}
