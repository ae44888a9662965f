// ABOUTME: Cyclic comparison over the 32-bit xmin transaction counter
// ABOUTME: Distinguishes normal advance, wraparound, and backward rollback

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Half of the 32-bit counter space. Two counters within half a cycle of
/// each other compare by cyclic distance; beyond that the ordering is
/// ambiguous without the epoch.
pub const HALF_SPACE: u32 = 1 << 31;

/// Progress marker for an xmin-tracked stream.
///
/// `value` is the raw 32-bit counter; `epoch` increments each time the
/// counter space wraps around. Tokens order by `(epoch, value)`: a lower
/// raw value with a higher epoch is newer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct XminCursor {
    pub value: u32,
    pub epoch: u32,
}

impl XminCursor {
    pub fn new(value: u32, epoch: u32) -> Self {
        Self { value, epoch }
    }

    /// First-ever token for a stream.
    pub fn initial(value: u32) -> Self {
        Self { value, epoch: 0 }
    }
}

impl Ord for XminCursor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| self.value.cmp(&other.value))
    }
}

impl PartialOrd for XminCursor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Outcome of comparing the current high-water counter against the last
/// committed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WraparoundCheck {
    /// Counter moved forward (or stood still) without wrapping.
    Advance,
    /// Counter completed a cycle; raw value decreased but cyclic ordering
    /// says forward progress. The epoch must increment.
    Wraparound,
    /// Counter moved backward without a full cycle (restored or reset
    /// database). Recoverable via full resync, never an error.
    Rollback,
}

/// Tuning for wraparound detection.
#[derive(Debug, Clone, Copy)]
pub struct WraparoundConfig {
    /// Minimum backward gap (in raw counter units) treated as a genuine
    /// wraparound rather than a rollback.
    pub rollback_threshold: u32,
}

impl Default for WraparoundConfig {
    fn default() -> Self {
        Self {
            rollback_threshold: HALF_SPACE,
        }
    }
}

/// True if `counter` is strictly newer than `reference` under cyclic
/// comparison: the forward distance from `reference` to `counter` is
/// nonzero and less than half the counter space.
pub fn wrap_newer(counter: u32, reference: u32) -> bool {
    let forward = counter.wrapping_sub(reference);
    forward != 0 && forward < HALF_SPACE
}

/// Cyclic ordering of two raw counters. Counters exactly half a cycle
/// apart are reported as `Greater` for the one with the larger raw value,
/// keeping the ordering total.
pub fn wrap_cmp(a: u32, b: u32) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    if wrap_newer(a, b) {
        Ordering::Greater
    } else if wrap_newer(b, a) {
        Ordering::Less
    } else {
        // Exactly HALF_SPACE apart; fall back to raw ordering.
        a.cmp(&b)
    }
}

/// Classify the movement from the last committed counter to the current
/// high-water reading.
///
/// A backward gap of at least `config.rollback_threshold` means the
/// counter crossed zero and came around (wraparound); a smaller backward
/// gap means the database itself moved backward (rollback).
pub fn detect_wraparound(last: u32, current: u32, config: &WraparoundConfig) -> WraparoundCheck {
    if current >= last {
        WraparoundCheck::Advance
    } else if last - current >= config.rollback_threshold {
        WraparoundCheck::Wraparound
    } else {
        WraparoundCheck::Rollback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_newer_basic() {
        assert!(wrap_newer(200, 100));
        assert!(!wrap_newer(100, 200));
        assert!(!wrap_newer(100, 100));
    }

    #[test]
    fn test_wrap_newer_across_zero() {
        // Counter wrapped from near u32::MAX to a small value.
        assert!(wrap_newer(5, u32::MAX - 10));
        assert!(!wrap_newer(u32::MAX - 10, 5));
    }

    #[test]
    fn test_wrap_newer_half_space_boundary() {
        // Just under half a cycle ahead: newer.
        assert!(wrap_newer(HALF_SPACE - 1, 0));
        // Exactly half a cycle: ambiguous, treated as not newer.
        assert!(!wrap_newer(HALF_SPACE, 0));
        // Beyond half a cycle: the reference is the newer one.
        assert!(!wrap_newer(HALF_SPACE + 1, 0));
        assert!(wrap_newer(0, HALF_SPACE + 1));
    }

    #[test]
    fn test_wrap_cmp() {
        use std::cmp::Ordering::*;
        assert_eq!(wrap_cmp(100, 100), Equal);
        assert_eq!(wrap_cmp(200, 100), Greater);
        assert_eq!(wrap_cmp(100, 200), Less);
        // Wrapped: 3 is newer than u32::MAX - 2.
        assert_eq!(wrap_cmp(3, u32::MAX - 2), Greater);
        assert_eq!(wrap_cmp(u32::MAX - 2, 3), Less);
        // Exactly half a cycle apart falls back to raw ordering.
        assert_eq!(wrap_cmp(HALF_SPACE, 0), Greater);
        assert_eq!(wrap_cmp(0, HALF_SPACE), Less);
    }

    #[test]
    fn test_detect_advance() {
        let config = WraparoundConfig::default();
        assert_eq!(detect_wraparound(100, 200, &config), WraparoundCheck::Advance);
        assert_eq!(detect_wraparound(100, 100, &config), WraparoundCheck::Advance);
    }

    #[test]
    fn test_detect_wraparound_large_backward_gap() {
        let config = WraparoundConfig::default();
        // Counter crossed zero: raw value collapsed by more than half the space.
        assert_eq!(
            detect_wraparound(u32::MAX - 5, 100, &config),
            WraparoundCheck::Wraparound
        );
        assert_eq!(
            detect_wraparound(3_500_000_000, 100, &config),
            WraparoundCheck::Wraparound
        );
    }

    #[test]
    fn test_detect_rollback_small_backward_gap() {
        let config = WraparoundConfig::default();
        // Slight backward movement: restored database, not a wraparound.
        assert_eq!(
            detect_wraparound(1000, 900, &config),
            WraparoundCheck::Rollback
        );
        assert_eq!(
            detect_wraparound(3_000_000_000, 1_000_000_000, &config),
            WraparoundCheck::Rollback
        );
    }

    #[test]
    fn test_detect_threshold_boundary() {
        let config = WraparoundConfig::default();
        assert_eq!(
            detect_wraparound(HALF_SPACE, 0, &config),
            WraparoundCheck::Wraparound
        );
        assert_eq!(
            detect_wraparound(HALF_SPACE - 1, 0, &config),
            WraparoundCheck::Rollback
        );
    }

    #[test]
    fn test_detect_custom_threshold() {
        let config = WraparoundConfig {
            rollback_threshold: 2_000_000_000,
        };
        assert_eq!(
            detect_wraparound(2_000_000_001, 1, &config),
            WraparoundCheck::Wraparound
        );
        assert_eq!(
            detect_wraparound(2_000_000_000, 1, &config),
            WraparoundCheck::Rollback
        );
    }

    #[test]
    fn test_cursor_ordering_across_epochs() {
        // A lower raw value with a higher epoch is newer.
        let old = XminCursor::new(u32::MAX - 3, 0);
        let new = XminCursor::new(7, 1);
        assert!(new > old);

        // Within an epoch raw values order normally.
        assert!(XminCursor::new(200, 1) > XminCursor::new(100, 1));
    }

    #[test]
    fn test_cursor_serde_round_trip() {
        let cursor = XminCursor::new(4_000_000_123, 2);
        let json = serde_json::to_string(&cursor).unwrap();
        let parsed: XminCursor = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, cursor);
    }
}
