// ABOUTME: Window state machine for xmin-based incremental sync
// ABOUTME: Fixes the candidate token before scanning and classifies counter movement

use crate::policy::{SyncWindow, WindowBound, WindowKind};

use super::cursor::{
    detect_wraparound, wrap_newer, WraparoundCheck, WraparoundConfig, XminCursor,
};

/// Per-run sync window for one stream, produced at window-open time.
///
/// `candidate` is the high-water counter read before row scanning began.
/// It is the token committed at checkpoint, regardless of what is observed
/// during streaming: rows committed after the window opened belong to the
/// next run. Re-reading the counter after the scan would silently drop
/// rows written concurrently with it.
#[derive(Debug, Clone)]
pub struct XminWindowPlan {
    pub window: SyncWindow,
    pub candidate: XminCursor,
    pub kind: WindowKind,
    /// Raw lower bound (exclusive), absent for initial sync and full resync.
    lower: Option<u32>,
}

impl XminWindowPlan {
    /// Epoch-aware row inclusion test: a row belongs to this window if its
    /// write-counter is strictly newer than the lower bound (cyclically)
    /// and not newer than the candidate.
    pub fn includes(&self, position: u32) -> bool {
        if wrap_newer(position, self.candidate.value) {
            // Written after the window opened; deferred to the next run.
            return false;
        }
        match self.lower {
            Some(lower) => wrap_newer(position, lower),
            None => true,
        }
    }
}

/// Converts high-water counter readings into per-stream sync windows.
///
/// One cycle per stream per run: idle, window opened, rows streaming,
/// checkpointed. The tracker itself is stateless between runs; the last
/// committed token comes from the state store.
#[derive(Debug, Clone, Default)]
pub struct XminTracker {
    pub wraparound: WraparoundConfig,
}

impl XminTracker {
    pub fn new(wraparound: WraparoundConfig) -> Self {
        Self { wraparound }
    }

    /// Open a sync window given the stream's last committed token and the
    /// current high-water counter (a single scalar read taken before any
    /// row is scanned).
    pub fn open_window(&self, last: Option<&XminCursor>, high_water: u32) -> XminWindowPlan {
        let Some(last) = last else {
            return XminWindowPlan {
                window: SyncWindow {
                    lower: None,
                    upper: Some(WindowBound::Xmin(high_water)),
                },
                candidate: XminCursor::initial(high_water),
                kind: WindowKind::Initial,
                lower: None,
            };
        };

        match detect_wraparound(last.value, high_water, &self.wraparound) {
            WraparoundCheck::Advance => XminWindowPlan {
                window: SyncWindow {
                    lower: Some(WindowBound::Xmin(last.value)),
                    upper: Some(WindowBound::Xmin(high_water)),
                },
                candidate: XminCursor::new(high_water, last.epoch),
                kind: WindowKind::Incremental,
                lower: Some(last.value),
            },
            WraparoundCheck::Wraparound => {
                tracing::info!(
                    last_xmin = last.value,
                    high_water,
                    epoch = last.epoch + 1,
                    "xmin counter wrapped around, advancing epoch"
                );
                XminWindowPlan {
                    window: SyncWindow {
                        lower: Some(WindowBound::Xmin(last.value)),
                        upper: Some(WindowBound::Xmin(high_water)),
                    },
                    candidate: XminCursor::new(high_water, last.epoch + 1),
                    kind: WindowKind::Wraparound,
                    lower: Some(last.value),
                }
            }
            WraparoundCheck::Rollback => {
                tracing::warn!(
                    last_xmin = last.value,
                    high_water,
                    "xmin counter moved backward without a full cycle; \
                     performing full resync (duplicates expected downstream)"
                );
                XminWindowPlan {
                    window: SyncWindow {
                        lower: None,
                        upper: Some(WindowBound::Xmin(high_water)),
                    },
                    candidate: XminCursor::new(high_water, last.epoch),
                    kind: WindowKind::FullResync,
                    lower: None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_window_is_unbounded_below() {
        let tracker = XminTracker::default();
        let plan = tracker.open_window(None, 500);

        assert_eq!(plan.kind, WindowKind::Initial);
        assert_eq!(plan.candidate, XminCursor::new(500, 0));
        assert!(plan.includes(1));
        assert!(plan.includes(500));
        // Written after the window opened.
        assert!(!plan.includes(501));
    }

    #[test]
    fn test_incremental_window_excludes_already_synced() {
        let tracker = XminTracker::default();
        let last = XminCursor::new(100, 0);
        let plan = tracker.open_window(Some(&last), 200);

        assert_eq!(plan.kind, WindowKind::Incremental);
        assert_eq!(plan.candidate, XminCursor::new(200, 0));
        assert!(!plan.includes(100));
        assert!(plan.includes(101));
        assert!(plan.includes(200));
        assert!(!plan.includes(201));
    }

    #[test]
    fn test_idle_window_includes_nothing() {
        let tracker = XminTracker::default();
        let last = XminCursor::new(300, 2);
        let plan = tracker.open_window(Some(&last), 300);

        assert_eq!(plan.kind, WindowKind::Incremental);
        assert_eq!(plan.candidate.epoch, 2);
        assert!(!plan.includes(300));
        assert!(!plan.includes(299));
    }

    #[test]
    fn test_wraparound_advances_epoch_and_wraps_window() {
        let tracker = XminTracker::default();
        let last = XminCursor::new(u32::MAX - 3, 0);
        let plan = tracker.open_window(Some(&last), 10);

        assert_eq!(plan.kind, WindowKind::Wraparound);
        assert_eq!(plan.candidate, XminCursor::new(10, 1));
        // Rows on both sides of the zero crossing are included.
        assert!(plan.includes(u32::MAX - 1));
        assert!(plan.includes(5));
        assert!(plan.includes(10));
        // Already synced before the crossing.
        assert!(!plan.includes(u32::MAX - 3));
        // Written after the window opened.
        assert!(!plan.includes(11));
    }

    #[test]
    fn test_rollback_triggers_full_resync() {
        let tracker = XminTracker::default();
        let last = XminCursor::new(3_000_000_000, 1);
        let plan = tracker.open_window(Some(&last), 1_000_000_000);

        assert_eq!(plan.kind, WindowKind::FullResync);
        // Epoch is kept; the counter did not complete a cycle.
        assert_eq!(plan.candidate, XminCursor::new(1_000_000_000, 1));
        // Everything up to the new high water is re-emitted.
        assert!(plan.includes(1));
        assert!(plan.includes(999_999_999));
        assert!(plan.includes(1_000_000_000));
    }

    #[test]
    fn test_candidate_is_fixed_at_window_open() {
        // The candidate must be the high-water value passed in, not anything
        // derived from rows observed later.
        let tracker = XminTracker::default();
        let last = XminCursor::new(50, 0);
        let plan = tracker.open_window(Some(&last), 80);
        assert_eq!(plan.candidate.value, 80);
        // A row at 90 (committed mid-scan) is excluded from this window.
        assert!(!plan.includes(90));
    }
}
