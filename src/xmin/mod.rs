// ABOUTME: xmin-based increment tracking for PostgreSQL sources
// ABOUTME: Cyclic counter comparison plus the per-stream window state machine

pub mod cursor;
pub mod tracker;

pub use cursor::{
    detect_wraparound, wrap_cmp, wrap_newer, WraparoundCheck, WraparoundConfig, XminCursor,
    HALF_SPACE,
};
pub use tracker::{XminTracker, XminWindowPlan};
