// ABOUTME: Increment-tracking policies - resolves the replication method
// ABOUTME: into window computation and token advancement per stream

use std::cmp::Ordering;

use crate::config::ReplicationMethod;
use crate::state::ProgressToken;
use crate::xmin::{XminTracker, XminWindowPlan};

/// One bound of a sync window.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowBound {
    /// Raw xmin counter value.
    Xmin(u32),
    /// Caller-defined cursor value.
    Cursor(serde_json::Value),
}

/// Row-scan bounds handed to the row-source collaborator.
///
/// `lower` is exclusive (rows strictly newer than the last token),
/// `upper` is inclusive. `None` means unbounded on that side. Xmin windows
/// may wrap through zero, in which case the raw lower bound is numerically
/// larger than the upper bound.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncWindow {
    pub lower: Option<WindowBound>,
    pub upper: Option<WindowBound>,
}

impl SyncWindow {
    /// Unbounded window: every row in the stream.
    pub fn unbounded() -> Self {
        Self {
            lower: None,
            upper: None,
        }
    }
}

/// How a window relates to the stream's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKind {
    /// First sync of the stream; no prior token.
    Initial,
    /// Normal forward increment.
    Incremental,
    /// The counter wrapped; the window crosses zero and the epoch advances.
    Wraparound,
    /// The counter rolled back; the whole stream is re-read.
    FullResync,
}

/// Concrete window for one stream in one run, carrying everything needed
/// to filter rows and to advance the token at checkpoint.
#[derive(Debug, Clone)]
pub enum WindowPlan {
    Xmin(XminWindowPlan),
    Cursor {
        window: SyncWindow,
        kind: WindowKind,
        prior: Option<ProgressToken>,
    },
}

impl WindowPlan {
    pub fn window(&self) -> &SyncWindow {
        match self {
            WindowPlan::Xmin(plan) => &plan.window,
            WindowPlan::Cursor { window, .. } => window,
        }
    }

    pub fn kind(&self) -> WindowKind {
        match self {
            WindowPlan::Xmin(plan) => plan.kind,
            WindowPlan::Cursor { kind, .. } => *kind,
        }
    }

    /// Row inclusion by write-counter position. Cursor-bounded windows are
    /// filtered by the collaborator's query instead and accept every row.
    pub fn includes_position(&self, position: u32) -> bool {
        match self {
            WindowPlan::Xmin(plan) => plan.includes(position),
            WindowPlan::Cursor { .. } => true,
        }
    }
}

/// A replication method resolved into window computation and token
/// advancement for one stream.
pub trait IncrementPolicy {
    /// Compute the scan window from the last committed token.
    fn compute_window(&self, last: Option<&ProgressToken>) -> WindowPlan;

    /// Produce the token to commit at checkpoint. `observed_max` is the
    /// highest cursor value seen among emitted rows; xmin policies ignore
    /// it and commit the candidate captured when the window opened.
    fn advance(
        &self,
        plan: &WindowPlan,
        observed_max: Option<ProgressToken>,
    ) -> Option<ProgressToken>;
}

/// Standard replication: windows bounded by a caller-nominated cursor.
pub struct StandardPolicy {
    cursor_field: Vec<String>,
}

impl StandardPolicy {
    pub fn new(cursor_field: Vec<String>) -> Self {
        Self { cursor_field }
    }

    pub fn cursor_field(&self) -> &[String] {
        &self.cursor_field
    }
}

impl IncrementPolicy for StandardPolicy {
    fn compute_window(&self, last: Option<&ProgressToken>) -> WindowPlan {
        let (lower, kind) = match last {
            Some(ProgressToken::Cursor { value }) => (
                Some(WindowBound::Cursor(value.clone())),
                WindowKind::Incremental,
            ),
            _ => (None, WindowKind::Initial),
        };
        WindowPlan::Cursor {
            window: SyncWindow { lower, upper: None },
            kind,
            prior: last.cloned(),
        }
    }

    fn advance(
        &self,
        plan: &WindowPlan,
        observed_max: Option<ProgressToken>,
    ) -> Option<ProgressToken> {
        match plan {
            WindowPlan::Cursor { prior, .. } => observed_max.or_else(|| prior.clone()),
            WindowPlan::Xmin(_) => None,
        }
    }
}

/// Xmin replication: windows derived from the transaction counter.
///
/// Opened per stream after a single high-water read; the candidate token
/// is fixed at that moment (see `XminWindowPlan`).
pub struct XminPolicy {
    tracker: XminTracker,
    high_water: u32,
}

impl XminPolicy {
    pub fn open(tracker: XminTracker, high_water: u32) -> Self {
        Self {
            tracker,
            high_water,
        }
    }
}

impl IncrementPolicy for XminPolicy {
    fn compute_window(&self, last: Option<&ProgressToken>) -> WindowPlan {
        let last_cursor = last.and_then(|t| t.as_xmin());
        WindowPlan::Xmin(self.tracker.open_window(last_cursor, self.high_water))
    }

    fn advance(
        &self,
        plan: &WindowPlan,
        _observed_max: Option<ProgressToken>,
    ) -> Option<ProgressToken> {
        match plan {
            WindowPlan::Xmin(xmin_plan) => Some(ProgressToken::Xmin(xmin_plan.candidate)),
            WindowPlan::Cursor { .. } => None,
        }
    }
}

/// Resolve the configured replication method into a policy for one stream.
pub fn select_policy(
    method: ReplicationMethod,
    cursor_field: Option<Vec<String>>,
    tracker: XminTracker,
    high_water: u32,
) -> Box<dyn IncrementPolicy + Send + Sync> {
    match method {
        ReplicationMethod::Standard => {
            Box::new(StandardPolicy::new(cursor_field.unwrap_or_default()))
        }
        ReplicationMethod::Xmin => Box::new(XminPolicy::open(tracker, high_water)),
    }
}

/// Ordering over opaque cursor values: null < bool < number < string.
/// Numbers compare numerically, strings lexicographically; this matches
/// how cursor columns of a single declared type order naturally.
pub fn cmp_cursor_values(a: &serde_json::Value, b: &serde_json::Value) -> Ordering {
    use serde_json::Value;

    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) | Value::Object(_) => 4,
        }
    }

    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NEG_INFINITY);
            let y = y.as_f64().unwrap_or(f64::NEG_INFINITY);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Highest cursor value among row payloads, following `cursor_field` as a
/// nested path into each row's JSON data.
pub fn max_cursor_value(
    rows: &[serde_json::Value],
    cursor_field: &[String],
) -> Option<serde_json::Value> {
    rows.iter()
        .filter_map(|row| {
            let mut value = row;
            for segment in cursor_field {
                value = value.get(segment)?;
            }
            Some(value)
        })
        .max_by(|a, b| cmp_cursor_values(a, b))
        .cloned()
}
