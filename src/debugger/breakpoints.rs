use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

/// Answers whether a source line carries an active breakpoint.
pub trait BreakpointSource: Send + Sync {
    fn is_breakpoint_line(&self, line: usize) -> bool;
}

/// Shared set of breakpoint lines (1-based).
///
/// Clones share the same set, so the front end can edit breakpoints while a
/// strategy holding another clone reads them from the worker thread.
#[derive(Debug, Clone, Default)]
pub struct Breakpoints {
    points: Arc<RwLock<BTreeSet<usize>>>,
}

impl Breakpoints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the line already had a breakpoint.
    pub fn add(&self, line: usize) -> bool {
        let added = self.points.write().insert(line);
        debug!(line, added, "breakpoint set");
        added
    }

    pub fn remove(&self, line: usize) -> bool {
        let removed = self.points.write().remove(&line);
        debug!(line, removed, "breakpoint removed");
        removed
    }

    /// Flip the breakpoint on `line`; returns whether it is now set.
    pub fn toggle(&self, line: usize) -> bool {
        let mut points = self.points.write();
        if points.remove(&line) {
            false
        } else {
            points.insert(line)
        }
    }

    pub fn contains(&self, line: usize) -> bool {
        self.points.read().contains(&line)
    }

    /// All breakpoint lines in ascending order.
    pub fn lines(&self) -> Vec<usize> {
        self.points.read().iter().copied().collect()
    }

    pub fn clear(&self) {
        self.points.write().clear();
    }
}

impl BreakpointSource for Breakpoints {
    fn is_breakpoint_line(&self, line: usize) -> bool {
        self.contains(line)
    }
}

impl<S: BreakpointSource + ?Sized> BreakpointSource for Arc<S> {
    fn is_breakpoint_line(&self, line: usize) -> bool {
        (**self).is_breakpoint_line(line)
    }
}
