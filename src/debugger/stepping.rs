//! Step strategies: when to halt, given the stream of trace events.
//!
//! Depths are interpreter call-stack depths as tracked by the dispatcher: the
//! main frame runs at depth 1, a Call event is reported at the callee's depth
//! and a Return event at the depth of the frame being left.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use super::breakpoints::BreakpointSource;

/// Outcome of asking a strategy about one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Continue,
    Halt,
}

/// Strategy names, for status and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    StepInto,
    StepOver,
    StepOut,
    RunToEnd,
    RunToBreakpoint,
}

/// The active halting policy. Armed variants keep the depth the command was
/// issued at.
#[derive(Clone)]
pub enum Strategy {
    /// Halt on every call, line and return.
    StepInto,
    /// Halt on lines at or above the armed depth.
    StepOver {
        depth: usize,
        breakpoints: Arc<dyn BreakpointSource>,
    },
    /// Halt on the first line shallower than the armed depth.
    StepOut {
        depth: usize,
        breakpoints: Arc<dyn BreakpointSource>,
    },
    /// Never halt.
    RunToEnd,
    /// Halt on breakpoint lines only.
    RunToBreakpoint {
        breakpoints: Arc<dyn BreakpointSource>,
    },
}

impl Strategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::StepInto => StrategyKind::StepInto,
            Self::StepOver { .. } => StrategyKind::StepOver,
            Self::StepOut { .. } => StrategyKind::StepOut,
            Self::RunToEnd => StrategyKind::RunToEnd,
            Self::RunToBreakpoint { .. } => StrategyKind::RunToBreakpoint,
        }
    }

    pub fn on_call(&self, _depth: usize) -> Decision {
        match self {
            Self::StepInto => Decision::Halt,
            _ => Decision::Continue,
        }
    }

    pub fn on_line(&self, depth: usize, line: usize) -> Decision {
        let halt = match self {
            Self::StepInto => true,
            Self::StepOver {
                depth: armed,
                breakpoints,
            } => depth <= *armed || breakpoints.is_breakpoint_line(line),
            Self::StepOut {
                depth: armed,
                breakpoints,
            } => depth < *armed || breakpoints.is_breakpoint_line(line),
            Self::RunToEnd => false,
            Self::RunToBreakpoint { breakpoints } => breakpoints.is_breakpoint_line(line),
        };
        if halt {
            Decision::Halt
        } else {
            Decision::Continue
        }
    }

    pub fn on_return(&self, _depth: usize) -> Decision {
        match self {
            Self::StepInto => Decision::Halt,
            _ => Decision::Continue,
        }
    }
}

impl fmt::Debug for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StepOver { depth, .. } => f.debug_struct("StepOver").field("depth", depth).finish(),
            Self::StepOut { depth, .. } => f.debug_struct("StepOut").field("depth", depth).finish(),
            other => fmt::Debug::fmt(&other.kind(), f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debugger::Breakpoints;

    fn with_breakpoints(lines: &[usize]) -> Arc<dyn BreakpointSource> {
        let bps = Breakpoints::new();
        for &line in lines {
            bps.add(line);
        }
        Arc::new(bps)
    }

    #[test]
    fn step_into_halts_everywhere() {
        let s = Strategy::StepInto;
        assert_eq!(s.on_call(5), Decision::Halt);
        assert_eq!(s.on_line(5, 1), Decision::Halt);
        assert_eq!(s.on_return(5), Decision::Halt);
    }

    #[test]
    fn step_over_ignores_deeper_lines_unless_breakpoint() {
        let s = Strategy::StepOver {
            depth: 2,
            breakpoints: with_breakpoints(&[40]),
        };
        assert_eq!(s.on_call(3), Decision::Continue);
        assert_eq!(s.on_line(3, 30), Decision::Continue);
        assert_eq!(s.on_line(3, 40), Decision::Halt);
        assert_eq!(s.on_return(3), Decision::Continue);
        assert_eq!(s.on_line(2, 11), Decision::Halt);
        assert_eq!(s.on_line(1, 4), Decision::Halt);
    }

    #[test]
    fn step_out_waits_for_shallower_line() {
        let s = Strategy::StepOut {
            depth: 2,
            breakpoints: with_breakpoints(&[]),
        };
        assert_eq!(s.on_line(2, 10), Decision::Continue);
        assert_eq!(s.on_line(3, 20), Decision::Continue);
        assert_eq!(s.on_return(2), Decision::Continue);
        assert_eq!(s.on_line(1, 5), Decision::Halt);
    }

    #[test]
    fn run_to_end_never_halts() {
        let s = Strategy::RunToEnd;
        assert_eq!(s.on_call(1), Decision::Continue);
        assert_eq!(s.on_line(1, 1), Decision::Continue);
        assert_eq!(s.on_return(1), Decision::Continue);
    }

    #[test]
    fn run_to_breakpoint_reads_live_breakpoints() {
        let bps = Breakpoints::new();
        let s = Strategy::RunToBreakpoint {
            breakpoints: Arc::new(bps.clone()),
        };
        assert_eq!(s.on_line(4, 7), Decision::Continue);
        bps.add(7);
        assert_eq!(s.on_line(4, 7), Decision::Halt);
        assert_eq!(s.on_call(4), Decision::Continue);
        assert_eq!(format!("{s:?}"), "RunToBreakpoint");
    }
}
