//! Step debugger: strategies, the trace dispatcher and the execution
//! controller that drives a [`ScriptEngine`](crate::executor::ScriptEngine)
//! on a worker thread.

mod breakpoints;
mod controller;
mod dispatcher;
mod frame;
mod handoff;
mod notify;
mod sink;
mod stepping;

pub use breakpoints::{BreakpointSource, Breakpoints};
pub use controller::{Controller, DebugInfo, Stop};
pub use frame::{FrameSummary, Payload};
pub use sink::{DebugSink, HighlightKind, Recorder, SinkEvent};
pub use stepping::{Decision, Strategy, StrategyKind};
