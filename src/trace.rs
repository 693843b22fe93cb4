//! Trace instrumentation contract between an interpreter and the debugger.
//!
//! The interpreter invokes a [`TraceCallback`] synchronously on the executing
//! thread for every call, line, return and exception. Each event borrows a
//! [`Frame`] owned by the interpreter; the borrow ends when the callback
//! returns, so anything kept past that point must be copied out.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Name → display value snapshot of a scope.
pub type Bindings = BTreeMap<String, String>;

/// Stable identity of a function body, used to tell "same function" apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CodeId(pub usize);

/// Kind of trace event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceKind {
    Call,
    Line,
    Return,
    Exception,
}

impl fmt::Display for TraceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Call => "call",
            Self::Line => "line",
            Self::Return => "return",
            Self::Exception => "exception",
        })
    }
}

/// The interpreter's view of one active function invocation.
pub trait Frame {
    /// Line currently executing, 1-based.
    fn line(&self) -> usize;

    fn code_id(&self) -> CodeId;

    fn function_name(&self) -> &str;

    /// Line where the function body starts.
    fn first_line(&self) -> usize;

    fn locals(&self) -> Bindings;

    fn globals(&self) -> Bindings;
}

/// Details attached to an exception event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExceptionInfo {
    pub message: String,
    pub line: usize,
}

/// One trace notification from the interpreter.
#[derive(Clone, Copy)]
pub enum TraceEvent<'a> {
    Call(&'a dyn Frame),
    Line(&'a dyn Frame),
    /// Frame exit, carrying the returned value if there is one. Also fired for
    /// frames unwound by an exception.
    Return(&'a dyn Frame, Option<&'a str>),
    Exception(&'a dyn Frame, &'a ExceptionInfo),
}

impl<'a> TraceEvent<'a> {
    pub fn kind(&self) -> TraceKind {
        match self {
            Self::Call(_) => TraceKind::Call,
            Self::Line(_) => TraceKind::Line,
            Self::Return(..) => TraceKind::Return,
            Self::Exception(..) => TraceKind::Exception,
        }
    }

    pub fn frame(&self) -> &'a dyn Frame {
        match *self {
            Self::Call(frame)
            | Self::Line(frame)
            | Self::Return(frame, _)
            | Self::Exception(frame, _) => frame,
        }
    }
}

impl fmt::Debug for TraceEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let frame = self.frame();
        f.debug_struct("TraceEvent")
            .field("kind", &self.kind())
            .field("function", &frame.function_name())
            .field("line", &frame.line())
            .finish()
    }
}

/// What the interpreter should do with tracing after a callback returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceFlow {
    /// Keep delivering events to the same callback.
    Continue,
    /// Stop tracing for the rest of the run.
    Detach,
}

/// Receiver of trace events. Runs on the interpreter's thread.
pub trait TraceCallback: Send {
    fn trace(&mut self, event: TraceEvent<'_>) -> TraceFlow;
}

impl<F> TraceCallback for F
where
    F: FnMut(TraceEvent<'_>) -> TraceFlow + Send,
{
    fn trace(&mut self, event: TraceEvent<'_>) -> TraceFlow {
        self(event)
    }
}
