//! Interpreter capability interface and the bundled batch-style interpreter.

mod arith;
mod host;
mod program;
mod runner;

pub use host::{Host, NoHost};
pub use program::{Cond, Jump, Op, Program, Statement};
pub use runner::BatchEngine;

use crate::error::{Diagnostic, DomainError, RuntimeError, ScriptError};
use crate::trace::TraceCallback;

/// Destination of script output.
pub trait OutputSink: Send {
    fn write(&mut self, text: &str);

    /// Report a failure raised by the host object model.
    fn domain_error(&mut self, error: &DomainError) {
        self.write(&format!("{error}\n"));
    }
}

/// Output sink writing to the process stdout.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn write(&mut self, text: &str) {
        print!("{text}");
    }

    fn domain_error(&mut self, error: &DomainError) {
        eprintln!("{error}");
    }
}

/// What the debugger needs from an interpreter.
pub trait ScriptEngine: Send + 'static {
    type Program: Send + 'static;

    /// Compile source text. Never runs any of it.
    fn compile(&mut self, source: &str) -> Result<Self::Program, Diagnostic>;

    /// Execute a compiled program on the calling thread, invoking the trace
    /// callback (if one is set) for every event.
    fn run(&mut self, program: &Self::Program) -> Result<(), RuntimeError>;

    /// Install or remove the trace callback used by subsequent runs.
    fn set_trace(&mut self, callback: Option<Box<dyn TraceCallback>>);

    fn set_output(&mut self, sink: Box<dyn OutputSink>);

    fn compile_and_run(&mut self, source: &str) -> Result<(), ScriptError> {
        let program = self.compile(source)?;
        self.run(&program)?;
        Ok(())
    }
}
