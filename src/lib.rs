//! Interactive step debugger for line-oriented scripts.
//!
//! A [`Controller`] compiles a script on the calling thread, runs it on a
//! worker thread and halts it according to the active step strategy. The
//! bundled [`BatchEngine`] interprets a batch-flavoured scripting language;
//! any interpreter implementing [`ScriptEngine`] can be debugged the same way.

pub mod debugger;
pub mod error;
pub mod executor;
pub mod frontend;
pub mod parser;
pub mod trace;

pub use debugger::{Breakpoints, Controller, DebugSink, Stop};
pub use error::{DebugError, Diagnostic, DomainError, RuntimeError, ScriptError};
pub use executor::{BatchEngine, Host, ScriptEngine};
