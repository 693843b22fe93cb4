use std::io::{self, Stderr, Stdout, Write};

use tracing::warn;

use crate::debugger::{DebugSink, FrameSummary, HighlightKind, Payload};
use crate::error::{DomainError, ScriptError};
use crate::trace::TraceKind;

/// Human-oriented sink. Debugger UI goes to `ui`, script output to `out`.
pub struct ConsoleSink<U: Write = Stderr, O: Write = Stdout> {
    source: Vec<String>,
    ui: U,
    out: O,
}

impl ConsoleSink {
    /// UI on stderr, script output on stdout.
    pub fn stdio(source: &str) -> Self {
        Self::new(source, io::stderr(), io::stdout())
    }
}

impl<U: Write, O: Write> ConsoleSink<U, O> {
    pub fn new(source: &str, ui: U, out: O) -> Self {
        Self {
            source: source.lines().map(str::to_string).collect(),
            ui,
            out,
        }
    }

    pub fn into_parts(self) -> (U, O) {
        (self.ui, self.out)
    }

    fn say(&mut self, text: std::fmt::Arguments<'_>) {
        if let Err(err) = self.ui.write_fmt(text).and_then(|_| self.ui.flush()) {
            warn!(%err, "console write failed");
        }
    }

    fn source_line(&self, line: usize) -> &str {
        line.checked_sub(1)
            .and_then(|i| self.source.get(i))
            .map(String::as_str)
            .unwrap_or("")
    }
}

impl<U: Write, O: Write> DebugSink for ConsoleSink<U, O> {
    fn on_step_event(&mut self, kind: TraceKind, frame: &FrameSummary, payload: &Payload) {
        let line = frame.line;
        match (kind, payload) {
            (TraceKind::Call, _) => self.say(format_args!("\n⤵️  Entering {} (line {line})\n", frame.function)),
            (TraceKind::Return, Payload::ReturnValue { value }) => {
                self.say(format_args!("\n⤴️  Leaving {} with {value}\n", frame.function))
            }
            (TraceKind::Return, _) => self.say(format_args!("\n⤴️  Leaving {}\n", frame.function)),
            (TraceKind::Exception, Payload::Exception(info)) => {
                self.say(format_args!("\n❌ Exception at line {}: {}\n", info.line, info.message))
            }
            _ => self.say(format_args!("\n🔍 Line {line} in {}\n", frame.function)),
        }
    }

    fn on_status_changed(&mut self, _text: &str) {}

    fn on_highlight_line(&mut self, line: Option<usize>, _kind: HighlightKind) {
        if let Some(line) = line {
            let text = self.source_line(line).to_string();
            self.say(format_args!("  {line:>4} | {text}\n"));
        }
    }

    fn on_finished(&mut self) {
        self.say(format_args!("\n✅ Script finished\n"));
    }

    fn on_output(&mut self, text: &str) {
        if let Err(err) = self.out.write_all(text.as_bytes()).and_then(|_| self.out.flush()) {
            warn!(%err, "script output write failed");
        }
    }

    fn on_error(&mut self, error: &ScriptError) {
        self.say(format_args!("❌ {error}\n"));
    }

    fn on_domain_error(&mut self, error: &DomainError) {
        self.say(format_args!("⚠️  {error}\n"));
    }
}
