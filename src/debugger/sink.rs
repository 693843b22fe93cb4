use serde::Serialize;

use super::frame::{FrameSummary, Payload};
use crate::error::{DomainError, ScriptError};
use crate::trace::TraceKind;

/// How the editor should mark a highlighted line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightKind {
    None,
    Call,
    Line,
    Return,
    Exception,
}

/// Receiver of everything the controller reports. Only ever called on the
/// controller thread.
pub trait DebugSink {
    /// Every traced event of a debug run, in order, whether or not it halts.
    /// The worker does not trace further until this returns.
    fn on_step_event(&mut self, kind: TraceKind, frame: &FrameSummary, payload: &Payload);

    fn on_status_changed(&mut self, text: &str);

    fn on_highlight_line(&mut self, line: Option<usize>, kind: HighlightKind);

    /// The run is over, successfully or not.
    fn on_finished(&mut self);

    /// The editor enters (`true`) or leaves script execution mode.
    fn on_exec_mode(&mut self, _executing: bool) {}

    /// Output written by the script.
    fn on_output(&mut self, _text: &str) {}

    /// A compile error (reported at once) or the failure a run finished with.
    fn on_error(&mut self, _error: &ScriptError) {}

    fn on_domain_error(&mut self, _error: &DomainError) {}
}

impl<S: DebugSink + ?Sized> DebugSink for Box<S> {
    fn on_step_event(&mut self, kind: TraceKind, frame: &FrameSummary, payload: &Payload) {
        (**self).on_step_event(kind, frame, payload);
    }

    fn on_status_changed(&mut self, text: &str) {
        (**self).on_status_changed(text);
    }

    fn on_highlight_line(&mut self, line: Option<usize>, kind: HighlightKind) {
        (**self).on_highlight_line(line, kind);
    }

    fn on_finished(&mut self) {
        (**self).on_finished();
    }

    fn on_exec_mode(&mut self, executing: bool) {
        (**self).on_exec_mode(executing);
    }

    fn on_output(&mut self, text: &str) {
        (**self).on_output(text);
    }

    fn on_error(&mut self, error: &ScriptError) {
        (**self).on_error(error);
    }

    fn on_domain_error(&mut self, error: &DomainError) {
        (**self).on_domain_error(error);
    }
}

/// One sink notification as data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SinkEvent {
    Step {
        kind: TraceKind,
        frame: FrameSummary,
        payload: Payload,
    },
    Status {
        text: String,
    },
    Highlight {
        line: Option<usize>,
        kind: HighlightKind,
    },
    Finished,
    ExecMode {
        executing: bool,
    },
    Output {
        text: String,
    },
    Error {
        message: String,
    },
    DomainError {
        command: String,
        message: String,
    },
}

impl SinkEvent {
    pub fn step(kind: TraceKind, frame: &FrameSummary, payload: &Payload) -> Self {
        Self::Step {
            kind,
            frame: frame.clone(),
            payload: payload.clone(),
        }
    }

    pub fn error(error: &ScriptError) -> Self {
        Self::Error {
            message: error.to_string(),
        }
    }

    pub fn domain_error(error: &DomainError) -> Self {
        Self::DomainError {
            command: error.command.clone(),
            message: error.message.clone(),
        }
    }
}

/// Sink that keeps every notification in order.
#[derive(Debug, Default, Clone)]
pub struct Recorder {
    pub events: Vec<SinkEvent>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Step events in the order they were delivered.
    pub fn steps(&self) -> impl Iterator<Item = (TraceKind, &FrameSummary)> + '_ {
        self.events.iter().filter_map(|e| match e {
            SinkEvent::Step { kind, frame, .. } => Some((*kind, frame)),
            _ => None,
        })
    }

    pub fn count_finished(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, SinkEvent::Finished))
            .count()
    }

    /// Concatenated script output.
    pub fn output(&self) -> String {
        self.events
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Output { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl DebugSink for Recorder {
    fn on_step_event(&mut self, kind: TraceKind, frame: &FrameSummary, payload: &Payload) {
        self.events.push(SinkEvent::step(kind, frame, payload));
    }

    fn on_status_changed(&mut self, text: &str) {
        self.events.push(SinkEvent::Status {
            text: text.to_string(),
        });
    }

    fn on_highlight_line(&mut self, line: Option<usize>, kind: HighlightKind) {
        self.events.push(SinkEvent::Highlight { line, kind });
    }

    fn on_finished(&mut self) {
        self.events.push(SinkEvent::Finished);
    }

    fn on_exec_mode(&mut self, executing: bool) {
        self.events.push(SinkEvent::ExecMode { executing });
    }

    fn on_output(&mut self, text: &str) {
        self.events.push(SinkEvent::Output {
            text: text.to_string(),
        });
    }

    fn on_error(&mut self, error: &ScriptError) {
        self.events.push(SinkEvent::error(error));
    }

    fn on_domain_error(&mut self, error: &DomainError) {
        self.events.push(SinkEvent::domain_error(error));
    }
}
