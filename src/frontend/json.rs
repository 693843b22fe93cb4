use std::io::{self, Stdout, Write};

use serde::Serialize;
use tracing::warn;

use crate::debugger::{DebugSink, FrameSummary, HighlightKind, Payload, SinkEvent};
use crate::error::{DomainError, ScriptError};
use crate::trace::TraceKind;

#[derive(Serialize)]
struct Envelope<'a> {
    seq: u64,
    #[serde(flatten)]
    event: &'a SinkEvent,
}

/// Machine sink: every notification becomes one JSON object per line,
/// numbered with a running `seq`.
pub struct JsonSink<W: Write = Stdout> {
    seq: u64,
    out: W,
}

impl JsonSink {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> JsonSink<W> {
    pub fn new(out: W) -> Self {
        Self { seq: 0, out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn send(&mut self, event: SinkEvent) {
        let envelope = Envelope {
            seq: self.next_seq(),
            event: &event,
        };
        let written = serde_json::to_writer(&mut self.out, &envelope)
            .map_err(io::Error::from)
            .and_then(|_| self.out.write_all(b"\n"))
            .and_then(|_| self.out.flush());
        if let Err(err) = written {
            warn!(%err, "failed to write event");
        }
    }
}

impl<W: Write> DebugSink for JsonSink<W> {
    fn on_step_event(&mut self, kind: TraceKind, frame: &FrameSummary, payload: &Payload) {
        self.send(SinkEvent::step(kind, frame, payload));
    }

    fn on_status_changed(&mut self, text: &str) {
        self.send(SinkEvent::Status {
            text: text.to_string(),
        });
    }

    fn on_highlight_line(&mut self, line: Option<usize>, kind: HighlightKind) {
        self.send(SinkEvent::Highlight { line, kind });
    }

    fn on_finished(&mut self) {
        self.send(SinkEvent::Finished);
    }

    fn on_exec_mode(&mut self, executing: bool) {
        self.send(SinkEvent::ExecMode { executing });
    }

    fn on_output(&mut self, text: &str) {
        self.send(SinkEvent::Output {
            text: text.to_string(),
        });
    }

    fn on_error(&mut self, error: &ScriptError) {
        self.send(SinkEvent::error(error));
    }

    fn on_domain_error(&mut self, error: &DomainError) {
        self.send(SinkEvent::domain_error(error));
    }
}
