//! Messages from the worker thread to the controller thread.

use std::sync::mpsc::Sender;

use super::frame::{FrameSummary, Payload};
use crate::error::{DomainError, ScriptError};
use crate::executor::OutputSink;
use crate::trace::TraceKind;

/// One traced event. The worker waits for the controller to acknowledge
/// `seq` before it decides whether to halt.
#[derive(Debug, Clone)]
pub(crate) struct Step {
    pub seq: u64,
    pub kind: TraceKind,
    pub frame: FrameSummary,
    pub payload: Payload,
}

/// Snapshot taken when the worker parks.
#[derive(Debug, Clone)]
pub(crate) struct Halt {
    pub kind: TraceKind,
    pub depth: usize,
    pub frame: FrameSummary,
    pub payload: Payload,
}

#[derive(Debug)]
pub(crate) enum Notification {
    Step(Step),
    Halted(Halt),
    Output(String),
    DomainError(DomainError),
    Finished(Result<(), ScriptError>),
}

/// Output sink the worker installs on the engine; forwards everything to the
/// controller.
pub(crate) struct ChannelOutput {
    events: Sender<Notification>,
}

impl ChannelOutput {
    pub(crate) fn new(events: Sender<Notification>) -> Self {
        Self { events }
    }
}

impl OutputSink for ChannelOutput {
    fn write(&mut self, text: &str) {
        let _ = self.events.send(Notification::Output(text.to_string()));
    }

    fn domain_error(&mut self, error: &DomainError) {
        let _ = self.events.send(Notification::DomainError(error.clone()));
    }
}

/// Sends the worker's outcome when dropped. A worker that unwinds before
/// recording an outcome reports [`ScriptError::WorkerLost`].
pub(crate) struct FinishGuard {
    events: Sender<Notification>,
    outcome: Option<Result<(), ScriptError>>,
}

impl FinishGuard {
    pub(crate) fn new(events: Sender<Notification>) -> Self {
        Self {
            events,
            outcome: None,
        }
    }

    pub(crate) fn record(&mut self, outcome: Result<(), ScriptError>) {
        self.outcome = Some(outcome);
    }
}

impl Drop for FinishGuard {
    fn drop(&mut self) {
        let outcome = self.outcome.take().unwrap_or(Err(ScriptError::WorkerLost));
        let _ = self.events.send(Notification::Finished(outcome));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;

    #[test]
    fn guard_reports_lost_worker_on_panic() {
        let (tx, rx) = mpsc::channel();
        let result = thread::spawn(move || {
            let _guard = FinishGuard::new(tx);
            panic!("interpreter bug");
        })
        .join();
        assert!(result.is_err());

        match rx.recv().unwrap() {
            Notification::Finished(outcome) => assert_eq!(outcome, Err(ScriptError::WorkerLost)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn channel_output_forwards_in_order() {
        let (tx, rx) = mpsc::channel();
        let mut out = ChannelOutput::new(tx);
        out.write("a");
        out.domain_error(&DomainError {
            command: "box".into(),
            message: "bad size".into(),
        });

        assert!(matches!(rx.recv().unwrap(), Notification::Output(text) if text == "a"));
        assert!(matches!(rx.recv().unwrap(), Notification::DomainError(e) if e.command == "box"));
    }
}
