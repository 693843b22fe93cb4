use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use super::breakpoints::BreakpointSource;
use super::dispatcher::TraceDispatcher;
use super::frame::{FrameSummary, Payload};
use super::handoff::Handoff;
use super::notify::{ChannelOutput, FinishGuard, Halt, Notification, Step};
use super::sink::{DebugSink, HighlightKind};
use super::stepping::{Strategy, StrategyKind};
use crate::error::{DebugError, ScriptError};
use crate::executor::ScriptEngine;
use crate::trace::{TraceCallback, TraceKind};

const WORKER_NAME: &str = "script-worker";

/// Status line shown to the user. Every change is forwarded to the sink.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebugInfo {
    status: String,
}

impl DebugInfo {
    pub fn status(&self) -> &str {
        &self.status
    }
}

/// Where a wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stop {
    /// The worker is parked on a trace event.
    Halted { kind: TraceKind, line: usize },
    /// No script is executing.
    Finished,
}

struct Session {
    handoff: Arc<Handoff>,
    events: Receiver<Notification>,
    worker: JoinHandle<()>,
}

/// Runs scripts on a worker thread and steers them from the calling thread.
///
/// All sink notifications are delivered from [`Controller::pump`],
/// [`Controller::wait`] or [`Controller::wait_timeout`], or from a step
/// command draining pending ones, so the sink only ever runs on the thread
/// that owns the controller.
pub struct Controller<E: ScriptEngine, S: DebugSink> {
    engine: Arc<Mutex<E>>,
    sink: S,
    breakpoints: Arc<dyn BreakpointSource>,
    session: Option<Session>,
    info: DebugInfo,
    active: Option<StrategyKind>,
    halt: Option<Halt>,
    last_error: Option<ScriptError>,
}

impl<E: ScriptEngine, S: DebugSink> Controller<E, S> {
    pub fn new(engine: E, sink: S, breakpoints: impl BreakpointSource + 'static) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            sink,
            breakpoints: Arc::new(breakpoints),
            session: None,
            info: DebugInfo::default(),
            active: None,
            halt: None,
            last_error: None,
        }
    }

    /// Compile and execute `source` without instrumentation.
    pub fn run(&mut self, source: &str) -> Result<(), DebugError> {
        self.start(source, None)
    }

    /// Compile and execute `source`, halting on its first trace event.
    pub fn debug(&mut self, source: &str) -> Result<(), DebugError> {
        self.start(source, Some(Strategy::StepInto))
    }

    pub fn step_into(&mut self) -> bool {
        self.step(StrategyKind::StepInto)
    }

    pub fn step_over(&mut self) -> bool {
        self.step(StrategyKind::StepOver)
    }

    pub fn step_out(&mut self) -> bool {
        self.step(StrategyKind::StepOut)
    }

    pub fn run_to_end(&mut self) -> bool {
        self.step(StrategyKind::RunToEnd)
    }

    pub fn run_to_breakpoint(&mut self) -> bool {
        self.step(StrategyKind::RunToBreakpoint)
    }

    /// Deliver every pending notification to the sink without blocking.
    /// Returns how many were delivered.
    pub fn pump(&mut self) -> usize {
        let mut delivered = 0;
        loop {
            let Some(session) = &self.session else {
                return delivered;
            };
            match session.events.try_recv() {
                Ok(notification) => self.deliver(notification),
                Err(TryRecvError::Empty) => return delivered,
                Err(TryRecvError::Disconnected) => self.finish(Err(ScriptError::WorkerLost)),
            }
            delivered += 1;
        }
    }

    /// Block until the worker halts or the run finishes.
    pub fn wait(&mut self) -> Stop {
        loop {
            if let Some(stop) = self.stopped() {
                return stop;
            }
            let Some(session) = &self.session else {
                return Stop::Finished;
            };
            match session.events.recv() {
                Ok(notification) => self.deliver(notification),
                Err(_) => self.finish(Err(ScriptError::WorkerLost)),
            }
        }
    }

    /// Like [`Controller::wait`], giving up after `timeout`.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<Stop> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(stop) = self.stopped() {
                return Some(stop);
            }
            let session = self.session.as_ref()?;
            let remaining = deadline.saturating_duration_since(Instant::now());
            match session.events.recv_timeout(remaining) {
                Ok(notification) => self.deliver(notification),
                Err(RecvTimeoutError::Timeout) => return None,
                Err(RecvTimeoutError::Disconnected) => self.finish(Err(ScriptError::WorkerLost)),
            }
        }
    }

    /// The failure the most recent run ended with, or its compile error.
    pub fn last_error(&self) -> Option<&ScriptError> {
        self.last_error.as_ref()
    }

    pub fn debug_info(&self) -> &DebugInfo {
        &self.info
    }

    /// Strategy the worker currently runs under; `None` when idle or running
    /// without instrumentation.
    pub fn active_strategy(&self) -> Option<StrategyKind> {
        self.active
    }

    /// Frame the worker is halted in.
    pub fn current_frame(&self) -> Option<&FrameSummary> {
        self.halt.as_ref().map(|h| &h.frame)
    }

    pub fn is_running(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_halted(&self) -> bool {
        self.halt.is_some()
    }

    pub fn breakpoints(&self) -> &Arc<dyn BreakpointSource> {
        &self.breakpoints
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// The engine, while no script is executing.
    pub fn engine(&self) -> Option<MutexGuard<'_, E>> {
        match self.session {
            Some(_) => None,
            None => Some(self.engine.lock()),
        }
    }

    fn start(&mut self, source: &str, strategy: Option<Strategy>) -> Result<(), DebugError> {
        self.pump();
        if self.session.is_some() {
            return Err(DebugError::AlreadyRunning);
        }

        let compiled = self.engine.lock().compile(source);
        let program = match compiled {
            Ok(program) => program,
            Err(diagnostic) => {
                warn!(%diagnostic, "compile failed");
                let error = ScriptError::Compile(diagnostic.clone());
                self.sink.on_error(&error);
                self.last_error = Some(error);
                self.completed();
                return Err(DebugError::Compile(diagnostic));
            }
        };

        let (tx, rx) = mpsc::channel();
        let handoff = Arc::new(Handoff::new());
        let active = strategy.as_ref().map(Strategy::kind);
        let dispatcher = strategy.map(|s| TraceDispatcher::new(s, handoff.clone(), tx.clone()));
        let engine = Arc::clone(&self.engine);

        let worker = thread::Builder::new()
            .name(WORKER_NAME.to_string())
            .spawn(move || {
                let mut guard = FinishGuard::new(tx.clone());
                let mut engine = engine.lock();
                engine.set_output(Box::new(ChannelOutput::new(tx)));
                engine.set_trace(dispatcher.map(|d| Box::new(d) as Box<dyn TraceCallback>));
                let outcome = engine.run(&program).map_err(ScriptError::from);
                engine.set_trace(None);
                guard.record(outcome);
            })?;
        info!(debug = active.is_some(), "script started");

        self.session = Some(Session {
            handoff,
            events: rx,
            worker,
        });
        self.last_error = None;
        self.active = active;
        self.sink.on_exec_mode(true);
        self.set_status("Running");
        Ok(())
    }

    fn step(&mut self, kind: StrategyKind) -> bool {
        self.pump();
        let Some(session) = &self.session else {
            debug!(?kind, "no script running");
            return false;
        };
        // The worker may be parked before its halt reached the sink; only a
        // delivered halt can be resumed.
        if self.halt.is_none() {
            debug!(?kind, "no halt delivered");
            return false;
        }

        let breakpoints = Arc::clone(&self.breakpoints);
        let released = session.handoff.release(|depth| {
            debug!(?kind, depth, "arming");
            match kind {
                StrategyKind::StepInto => Strategy::StepInto,
                StrategyKind::StepOver => Strategy::StepOver { depth, breakpoints },
                StrategyKind::StepOut => Strategy::StepOut { depth, breakpoints },
                StrategyKind::RunToEnd => Strategy::RunToEnd,
                StrategyKind::RunToBreakpoint => Strategy::RunToBreakpoint { breakpoints },
            }
        });
        if !released {
            debug!(?kind, "worker not parked");
            return false;
        }

        self.halt = None;
        self.active = Some(kind);
        self.set_status("Running");
        if kind == StrategyKind::RunToEnd {
            self.sink.on_highlight_line(None, HighlightKind::None);
        }
        true
    }

    fn stopped(&mut self) -> Option<Stop> {
        self.pump();
        match (&self.session, &self.halt) {
            (None, _) => Some(Stop::Finished),
            (Some(_), Some(halt)) => Some(Stop::Halted {
                kind: halt.kind,
                line: halt.frame.line,
            }),
            (Some(_), None) => None,
        }
    }

    fn deliver(&mut self, notification: Notification) {
        match notification {
            Notification::Step(step) => self.stepped(step),
            Notification::Halted(halt) => self.halted(halt),
            Notification::Output(text) => self.sink.on_output(&text),
            Notification::DomainError(error) => {
                warn!(%error, "domain error");
                self.sink.on_domain_error(&error);
            }
            Notification::Finished(outcome) => self.finish(outcome),
        }
    }

    /// Hand a traced event to the sink, then let the worker go on.
    fn stepped(&mut self, step: Step) {
        self.sink.on_step_event(step.kind, &step.frame, &step.payload);
        if let Some(session) = &self.session {
            session.handoff.mark_delivered(step.seq);
        }
    }

    fn halted(&mut self, halt: Halt) {
        debug!(kind = %halt.kind, line = halt.frame.line, depth = halt.depth, "halted");

        let frame = &halt.frame;
        let (status, line, highlight) = match (halt.kind, &halt.payload) {
            (TraceKind::Call, _) => (
                format!("Call: {}", frame.function),
                frame.line,
                HighlightKind::Call,
            ),
            (TraceKind::Return, _) => (
                format!("Return: {}", frame.function),
                frame.first_line,
                HighlightKind::Return,
            ),
            (TraceKind::Exception, Payload::Exception(info)) => (
                format!("Exception at line {}: {}", info.line, info.message),
                frame.line,
                HighlightKind::Exception,
            ),
            (TraceKind::Exception, _) => (
                format!("Exception at line {}", frame.line),
                frame.line,
                HighlightKind::Exception,
            ),
            (TraceKind::Line, _) => (format!("Line {}", frame.line), frame.line, HighlightKind::Line),
        };
        if halt.kind == TraceKind::Exception {
            self.active = Some(StrategyKind::StepInto);
        }
        self.set_status(&status);
        self.sink.on_highlight_line(Some(line), highlight);
        self.halt = Some(halt);
    }

    fn finish(&mut self, outcome: Result<(), ScriptError>) {
        let Some(session) = self.session.take() else {
            return;
        };
        let outcome = match session.worker.join() {
            Ok(()) => outcome,
            Err(_) => Err(ScriptError::WorkerLost),
        };

        match outcome {
            Ok(()) => info!("script finished"),
            Err(error) => {
                warn!(%error, "script failed");
                self.sink.on_error(&error);
                self.last_error = Some(error);
            }
        }

        self.halt = None;
        self.active = None;
        self.completed();
        self.sink.on_exec_mode(false);
    }

    fn completed(&mut self) {
        self.sink.on_finished();
        self.set_status("Completed");
        self.sink.on_highlight_line(None, HighlightKind::None);
    }

    fn set_status(&mut self, text: &str) {
        self.info.status = text.to_string();
        self.sink.on_status_changed(text);
    }
}

impl<E: ScriptEngine, S: DebugSink> Drop for Controller<E, S> {
    fn drop(&mut self) {
        if let Some(session) = &self.session {
            // Nothing will release the worker any more; let it run out.
            session.handoff.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debugger::{Breakpoints, Recorder, SinkEvent};
    use crate::executor::BatchEngine;

    const TIMEOUT: Duration = Duration::from_secs(10);

    fn controller() -> Controller<BatchEngine, Recorder> {
        Controller::new(BatchEngine::new(), Recorder::new(), Breakpoints::new())
    }

    #[test]
    fn debug_halts_on_entry() {
        let mut ctl = controller();
        ctl.debug("echo hi\n").unwrap();

        let stop = ctl.wait_timeout(TIMEOUT).unwrap();
        assert_eq!(stop, Stop::Halted { kind: TraceKind::Call, line: 1 });
        assert_eq!(ctl.active_strategy(), Some(StrategyKind::StepInto));
        assert_eq!(ctl.debug_info().status(), "Call: <main>");
        assert_eq!(ctl.current_frame().map(|f| f.function.as_str()), Some("<main>"));

        assert!(ctl.run_to_end());
        assert_eq!(ctl.wait_timeout(TIMEOUT), Some(Stop::Finished));
        assert_eq!(ctl.debug_info().status(), "Completed");
        assert_eq!(ctl.sink().output(), "hi\n");
        assert!(ctl.last_error().is_none());
    }

    #[test]
    fn step_without_script_is_noop() {
        let mut ctl = controller();
        assert!(!ctl.step_into());
        assert!(!ctl.run_to_end());
        assert!(ctl.sink().events.is_empty());
    }

    #[test]
    fn exec_mode_brackets_the_run() {
        let mut ctl = controller();
        ctl.run("echo x\n").unwrap();
        assert_eq!(ctl.wait(), Stop::Finished);

        let events = &ctl.sink().events;
        assert_eq!(events.first(), Some(&SinkEvent::ExecMode { executing: true }));
        assert_eq!(events.last(), Some(&SinkEvent::ExecMode { executing: false }));
        assert!(ctl.engine().is_some());
    }

    #[test]
    fn dropping_a_halted_controller_frees_the_worker() {
        let mut ctl = controller();
        ctl.debug("echo a\necho b\n").unwrap();
        ctl.wait_timeout(TIMEOUT).unwrap();
        let engine = Arc::clone(&ctl.engine);
        drop(ctl);

        // The worker runs to the end and releases the engine.
        let deadline = Instant::now() + TIMEOUT;
        while engine.try_lock().is_none() {
            assert!(Instant::now() < deadline, "worker never finished");
            thread::sleep(Duration::from_millis(5));
        }
    }
}
