use std::sync::mpsc::Sender;
use std::sync::Arc;

use tracing::{debug, trace};

use super::frame::{FrameSummary, Payload};
use super::handoff::Handoff;
use super::notify::{Halt, Notification, Step};
use super::stepping::{Decision, Strategy};
use crate::trace::{TraceCallback, TraceEvent, TraceFlow, TraceKind};

/// Trace callback installed for a debug run. Lives on the worker thread.
pub(crate) struct TraceDispatcher {
    strategy: Strategy,
    depth: usize,
    /// Sequence number of the last step event sent.
    seq: u64,
    handoff: Arc<Handoff>,
    events: Sender<Notification>,
}

impl TraceDispatcher {
    pub(crate) fn new(strategy: Strategy, handoff: Arc<Handoff>, events: Sender<Notification>) -> Self {
        Self {
            strategy,
            depth: 0,
            seq: 0,
            handoff,
            events,
        }
    }

    /// Send the step event and wait until the sink has seen it, so the next
    /// event never overlaps its delivery.
    fn report(&mut self, kind: TraceKind, frame: &FrameSummary, payload: &Payload) {
        self.seq += 1;
        let step = Step {
            seq: self.seq,
            kind,
            frame: frame.clone(),
            payload: payload.clone(),
        };
        // A closed channel means the controller is gone; nobody acknowledges.
        if self.events.send(Notification::Step(step)).is_ok() {
            self.handoff.await_delivery(self.seq);
        }
    }

    /// Queue the halt for the controller and block until a step command
    /// hands over the next strategy.
    fn halt(&mut self, kind: TraceKind, frame: FrameSummary, payload: Payload) {
        let halt = Halt {
            kind,
            depth: self.depth,
            frame,
            payload,
        };
        debug!(kind = %halt.kind, line = halt.frame.line, depth = self.depth, "halting");

        let events = &self.events;
        self.strategy = self.handoff.park(self.depth, || {
            // A closed channel means the controller is gone; the handoff is
            // closed too and park returns at once.
            let _ = events.send(Notification::Halted(halt));
        });
        debug!(strategy = ?self.strategy, "resumed");
    }
}

impl TraceCallback for TraceDispatcher {
    fn trace(&mut self, event: TraceEvent<'_>) -> TraceFlow {
        let kind = event.kind();
        if kind == TraceKind::Call {
            self.depth += 1;
        }

        let frame = FrameSummary::capture(event.frame());
        let payload = Payload::capture(&event);
        self.report(kind, &frame, &payload);

        let decision = match event {
            TraceEvent::Call(_) => self.strategy.on_call(self.depth),
            TraceEvent::Line(_) => self.strategy.on_line(self.depth, frame.line),
            TraceEvent::Return(..) => self.strategy.on_return(self.depth),
            TraceEvent::Exception(..) => {
                self.strategy = Strategy::StepInto;
                Decision::Halt
            }
        };
        trace!(%kind, depth = self.depth, ?decision, "dispatch");

        if decision == Decision::Halt {
            self.halt(kind, frame, payload);
        }

        if kind == TraceKind::Return {
            self.depth = self
                .depth
                .checked_sub(1)
                .expect("return event without a matching call");
        }

        TraceFlow::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{Bindings, CodeId, Frame};
    use std::sync::mpsc;
    use std::thread;

    struct Fake {
        line: usize,
    }

    impl Frame for Fake {
        fn line(&self) -> usize {
            self.line
        }
        fn code_id(&self) -> CodeId {
            CodeId(0)
        }
        fn function_name(&self) -> &str {
            "fake"
        }
        fn first_line(&self) -> usize {
            1
        }
        fn locals(&self) -> Bindings {
            Bindings::new()
        }
        fn globals(&self) -> Bindings {
            Bindings::new()
        }
    }

    fn kinds(rx: &mpsc::Receiver<Notification>) -> Vec<(u64, TraceKind)> {
        rx.try_iter()
            .map(|n| match n {
                Notification::Step(step) => (step.seq, step.kind),
                other => panic!("unexpected {other:?}"),
            })
            .collect()
    }

    #[test]
    fn run_to_end_reports_every_event_and_tracks_depth() {
        let (tx, rx) = mpsc::channel();
        // Nobody acknowledges on a closed handoff, so the waits fall through.
        let handoff = Arc::new(Handoff::new());
        handoff.close();
        let mut dispatcher = TraceDispatcher::new(Strategy::RunToEnd, handoff, tx);
        let frame = Fake { line: 3 };

        assert_eq!(dispatcher.trace(TraceEvent::Call(&frame)), TraceFlow::Continue);
        dispatcher.trace(TraceEvent::Call(&frame));
        dispatcher.trace(TraceEvent::Line(&frame));
        assert_eq!(dispatcher.depth, 2);
        dispatcher.trace(TraceEvent::Return(&frame, None));
        assert_eq!(dispatcher.depth, 1);

        assert_eq!(
            kinds(&rx),
            vec![
                (1, TraceKind::Call),
                (2, TraceKind::Call),
                (3, TraceKind::Line),
                (4, TraceKind::Return),
            ]
        );
    }

    #[test]
    fn waits_for_each_step_to_be_delivered() {
        let (tx, rx) = mpsc::channel();
        let handoff = Arc::new(Handoff::new());
        let mut dispatcher = TraceDispatcher::new(Strategy::RunToEnd, handoff.clone(), tx);

        let worker = thread::spawn(move || {
            let frame = Fake { line: 1 };
            dispatcher.trace(TraceEvent::Call(&frame));
            dispatcher.trace(TraceEvent::Line(&frame));
        });

        let Notification::Step(first) = rx.recv().unwrap() else {
            panic!("expected a step event");
        };
        thread::sleep(std::time::Duration::from_millis(20));
        // The line event is not traced until the call is acknowledged.
        assert!(rx.try_recv().is_err());

        handoff.mark_delivered(first.seq);
        let Notification::Step(second) = rx.recv().unwrap() else {
            panic!("expected a step event");
        };
        assert_eq!(second.kind, TraceKind::Line);
        handoff.mark_delivered(second.seq);
        worker.join().unwrap();
    }

    #[test]
    fn exception_halts_and_rearms_step_into() {
        let (tx, rx) = mpsc::channel();
        let handoff = Arc::new(Handoff::new());
        let mut dispatcher = TraceDispatcher::new(Strategy::RunToEnd, handoff.clone(), tx);

        let worker = thread::spawn(move || {
            let frame = Fake { line: 9 };
            let info = crate::trace::ExceptionInfo {
                message: "boom".to_string(),
                line: 9,
            };
            dispatcher.trace(TraceEvent::Call(&frame));
            dispatcher.trace(TraceEvent::Exception(&frame, &info));
            dispatcher.strategy.kind()
        });

        for expected in [TraceKind::Call, TraceKind::Exception] {
            match rx.recv().unwrap() {
                Notification::Step(step) => {
                    assert_eq!(step.kind, expected);
                    handoff.mark_delivered(step.seq);
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        match rx.recv().unwrap() {
            Notification::Halted(halt) => {
                assert_eq!(halt.kind, TraceKind::Exception);
                assert_eq!(halt.depth, 1);
                assert_eq!(
                    halt.payload,
                    Payload::Exception(crate::trace::ExceptionInfo {
                        message: "boom".to_string(),
                        line: 9,
                    })
                );
            }
            _ => panic!("expected a halt notification"),
        }
        // The exception already swapped in StepInto; hand it back unchanged.
        assert!(handoff.release(|_| Strategy::StepInto));
        assert_eq!(worker.join().unwrap(), crate::debugger::StrategyKind::StepInto);
    }
}
