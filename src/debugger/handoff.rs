//! Blocking handoff between the worker and the controller thread.

use parking_lot::{Condvar, Mutex};

use super::stepping::Strategy;

#[derive(Default)]
struct Slot {
    /// Depth the worker is parked at.
    parked: Option<usize>,
    /// Strategy handed over by the controller; wakes the worker.
    release: Option<Strategy>,
    /// The controller is gone; parking returns immediately.
    closed: bool,
    /// Highest step event sequence number the controller has delivered.
    delivered: u64,
}

/// Single-slot binary signal. The worker parks, the controller releases it
/// exactly once per step command and passes the strategy to resume with.
///
/// Also carries delivery acknowledgements for step events, so the worker
/// never runs ahead of the sink.
#[derive(Default)]
pub(crate) struct Handoff {
    slot: Mutex<Slot>,
    cvar: Condvar,
}

impl Handoff {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Park the calling worker at `depth`.
    ///
    /// `announce` runs after the worker is registered as parked but before it
    /// blocks, so a controller reacting to the announcement always finds it
    /// parked. Returns the strategy supplied by [`Handoff::release`].
    pub(crate) fn park(&self, depth: usize, announce: impl FnOnce()) -> Strategy {
        let mut slot = self.slot.lock();
        if slot.closed {
            return Strategy::RunToEnd;
        }
        slot.parked = Some(depth);
        slot.release = None;
        announce();
        loop {
            if let Some(strategy) = slot.release.take() {
                slot.parked = None;
                return strategy;
            }
            if slot.closed {
                slot.parked = None;
                return Strategy::RunToEnd;
            }
            self.cvar.wait(&mut slot);
        }
    }

    /// Wake the parked worker with the strategy built by `arm` from the
    /// parked depth. Returns `false` (and does nothing) when no worker is
    /// waiting.
    pub(crate) fn release(&self, arm: impl FnOnce(usize) -> Strategy) -> bool {
        let mut slot = self.slot.lock();
        let Some(depth) = slot.parked else {
            return false;
        };
        if slot.release.is_some() {
            return false;
        }
        slot.release = Some(arm(depth));
        self.cvar.notify_one();
        true
    }

    /// Block until step event `seq` has been delivered to the sink.
    pub(crate) fn await_delivery(&self, seq: u64) {
        let mut slot = self.slot.lock();
        while slot.delivered < seq && !slot.closed {
            self.cvar.wait(&mut slot);
        }
    }

    pub(crate) fn mark_delivered(&self, seq: u64) {
        let mut slot = self.slot.lock();
        slot.delivered = slot.delivered.max(seq);
        self.cvar.notify_all();
    }

    /// Let the worker run free from now on: any parked or future `park`
    /// returns [`Strategy::RunToEnd`] at once.
    pub(crate) fn close(&self) {
        self.slot.lock().closed = true;
        self.cvar.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debugger::StrategyKind;
    use std::sync::{mpsc, Arc};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn release_without_parked_worker_is_a_noop() {
        let handoff = Handoff::new();
        assert!(!handoff.release(|_| Strategy::RunToEnd));
    }

    #[test]
    fn worker_blocks_until_released_and_receives_strategy() {
        let handoff = Arc::new(Handoff::new());
        let (tx, rx) = mpsc::channel();

        let worker = {
            let handoff = handoff.clone();
            thread::spawn(move || {
                let strategy = handoff.park(3, || tx.send("parked").unwrap());
                strategy.kind()
            })
        };

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok("parked"));
        thread::sleep(Duration::from_millis(20));
        assert!(!worker.is_finished());

        let mut seen = None;
        assert!(handoff.release(|depth| {
            seen = Some(depth);
            Strategy::StepInto
        }));
        assert!(!handoff.release(|_| Strategy::RunToEnd));
        assert_eq!(seen, Some(3));

        assert_eq!(worker.join().unwrap(), StrategyKind::StepInto);
        assert!(!handoff.release(|_| Strategy::StepInto));
    }

    #[test]
    fn delivery_wait_returns_once_acknowledged() {
        let handoff = Arc::new(Handoff::new());
        let worker = {
            let handoff = handoff.clone();
            thread::spawn(move || {
                handoff.await_delivery(1);
                handoff.await_delivery(2);
            })
        };

        thread::sleep(Duration::from_millis(20));
        assert!(!worker.is_finished());
        handoff.mark_delivered(2);
        worker.join().unwrap();

        // Already acknowledged sequence numbers do not block.
        handoff.await_delivery(1);
    }

    #[test]
    fn close_frees_parked_and_future_workers() {
        let handoff = Arc::new(Handoff::new());
        let (tx, rx) = mpsc::channel();

        let worker = {
            let handoff = handoff.clone();
            thread::spawn(move || {
                let first = handoff.park(1, || tx.send(()).unwrap());
                let second = handoff.park(2, || panic!("closed handoff must not announce"));
                (first.kind(), second.kind())
            })
        };

        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        handoff.close();
        assert_eq!(
            worker.join().unwrap(),
            (StrategyKind::RunToEnd, StrategyKind::RunToEnd)
        );
        assert!(!handoff.release(|_| Strategy::StepInto));
        handoff.await_delivery(100);
    }
}
