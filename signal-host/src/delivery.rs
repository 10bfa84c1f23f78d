//! Delivery engine and handler invocation frame.

use std::sync::Arc;

use log::{debug, info};
use signal::{
    DefaultAction, DeliveryOutcome, ProcId, SigInfo, SignalAction, SignalNo, SignalOps,
    SignalResult,
};

use crate::error::SendError;
use crate::kernel::Kernel;
use crate::observer::DeliveryEvent;
use crate::process::{Process, ProcessState, TerminalState};

/// What is left to do once the process lock is released.
enum Followup {
    Nothing,
    Exit(TerminalState),
    Run(SignalAction),
}

/// Pops the handler frame on drop, including when the callback unwinds.
struct FrameGuard<'a> {
    process: &'a Process,
    signo: SignalNo,
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        self.process.inner.lock().signal.leave_handler(self.signo);
    }
}

impl Kernel {
    /// Post `signo` to `target` and apply it if nothing defers it.
    ///
    /// A handler runs on the calling thread before this returns.
    pub fn send(
        &self,
        sender: Option<ProcId>,
        target: ProcId,
        signo: SignalNo,
    ) -> Result<DeliveryOutcome, SendError> {
        self.dispatch(sender, target, signo, &mut Vec::new())
    }

    /// Deliver every pending kind of `pid` that is eligible now, ascending rank.
    ///
    /// Kinds delivered by the flush that follows each handler are included.
    pub fn flush(&self, pid: ProcId) -> Vec<(SignalNo, DeliveryOutcome)> {
        let mut delivered = Vec::new();
        while let Some(process) = self.live(pid) {
            let next = {
                let mut inner = process.inner.lock();
                if inner.state.is_terminal() {
                    None
                } else {
                    inner.signal.take_deliverable()
                }
            };
            let Some((signo, sender)) = next else {
                break;
            };
            if self.dispatch(sender, pid, signo, &mut delivered).is_err() {
                break;
            }
        }
        delivered
    }

    /// Decide and apply one delivery. `delivered` receives this delivery and,
    /// after it, whatever the post-handler flush delivered.
    fn dispatch(
        &self,
        sender: Option<ProcId>,
        target: ProcId,
        signo: SignalNo,
        delivered: &mut Vec<(SignalNo, DeliveryOutcome)>,
    ) -> Result<DeliveryOutcome, SendError> {
        let process = self
            .lookup(target)
            .ok_or(SendError::NoSuchProcess(target))?;

        let (outcome, followup, resumed) = {
            let mut inner = process.inner.lock();
            if inner.state.is_terminal() {
                return Err(SendError::NoSuchProcess(target));
            }
            // SIGCONT resumes a stopped process whatever its disposition.
            let resumed = signo == SignalNo::SIGCONT && inner.state == ProcessState::Stopped;
            if resumed {
                inner.state = ProcessState::Running;
            }
            match inner.signal.add_signal(signo, sender) {
                SignalResult::Ignored => (DeliveryOutcome::Dropped, Followup::Nothing, resumed),
                SignalResult::Pending => (DeliveryOutcome::Queued, Followup::Nothing, resumed),
                SignalResult::ProcessKilled(action) => {
                    let status = TerminalState::Terminated(signo);
                    inner.state = status.into();
                    (
                        DeliveryOutcome::DefaultActionApplied(action),
                        Followup::Exit(status),
                        resumed,
                    )
                }
                SignalResult::ProcessSuspended => {
                    inner.state = ProcessState::Stopped;
                    (
                        DeliveryOutcome::DefaultActionApplied(DefaultAction::Stop),
                        Followup::Nothing,
                        resumed,
                    )
                }
                SignalResult::ProcessResumed if resumed => (
                    DeliveryOutcome::DefaultActionApplied(DefaultAction::Continue),
                    Followup::Nothing,
                    resumed,
                ),
                SignalResult::ProcessResumed => {
                    (DeliveryOutcome::Dropped, Followup::Nothing, resumed)
                }
                SignalResult::Handle(action) => {
                    inner.signal.enter_handler(signo, action.mask);
                    (DeliveryOutcome::HandlerInvoked, Followup::Run(action), resumed)
                }
            }
        };

        if resumed {
            self.stops.broadcast();
        }
        self.report(DeliveryEvent {
            sender,
            target,
            signo,
            outcome,
        });
        delivered.push((signo, outcome));

        match followup {
            Followup::Nothing => {}
            Followup::Exit(status) => self.after_exit(target, status),
            Followup::Run(action) => {
                let info = SigInfo {
                    signo,
                    sender,
                    receiver: target,
                };
                delivered.extend(self.run_handler(&process, &action, &info));
            }
        }
        Ok(outcome)
    }

    /// Invoke the callback of an already pushed frame, then flush.
    fn run_handler(
        &self,
        process: &Arc<Process>,
        action: &SignalAction,
        info: &SigInfo,
    ) -> Vec<(SignalNo, DeliveryOutcome)> {
        {
            let _frame = FrameGuard {
                process: process.as_ref(),
                signo: info.signo,
            };
            let ops: &dyn SignalOps = self;
            (action.handler)(ops, info);
        }
        debug!("{} returned from the {} handler", process.pid, info.signo);
        self.flush(process.pid)
    }

    fn report(&self, event: DeliveryEvent) {
        match event.outcome {
            DeliveryOutcome::Dropped | DeliveryOutcome::Queued => debug!("{}", event),
            DeliveryOutcome::DefaultActionApplied(_) | DeliveryOutcome::HandlerInvoked => {
                info!("{}", event)
            }
        }
        let observers = self.observers.read().clone();
        for observer in observers {
            observer.on_delivery(&event);
        }
    }
}
