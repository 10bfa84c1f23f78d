#![no_std]

extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

pub use rcore_task_manage::ProcId;
pub use signal_defs::{DefaultAction, ParseSignalError, SignalNo, SignalSet, MAX_SIG};

/// What a handler learns about the delivery it is running for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigInfo {
    pub signo: SignalNo,
    /// `None` when the signal came from outside the process tree.
    pub sender: Option<ProcId>,
    pub receiver: ProcId,
}

/// Hosted handler callback.
///
/// `ops` lets the handler send, block and unblock while it runs; those calls
/// see the mask overlay of the running frame.
pub type HandlerFn = Arc<dyn Fn(&dyn SignalOps, &SigInfo) + Send + Sync>;

/// A caught-signal action: the callback plus the kinds blocked while it runs.
#[derive(Clone)]
pub struct SignalAction {
    pub handler: HandlerFn,
    pub mask: SignalSet,
}

impl SignalAction {
    pub fn new<F>(mask: SignalSet, handler: F) -> Self
    where
        F: Fn(&dyn SignalOps, &SigInfo) + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
            mask,
        }
    }
}

impl fmt::Debug for SignalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalAction")
            .field("handler", &Arc::as_ptr(&self.handler))
            .field("mask", &self.mask)
            .finish()
    }
}

/// Configured reaction of a process to one signal kind.
#[derive(Debug, Clone, Default)]
pub enum Disposition {
    #[default]
    Default,
    Ignore,
    Handler(SignalAction),
}

impl Disposition {
    #[inline]
    pub fn is_ignore(&self) -> bool {
        matches!(self, Disposition::Ignore)
    }

    #[inline]
    pub fn is_default(&self) -> bool {
        matches!(self, Disposition::Default)
    }

    #[inline]
    pub fn is_handler(&self) -> bool {
        matches!(self, Disposition::Handler(_))
    }
}

/// Per-process decision for one signal, computed under the process lock.
#[derive(Debug, Clone)]
pub enum SignalResult {
    /// Dropped: ignored, or ignored by default.
    Ignored,
    /// Deferred into the pending set.
    Pending,
    /// Default action ends the process.
    ProcessKilled(DefaultAction),
    /// Default action stops the process.
    ProcessSuspended,
    /// Default action of `SIGCONT`.
    ProcessResumed,
    /// Caller must run the handler frame.
    Handle(SignalAction),
}

/// Classified result of a `send`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Dropped,
    Queued,
    DefaultActionApplied(DefaultAction),
    HandlerInvoked,
}

impl fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryOutcome::Dropped => f.write_str("dropped"),
            DeliveryOutcome::Queued => f.write_str("queued"),
            DeliveryOutcome::DefaultActionApplied(action) => {
                write!(f, "default action {:?}", action)
            }
            DeliveryOutcome::HandlerInvoked => f.write_str("handler invoked"),
        }
    }
}

/// `send` failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// Target never existed, or has exited or been terminated.
    NoSuchProcess(ProcId),
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::NoSuchProcess(pid) => write!(f, "no such process: {}", pid),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for SendError {}

/// Operations a running handler (or any hosted task) may call back into.
pub trait SignalOps: Send + Sync {
    /// Post `signo` to `target`.
    fn send(
        &self,
        sender: Option<ProcId>,
        target: ProcId,
        signo: SignalNo,
    ) -> Result<DeliveryOutcome, SendError>;

    /// Add `set` to the persistent mask of `pid`.
    fn block(&self, pid: ProcId, set: SignalSet);

    /// Remove `set` from the persistent mask and deliver what became eligible.
    fn unblock(&self, pid: ProcId, set: SignalSet) -> Vec<(SignalNo, DeliveryOutcome)>;

    /// Kinds currently deferred on `pid`.
    fn pending_set(&self, pid: ProcId) -> SignalSet;
}

/// Abstract signal state bound to one process.
pub trait Signal: Send + Sync {
    /// Clone dispositions and mask for a forked child; pending starts empty.
    fn from_fork(&self) -> Box<dyn Signal>;

    /// Decide what one incoming signal does. Queues it when deferred.
    fn add_signal(&mut self, signo: SignalNo, sender: Option<ProcId>) -> SignalResult;

    /// Remove and return the lowest-ranked pending signal that may be delivered now.
    fn take_deliverable(&mut self) -> Option<(SignalNo, Option<ProcId>)>;

    /// Drop a pending entry, if any.
    fn discard(&mut self, signo: SignalNo);

    /// Whether a handler frame is active.
    fn is_handling_signal(&self) -> bool;

    /// Install a disposition. `false` for kinds that cannot be caught or ignored.
    fn set_action(&mut self, signo: SignalNo, action: Disposition) -> bool;

    /// Configured disposition; unset kinds report `Default`.
    fn get_action(&self, signo: SignalNo) -> Disposition;

    /// Add to the persistent mask.
    fn block(&mut self, set: SignalSet);

    /// Remove from the persistent mask.
    fn unblock(&mut self, set: SignalSet);

    /// Replace the persistent mask and return the old one.
    fn update_mask(&mut self, mask: SignalSet) -> SignalSet;

    fn blocked(&self) -> SignalSet;

    fn pending(&self) -> SignalSet;

    /// Union of the masks of all active handler frames.
    fn active_handler_blocks(&self) -> SignalSet;

    /// Persistent mask plus handler overlay.
    fn effective_blocked(&self) -> SignalSet {
        self.blocked().union(self.active_handler_blocks())
    }

    /// Push a handler frame. Panics if a frame for `signo` is already active.
    fn enter_handler(&mut self, signo: SignalNo, mask: SignalSet);

    /// Pop the frame pushed for `signo`.
    fn leave_handler(&mut self, signo: SignalNo);
}
