#![no_std]

extern crate alloc;

use alloc::boxed::Box;
use alloc::vec::Vec;
use signal::{
    DefaultAction, Disposition, ProcId, Signal, SignalNo, SignalResult, SignalSet, MAX_SIG,
};

/// Kinds whose default action stops the process.
const STOP_SIGNALS: SignalSet = SignalSet(
    (1 << SignalNo::SIGSTOP as usize)
        | (1 << SignalNo::SIGTSTP as usize)
        | (1 << SignalNo::SIGTTIN as usize)
        | (1 << SignalNo::SIGTTOU as usize),
);

/// Kinds that can never be blocked.
const UNBLOCKABLE: SignalSet =
    SignalSet((1 << SignalNo::SIGKILL as usize) | (1 << SignalNo::SIGSTOP as usize));

/// One active handler invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerFrame {
    pub signo: SignalNo,
    pub mask: SignalSet,
}

/// Per-process signal implementation.
pub struct SignalImpl {
    /// Pending kinds, presence only.
    pub received: SignalSet,
    /// First sender of each pending kind.
    pub senders: [Option<ProcId>; MAX_SIG + 1],
    /// Persistent blocked mask.
    pub mask: SignalSet,
    /// Active handler frames, innermost last.
    pub handling: Vec<HandlerFrame>,
    pub actions: [Disposition; MAX_SIG + 1],
}

impl SignalImpl {
    #[inline]
    pub fn new() -> Self {
        Self {
            received: SignalSet::empty(),
            senders: [None; MAX_SIG + 1],
            mask: SignalSet::empty(),
            handling: Vec::new(),
            actions: core::array::from_fn(|_| Disposition::Default),
        }
    }

    #[inline]
    fn valid_index(signo: SignalNo) -> Option<usize> {
        let idx = signo as usize;
        if idx == 0 || idx > MAX_SIG {
            None
        } else {
            Some(idx)
        }
    }

    /// Kinds with an active handler frame.
    #[inline]
    fn handling_set(&self) -> SignalSet {
        self.handling.iter().map(|frame| frame.signo).collect()
    }

    /// Everything a new delivery must wait for right now.
    #[inline]
    fn deferred(&self) -> SignalSet {
        self.effective_blocked()
            .union(self.handling_set())
            .difference(UNBLOCKABLE)
    }

    #[inline]
    fn ignored_by_disposition(&self, signo: SignalNo, idx: usize) -> bool {
        match &self.actions[idx] {
            Disposition::Ignore => true,
            Disposition::Default => signo.default_action() == DefaultAction::Ignore,
            Disposition::Handler(_) => false,
        }
    }

    #[inline]
    fn queue(&mut self, signo: SignalNo, idx: usize, sender: Option<ProcId>) {
        // Standard signals coalesce; the first sender is kept.
        if !self.received.contains(signo) {
            self.received.insert(signo);
            self.senders[idx] = sender;
        }
    }

    /// Job-control side effects of generating `signo`.
    #[inline]
    fn discard_conflicting(&mut self, signo: SignalNo) {
        if signo == SignalNo::SIGCONT {
            for stop in STOP_SIGNALS {
                self.discard(stop);
            }
        } else if STOP_SIGNALS.contains(signo) {
            self.discard(SignalNo::SIGCONT);
        }
    }
}

impl Default for SignalImpl {
    fn default() -> Self {
        Self::new()
    }
}

impl Signal for SignalImpl {
    fn from_fork(&self) -> Box<dyn Signal> {
        Box::new(Self {
            received: SignalSet::empty(),
            senders: [None; MAX_SIG + 1],
            mask: self.mask,
            handling: Vec::new(),
            actions: self.actions.clone(),
        })
    }

    fn add_signal(&mut self, signo: SignalNo, sender: Option<ProcId>) -> SignalResult {
        let Some(idx) = Self::valid_index(signo) else {
            return SignalResult::Ignored;
        };
        self.discard_conflicting(signo);

        match signo {
            SignalNo::SIGKILL => return SignalResult::ProcessKilled(DefaultAction::Terminate),
            SignalNo::SIGSTOP => return SignalResult::ProcessSuspended,
            _ => {}
        }

        // Ignore wins over queuing, even for blocked kinds.
        if self.ignored_by_disposition(signo, idx) {
            return SignalResult::Ignored;
        }

        if self.deferred().contains(signo) {
            self.queue(signo, idx, sender);
            return SignalResult::Pending;
        }

        match &self.actions[idx] {
            Disposition::Handler(action) => SignalResult::Handle(action.clone()),
            Disposition::Ignore => SignalResult::Ignored,
            Disposition::Default => match signo.default_action() {
                action @ (DefaultAction::Terminate | DefaultAction::CoreDump) => {
                    SignalResult::ProcessKilled(action)
                }
                DefaultAction::Stop => SignalResult::ProcessSuspended,
                DefaultAction::Continue => SignalResult::ProcessResumed,
                DefaultAction::Ignore => SignalResult::Ignored,
            },
        }
    }

    fn take_deliverable(&mut self) -> Option<(SignalNo, Option<ProcId>)> {
        let bit = self.received.find_first_one(self.deferred())?;
        self.received.remove_bit(bit);
        let sender = self.senders.get_mut(bit).and_then(Option::take);
        let signo = SignalNo::from(bit);
        if Self::valid_index(signo).is_some() {
            Some((signo, sender))
        } else {
            None
        }
    }

    fn discard(&mut self, signo: SignalNo) {
        if let Some(idx) = Self::valid_index(signo) {
            self.received.remove(signo);
            self.senders[idx] = None;
        }
    }

    fn is_handling_signal(&self) -> bool {
        !self.handling.is_empty()
    }

    fn set_action(&mut self, signo: SignalNo, action: Disposition) -> bool {
        if !signo.is_catchable() {
            return false;
        }
        let Some(idx) = Self::valid_index(signo) else {
            return false;
        };
        self.actions[idx] = action;
        if self.ignored_by_disposition(signo, idx) {
            self.discard(signo);
        }
        true
    }

    fn get_action(&self, signo: SignalNo) -> Disposition {
        match Self::valid_index(signo) {
            Some(idx) => self.actions[idx].clone(),
            None => Disposition::Default,
        }
    }

    fn block(&mut self, set: SignalSet) {
        self.mask = self.mask.union(set).difference(UNBLOCKABLE);
    }

    fn unblock(&mut self, set: SignalSet) {
        self.mask = self.mask.difference(set);
    }

    fn update_mask(&mut self, mask: SignalSet) -> SignalSet {
        let old = self.mask;
        self.mask = mask.difference(UNBLOCKABLE);
        old
    }

    fn blocked(&self) -> SignalSet {
        self.mask
    }

    fn pending(&self) -> SignalSet {
        self.received
    }

    fn active_handler_blocks(&self) -> SignalSet {
        self.handling
            .iter()
            .fold(SignalSet::empty(), |acc, frame| acc.union(frame.mask))
    }

    fn enter_handler(&mut self, signo: SignalNo, mask: SignalSet) {
        assert!(
            !self.handling.iter().any(|frame| frame.signo == signo),
            "{} re-entered while its handler is running",
            signo
        );
        self.handling.push(HandlerFrame { signo, mask });
    }

    fn leave_handler(&mut self, signo: SignalNo) {
        if let Some(pos) = self.handling.iter().rposition(|frame| frame.signo == signo) {
            self.handling.remove(pos);
        }
    }
}
