//! Process records kept in the engine's table.

use std::sync::atomic::{AtomicBool, Ordering};

use signal::{Disposition, ProcId, Signal, SignalAction, SignalNo, SignalSet};

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalState {
    Exited(i32),
    Terminated(SignalNo),
}

/// Lifecycle state of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    Stopped,
    Exited(i32),
    Terminated(SignalNo),
}

impl ProcessState {
    #[inline]
    pub fn is_terminal(self) -> bool {
        self.terminal().is_some()
    }

    #[inline]
    pub fn terminal(self) -> Option<TerminalState> {
        match self {
            ProcessState::Exited(code) => Some(TerminalState::Exited(code)),
            ProcessState::Terminated(signo) => Some(TerminalState::Terminated(signo)),
            ProcessState::Running | ProcessState::Stopped => None,
        }
    }
}

impl From<TerminalState> for ProcessState {
    fn from(state: TerminalState) -> Self {
        match state {
            TerminalState::Exited(code) => ProcessState::Exited(code),
            TerminalState::Terminated(signo) => ProcessState::Terminated(signo),
        }
    }
}

pub(crate) struct ProcessInner {
    pub state: ProcessState,
    pub signal: Box<dyn Signal>,
}

/// One entry of the process table. Terminal records stay in the table.
pub(crate) struct Process {
    pub pid: ProcId,
    /// Parent at spawn time.
    pub parent: Option<ProcId>,
    pub inner: spin::Mutex<ProcessInner>,
    reaped: AtomicBool,
}

impl Process {
    pub fn new(pid: ProcId, parent: Option<ProcId>, signal: Box<dyn Signal>) -> Self {
        Self {
            pid,
            parent,
            inner: spin::Mutex::new(ProcessInner {
                state: ProcessState::Running,
                signal,
            }),
            reaped: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn state(&self) -> ProcessState {
        self.inner.lock().state
    }

    #[inline]
    pub fn is_live(&self) -> bool {
        !self.state().is_terminal()
    }

    #[inline]
    pub fn is_reaped(&self) -> bool {
        self.reaped.load(Ordering::Acquire)
    }

    #[inline]
    pub fn mark_reaped(&self) {
        self.reaped.store(true, Ordering::Release);
    }
}

/// Signal configuration of a process being spawned.
///
/// ```ignore
/// let config = SpawnConfig::new()
///     .ignore(SignalNo::SIGQUIT)
///     .block([SignalNo::SIGINT, SignalNo::SIGABRT]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SpawnConfig {
    pub(crate) inherit: bool,
    pub(crate) dispositions: Vec<(SignalNo, Disposition)>,
    pub(crate) blocked: SignalSet,
}

impl SpawnConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from the parent's dispositions and mask, as `fork` does.
    pub fn inherit(mut self) -> Self {
        self.inherit = true;
        self
    }

    pub fn disposition(mut self, signo: SignalNo, disposition: Disposition) -> Self {
        self.dispositions.push((signo, disposition));
        self
    }

    pub fn ignore(self, signo: SignalNo) -> Self {
        self.disposition(signo, Disposition::Ignore)
    }

    pub fn handle(self, signo: SignalNo, action: SignalAction) -> Self {
        self.disposition(signo, Disposition::Handler(action))
    }

    /// Add kinds to the initial blocked set.
    pub fn block(mut self, set: impl Into<SignalSet>) -> Self {
        self.blocked = self.blocked.union(set.into());
        self
    }
}
