use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::{info, warn};
use rcore_task_manage::{PidAllocator, ProcTree, WaitStatus};
use signal::{DeliveryOutcome, Disposition, ProcId, Signal, SignalNo, SignalOps, SignalSet};
use signal_impl::SignalImpl;
use sync::Condvar;

use crate::error::{SendError, SpawnError, WaitError};
use crate::observer::DeliveryObserver;
use crate::process::{Process, ProcessState, SpawnConfig, TerminalState};

/// The signal engine: process table, tree relations and delivery.
///
/// Shared between hosted workers as `Arc<Kernel>`. Handlers receive it as
/// `&dyn SignalOps`.
pub struct Kernel {
    pub(crate) table: spin::RwLock<BTreeMap<ProcId, Arc<Process>>>,
    pub(crate) tree: spin::Mutex<ProcTree<TerminalState>>,
    pids: PidAllocator,
    live: AtomicUsize,
    limit: Option<usize>,
    /// Woken whenever a process becomes terminal.
    pub(crate) exits: Condvar,
    /// Woken whenever a process leaves `Stopped`.
    pub(crate) stops: Condvar,
    pub(crate) observers: spin::RwLock<Vec<Arc<dyn DeliveryObserver>>>,
}

impl Kernel {
    pub fn new() -> Self {
        Self {
            table: spin::RwLock::new(BTreeMap::new()),
            tree: spin::Mutex::new(ProcTree::new()),
            pids: PidAllocator::default(),
            live: AtomicUsize::new(0),
            limit: None,
            exits: Condvar::new(),
            stops: Condvar::new(),
            observers: spin::RwLock::new(Vec::new()),
        }
    }

    /// Engine that refuses to hold more than `limit` live processes.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::new()
        }
    }

    pub fn add_observer(&self, observer: Arc<dyn DeliveryObserver>) {
        self.observers.write().push(observer);
    }

    #[inline]
    pub(crate) fn lookup(&self, pid: ProcId) -> Option<Arc<Process>> {
        self.table.read().get(&pid).cloned()
    }

    /// Record of a process that can still receive signals.
    #[inline]
    pub(crate) fn live(&self, pid: ProcId) -> Option<Arc<Process>> {
        self.lookup(pid).filter(|process| process.is_live())
    }

    // ---------------------------------------------------------------------
    // lifecycle
    // ---------------------------------------------------------------------

    /// Create a process under `parent` (`None` for a root).
    pub fn spawn(
        &self,
        parent: Option<ProcId>,
        config: SpawnConfig,
    ) -> Result<ProcId, SpawnError> {
        let mut signal: Box<dyn Signal> = match parent {
            Some(ppid) => {
                let process = self.live(ppid).ok_or(SpawnError::NoSuchParent(ppid))?;
                let inner = process.inner.lock();
                if config.inherit {
                    inner.signal.from_fork()
                } else {
                    Box::new(SignalImpl::new())
                }
            }
            None => Box::new(SignalImpl::new()),
        };

        let limit = self.limit;
        self.live
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| match limit {
                Some(limit) if n >= limit => None,
                _ => Some(n + 1),
            })
            .map_err(|_| SpawnError::ResourceExhausted {
                limit: limit.unwrap_or(usize::MAX),
            })?;

        for (signo, disposition) in config.dispositions {
            if !signal.set_action(signo, disposition) {
                warn!("{} cannot be caught or ignored, disposition not installed", signo);
            }
        }
        signal.block(config.blocked);

        let pid = self.pids.alloc();
        self.tree.lock().add(pid, parent);
        self.table
            .write()
            .insert(pid, Arc::new(Process::new(pid, parent, signal)));
        match parent {
            Some(ppid) => info!("spawned {} under {}", pid, ppid),
            None => info!("spawned {} as a root", pid),
        }
        Ok(pid)
    }

    /// Mark `pid` terminal. No-op if it already is.
    pub fn finish(&self, pid: ProcId, status: TerminalState) {
        let Some(process) = self.lookup(pid) else {
            return;
        };
        {
            let mut inner = process.inner.lock();
            if inner.state.is_terminal() {
                return;
            }
            inner.state = status.into();
        }
        self.after_exit(pid, status);
    }

    /// Bookkeeping once `pid` has become terminal. Must run with no lock held.
    pub(crate) fn after_exit(&self, pid: ProcId, status: TerminalState) {
        self.live.fetch_sub(1, Ordering::SeqCst);
        let parent = {
            let mut tree = self.tree.lock();
            let parent = tree.parent(pid);
            tree.exit(pid, status);
            parent
        };
        info!("{} is now {:?}", pid, status);
        self.exits.broadcast();
        self.stops.broadcast();
        if let Some(parent) = parent {
            // A terminal parent refuses the notification.
            let _ = self.send(Some(pid), parent, SignalNo::SIGCHLD);
        }
    }

    /// Block until `child` is terminal, then reap it.
    pub fn wait(
        &self,
        parent: ProcId,
        child: ProcId,
    ) -> Result<(ProcId, TerminalState), WaitError> {
        let record = self.lookup(child).ok_or(WaitError::NoSuchProcess(child))?;
        if record.is_reaped() {
            return Err(WaitError::NoSuchProcess(child));
        }
        if !self.tree.lock().is_descendant(parent, child) {
            return Err(WaitError::NoSuchChild(child));
        }
        self.exits.wait_until(|| match self.tree.lock().wait(parent, child) {
            WaitStatus::Exited(pid, status) => {
                record.mark_reaped();
                Some(Ok((pid, status)))
            }
            WaitStatus::Running => None,
            // Reaped by a concurrent waiter.
            WaitStatus::NoSuchChild if record.is_reaped() => {
                Some(Err(WaitError::NoSuchProcess(child)))
            }
            WaitStatus::NoSuchChild => Some(Err(WaitError::NoSuchChild(child))),
        })
    }

    /// Block until any direct child of `parent` is terminal, then reap it.
    pub fn wait_any(&self, parent: ProcId) -> Result<(ProcId, TerminalState), WaitError> {
        self.exits.wait_until(|| match self.tree.lock().wait_any(parent) {
            WaitStatus::Exited(pid, status) => {
                if let Some(record) = self.lookup(pid) {
                    record.mark_reaped();
                }
                Some(Ok((pid, status)))
            }
            WaitStatus::Running => None,
            WaitStatus::NoSuchChild => Some(Err(WaitError::NoSuchChild(parent))),
        })
    }

    /// Worker yield point: run one delivery step, then sleep while stopped.
    ///
    /// Fails once the process is terminal so the worker can stop.
    pub fn checkpoint(&self, pid: ProcId) -> Result<(), SendError> {
        let process = self.lookup(pid).ok_or(SendError::NoSuchProcess(pid))?;
        self.flush(pid);
        let state = self.stops.wait_until(|| match process.state() {
            ProcessState::Stopped => None,
            state => Some(state),
        });
        if state.is_terminal() {
            return Err(SendError::NoSuchProcess(pid));
        }
        self.flush(pid);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // queries
    // ---------------------------------------------------------------------

    pub fn state(&self, pid: ProcId) -> Option<ProcessState> {
        self.lookup(pid).map(|process| process.state())
    }

    /// Current parent; orphans report the process that adopted them.
    pub fn parent(&self, pid: ProcId) -> Option<ProcId> {
        let tree = self.tree.lock();
        if tree.contains(pid) {
            tree.parent(pid)
        } else {
            drop(tree);
            self.lookup(pid).and_then(|process| process.parent)
        }
    }

    /// Children that have not exited yet.
    pub fn children(&self, pid: ProcId) -> Vec<ProcId> {
        self.tree.lock().children(pid)
    }

    pub fn pending_set(&self, pid: ProcId) -> SignalSet {
        self.live(pid)
            .map(|process| process.inner.lock().signal.pending())
            .unwrap_or_default()
    }

    pub fn is_pending(&self, pid: ProcId, signo: SignalNo) -> bool {
        self.pending_set(pid).contains(signo)
    }

    pub fn blocked_set(&self, pid: ProcId) -> SignalSet {
        self.live(pid)
            .map(|process| process.inner.lock().signal.blocked())
            .unwrap_or_default()
    }

    // ---------------------------------------------------------------------
    // dispositions and mask
    // ---------------------------------------------------------------------

    /// Replace the disposition of `signo`. `false` for uncatchable kinds or
    /// a pid that is not live.
    pub fn install(&self, pid: ProcId, signo: SignalNo, disposition: Disposition) -> bool {
        match self.live(pid) {
            Some(process) => process.inner.lock().signal.set_action(signo, disposition),
            None => false,
        }
    }

    pub fn disposition(&self, pid: ProcId, signo: SignalNo) -> Option<Disposition> {
        self.lookup(pid)
            .map(|process| process.inner.lock().signal.get_action(signo))
    }

    pub fn block(&self, pid: ProcId, set: SignalSet) {
        if let Some(process) = self.live(pid) {
            process.inner.lock().signal.block(set);
        }
    }

    /// Unblock `set` and deliver whatever became eligible, ascending rank.
    pub fn unblock(&self, pid: ProcId, set: SignalSet) -> Vec<(SignalNo, DeliveryOutcome)> {
        let Some(process) = self.live(pid) else {
            return Vec::new();
        };
        process.inner.lock().signal.unblock(set);
        self.flush(pid)
    }

    /// Replace the blocked set, flush, and return the old set.
    pub fn set_mask(&self, pid: ProcId, set: SignalSet) -> SignalSet {
        let Some(process) = self.live(pid) else {
            return SignalSet::empty();
        };
        let old = process.inner.lock().signal.update_mask(set);
        self.flush(pid);
        old
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalOps for Kernel {
    fn send(
        &self,
        sender: Option<ProcId>,
        target: ProcId,
        signo: SignalNo,
    ) -> Result<DeliveryOutcome, SendError> {
        Kernel::send(self, sender, target, signo)
    }

    fn block(&self, pid: ProcId, set: SignalSet) {
        Kernel::block(self, pid, set)
    }

    fn unblock(&self, pid: ProcId, set: SignalSet) -> Vec<(SignalNo, DeliveryOutcome)> {
        Kernel::unblock(self, pid, set)
    }

    fn pending_set(&self, pid: ProcId) -> SignalSet {
        Kernel::pending_set(self, pid)
    }
}
