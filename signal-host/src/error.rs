use core::fmt;

use signal::ProcId;

pub use signal::SendError;

/// `wait` / `wait_any` failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitError {
    /// The pid was never spawned, or has already been reaped.
    NoSuchProcess(ProcId),
    /// The pid is not a descendant of the waiter, or the waiter has no children.
    NoSuchChild(ProcId),
}

impl fmt::Display for WaitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitError::NoSuchProcess(pid) => write!(f, "no such process: {}", pid),
            WaitError::NoSuchChild(pid) => write!(f, "no such child: {}", pid),
        }
    }
}

impl std::error::Error for WaitError {}

/// `spawn` failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnError {
    /// The live-process limit is reached.
    ResourceExhausted { limit: usize },
    /// The requested parent is not a live process.
    NoSuchParent(ProcId),
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpawnError::ResourceExhausted { limit } => {
                write!(f, "process limit of {} reached", limit)
            }
            SpawnError::NoSuchParent(pid) => write!(f, "no such parent: {}", pid),
        }
    }
}

impl std::error::Error for SpawnError {}
