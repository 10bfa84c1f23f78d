//! Signal delivery engine for a tree of hosted processes.
//!
//! Every hosted process is driven by its own OS thread. Workers call into a
//! shared [`Kernel`] to send signals, change their mask and reach yield points
//! ([`Kernel::checkpoint`]); the engine decides each delivery under the
//! target's lock and runs handler callbacks synchronously, with no lock held.

mod delivery;
mod directory;
mod error;
mod kernel;
mod observer;
mod process;

pub use directory::ProcessDirectory;
pub use error::{SendError, SpawnError, WaitError};
pub use kernel::Kernel;
pub use observer::{DeliveryEvent, DeliveryLog, DeliveryObserver};
pub use process::{ProcessState, SpawnConfig, TerminalState};

pub use signal::{
    DefaultAction, DeliveryOutcome, Disposition, ProcId, SigInfo, SignalAction, SignalNo,
    SignalOps, SignalSet,
};
