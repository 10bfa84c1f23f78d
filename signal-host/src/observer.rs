use core::fmt;

use signal::{DeliveryOutcome, ProcId, SignalNo};

/// One classified delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryEvent {
    pub sender: Option<ProcId>,
    pub target: ProcId,
    pub signo: SignalNo,
    pub outcome: DeliveryOutcome,
}

impl fmt::Display for DeliveryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sender {
            Some(sender) => write!(
                f,
                "{} from {} to {}: {}",
                self.signo, sender, self.target, self.outcome
            ),
            None => write!(f, "{} to {}: {}", self.signo, self.target, self.outcome),
        }
    }
}

/// Receives every delivery the engine classifies.
///
/// Called with no engine lock held, before a handler callback runs.
pub trait DeliveryObserver: Send + Sync {
    fn on_delivery(&self, event: &DeliveryEvent);
}

/// Observer that records events in order.
#[derive(Default)]
pub struct DeliveryLog {
    events: spin::Mutex<Vec<DeliveryEvent>>,
}

impl DeliveryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DeliveryEvent> {
        self.events.lock().clone()
    }

    /// Events addressed to `target`.
    pub fn events_for(&self, target: ProcId) -> Vec<DeliveryEvent> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.target == target)
            .copied()
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl DeliveryObserver for DeliveryLog {
    fn on_delivery(&self, event: &DeliveryEvent) {
        self.events.lock().push(*event);
    }
}
