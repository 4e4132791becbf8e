use std::fmt;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::workload::WorkloadError;

/// Number of roles that deposit into the outcome channel.
pub const PRODUCERS: usize = 2;

/// Which role produced a terminal event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    SignalWatcher,
    WorkloadRunner,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::SignalWatcher => write!(f, "signal-watcher"),
            Role::WorkloadRunner => write!(f, "workload-runner"),
        }
    }
}

/// The cause that ends a supervised run.
#[derive(Debug)]
pub enum TerminalEvent {
    /// A termination request, named after the signal (`SIGINT`, `SIGTERM`).
    Signal(&'static str),
    /// The workload returned, cleanly or not.
    Workload(Result<(), WorkloadError>),
}

impl TerminalEvent {
    pub fn role(&self) -> Role {
        match self {
            TerminalEvent::Signal(_) => Role::SignalWatcher,
            TerminalEvent::Workload(_) => Role::WorkloadRunner,
        }
    }

    pub fn is_workload_error(&self) -> bool {
        matches!(self, TerminalEvent::Workload(Err(_)))
    }
}

impl fmt::Display for TerminalEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminalEvent::Signal(name) => write!(f, "signal received: {name}"),
            TerminalEvent::Workload(Ok(())) => write!(f, "workload stopped: nil"),
            TerminalEvent::Workload(Err(e)) => write!(f, "workload stopped: {e}"),
        }
    }
}

/// Producer side of the outcome channel. Each role holds one clone and
/// deposits exactly once.
#[derive(Debug, Clone)]
pub struct OutcomeSender(mpsc::Sender<TerminalEvent>);

/// Consumer side of the outcome channel. Only the supervisor reads it.
#[derive(Debug)]
pub struct OutcomeReceiver(mpsc::Receiver<TerminalEvent>);

/// Create an outcome channel sized to [`PRODUCERS`], so no deposit can
/// ever wait on the reader.
pub fn channel() -> (OutcomeSender, OutcomeReceiver) {
    let (tx, rx) = mpsc::channel(PRODUCERS);
    (OutcomeSender(tx), OutcomeReceiver(rx))
}

impl OutcomeSender {
    /// Deposit without blocking. Returns `false` when the event was
    /// discarded because the supervisor has already stopped reading.
    pub fn deposit(&self, event: TerminalEvent) -> bool {
        match self.0.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Closed(event)) => {
                tracing::debug!(role = %event.role(), cause = %event, "late outcome discarded");
                false
            }
            Err(TrySendError::Full(event)) => {
                tracing::warn!(role = %event.role(), cause = %event, "outcome channel full, event dropped");
                false
            }
        }
    }
}

impl OutcomeReceiver {
    /// Wait for the next event. `None` once every producer is gone without
    /// depositing.
    pub async fn next(&mut self) -> Option<TerminalEvent> {
        self.0.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_cause_text() {
        let event = TerminalEvent::Signal("SIGTERM");
        assert_eq!(event.to_string(), "signal received: SIGTERM");
        assert_eq!(event.role(), Role::SignalWatcher);
        assert!(!event.is_workload_error());
    }

    #[test]
    fn workload_cause_text() {
        let clean = TerminalEvent::Workload(Ok(()));
        assert_eq!(clean.to_string(), "workload stopped: nil");
        assert!(!clean.is_workload_error());

        let failed = TerminalEvent::Workload(Err(WorkloadError::Failed("disk full".into())));
        assert_eq!(failed.to_string(), "workload stopped: disk full");
        assert_eq!(failed.role(), Role::WorkloadRunner);
        assert!(failed.is_workload_error());
    }

    #[tokio::test]
    async fn both_producers_deposit_without_a_reader() {
        let (tx, mut rx) = channel();
        let other = tx.clone();
        assert!(tx.deposit(TerminalEvent::Signal("SIGINT")));
        assert!(other.deposit(TerminalEvent::Workload(Ok(()))));

        assert!(matches!(rx.next().await, Some(TerminalEvent::Signal("SIGINT"))));
        assert!(matches!(rx.next().await, Some(TerminalEvent::Workload(Ok(())))));
    }

    #[tokio::test]
    async fn deposit_after_reader_dropped_is_discarded() {
        let (tx, rx) = channel();
        drop(rx);
        assert!(!tx.deposit(TerminalEvent::Workload(Ok(()))));
    }

    #[tokio::test]
    async fn next_ends_when_producers_vanish() {
        let (tx, mut rx) = channel();
        drop(tx);
        assert!(rx.next().await.is_none());
    }
}
