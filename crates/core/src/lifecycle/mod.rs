mod event;
mod signals;
mod supervisor;

pub use event::{OutcomeReceiver, OutcomeSender, PRODUCERS, Role, TerminalEvent, channel};
pub use signals::{OsSignals, SignalFuture, SignalSource};
pub use supervisor::{ExitPolicy, ShutdownReport, Supervisor, SupervisorError, SupervisorState};
