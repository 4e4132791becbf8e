use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::event::{self, OutcomeReceiver, Role, TerminalEvent};
use super::signals::SignalSource;
use crate::config::{NoisiaCfg, ValidationError};
use crate::workload::{Workload, WorkloadError};

/// Supervisor lifecycle: Idle → Running → Terminating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    Running,
    Terminating,
}

/// How the winning terminal event maps to a process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExitPolicy {
    /// Every supervised shutdown exits 0, whatever its cause.
    #[default]
    Lenient,
    /// A workload error that ends the run exits 1.
    FailOnWorkloadError,
}

/// Failures that prevent the supervised run from starting.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("register signal handlers: {0}")]
    SignalRegistration(#[source] io::Error),
    #[error("supervisor already started")]
    AlreadyStarted,
}

impl SupervisorError {
    pub fn exit_code(&self) -> u8 {
        1
    }
}

/// What ended the run.
#[derive(Debug)]
pub struct ShutdownReport {
    /// The first terminal event; the one that triggered cancellation.
    pub cause: TerminalEvent,
    /// The losing role's event, when it arrived within the drain window.
    pub trailing: Option<TerminalEvent>,
    pub policy: ExitPolicy,
}

impl ShutdownReport {
    pub fn exit_code(&self) -> u8 {
        match self.policy {
            ExitPolicy::FailOnWorkloadError if self.cause.is_workload_error() => 1,
            _ => 0,
        }
    }
}

/// Races the signal watcher against the workload and tears both down on
/// the first terminal event.
#[derive(Debug)]
pub struct Supervisor {
    state: SupervisorState,
    token: CancellationToken,
    policy: ExitPolicy,
    drain_timeout: Duration,
}

impl Supervisor {
    pub fn new() -> Self {
        Self {
            state: SupervisorState::Idle,
            token: CancellationToken::new(),
            policy: ExitPolicy::default(),
            drain_timeout: Duration::ZERO,
        }
    }

    /// Supervisor with the shutdown settings carried in `cfg`.
    pub fn from_cfg(cfg: &NoisiaCfg) -> Self {
        let policy = if cfg.fail_on_workload_error {
            ExitPolicy::FailOnWorkloadError
        } else {
            ExitPolicy::Lenient
        };
        Self::new()
            .with_exit_policy(policy)
            .with_drain_timeout(Duration::from_secs(cfg.drain_timeout_secs))
    }

    pub fn with_exit_policy(mut self, policy: ExitPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// After a signal ends the run, wait up to `timeout` for the workload to
    /// wind down and report. Zero (the default) means exit without waiting.
    /// A run ended by the workload never drains.
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// The cancellation token handed to the workload.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Validate `cfg`, then run `workload` against `signals` until one of
    /// them produces a terminal event.
    ///
    /// Nothing is registered or spawned when validation fails. The losing
    /// role is not joined: it keeps unwinding on the runtime after this
    /// returns, and its event is discarded.
    pub async fn run<S: SignalSource>(
        &mut self,
        cfg: NoisiaCfg,
        workload: Arc<dyn Workload>,
        signals: S,
    ) -> Result<ShutdownReport, SupervisorError> {
        if self.state != SupervisorState::Idle {
            return Err(SupervisorError::AlreadyStarted);
        }
        cfg.validate()?;
        let watch = signals
            .register()
            .map_err(SupervisorError::SignalRegistration)?;

        let cfg = Arc::new(cfg);
        let (outcome_tx, mut outcome_rx) = event::channel();
        self.state = SupervisorState::Running;
        tracing::info!(workload = workload.name(), jobs = cfg.jobs, "supervisor running");

        // Each role cancels before it deposits, so whoever reads an event
        // also sees the cancellation.
        let token = self.token.clone();
        let signal_tx = outcome_tx.clone();
        tokio::spawn(async move {
            let event = watch.await;
            token.cancel();
            signal_tx.deposit(event);
        });

        let token = self.token.clone();
        tokio::spawn(async move {
            let workload_token = token.clone();
            let running = tokio::spawn(async move { workload.run(workload_token, cfg).await });
            let result = running.await.unwrap_or_else(|e| Err(WorkloadError::from(e)));
            token.cancel();
            outcome_tx.deposit(TerminalEvent::Workload(result));
        });

        let cause = match outcome_rx.next().await {
            Some(event) => event,
            None => TerminalEvent::Workload(Err(WorkloadError::Aborted(
                "outcome channel closed without an event".into(),
            ))),
        };
        self.state = SupervisorState::Terminating;

        let trailing = self.drain(cause.role(), &mut outcome_rx).await;
        if let Some(event) = &trailing {
            tracing::debug!(role = %event.role(), cause = %event, "losing role reported");
        }
        tracing::warn!(role = %cause.role(), "shutdown: {cause}");

        Ok(ShutdownReport {
            cause,
            trailing,
            policy: self.policy,
        })
    }

    async fn drain(
        &self,
        winner: Role,
        outcome_rx: &mut OutcomeReceiver,
    ) -> Option<TerminalEvent> {
        // Only the workload holds resources worth draining.
        if self.drain_timeout.is_zero() || winner != Role::SignalWatcher {
            return None;
        }
        match tokio::time::timeout(self.drain_timeout, outcome_rx.next()).await {
            Ok(event) => event,
            Err(_) => {
                tracing::warn!(
                    drain_timeout = ?self.drain_timeout,
                    "workload still running after drain timeout"
                );
                None
            }
        }
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::signals::SignalFuture;

    struct NeverSignal;

    impl SignalSource for NeverSignal {
        fn register(self) -> io::Result<SignalFuture> {
            Ok(Box::pin(std::future::pending::<TerminalEvent>()))
        }
    }

    struct BrokenSignal;

    impl SignalSource for BrokenSignal {
        fn register(self) -> io::Result<SignalFuture> {
            Err(io::Error::other("no signal support"))
        }
    }

    struct Done;

    #[async_trait::async_trait]
    impl Workload for Done {
        fn name(&self) -> &str {
            "done"
        }

        async fn run(
            &self,
            _token: CancellationToken,
            _cfg: Arc<NoisiaCfg>,
        ) -> Result<(), WorkloadError> {
            Ok(())
        }
    }

    fn valid_cfg() -> NoisiaCfg {
        NoisiaCfg {
            conninfo: "postgres://postgres@127.0.0.1/postgres".into(),
            idle_xacts: true,
            ..NoisiaCfg::default()
        }
    }

    #[test]
    fn new_supervisor_is_idle_and_live() {
        let sup = Supervisor::new();
        assert_eq!(sup.state(), SupervisorState::Idle);
        assert!(!sup.token().is_cancelled());
    }

    #[test]
    fn from_cfg_picks_up_shutdown_settings() {
        let cfg = NoisiaCfg {
            fail_on_workload_error: true,
            drain_timeout_secs: 7,
            ..valid_cfg()
        };
        let sup = Supervisor::from_cfg(&cfg);
        assert_eq!(sup.policy, ExitPolicy::FailOnWorkloadError);
        assert_eq!(sup.drain_timeout, Duration::from_secs(7));

        let sup = Supervisor::from_cfg(&valid_cfg());
        assert_eq!(sup.policy, ExitPolicy::Lenient);
        assert!(sup.drain_timeout.is_zero());
    }

    #[tokio::test]
    async fn runs_to_terminating() {
        let mut sup = Supervisor::new();
        let report = sup.run(valid_cfg(), Arc::new(Done), NeverSignal).await.unwrap();
        assert_eq!(sup.state(), SupervisorState::Terminating);
        assert!(sup.token().is_cancelled());
        assert_eq!(report.cause.to_string(), "workload stopped: nil");
        assert_eq!(report.exit_code(), 0);
    }

    #[tokio::test]
    async fn second_run_is_rejected() {
        let mut sup = Supervisor::new();
        sup.run(valid_cfg(), Arc::new(Done), NeverSignal).await.unwrap();
        let err = sup.run(valid_cfg(), Arc::new(Done), NeverSignal).await.unwrap_err();
        assert!(matches!(err, SupervisorError::AlreadyStarted));
    }

    #[tokio::test]
    async fn signal_registration_failure_starts_nothing() {
        let mut sup = Supervisor::new();
        let err = sup.run(valid_cfg(), Arc::new(Done), BrokenSignal).await.unwrap_err();
        assert!(matches!(err, SupervisorError::SignalRegistration(_)));
        assert_eq!(err.exit_code(), 1);
        assert_eq!(sup.state(), SupervisorState::Idle);
        assert!(!sup.token().is_cancelled());
    }

    #[test]
    fn exit_code_policy() {
        let failed = || TerminalEvent::Workload(Err(WorkloadError::Failed("lost connection".into())));
        let report = |cause, policy| ShutdownReport {
            cause,
            trailing: None,
            policy,
        };

        assert_eq!(report(failed(), ExitPolicy::Lenient).exit_code(), 0);
        assert_eq!(report(failed(), ExitPolicy::FailOnWorkloadError).exit_code(), 1);
        assert_eq!(
            report(TerminalEvent::Signal("SIGINT"), ExitPolicy::FailOnWorkloadError).exit_code(),
            0
        );
        assert_eq!(
            report(TerminalEvent::Workload(Ok(())), ExitPolicy::FailOnWorkloadError).exit_code(),
            0
        );
    }
}
