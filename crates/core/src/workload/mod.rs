//! The long-running, cancellable operation the supervisor drives.
//!
//! A [`Workload`] runs until it fails, finishes, or observes its
//! cancellation token. [`WorkloadSet`] is the implementation the binary
//! uses: it connects to Postgres and fans out `jobs` workers for every
//! enabled workload kind.

mod idle_xacts;
mod rollbacks;

pub use idle_xacts::Naptime;
pub use rollbacks::pace;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::config::NoisiaCfg;

// ── Error type ─────────────────────────────────────────────────

/// Why a workload stopped short of a clean return.
#[derive(Debug, thiserror::Error)]
pub enum WorkloadError {
    #[error("connect to postgres: {0}")]
    Connect(#[source] sqlx::Error),
    #[error("connect to postgres timed out after {0}s")]
    ConnectTimeout(u64),
    #[error("database: {0}")]
    Database(#[from] sqlx::Error),
    #[error("workload panicked: {0}")]
    Panicked(String),
    #[error("workload aborted: {0}")]
    Aborted(String),
    #[error("{0}")]
    Failed(String),
}

impl From<JoinError> for WorkloadError {
    fn from(err: JoinError) -> Self {
        if !err.is_panic() {
            return Self::Aborted(err.to_string());
        }
        let payload = err.into_panic();
        let msg = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_owned());
        Self::Panicked(msg)
    }
}

// ── Workload trait ─────────────────────────────────────────────

/// A cooperative long-running operation.
///
/// `run` is called at most once per process. Implementations must stop
/// starting new work and return promptly once `token` is cancelled; they
/// only observe the token and never cancel it themselves.
#[async_trait]
pub trait Workload: Send + Sync {
    fn name(&self) -> &str;

    async fn run(
        &self,
        token: CancellationToken,
        cfg: Arc<NoisiaCfg>,
    ) -> Result<(), WorkloadError>;
}

// ── Workload kinds ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadKind {
    IdleXacts,
    Rollbacks,
}

impl WorkloadKind {
    /// Kinds switched on in `cfg`, in a stable order.
    pub fn enabled(cfg: &NoisiaCfg) -> Vec<Self> {
        let mut kinds = Vec::with_capacity(2);
        if cfg.idle_xacts {
            kinds.push(Self::IdleXacts);
        }
        if cfg.rollbacks {
            kinds.push(Self::Rollbacks);
        }
        kinds
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkloadKind::IdleXacts => write!(f, "idle-xacts"),
            WorkloadKind::Rollbacks => write!(f, "rollbacks"),
        }
    }
}

// ── WorkloadSet ────────────────────────────────────────────────

/// Runs every enabled workload kind with `cfg.jobs` workers each against a
/// shared connection pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct WorkloadSet;

#[async_trait]
impl Workload for WorkloadSet {
    fn name(&self) -> &str {
        "noisia"
    }

    async fn run(
        &self,
        token: CancellationToken,
        cfg: Arc<NoisiaCfg>,
    ) -> Result<(), WorkloadError> {
        let Some(pool) = connect(&token, &cfg).await? else {
            return Ok(());
        };

        // Child token: a failing worker stops its siblings without touching
        // the supervisor's token.
        let workers = token.child_token();
        let mut set = JoinSet::new();
        for kind in WorkloadKind::enabled(&cfg) {
            tracing::info!(workload = %kind, jobs = cfg.jobs, "starting workload");
            for worker in 0..cfg.jobs {
                let pool = pool.clone();
                let token = workers.clone();
                let cfg = Arc::clone(&cfg);
                set.spawn(async move {
                    let result = match kind {
                        WorkloadKind::IdleXacts => {
                            idle_xacts::run_worker(pool, token, Naptime::from_cfg(&cfg)).await
                        }
                        WorkloadKind::Rollbacks => {
                            rollbacks::run_worker(pool, token, cfg.rollbacks_rate).await
                        }
                    };
                    if let Err(e) = &result {
                        tracing::warn!(workload = %kind, worker, error = %e, "worker failed");
                    }
                    result
                });
            }
        }

        let mut first_err = None;
        while let Some(joined) = set.join_next().await {
            if let Err(e) = joined.unwrap_or_else(|e| Err(e.into())) {
                workers.cancel();
                first_err.get_or_insert(e);
            }
        }
        pool.close().await;
        tracing::debug!("all workers stopped");

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Connect the pool, bounded by `connect_timeout_secs`. Returns `None` when
/// cancellation wins the race.
async fn connect(
    token: &CancellationToken,
    cfg: &NoisiaCfg,
) -> Result<Option<PgPool>, WorkloadError> {
    let max_connections = cfg.max_connections();
    let connecting = tokio::time::timeout(
        Duration::from_secs(cfg.connect_timeout_secs),
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(&cfg.conninfo),
    );

    tokio::select! {
        biased;
        _ = token.cancelled() => Ok(None),
        result = connecting => match result {
            Ok(Ok(pool)) => {
                tracing::info!(max_connections, "connected to postgres");
                Ok(Some(pool))
            }
            Ok(Err(e)) => Err(WorkloadError::Connect(e)),
            Err(_) => Err(WorkloadError::ConnectTimeout(cfg.connect_timeout_secs)),
        },
    }
}
