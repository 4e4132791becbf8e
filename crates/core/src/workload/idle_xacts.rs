use std::time::Duration;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use super::WorkloadError;
use crate::config::NoisiaCfg;

/// Inclusive range of seconds a transaction stays idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Naptime {
    min_secs: u64,
    max_secs: u64,
}

impl Naptime {
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            min_secs: min_secs.min(max_secs),
            max_secs: max_secs.max(min_secs),
        }
    }

    pub fn from_cfg(cfg: &NoisiaCfg) -> Self {
        Self::new(cfg.idle_xacts_naptime_min, cfg.idle_xacts_naptime_max)
    }

    pub fn sample(&self) -> Duration {
        Duration::from_secs(fastrand::u64(self.min_secs..=self.max_secs))
    }
}

/// Open a transaction, leave it idle for a random naptime, roll it back.
/// Repeats until `token` is cancelled; an in-flight transaction is rolled
/// back before returning.
pub(super) async fn run_worker(
    pool: PgPool,
    token: CancellationToken,
    naptime: Naptime,
) -> Result<(), WorkloadError> {
    while !token.is_cancelled() {
        let nap = naptime.sample();
        let mut tx = pool.begin().await?;
        let pid: i32 = sqlx::query_scalar("SELECT pg_backend_pid()")
            .fetch_one(&mut *tx)
            .await?;
        tracing::debug!(pid, naptime_secs = nap.as_secs(), "idle transaction open");

        let cancelled = tokio::select! {
            _ = token.cancelled() => true,
            _ = tokio::time::sleep(nap) => false,
        };
        tx.rollback().await?;
        if cancelled {
            break;
        }
    }
    Ok(())
}
