use std::time::Duration;

use sqlx::PgPool;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::WorkloadError;

/// Interval between transactions for a per-worker rate (transactions/sec).
pub fn pace(rate: u32) -> Duration {
    Duration::from_secs(1) / rate.max(1)
}

/// Run `rate` rolled-back transactions per second until cancelled.
pub(super) async fn run_worker(
    pool: PgPool,
    token: CancellationToken,
    rate: u32,
) -> Result<(), WorkloadError> {
    let mut ticker = tokio::time::interval(pace(rate));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = token.cancelled() => return Ok(()),
            _ = ticker.tick() => {
                let mut tx = pool.begin().await?;
                sqlx::query("SELECT 1").execute(&mut *tx).await?;
                tx.rollback().await?;
            }
        }
    }
}
