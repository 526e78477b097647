//! Background task that flips unpaid fees past their due date to
//! `overdue`. The due-date check is independent of payment activity, so
//! a ledger nobody touches still goes overdue on time.

use std::time::Duration;

use chrono::Utc;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Run the sweep loop until the token is cancelled.
pub async fn run(pool: SqlitePool, interval_secs: u64, cancel: CancellationToken) {
    info!("overdue sweeper starting (every {interval_secs}s)");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("overdue sweeper stopping");
                return;
            }
            _ = tokio::time::sleep(Duration::from_secs(interval_secs)) => {}
        }

        match sweep_once(&pool, Utc::now().timestamp()).await {
            Ok(0) => {}
            Ok(flipped) => info!("{flipped} student fees flipped to overdue"),
            Err(e) => error!("overdue sweep failed: {e}"),
        }
    }
}

/// Perform a single sweep iteration. Returns the number of fees flipped.
pub async fn sweep_once(pool: &SqlitePool, now: i64) -> crate::errors::Result<u64> {
    crate::store::fees::mark_overdue(pool, now).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testutil;

    #[tokio::test]
    async fn cancelled_sweeper_exits() {
        let pool = testutil::pool().await;
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(pool, 3600, cancel.clone()));

        cancel.cancel();
        handle.await.unwrap();
    }
}
