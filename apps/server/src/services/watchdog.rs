//! Watchdog for runs whose parser never reported back.
//!
//! Runs left `pending` or `running` past the configured age are marked
//! `failed` so they stop looking in progress.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::config::WatchdogSettings;
use crate::db::DbPool;
use crate::error::AppResult;

/// Message recorded on runs failed by the watchdog.
pub const STUCK_RUN_MESSAGE: &str = "timed out waiting for parser results";

/// Start the watchdog background task.
pub fn start_watchdog_task(pool: Arc<DbPool>, settings: WatchdogSettings) {
    tokio::spawn(async move {
        info!(
            "Starting run watchdog (stuck after: {} seconds, interval: {} seconds)",
            settings.stuck_run_secs, settings.interval_secs
        );

        let mut ticker = interval(Duration::from_secs(settings.interval_secs.max(1)));

        loop {
            ticker.tick().await;

            if let Err(e) = run_watchdog(&pool, &settings).await {
                error!("Watchdog error: {}", e);
            }
        }
    });
}

/// Fail every open run older than the stuck threshold. Returns how many were failed.
pub async fn run_watchdog(pool: &DbPool, settings: &WatchdogSettings) -> AppResult<usize> {
    let age = settings.stuck_run_secs.min(u64::from(u32::MAX)) as i64;
    let cutoff = Utc::now() - chrono::Duration::seconds(age);

    let stuck = pool.find_open_runs_before(cutoff).await?;
    if stuck.is_empty() {
        return Ok(0);
    }

    let mut failed = 0;
    for run in stuck {
        if pool.fail_run(run.id, STUCK_RUN_MESSAGE).await? {
            warn!(
                run_id = run.id,
                status = %run.status,
                created_at = %run.created_at,
                "Run marked failed: {}",
                STUCK_RUN_MESSAGE
            );
            failed += 1;
        }
    }

    if failed > 0 {
        info!("Watchdog failed {} stuck runs", failed);
    }
    Ok(failed)
}
