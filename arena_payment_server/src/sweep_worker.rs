use arena_payment_engine::{MatchFlowApi, SqliteDatabase};
use chrono::Duration;
use log::*;
use tokio::task::JoinHandle;

/// Starts the match lifecycle sweep worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// The sweep is re-entrant and runs concurrently with user joins; the join path re-checks match status inside its
/// own transaction, so a tick landing mid-join cannot corrupt anything.
pub fn start_sweep_worker(db: SqliteDatabase, live_duration: Duration, interval_secs: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        let api = MatchFlowApi::new(db);
        info!("🕰️ Match lifecycle sweep worker started (every {interval_secs}s)");
        loop {
            timer.tick().await;
            trace!("🕰️ Running match lifecycle sweep");
            match api.auto_update_statuses(live_duration).await {
                Ok(result) if result.total() > 0 => {
                    info!("🕰️ Sweep: {} matches started, {} completed", result.started, result.completed);
                },
                Ok(_) => trace!("🕰️ Sweep pass: nothing to do"),
                Err(e) => error!("🕰️ Error running match lifecycle sweep: {e}"),
            }
        }
    })
}
