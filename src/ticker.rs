use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::engine::Engine;

/// Background task that keeps a day moving between client commands: statuses
/// follow the clock, due reservations bind, the backlog retries, and a failed
/// snapshot write is retried.
pub async fn run_ticker(engine: Arc<Engine>, every: Duration, stale_after: chrono::Duration) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        let report = engine.tick(stale_after).await;
        if !report.fulfilled.is_empty() || !report.flushed.is_empty() {
            debug!(
                "day {}: tick bound {} reservations, {} waiting",
                engine.day(),
                report.fulfilled.len(),
                report.flushed.len()
            );
        }
    }
}
