//! Polling completion monitor.
//!
//! One monitor runs per batch. Each tick re-evaluates the composite
//! completion predicate under the accounting lock and stops on done, stall,
//! timeout, or when another path has already claimed the outcome.

use super::accounting::ProgressAccounting;
use crate::config::MonitorConfig;
use std::sync::Arc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Why the monitor stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MonitorVerdict {
    /// Every expected item reached a terminal status
    Completed,
    /// Counters stopped moving with nothing in flight
    Stalled,
    /// The wall-clock ceiling was reached
    TimedOut,
    /// Another path claimed the outcome; nothing to report
    Skipped,
}

/// Watch `accounting` until the batch ends
pub(crate) async fn run_monitor(
    accounting: Arc<ProgressAccounting>,
    config: MonitorConfig,
    stop: CancellationToken,
) -> MonitorVerdict {
    let started = Instant::now();
    let mut interval = tokio::time::interval(config.poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut last_progress = None;
    let mut no_progress_ticks: u32 = 0;

    loop {
        tokio::select! {
            _ = stop.cancelled() => {
                tracing::debug!("completion monitor stopped");
                return MonitorVerdict::Skipped;
            }
            _ = interval.tick() => {
                let snapshot = accounting.snapshot().await;
                if snapshot.outcome.is_some() {
                    return MonitorVerdict::Skipped;
                }

                let progress = (snapshot.processed, snapshot.total_expected);
                if last_progress == Some(progress) {
                    no_progress_ticks = no_progress_ticks.saturating_add(1);
                } else {
                    last_progress = Some(progress);
                    no_progress_ticks = 0;
                }

                tracing::debug!(
                    processed = snapshot.processed,
                    total = snapshot.total_expected,
                    succeeded = snapshot.succeeded,
                    failed = snapshot.failed,
                    canceled = snapshot.canceled,
                    albums_complete = snapshot.all_albums_complete,
                    in_flight = !snapshot.no_item_in_flight,
                    no_progress_ticks,
                    "completion check"
                );

                if accounting.try_mark_batch_done().await.is_some() {
                    return MonitorVerdict::Completed;
                }

                if no_progress_ticks > config.stall_ticks
                    && accounting.try_mark_stalled().await.is_some()
                {
                    tracing::warn!(
                        processed = snapshot.processed,
                        total = snapshot.total_expected,
                        "batch stalled, finishing with what completed"
                    );
                    return MonitorVerdict::Stalled;
                }

                if started.elapsed() >= config.batch_timeout {
                    return match accounting.finish(crate::types::BatchOutcome::TimedOut).await {
                        Some(_) => MonitorVerdict::TimedOut,
                        None => MonitorVerdict::Skipped,
                    };
                }
            }
        }
    }
}
