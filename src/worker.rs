// Background gateway stats logger. Reports session and ingest totals at INFO level.

use std::sync::Arc;
use tokio::time::{Duration, interval};

use crate::registry::DeviceRegistry;

/// Logs gateway stats every `stats_log_interval_secs` until `shutdown_rx` fires.
pub fn spawn_stats_logger(
    registry: Arc<DeviceRegistry>,
    stats_log_interval_secs: u64,
    mut shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut stats_log_tick = interval(Duration::from_secs(stats_log_interval_secs));
        stats_log_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // First tick fires immediately; nothing to report yet.
        stats_log_tick.tick().await;

        loop {
            tokio::select! {
                _ = stats_log_tick.tick() => {
                    tracing::info!(
                        connected_devices = registry.connection_count(),
                        reports_total = registry.reports_total(),
                        reports_rejected_total = registry.reports_rejected_total(),
                        "gateway stats"
                    );
                }
                _ = &mut shutdown_rx => {
                    tracing::debug!("Stats logger shutting down");
                    break;
                }
            }
        }
    })
}
