//! Liveness sweep
//!
//! Connections that die without a FIN or RST (laptop lid closed, Wi-Fi
//! gone) never wake their task up. This background task evicts any entry
//! whose last heartbeat is older than the grace timeout; eviction cancels
//! the entry's token so its task closes the socket.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::ConnectionRegistry;

/// Run the sweep until `cancel` fires.
///
/// An entry silent since `t` is gone by `t + grace + interval` at the latest.
pub async fn run_liveness_sweep(
    registry: Arc<ConnectionRegistry>,
    grace: Duration,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(
        "Starting liveness sweep (grace timeout: {:?}, interval: {:?})",
        grace,
        interval
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let evicted = registry.evict_expired(grace);
                if !evicted.is_empty() {
                    tracing::info!(
                        "Sweep evicted {} silent connection(s), {} live",
                        evicted.len(),
                        registry.count()
                    );
                }
            }
            _ = cancel.cancelled() => {
                tracing::info!("Liveness sweep shutting down");
                break;
            }
        }
    }
}
