//! Ping/pong heartbeat for WebSocket keepalive.

use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::metrics::RealtimeMetrics;

use super::authenticator::CLOSE_GOING_AWAY;
use super::manager::ConnectionManager;

/// Periodically pings every connection and terminates those that did not
/// answer the previous ping.
#[derive(Debug)]
pub struct HeartbeatMonitor {
    manager: Arc<ConnectionManager>,
    metrics: Arc<RealtimeMetrics>,
    interval: Duration,
}

impl HeartbeatMonitor {
    pub fn new(
        manager: Arc<ConnectionManager>,
        metrics: Arc<RealtimeMetrics>,
        interval: Duration,
    ) -> Self {
        Self {
            manager,
            metrics,
            interval,
        }
    }

    /// One heartbeat cycle. Returns the number of terminated connections.
    pub fn sweep(&self) -> usize {
        let mut terminated = 0;
        for handle in self.manager.registry().all_connections() {
            if !handle.take_alive() {
                warn!(conn_id = %handle.id, subject = %handle.user_id(), "Heartbeat timeout");
                self.metrics.inc_heartbeat_termination();
                self.manager
                    .terminate(&handle, CLOSE_GOING_AWAY, "Heartbeat timeout");
                terminated += 1;
                continue;
            }
            if !handle.ping() && !handle.is_open() {
                debug!(conn_id = %handle.id, "Ping failed on closed connection");
                self.manager.unregister(handle.id);
                terminated += 1;
            }
        }
        terminated
    }

    /// Run sweeps every interval until `shutdown` fires.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let mut interval = time::interval(self.interval);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        // the first tick completes immediately
        interval.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    let terminated = self.sweep();
                    if terminated > 0 {
                        debug!(terminated, "Heartbeat sweep finished");
                    }
                }
            }
        }
        debug!("Heartbeat loop stopped");
    }
}
