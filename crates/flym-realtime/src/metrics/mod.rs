//! Realtime engine metrics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Engine-level metrics counters.
#[derive(Debug, Default)]
pub struct RealtimeMetrics {
    /// Total connections established
    pub connections_opened: AtomicU64,
    /// Connections currently registered
    pub connections_active: AtomicU64,
    /// Inbound frames handled
    pub messages_received: AtomicU64,
    /// Frames queued to local connections
    pub messages_sent: AtomicU64,
    /// Join attempts rejected by the access gate
    pub joins_denied: AtomicU64,
    /// Connections closed for missing a heartbeat
    pub heartbeat_terminations: AtomicU64,
    /// Bus publishes that failed or timed out
    pub bus_publish_failures: AtomicU64,
}

impl RealtimeMetrics {
    /// Create new zeroed metrics
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        let _ = self
            .connections_active
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    pub fn inc_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_sent(&self, count: u64) {
        self.messages_sent.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_join_denied(&self) {
        self.joins_denied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_heartbeat_termination(&self) {
        self.heartbeat_terminations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_bus_failure(&self) {
        self.bus_publish_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            joins_denied: self.joins_denied.load(Ordering::Relaxed),
            heartbeat_terminations: self.heartbeat_terminations.load(Ordering::Relaxed),
            bus_publish_failures: self.bus_publish_failures.load(Ordering::Relaxed),
        }
    }
}

/// Serializable metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub connections_opened: u64,
    pub connections_active: u64,
    pub messages_received: u64,
    pub messages_sent: u64,
    pub joins_denied: u64,
    pub heartbeat_terminations: u64,
    pub bus_publish_failures: u64,
}
