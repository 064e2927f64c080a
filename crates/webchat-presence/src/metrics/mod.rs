//! Registry metrics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Cumulative registry counters.
#[derive(Debug, Default)]
pub struct RegistryMetrics {
    /// Connect operations that changed membership
    pub connects: AtomicU64,
    /// Disconnect/leave operations that changed membership
    pub disconnects: AtomicU64,
    /// Nicks removed by idle expiry
    pub expirations: AtomicU64,
    /// Rooms created
    pub rooms_opened: AtomicU64,
    /// Rooms deleted after their last member left
    pub rooms_closed: AtomicU64,
    /// Events handed to the broadcast channel
    pub events_published: AtomicU64,
}

impl RegistryMetrics {
    /// Create new zeroed metrics
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_join(&self, opened: usize) {
        self.connects.fetch_add(1, Ordering::Relaxed);
        self.rooms_opened.fetch_add(opened as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_leave(&self, closed: usize, expired: bool) {
        if expired {
            self.expirations.fetch_add(1, Ordering::Relaxed);
        } else {
            self.disconnects.fetch_add(1, Ordering::Relaxed);
        }
        self.rooms_closed.fetch_add(closed as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_event(&self) {
        self.events_published.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connects: self.connects.load(Ordering::Relaxed),
            disconnects: self.disconnects.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            rooms_opened: self.rooms_opened.load(Ordering::Relaxed),
            rooms_closed: self.rooms_closed.load(Ordering::Relaxed),
            events_published: self.events_published.load(Ordering::Relaxed),
        }
    }
}

/// Serializable metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Connect operations that changed membership
    pub connects: u64,
    /// Disconnect/leave operations that changed membership
    pub disconnects: u64,
    /// Nicks removed by idle expiry
    pub expirations: u64,
    /// Rooms created
    pub rooms_opened: u64,
    /// Rooms deleted
    pub rooms_closed: u64,
    /// Events published
    pub events_published: u64,
}
