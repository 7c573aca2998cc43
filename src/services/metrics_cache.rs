//! Shared metrics cache and stale-view detection

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use crate::services::metrics::{RouteMetrics, PLACEHOLDER_PENDING};

/// Point in the cache's history, taken before a route is read from storage.
/// Metrics computed from that read are only stored if the route has not
/// been invalidated since.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CacheStamp(u64);

#[derive(Default)]
struct CacheState {
    entries: HashMap<Uuid, RouteMetrics>,
    /// Stamp of each route's latest invalidation
    invalidated: HashMap<Uuid, u64>,
}

/// Route id to computed metrics. Entries are written whole; a reader sees
/// either nothing or a complete entry.
#[derive(Default)]
pub struct MetricsCache {
    clock: AtomicU64,
    state: RwLock<CacheState>,
}

impl MetricsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stamp(&self) -> CacheStamp {
        CacheStamp(self.clock.load(Ordering::SeqCst))
    }

    /// Store metrics computed from a read taken at `stamp`. Returns false,
    /// storing nothing, when the route changed after that read.
    pub fn insert(&self, route_id: Uuid, stamp: CacheStamp, metrics: RouteMetrics) -> bool {
        let mut state = self.state.write();
        if state.invalidated.get(&route_id).is_some_and(|&at| at > stamp.0) {
            return false;
        }
        state.entries.insert(route_id, metrics);
        true
    }

    pub fn get(&self, route_id: &Uuid) -> Option<RouteMetrics> {
        self.state.read().entries.get(route_id).copied()
    }

    /// Drop a route's entry after its addresses changed or it was deleted.
    /// Computations that read the route before this call can no longer
    /// store their result.
    pub fn invalidate(&self, route_id: &Uuid) {
        let mut state = self.state.write();
        let at = self.clock.fetch_add(1, Ordering::SeqCst) + 1;
        state.entries.remove(route_id);
        state.invalidated.insert(*route_id, at);
    }

    /// Duration text for a route, pending while not computed
    pub fn duration_display(&self, route_id: &Uuid) -> String {
        self.get(route_id)
            .map(|m| m.duration_display())
            .unwrap_or_else(|| PLACEHOLDER_PENDING.to_string())
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.state.read().entries.is_empty()
    }
}

/// Marks one view request; only the latest ticket per viewer is current
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewTicket {
    viewer: String,
    sequence: u64,
}

impl ViewTicket {
    #[cfg(test)]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

/// Tracks each viewer's most recent selection so slower, older view
/// results can be discarded instead of overwriting newer ones. A viewer is
/// one credential, so two clients of the same user do not supersede each
/// other.
#[derive(Default)]
pub struct ViewTracker {
    next: AtomicU64,
    latest: Mutex<HashMap<String, u64>>,
}

impl ViewTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new selection, superseding any earlier one of this viewer
    pub fn begin(&self, viewer: &str) -> ViewTicket {
        let sequence = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        self.latest.lock().insert(viewer.to_string(), sequence);
        ViewTicket {
            viewer: viewer.to_string(),
            sequence,
        }
    }

    pub fn is_current(&self, ticket: &ViewTicket) -> bool {
        self.latest.lock().get(&ticket.viewer) == Some(&ticket.sequence)
    }

    /// Forget a viewer, e.g. when its credential is logged out
    pub fn forget(&self, viewer: &str) {
        self.latest.lock().remove(viewer);
    }
}
