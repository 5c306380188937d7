//! Telemetry cache
//!
//! Single writer, many readers. The refresh pipeline builds a complete
//! [`TelemetryView`] off to the side and [`TelemetryCache::publish`] swaps it
//! in as one `Arc`; readers clone the `Arc` and keep a consistent view for as
//! long as they hold it, no matter how many refreshes land meanwhile.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use crate::types::{Alert, AppGroup, NormalizedSnapshot, RawSnapshot};

#[derive(Debug, Clone)]
pub struct TelemetryView {
    /// Incremented on every publish; 0 until the first refresh completes.
    pub generation: u64,
    pub snapshot: Arc<NormalizedSnapshot>,
    pub app_groups: Vec<AppGroup>,
    pub alerts: Vec<Alert>,
}

impl TelemetryView {
    fn empty() -> Self {
        Self {
            generation: 0,
            snapshot: Arc::new(NormalizedSnapshot::empty()),
            app_groups: Vec::new(),
            alerts: Vec::new(),
        }
    }

    pub fn is_primed(&self) -> bool {
        self.generation > 0
    }
}

pub struct TelemetryCache {
    view: RwLock<Arc<TelemetryView>>,
    /// Raw sample the next cycle's rates are computed against.
    baseline: Mutex<Option<RawSnapshot>>,
}

impl Default for TelemetryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryCache {
    pub fn new() -> Self {
        Self {
            view: RwLock::new(Arc::new(TelemetryView::empty())),
            baseline: Mutex::new(None),
        }
    }

    /// Last published view. Never blocks on a refresh in progress beyond the
    /// pointer swap.
    pub fn current(&self) -> Arc<TelemetryView> {
        // A panicking writer cannot leave a half-swapped Arc behind.
        let guard = self.view.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*guard)
    }

    /// Atomically replace the view; returns the new generation.
    pub fn publish(
        &self,
        snapshot: NormalizedSnapshot,
        app_groups: Vec<AppGroup>,
        alerts: Vec<Alert>,
    ) -> u64 {
        let snapshot = Arc::new(snapshot);
        let mut guard = self.view.write().unwrap_or_else(PoisonError::into_inner);
        let generation = guard.generation + 1;
        *guard = Arc::new(TelemetryView {
            generation,
            snapshot,
            app_groups,
            alerts,
        });
        generation
    }

    pub(crate) fn baseline(&self) -> MutexGuard<'_, Option<RawSnapshot>> {
        self.baseline.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
