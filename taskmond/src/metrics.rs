use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::types::ControlOutcome;

/// Daemon self-observation counters. All updates are relaxed atomics; the
/// numbers are informational and never drive control flow.
#[derive(Debug)]
pub struct Metrics {
    started: Instant,
    refresh_cycles: AtomicU64,
    sampler_failures: AtomicU64,
    degenerate_intervals: AtomicU64,
    refresh_panics: AtomicU64,
    last_refresh_micros: AtomicU64,
    control_success: AtomicU64,
    control_not_found: AtomicU64,
    control_permission_denied: AtomicU64,
    control_unsupported: AtomicU64,
    control_timeouts: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub refresh_cycles: u64,
    pub sampler_failures: u64,
    pub degenerate_intervals: u64,
    pub refresh_panics: u64,
    pub last_refresh_micros: u64,
    pub control_success: u64,
    pub control_not_found: u64,
    pub control_permission_denied: u64,
    pub control_unsupported: u64,
    pub control_timeouts: u64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            refresh_cycles: AtomicU64::new(0),
            sampler_failures: AtomicU64::new(0),
            degenerate_intervals: AtomicU64::new(0),
            refresh_panics: AtomicU64::new(0),
            last_refresh_micros: AtomicU64::new(0),
            control_success: AtomicU64::new(0),
            control_not_found: AtomicU64::new(0),
            control_permission_denied: AtomicU64::new(0),
            control_unsupported: AtomicU64::new(0),
            control_timeouts: AtomicU64::new(0),
        }
    }

    pub fn record_refresh(&self, took: Duration) {
        self.refresh_cycles.fetch_add(1, Ordering::Relaxed);
        let micros = u64::try_from(took.as_micros()).unwrap_or(u64::MAX);
        self.last_refresh_micros.store(micros, Ordering::Relaxed);
    }

    pub fn inc_sampler_failures(&self) {
        self.sampler_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_degenerate_intervals(&self) {
        self.degenerate_intervals.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_refresh_panics(&self) {
        self.refresh_panics.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_control_timeouts(&self) {
        self.control_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_control(&self, outcome: ControlOutcome) {
        let counter = match outcome {
            ControlOutcome::Success => &self.control_success,
            ControlOutcome::NotFound => &self.control_not_found,
            ControlOutcome::PermissionDenied => &self.control_permission_denied,
            ControlOutcome::PlatformUnsupported => &self.control_unsupported,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn refresh_cycles(&self) -> u64 {
        self.refresh_cycles.load(Ordering::Relaxed)
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.uptime().as_secs(),
            refresh_cycles: self.refresh_cycles.load(Ordering::Relaxed),
            sampler_failures: self.sampler_failures.load(Ordering::Relaxed),
            degenerate_intervals: self.degenerate_intervals.load(Ordering::Relaxed),
            refresh_panics: self.refresh_panics.load(Ordering::Relaxed),
            last_refresh_micros: self.last_refresh_micros.load(Ordering::Relaxed),
            control_success: self.control_success.load(Ordering::Relaxed),
            control_not_found: self.control_not_found.load(Ordering::Relaxed),
            control_permission_denied: self.control_permission_denied.load(Ordering::Relaxed),
            control_unsupported: self.control_unsupported.load(Ordering::Relaxed),
            control_timeouts: self.control_timeouts.load(Ordering::Relaxed),
        }
    }
}
