use log::{debug, error, info, warn};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;

use crate::aggregator::aggregate;
use crate::alerts::{AlertThresholds, evaluate};
use crate::cache::TelemetryCache;
use crate::controller::SafetyGuard;
use crate::metrics::Metrics;
use crate::normalizer::normalize;
use crate::sampler::Sampler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Published a new view with this generation.
    Published(u64),
    /// First sample stored as the rate baseline; nothing published yet.
    Primed,
    /// The cycle failed; the previous view is still served.
    Skipped,
}

/// Drives Sampler → Normalizer → Aggregator → Evaluator and publishes the
/// result. The only writer of [`TelemetryCache`].
pub struct Refresher {
    sampler: Box<dyn Sampler>,
    cache: Arc<TelemetryCache>,
    thresholds: AlertThresholds,
    guard: SafetyGuard,
    metrics: Arc<Metrics>,
}

impl Refresher {
    pub fn new(
        sampler: Box<dyn Sampler>,
        cache: Arc<TelemetryCache>,
        thresholds: AlertThresholds,
        guard: SafetyGuard,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            sampler,
            cache,
            thresholds,
            guard,
            metrics,
        }
    }

    /// One full cycle. Errors stop at this boundary: they are logged and
    /// counted, and readers keep the last good view.
    pub fn refresh_once(&mut self) -> RefreshOutcome {
        let started = Instant::now();

        let current = match self.sampler.sample() {
            Ok(raw) => raw,
            Err(err) => {
                warn!("[refresh] sampling failed, keeping last snapshot: {err}");
                self.metrics.inc_sampler_failures();
                return RefreshOutcome::Skipped;
            }
        };

        let mut baseline = self.cache.baseline();
        let mut snapshot = match (*baseline).as_ref().map(|prev| normalize(prev, &current)) {
            None => {
                *baseline = Some(current);
                debug!("[refresh] baseline sample stored");
                return RefreshOutcome::Primed;
            }
            Some(Err(err)) => {
                // Keep the older baseline; the next sample is measured against it.
                warn!("[refresh] {err}");
                self.metrics.inc_degenerate_intervals();
                return RefreshOutcome::Skipped;
            }
            Some(Ok(snapshot)) => {
                *baseline = Some(current);
                snapshot
            }
        };
        drop(baseline);

        for process in snapshot.processes.values_mut() {
            process.protected = self.guard.is_protected(process.pid, &process.name);
        }
        let app_groups = aggregate(&snapshot);
        let alerts = evaluate(&snapshot, &self.thresholds);

        for alert in &alerts {
            debug!(
                "[refresh] {:?} {:?} alert: {:.1} >= {:.1}",
                alert.severity, alert.resource, alert.current_value, alert.threshold
            );
        }

        let generation = self.cache.publish(snapshot, app_groups, alerts);
        self.metrics.record_refresh(started.elapsed());
        RefreshOutcome::Published(generation)
    }

    /// Seed rates with two samples `prime_delay` apart, then refresh every
    /// `period` until the runtime shuts down. Sampling runs on the blocking
    /// pool.
    pub async fn run(self, period: Duration, prime_delay: Duration) {
        let Some(refresher) = self.step().await else {
            return;
        };
        tokio::time::sleep(prime_delay).await;
        let Some(mut refresher) = refresher.step().await else {
            return;
        };
        info!(
            "[refresh] primed, refreshing every {}ms",
            period.as_millis()
        );

        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match refresher.step().await {
                Some(next) => refresher = next,
                None => return,
            }
        }
    }

    /// One cycle on the blocking pool. A panicking cycle is counted and
    /// skipped; the refresher comes back either way. `None` only when the
    /// runtime is shutting down.
    async fn step(mut self) -> Option<Self> {
        let joined = tokio::task::spawn_blocking(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.refresh_once()));
            if outcome.is_err() {
                self.metrics.inc_refresh_panics();
                error!("[refresh] refresh cycle panicked, keeping last snapshot");
            }
            self
        })
        .await;

        match joined {
            Ok(refresher) => Some(refresher),
            Err(err) => {
                error!("[refresh] refresh task cancelled: {err}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SamplerError;
    use crate::testing::{RawBuilder, ScriptedSampler, record};
    use crate::types::{Resource, Severity};

    fn refresher(
        script: Vec<Result<crate::types::RawSnapshot, SamplerError>>,
    ) -> (Refresher, Arc<TelemetryCache>, Arc<Metrics>) {
        let cache = Arc::new(TelemetryCache::new());
        let metrics = Arc::new(Metrics::new());
        let r = Refresher::new(
            Box::new(ScriptedSampler::new(script)),
            Arc::clone(&cache),
            AlertThresholds::default(),
            SafetyGuard::new(&["sshd".to_string()]),
            Arc::clone(&metrics),
        );
        (r, cache, metrics)
    }

    #[test]
    fn test_first_sample_only_primes() {
        let t0 = Instant::now();
        let (mut r, cache, _) = refresher(vec![Ok(RawBuilder::new(t0, &[0]).build())]);

        assert_eq!(r.refresh_once(), RefreshOutcome::Primed);
        assert_eq!(cache.current().generation, 0);
        assert!(cache.baseline().is_some());
    }

    #[test]
    fn test_publishes_full_view() {
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_secs(1);
        let script = vec![
            Ok(RawBuilder::new(t0, &[0, 0])
                .process(500, record("app", Some("/usr/bin/app"), 7, 0, 1 << 20))
                .process(600, record("sshd", Some("/usr/sbin/sshd"), 7, 0, 1 << 20))
                .build()),
            Ok(RawBuilder::new(t1, &[900, 900])
                .process(500, record("app", Some("/usr/bin/app"), 7, 500, 1 << 20))
                .process(600, record("sshd", Some("/usr/sbin/sshd"), 7, 0, 1 << 20))
                .build()),
        ];
        let (mut r, cache, metrics) = refresher(script);

        r.refresh_once();
        assert_eq!(r.refresh_once(), RefreshOutcome::Published(1));

        let view = cache.current();
        assert!((view.snapshot.system_cpu_percent - 90.0).abs() < 1e-6);
        assert!((view.snapshot.processes[&500].cpu_percent - 25.0).abs() < 1e-6);
        assert!(!view.snapshot.processes[&500].protected);
        assert!(view.snapshot.processes[&600].protected);
        assert_eq!(view.app_groups.len(), 2);
        assert_eq!(view.alerts.len(), 1);
        assert_eq!(view.alerts[0].resource, Resource::Cpu);
        assert_eq!(view.alerts[0].severity, Severity::Warning);
        assert_eq!(metrics.refresh_cycles(), 1);
    }

    #[test]
    fn test_sampler_failure_keeps_last_view() {
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_secs(1);
        let script = vec![
            Ok(RawBuilder::new(t0, &[0]).build()),
            Ok(RawBuilder::new(t1, &[100]).build()),
            Err(SamplerError::NoCpus),
        ];
        let (mut r, cache, metrics) = refresher(script);

        r.refresh_once();
        r.refresh_once();
        let before = cache.current();
        assert_eq!(r.refresh_once(), RefreshOutcome::Skipped);

        let after = cache.current();
        assert_eq!(after.generation, before.generation);
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(metrics.snapshot().sampler_failures, 1);
    }

    #[test]
    fn test_degenerate_interval_keeps_baseline() {
        let t0 = Instant::now() + Duration::from_secs(10);
        let script = vec![
            Ok(RawBuilder::new(t0, &[0]).build()),
            // Clock went backwards.
            Ok(RawBuilder::new(t0 - Duration::from_secs(1), &[50]).build()),
            Ok(RawBuilder::new(t0 + Duration::from_secs(2), &[1000]).build()),
        ];
        let (mut r, cache, metrics) = refresher(script);

        r.refresh_once();
        assert_eq!(r.refresh_once(), RefreshOutcome::Skipped);
        assert_eq!(metrics.snapshot().degenerate_intervals, 1);

        assert_eq!(r.refresh_once(), RefreshOutcome::Published(1));
        // Measured against t0: 1000ms busy over 2s.
        let view = cache.current();
        assert!((view.snapshot.system_cpu_percent - 50.0).abs() < 1e-6);
    }

    /// Panics on the call numbered `panic_on`, otherwise replays `inner`.
    struct FaultySampler {
        inner: ScriptedSampler,
        calls: usize,
        panic_on: usize,
    }

    impl Sampler for FaultySampler {
        fn sample(&mut self) -> Result<crate::types::RawSnapshot, SamplerError> {
            self.calls += 1;
            if self.calls == self.panic_on {
                panic!("sampler bug");
            }
            self.inner.sample()
        }
    }

    #[tokio::test]
    async fn test_panicking_cycle_does_not_stop_refreshing() {
        let t0 = Instant::now();
        let sampler = FaultySampler {
            inner: ScriptedSampler::new(vec![
                Ok(RawBuilder::new(t0, &[0]).build()),
                Ok(RawBuilder::new(t0 + Duration::from_secs(1), &[100]).build()),
                Ok(RawBuilder::new(t0 + Duration::from_secs(2), &[200]).build()),
            ]),
            calls: 0,
            panic_on: 3,
        };
        let cache = Arc::new(TelemetryCache::new());
        let metrics = Arc::new(Metrics::new());
        let r = Refresher::new(
            Box::new(sampler),
            Arc::clone(&cache),
            AlertThresholds::default(),
            SafetyGuard::default(),
            Arc::clone(&metrics),
        );

        let r = r.step().await.expect("primes");
        let r = r.step().await.expect("publishes");
        assert_eq!(cache.current().generation, 1);

        let r = r.step().await.expect("survives the panic");
        assert_eq!(metrics.snapshot().refresh_panics, 1);
        assert_eq!(cache.current().generation, 1);

        r.step().await.expect("keeps going");
        assert_eq!(cache.current().generation, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_primes_and_keeps_refreshing() {
        let t0 = Instant::now();
        let script = (0..6u64)
            .map(|i| Ok(RawBuilder::new(t0 + Duration::from_secs(i), &[i * 100]).build()))
            .collect();
        let (r, cache, _) = refresher(script);

        let handle = tokio::spawn(r.run(Duration::from_millis(1500), Duration::from_millis(200)));

        let deadline = tokio::time::Instant::now() + Duration::from_secs(30);
        while cache.current().generation < 3 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(cache.current().generation >= 3);
        handle.abort();
    }
}
