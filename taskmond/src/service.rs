//! Query and control facade used by the HTTP layer.
//!
//! Queries always answer from the cache and never sample on demand. Control
//! calls run on the blocking pool and are bounded by the configured timeout;
//! an OS call that outlives the timeout is left to finish on its own.

use log::warn;
use std::sync::Arc;
use std::time::Duration;

use crate::alerts::{AlertThresholds, ThresholdOverrides, evaluate};
use crate::cache::{TelemetryCache, TelemetryView};
use crate::capability::Capabilities;
use crate::controller::{ProcessControl, terminate_group};
use crate::error::{ControlError, ControlTimeout, QueryError, ThresholdError};
use crate::metrics::Metrics;
use crate::types::{
    Alert, AppGroup, ControlResult, GroupControlResult, NormalizedSnapshot, Pid, ProcessMetric,
    TerminateMode,
};

pub struct TelemetryService {
    cache: Arc<TelemetryCache>,
    control: Arc<dyn ProcessControl>,
    thresholds: AlertThresholds,
    metrics: Arc<Metrics>,
    control_timeout: Duration,
    default_terminate: TerminateMode,
}

impl TelemetryService {
    pub fn new(
        cache: Arc<TelemetryCache>,
        control: Arc<dyn ProcessControl>,
        thresholds: AlertThresholds,
        metrics: Arc<Metrics>,
        control_timeout: Duration,
        default_terminate: TerminateMode,
    ) -> Self {
        Self {
            cache,
            control,
            thresholds,
            metrics,
            control_timeout,
            default_terminate,
        }
    }

    pub fn view(&self) -> Arc<TelemetryView> {
        self.cache.current()
    }

    pub fn current_snapshot(&self) -> Arc<NormalizedSnapshot> {
        Arc::clone(&self.cache.current().snapshot)
    }

    pub fn app_groups(&self) -> Vec<AppGroup> {
        self.cache.current().app_groups.clone()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.cache.current().alerts.clone()
    }

    /// Evaluate the cached snapshot against adjusted thresholds.
    pub fn alerts_with(&self, overrides: &ThresholdOverrides) -> Result<Vec<Alert>, ThresholdError> {
        if overrides.is_empty() {
            return Ok(self.alerts());
        }
        let thresholds = self.thresholds.with_overrides(overrides);
        thresholds.validate()?;
        Ok(evaluate(&self.cache.current().snapshot, &thresholds))
    }

    pub fn thresholds(&self) -> &AlertThresholds {
        &self.thresholds
    }

    pub fn process_detail(&self, pid: Pid) -> Result<ProcessMetric, QueryError> {
        self.cache
            .current()
            .snapshot
            .processes
            .get(&pid)
            .cloned()
            .ok_or(QueryError::NotFound(pid))
    }

    /// Every process, system ones included, busiest first.
    pub fn processes(&self) -> Vec<ProcessMetric> {
        let view = self.cache.current();
        let mut list: Vec<ProcessMetric> = view.snapshot.processes.values().cloned().collect();
        list.sort_by(|a, b| {
            b.cpu_percent
                .total_cmp(&a.cpu_percent)
                .then_with(|| a.pid.cmp(&b.pid))
        });
        list
    }

    pub fn capabilities(&self) -> Capabilities {
        self.control.capabilities()
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// `force` picks SIGKILL over SIGTERM; `None` uses the configured default.
    pub async fn terminate(&self, pid: Pid, force: Option<bool>) -> Result<ControlResult, ControlError> {
        let mode = self.terminate_mode(force);
        self.control_one("terminate", pid, move |c, pid| c.terminate(pid, mode))
            .await
    }

    pub async fn suspend(&self, pid: Pid) -> Result<ControlResult, ControlError> {
        self.control_one("suspend", pid, |c, pid| c.suspend(pid)).await
    }

    pub async fn resume(&self, pid: Pid) -> Result<ControlResult, ControlError> {
        self.control_one("resume", pid, |c, pid| c.resume(pid)).await
    }

    pub async fn terminate_group(
        &self,
        pids: Vec<Pid>,
        force: Option<bool>,
    ) -> Result<GroupControlResult, ControlError> {
        let mode = self.terminate_mode(force);
        let target = format!("{} pids", pids.len());
        self.run_blocking("close", target, move |control, metrics| {
            let result = terminate_group(control, &pids, mode);
            for outcome in &result.outcomes {
                metrics.record_control(outcome.outcome);
            }
            result
        })
        .await
    }

    fn terminate_mode(&self, force: Option<bool>) -> TerminateMode {
        force.map_or(self.default_terminate, TerminateMode::from_force)
    }

    async fn control_one<F>(
        &self,
        operation: &'static str,
        pid: Pid,
        op: F,
    ) -> Result<ControlResult, ControlError>
    where
        F: FnOnce(&dyn ProcessControl, Pid) -> ControlResult + Send + 'static,
    {
        self.run_blocking(operation, format!("pid {pid}"), move |control, metrics| {
            let result = op(control, pid);
            metrics.record_control(result.outcome);
            result
        })
        .await
    }

    async fn run_blocking<T, F>(
        &self,
        operation: &'static str,
        target: String,
        work: F,
    ) -> Result<T, ControlError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn ProcessControl, &Metrics) -> T + Send + 'static,
    {
        let control = Arc::clone(&self.control);
        let metrics = Arc::clone(&self.metrics);
        let task = tokio::task::spawn_blocking(move || work(control.as_ref(), &*metrics));

        match tokio::time::timeout(self.control_timeout, task).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(join)) => Err(ControlError::Aborted {
                operation,
                reason: join.to_string(),
            }),
            Err(_) => {
                // Dropping the handle detaches the task; the OS call still completes.
                self.metrics.inc_control_timeouts();
                warn!(
                    "[control] {operation} of {target} still running after {}ms",
                    self.control_timeout.as_millis()
                );
                Err(ControlTimeout {
                    operation,
                    target,
                    waited: self.control_timeout,
                }
                .into())
            }
        }
    }
}
