use std::time::Duration;
use thiserror::Error;

use crate::types::{Pid, Resource};

/// The OS telemetry interface could not be read at all. Per-process read
/// failures never surface here; the sampler skips those entries.
#[derive(Debug, Error)]
pub enum SamplerError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed {path}: {reason}")]
    Malformed { path: String, reason: String },
    #[error("no CPUs reported by the operating system")]
    NoCpus,
}

/// The second snapshot was not taken strictly after the first.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("degenerate sampling interval: current snapshot is {behind:?} behind the previous one")]
pub struct DegenerateIntervalError {
    pub behind: Duration,
}

/// An alert threshold pair that cannot be evaluated.
#[derive(Debug, Error, PartialEq)]
pub enum ThresholdError {
    #[error("{resource}: thresholds must be within 0..=100 (warning={warning}, critical={critical})")]
    OutOfRange {
        resource: Resource,
        warning: f64,
        critical: f64,
    },
    #[error("{resource}: warning ({warning}) must not exceed critical ({critical})")]
    Inverted {
        resource: Resource,
        warning: f64,
        critical: f64,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("process {0} not found")]
    NotFound(Pid),
}

/// The caller stopped waiting; the control operation keeps running and its
/// outcome is still logged.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{operation} of {target} did not finish within {waited:?}")]
pub struct ControlTimeout {
    pub operation: &'static str,
    pub target: String,
    pub waited: Duration,
}

#[derive(Debug, Error)]
pub enum ControlError {
    #[error(transparent)]
    Timeout(#[from] ControlTimeout),
    /// The worker running the OS call panicked.
    #[error("{operation} task failed: {reason}")]
    Aborted {
        operation: &'static str,
        reason: String,
    },
}
