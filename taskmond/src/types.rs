use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

pub type Pid = u32;

/// Scheduler state reported for a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    Running,
    Sleeping,
    Idle,
    Stopped,
    Zombie,
    Dead,
    Unknown,
}

impl ProcessStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Sleeping => "sleeping",
            Self::Idle => "idle",
            Self::Stopped => "stopped",
            Self::Zombie => "zombie",
            Self::Dead => "dead",
            Self::Unknown => "unknown",
        }
    }
}

/// Cumulative busy time of one logical core since boot.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CoreTimes {
    /// Kernel CPU number (`cpuN`). Not contiguous once a core goes offline.
    pub index: usize,
    pub busy: Duration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MemoryTotals {
    pub total: u64,
    pub used: u64,
    pub available: u64,
    pub swap_total: u64,
    pub swap_used: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DiskTotals {
    pub total: u64,
    pub used: u64,
    /// Cumulative bytes read, summed over the process table.
    pub read_bytes: u64,
    /// Cumulative bytes written, summed over the process table.
    pub written_bytes: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NetworkCounters {
    pub sent: u64,
    pub received: u64,
}

/// One entry of the OS process table as read by the sampler.
#[derive(Debug, Clone, PartialEq)]
pub struct RawProcessRecord {
    /// Seconds since epoch.
    pub start_time: u64,
    /// Start time in clock ticks since boot, where the platform exposes it.
    /// Distinguishes lifetimes that began within the same second.
    pub start_ticks: Option<u64>,
    pub cumulative_cpu_time: Duration,
    pub resident_memory: u64,
    pub virtual_memory: u64,
    pub executable_path: Option<PathBuf>,
    pub display_name: String,
    pub thread_count: Option<usize>,
    pub status: ProcessStatus,
    pub parent: Option<Pid>,
    /// Kernel or platform process, not launched by a user.
    pub is_system: bool,
    pub command_line: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub user: Option<String>,
}

impl RawProcessRecord {
    /// Whether `self` and `other`, observed under the same pid, belong to the
    /// same process lifetime.
    pub fn same_lifetime(&self, other: &RawProcessRecord) -> bool {
        if self.start_time != other.start_time {
            return false;
        }
        match (self.start_ticks, other.start_ticks) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }
}

/// Utilization of the primary GPU, when a source for it exists.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GpuStats {
    pub name: String,
    pub load_percent: f64,
    pub memory_used: u64,
    pub memory_total: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_celsius: Option<f64>,
}

impl GpuStats {
    pub fn memory_percent(&self) -> f64 {
        if self.memory_total == 0 {
            return 0.0;
        }
        (self.memory_used as f64 / self.memory_total as f64 * 100.0).clamp(0.0, 100.0)
    }
}

/// Point-in-time capture of cumulative OS counters.
#[derive(Debug, Clone)]
pub struct RawSnapshot {
    pub taken_at: Instant,
    pub wall_clock: DateTime<Utc>,
    pub cores: Vec<CoreTimes>,
    pub memory: MemoryTotals,
    pub disk: DiskTotals,
    pub network: NetworkCounters,
    pub gpu: Option<GpuStats>,
    pub uptime_secs: u64,
    pub processes: HashMap<Pid, RawProcessRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessMetric {
    pub pid: Pid,
    pub start_time: u64,
    /// Per-core normalized: one saturated core reads 100.
    pub cpu_percent: f64,
    pub memory_bytes: u64,
    pub virtual_memory_bytes: u64,
    pub memory_percent: f64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executable_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_count: Option<usize>,
    pub status: ProcessStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<Pid>,
    pub is_system: bool,
    pub protected: bool,
    pub command_line: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

/// Rates and percentages derived from two raw snapshots.
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedSnapshot {
    #[serde(skip)]
    pub taken_at: Instant,
    pub timestamp: DateTime<Utc>,
    #[serde(with = "duration_ms", rename = "interval_ms")]
    pub interval: Duration,
    pub core_count: usize,
    pub system_cpu_percent: f64,
    pub per_core_cpu_percent: Vec<f64>,
    pub memory_percent: f64,
    pub disk_percent: f64,
    pub network_sent_bps: f64,
    pub network_recv_bps: f64,
    pub disk_read_bps: f64,
    pub disk_write_bps: f64,
    pub memory: MemoryTotals,
    pub disk: DiskTotals,
    pub gpu: Option<GpuStats>,
    pub uptime_secs: u64,
    pub processes: BTreeMap<Pid, ProcessMetric>,
}

impl NormalizedSnapshot {
    /// Placeholder served before the first refresh cycle completes.
    pub fn empty() -> Self {
        Self {
            taken_at: Instant::now(),
            timestamp: Utc::now(),
            interval: Duration::ZERO,
            core_count: 0,
            system_cpu_percent: 0.0,
            per_core_cpu_percent: Vec::new(),
            memory_percent: 0.0,
            disk_percent: 0.0,
            network_sent_bps: 0.0,
            network_recv_bps: 0.0,
            disk_read_bps: 0.0,
            disk_write_bps: 0.0,
            memory: MemoryTotals::default(),
            disk: DiskTotals::default(),
            gpu: None,
            uptime_secs: 0,
            processes: BTreeMap::new(),
        }
    }
}

/// Grouping identity of an application. The variant records whether the
/// executable path could be resolved.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AppKey {
    ByExecutablePath(String),
    ByRawName(String),
}

impl AppKey {
    pub fn name(&self) -> &str {
        match self {
            Self::ByExecutablePath(name) | Self::ByRawName(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppGroup {
    pub key: AppKey,
    pub name: String,
    pub pids: BTreeSet<Pid>,
    pub cpu_percent: f64,
    pub memory_bytes: u64,
    pub memory_percent: f64,
    pub process_count: usize,
    pub status: ProcessStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executable_path: Option<PathBuf>,
    /// No member is protected, so the whole group may be closed.
    pub is_closeable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Cpu,
    Memory,
    Disk,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Memory => "memory",
            Self::Disk => "disk",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub resource: Resource,
    pub severity: Severity,
    pub current_value: f64,
    pub threshold: f64,
}

/// How terminate stops a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminateMode {
    /// SIGTERM: the process may clean up or ignore it.
    Graceful,
    /// SIGKILL.
    Forced,
}

impl TerminateMode {
    pub fn from_force(force: bool) -> Self {
        if force { Self::Forced } else { Self::Graceful }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlOutcome {
    Success,
    NotFound,
    PermissionDenied,
    PlatformUnsupported,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlResult {
    pub pid: Pid,
    pub outcome: ControlOutcome,
    pub message: String,
}

impl ControlResult {
    pub fn new(pid: Pid, outcome: ControlOutcome, message: impl Into<String>) -> Self {
        Self {
            pid,
            outcome,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == ControlOutcome::Success
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupControlResult {
    pub outcomes: Vec<ControlResult>,
    pub succeeded: usize,
    /// At least one pid succeeded and at least one did not.
    pub partial_success: bool,
}

impl GroupControlResult {
    pub fn from_outcomes(outcomes: Vec<ControlResult>) -> Self {
        let succeeded = outcomes.iter().filter(|r| r.is_success()).count();
        let partial_success = succeeded > 0 && succeeded < outcomes.len();
        Self {
            outcomes,
            succeeded,
            partial_success,
        }
    }
}

mod duration_ms {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }
}
