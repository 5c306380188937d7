//! OS sampling
//!
//! A [`Sampler`] produces one [`RawSnapshot`] per call. The production
//! implementation reads memory, disks, networks and the process table through
//! sysinfo; per-core busy time comes from /proc/stat on Linux and is
//! integrated from sysinfo's per-core usage elsewhere. GPU load is attached
//! when a [`GpuSource`] exists for this host.

pub mod gpu;
mod platform;
#[cfg(target_os = "linux")]
mod procstat;

pub use gpu::GpuSource;
pub use platform::is_system_process;

use chrono::Utc;
use log::debug;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::{Duration, Instant};
use sysinfo::{
    Disks, Networks, ProcessRefreshKind, ProcessStatus as OsStatus, ProcessesToUpdate, System,
    UpdateKind, Users,
};

use crate::error::SamplerError;
use crate::types::{
    CoreTimes, DiskTotals, MemoryTotals, NetworkCounters, ProcessStatus, RawProcessRecord,
    RawSnapshot,
};

/// Source of raw OS snapshots. Called only from the refresh pipeline.
pub trait Sampler: Send {
    fn sample(&mut self) -> Result<RawSnapshot, SamplerError>;
}

/// Accounts created after startup are picked up at most this often.
const USERS_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

pub struct SysinfoSampler {
    system: System,
    networks: Networks,
    disks: Disks,
    users: Users,
    users_refreshed: Instant,
    gpu: Option<Box<dyn GpuSource>>,
    #[cfg(not(target_os = "linux"))]
    clock: UsageClock,
}

impl SysinfoSampler {
    pub fn new() -> Self {
        Self {
            system: System::new(),
            networks: Networks::new_with_refreshed_list(),
            disks: Disks::new_with_refreshed_list(),
            users: Users::new_with_refreshed_list(),
            users_refreshed: Instant::now(),
            gpu: gpu::detect(),
            #[cfg(not(target_os = "linux"))]
            clock: UsageClock::default(),
        }
    }

    pub fn with_gpu(mut self, gpu: Option<Box<dyn GpuSource>>) -> Self {
        self.gpu = gpu;
        self
    }

    fn refresh_users_if_stale(&mut self) {
        let unknown = self
            .system
            .processes()
            .values()
            .filter_map(|p| p.user_id())
            .any(|uid| self.users.get_user_by_id(uid).is_none());
        if unknown && self.users_refreshed.elapsed() >= USERS_REFRESH_INTERVAL {
            self.users.refresh();
            self.users_refreshed = Instant::now();
        }
    }

    #[cfg(target_os = "linux")]
    fn core_times(&mut self) -> Result<Vec<CoreTimes>, SamplerError> {
        procstat::read_core_times()
    }

    #[cfg(not(target_os = "linux"))]
    fn core_times(&mut self) -> Result<Vec<CoreTimes>, SamplerError> {
        self.system.refresh_cpu_usage();
        let usage: Vec<f32> = self.system.cpus().iter().map(|c| c.cpu_usage()).collect();
        if usage.is_empty() {
            return Err(SamplerError::NoCpus);
        }
        Ok(self.clock.advance(&usage, Instant::now()))
    }

    fn memory(&self) -> MemoryTotals {
        MemoryTotals {
            total: self.system.total_memory(),
            used: self.system.used_memory(),
            available: self.system.available_memory(),
            swap_total: self.system.total_swap(),
            swap_used: self.system.used_swap(),
        }
    }

    fn disk_usage(&self) -> (u64, u64) {
        // The same device can be mounted more than once.
        let mut seen = HashSet::new();
        self.disks
            .iter()
            .filter(|disk| seen.insert(disk.name().to_os_string()))
            .fold((0u64, 0u64), |(total, used), disk| {
                let space = disk.total_space();
                let free = disk.available_space().min(space);
                (total.saturating_add(space), used.saturating_add(space - free))
            })
    }

    fn network(&self) -> NetworkCounters {
        self.networks
            .iter()
            .fold(NetworkCounters::default(), |acc, (_name, data)| NetworkCounters {
                sent: acc.sent.saturating_add(data.total_transmitted()),
                received: acc.received.saturating_add(data.total_received()),
            })
    }
}

impl Default for SysinfoSampler {
    fn default() -> Self {
        Self::new()
    }
}

fn process_refresh_kind() -> ProcessRefreshKind {
    ProcessRefreshKind::nothing()
        .with_cpu()
        .with_memory()
        .with_disk_usage()
        .with_tasks()
        .with_exe(UpdateKind::OnlyIfNotSet)
        .with_cmd(UpdateKind::OnlyIfNotSet)
        .with_cwd(UpdateKind::Always)
        .with_user(UpdateKind::OnlyIfNotSet)
}

#[cfg(target_os = "linux")]
fn start_ticks(pid: u32) -> Option<u64> {
    procstat::read_start_ticks(pid)
}

#[cfg(not(target_os = "linux"))]
fn start_ticks(_pid: u32) -> Option<u64> {
    None
}

impl Sampler for SysinfoSampler {
    fn sample(&mut self) -> Result<RawSnapshot, SamplerError> {
        self.system.refresh_memory();
        // Processes that exit during the walk are simply absent from the table.
        self.system
            .refresh_processes_specifics(ProcessesToUpdate::All, true, process_refresh_kind());
        self.networks.refresh(true);
        self.disks.refresh(true);
        self.refresh_users_if_stale();
        let gpu = self.gpu.as_mut().and_then(|source| source.read());

        // Core counters and the timestamp they are divided by come from the
        // same instant.
        let cores = self.core_times()?;
        let taken_at = Instant::now();

        let mut processes = HashMap::with_capacity(self.system.processes().len());
        let mut read_bytes = 0u64;
        let mut written_bytes = 0u64;
        for (pid, process) in self.system.processes() {
            // Threads show up as processes on Linux; only keep thread-group leaders.
            if process.thread_kind().is_some_and(|k| k == sysinfo::ThreadKind::Userland) {
                continue;
            }

            let pid = pid.as_u32();
            let display_name = process.name().to_string_lossy().into_owned();
            let parent = process.parent().map(|p| p.as_u32());
            let disk = process.disk_usage();
            read_bytes = read_bytes.saturating_add(disk.total_read_bytes);
            written_bytes = written_bytes.saturating_add(disk.total_written_bytes);

            let record = RawProcessRecord {
                start_time: process.start_time(),
                start_ticks: start_ticks(pid),
                cumulative_cpu_time: Duration::from_millis(process.accumulated_cpu_time()),
                resident_memory: process.memory(),
                virtual_memory: process.virtual_memory(),
                executable_path: process
                    .exe()
                    .filter(|p| !p.as_os_str().is_empty())
                    .map(Path::to_path_buf),
                is_system: is_system_process(pid, parent, &display_name),
                display_name,
                thread_count: process.tasks().map(|t| t.len().max(1)),
                status: map_status(process.status()),
                parent,
                command_line: process
                    .cmd()
                    .iter()
                    .map(|arg| arg.to_string_lossy().into_owned())
                    .collect(),
                cwd: process.cwd().map(Path::to_path_buf),
                user: process
                    .user_id()
                    .and_then(|uid| self.users.get_user_by_id(uid))
                    .map(|user| user.name().to_string()),
            };
            processes.insert(pid, record);
        }

        let (disk_total, disk_used) = self.disk_usage();
        debug!(
            "[sampler] {} cores, {} processes",
            cores.len(),
            processes.len()
        );

        Ok(RawSnapshot {
            taken_at,
            wall_clock: Utc::now(),
            cores,
            memory: self.memory(),
            disk: DiskTotals {
                total: disk_total,
                used: disk_used,
                read_bytes,
                written_bytes,
            },
            network: self.network(),
            gpu,
            uptime_secs: System::uptime(),
            processes,
        })
    }
}

fn map_status(status: OsStatus) -> ProcessStatus {
    match status {
        OsStatus::Run => ProcessStatus::Running,
        OsStatus::Sleep | OsStatus::UninterruptibleDiskSleep | OsStatus::LockBlocked => {
            ProcessStatus::Sleeping
        }
        OsStatus::Idle | OsStatus::Parked => ProcessStatus::Idle,
        OsStatus::Stop | OsStatus::Tracing => ProcessStatus::Stopped,
        OsStatus::Zombie => ProcessStatus::Zombie,
        OsStatus::Dead => ProcessStatus::Dead,
        _ => ProcessStatus::Unknown,
    }
}

/// Integrates instantaneous per-core usage into cumulative busy time on
/// platforms that do not expose tick counters.
#[cfg(not(target_os = "linux"))]
#[derive(Default)]
struct UsageClock {
    busy: Vec<Duration>,
    last: Option<Instant>,
}

#[cfg(not(target_os = "linux"))]
impl UsageClock {
    fn advance(&mut self, usage: &[f32], now: Instant) -> Vec<CoreTimes> {
        self.busy.resize(usage.len(), Duration::ZERO);
        if let Some(last) = self.last {
            let elapsed = now.saturating_duration_since(last);
            for (busy, pct) in self.busy.iter_mut().zip(usage) {
                let share = f64::from(pct.clamp(0.0, 100.0)) / 100.0;
                *busy += elapsed.mul_f64(share);
            }
        }
        self.last = Some(now);
        self.busy
            .iter()
            .enumerate()
            .map(|(index, &busy)| CoreTimes { index, busy })
            .collect()
    }
}
