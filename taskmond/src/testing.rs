//! Builders and doubles shared by unit tests.

use chrono::Utc;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::capability::Capabilities;
use crate::controller::ProcessControl;
use crate::error::SamplerError;
use crate::sampler::Sampler;
use crate::types::{
    ControlOutcome, ControlResult, CoreTimes, DiskTotals, MemoryTotals, NetworkCounters,
    NormalizedSnapshot, Pid, ProcessMetric, ProcessStatus, RawProcessRecord, RawSnapshot,
    TerminateMode,
};

pub fn record(name: &str, exe: Option<&str>, start_time: u64, cpu_ms: u64, rss: u64) -> RawProcessRecord {
    RawProcessRecord {
        start_time,
        start_ticks: None,
        cumulative_cpu_time: Duration::from_millis(cpu_ms),
        resident_memory: rss,
        virtual_memory: rss * 2,
        executable_path: exe.map(PathBuf::from),
        display_name: name.to_string(),
        thread_count: Some(1),
        status: ProcessStatus::Running,
        parent: Some(1),
        is_system: false,
        command_line: vec![name.to_string()],
        cwd: None,
        user: None,
    }
}

pub struct RawBuilder {
    snapshot: RawSnapshot,
}

impl RawBuilder {
    pub fn new(taken_at: Instant, core_busy_ms: &[u64]) -> Self {
        Self {
            snapshot: RawSnapshot {
                taken_at,
                wall_clock: Utc::now(),
                cores: core_busy_ms
                    .iter()
                    .enumerate()
                    .map(|(index, ms)| CoreTimes {
                        index,
                        busy: Duration::from_millis(*ms),
                    })
                    .collect(),
                memory: MemoryTotals {
                    total: 8 << 30,
                    used: 2 << 30,
                    available: 6 << 30,
                    ..MemoryTotals::default()
                },
                disk: DiskTotals {
                    total: 100 << 30,
                    used: 50 << 30,
                    ..DiskTotals::default()
                },
                network: NetworkCounters::default(),
                gpu: None,
                uptime_secs: 1000,
                processes: HashMap::new(),
            },
        }
    }

    pub fn memory(mut self, total: u64, used: u64) -> Self {
        self.snapshot.memory.total = total;
        self.snapshot.memory.used = used;
        self.snapshot.memory.available = total.saturating_sub(used);
        self
    }

    pub fn disk(mut self, total: u64, used: u64) -> Self {
        self.snapshot.disk.total = total;
        self.snapshot.disk.used = used;
        self
    }

    pub fn disk_io(mut self, read: u64, written: u64) -> Self {
        self.snapshot.disk.read_bytes = read;
        self.snapshot.disk.written_bytes = written;
        self
    }

    pub fn network(mut self, sent: u64, received: u64) -> Self {
        self.snapshot.network = NetworkCounters { sent, received };
        self
    }

    pub fn process(mut self, pid: Pid, record: RawProcessRecord) -> Self {
        self.snapshot.processes.insert(pid, record);
        self
    }

    pub fn build(self) -> RawSnapshot {
        self.snapshot
    }
}

pub fn metric(pid: Pid, name: &str, exe: Option<&str>, cpu_percent: f64, memory_bytes: u64) -> ProcessMetric {
    ProcessMetric {
        pid,
        start_time: 1_700_000_000,
        cpu_percent,
        memory_bytes,
        virtual_memory_bytes: memory_bytes * 2,
        memory_percent: memory_bytes as f64 / (8u64 << 30) as f64 * 100.0,
        name: name.to_string(),
        executable_path: exe.map(PathBuf::from),
        thread_count: Some(1),
        status: ProcessStatus::Running,
        parent: Some(1),
        is_system: false,
        protected: false,
        command_line: vec![name.to_string()],
        cwd: None,
        user: Some("tester".to_string()),
    }
}

pub fn snapshot_with(processes: Vec<ProcessMetric>) -> NormalizedSnapshot {
    let mut snapshot = NormalizedSnapshot::empty();
    snapshot.core_count = 4;
    snapshot.per_core_cpu_percent = vec![0.0; 4];
    snapshot.processes = processes.into_iter().map(|p| (p.pid, p)).collect::<BTreeMap<_, _>>();
    snapshot
}

/// Replays a fixed sequence of sampler results.
pub struct ScriptedSampler {
    script: VecDeque<Result<RawSnapshot, SamplerError>>,
}

impl ScriptedSampler {
    pub fn new(script: Vec<Result<RawSnapshot, SamplerError>>) -> Self {
        Self {
            script: script.into(),
        }
    }
}

impl Sampler for ScriptedSampler {
    fn sample(&mut self) -> Result<RawSnapshot, SamplerError> {
        self.script.pop_front().unwrap_or(Err(SamplerError::NoCpus))
    }
}

/// Process control double returning preset outcomes per pid (default
/// `Success`) and recording every call. Forced terminates are recorded as
/// "kill".
#[derive(Default)]
pub struct FakeControl {
    pub outcomes: HashMap<Pid, ControlOutcome>,
    pub delay: Option<Duration>,
    pub calls: Mutex<Vec<(&'static str, Pid)>>,
}

impl FakeControl {
    pub fn with_outcome(mut self, pid: Pid, outcome: ControlOutcome) -> Self {
        self.outcomes.insert(pid, outcome);
        self
    }

    pub fn calls(&self) -> Vec<(&'static str, Pid)> {
        self.calls.lock().unwrap().clone()
    }

    fn act(&self, op: &'static str, pid: Pid) -> ControlResult {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.calls.lock().unwrap().push((op, pid));
        let outcome = self
            .outcomes
            .get(&pid)
            .copied()
            .unwrap_or(ControlOutcome::Success);
        ControlResult::new(pid, outcome, format!("{op} {pid}"))
    }
}

impl ProcessControl for FakeControl {
    fn terminate(&self, pid: Pid, mode: TerminateMode) -> ControlResult {
        match mode {
            TerminateMode::Graceful => self.act("terminate", pid),
            TerminateMode::Forced => self.act("kill", pid),
        }
    }

    fn suspend(&self, pid: Pid) -> ControlResult {
        self.act("suspend", pid)
    }

    fn resume(&self, pid: Pid) -> ControlResult {
        self.act("resume", pid)
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            suspend_resume: true,
            elevated_kill: false,
            gpu: false,
        }
    }
}
