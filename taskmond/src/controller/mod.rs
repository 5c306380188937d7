//! Process lifecycle control
//!
//! Terminate, suspend and resume act directly on the OS by pid and never
//! touch the telemetry cache. Every expected failure (the process already
//! exited, insufficient privilege, a primitive missing on this platform) is a
//! [`ControlOutcome`], not an error.

mod safety;

pub use safety::SafetyGuard;

use log::{info, warn};
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};

use crate::capability::{self, Capabilities};
use crate::types::{ControlOutcome, ControlResult, GroupControlResult, Pid, TerminateMode};

/// Platform primitives for acting on a process by pid.
pub trait ProcessControl: Send + Sync {
    fn terminate(&self, pid: Pid, mode: TerminateMode) -> ControlResult;
    fn suspend(&self, pid: Pid) -> ControlResult;
    fn resume(&self, pid: Pid) -> ControlResult;
    fn capabilities(&self) -> Capabilities;
}

/// Terminate every pid independently, continuing past failures. Duplicate
/// pids are attempted once.
pub fn terminate_group(
    control: &dyn ProcessControl,
    pids: &[Pid],
    mode: TerminateMode,
) -> GroupControlResult {
    let mut seen = HashSet::new();
    let outcomes: Vec<ControlResult> = pids
        .iter()
        .filter(|pid| seen.insert(**pid))
        .map(|&pid| control.terminate(pid, mode))
        .collect();

    let result = GroupControlResult::from_outcomes(outcomes);
    info!(
        "[control] group terminate: {}/{} succeeded",
        result.succeeded,
        result.outcomes.len()
    );
    result
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Terminate(TerminateMode),
    Suspend,
    Resume,
}

impl Operation {
    fn verb(self) -> &'static str {
        match self {
            Self::Terminate(TerminateMode::Graceful) => "terminate",
            Self::Terminate(TerminateMode::Forced) => "kill",
            Self::Suspend => "suspend",
            Self::Resume => "resume",
        }
    }

    fn past(self) -> &'static str {
        match self {
            Self::Terminate(TerminateMode::Graceful) => "terminated",
            Self::Terminate(TerminateMode::Forced) => "killed",
            Self::Suspend => "suspended",
            Self::Resume => "resumed",
        }
    }

    fn needs_suspend_support(self) -> bool {
        matches!(self, Self::Suspend | Self::Resume)
    }
}

pub struct OsProcessControl {
    system: Mutex<System>,
    guard: SafetyGuard,
    capabilities: Capabilities,
}

impl OsProcessControl {
    pub fn new(guard: SafetyGuard) -> Self {
        Self {
            system: Mutex::new(System::new()),
            guard,
            capabilities: capability::probe(),
        }
    }

    /// Current name of a live process.
    fn lookup(&self, pid: Pid) -> Option<String> {
        let target = sysinfo::Pid::from_u32(pid);
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[target]),
            true,
            ProcessRefreshKind::nothing(),
        );
        system
            .process(target)
            .map(|p| p.name().to_string_lossy().into_owned())
    }

    fn act(&self, pid: Pid, op: Operation) -> ControlResult {
        if op.needs_suspend_support() && !self.capabilities.suspend_resume {
            return ControlResult::new(
                pid,
                ControlOutcome::PlatformUnsupported,
                format!("{} is not supported on this platform", op.verb()),
            );
        }

        let Some(name) = self.lookup(pid) else {
            return ControlResult::new(
                pid,
                ControlOutcome::NotFound,
                format!("Process {pid} not found"),
            );
        };

        if op != Operation::Resume
            && let Err(reason) = self.guard.is_safe_to_stop(pid, &name)
        {
            warn!(
                target: "taskmon_audit",
                "REFUSED {} pid={} name={} reason={}",
                op.verb(), pid, name, reason
            );
            return ControlResult::new(pid, ControlOutcome::PermissionDenied, reason);
        }

        let outcome = self.deliver(pid, op);
        let message = match outcome {
            ControlOutcome::Success => format!("Process {name} (PID: {pid}) {}", op.past()),
            ControlOutcome::NotFound => format!("Process {pid} exited before it could be {}", op.past()),
            ControlOutcome::PermissionDenied => format!(
                "Access denied. Cannot {} process {pid}. Try running as administrator.",
                op.verb()
            ),
            ControlOutcome::PlatformUnsupported => {
                format!("{} is not supported on this platform", op.verb())
            }
        };

        if outcome == ControlOutcome::Success {
            warn!(
                target: "taskmon_audit",
                "{} pid={} name={}",
                op.verb().to_uppercase(), pid, name
            );
        } else {
            info!("[control] {} pid={} -> {:?}", op.verb(), pid, outcome);
        }
        ControlResult::new(pid, outcome, message)
    }

    #[cfg(unix)]
    fn deliver(&self, pid: Pid, op: Operation) -> ControlOutcome {
        let signal = match op {
            Operation::Terminate(TerminateMode::Graceful) => libc::SIGTERM,
            Operation::Terminate(TerminateMode::Forced) => libc::SIGKILL,
            Operation::Suspend => libc::SIGSTOP,
            Operation::Resume => libc::SIGCONT,
        };
        match signal_process(pid, signal) {
            Ok(()) => ControlOutcome::Success,
            Err(err) => errno_outcome(&err),
        }
    }

    #[cfg(not(unix))]
    fn deliver(&self, pid: Pid, op: Operation) -> ControlOutcome {
        use sysinfo::Signal;

        let signal = match op {
            Operation::Terminate(TerminateMode::Graceful) => Signal::Term,
            Operation::Terminate(TerminateMode::Forced) => Signal::Kill,
            Operation::Suspend => Signal::Stop,
            Operation::Resume => Signal::Continue,
        };
        let system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        match system.process(sysinfo::Pid::from_u32(pid)) {
            None => ControlOutcome::NotFound,
            Some(process) => match process.kill_with(signal) {
                None => ControlOutcome::PlatformUnsupported,
                Some(true) => ControlOutcome::Success,
                Some(false) => ControlOutcome::PermissionDenied,
            },
        }
    }
}

impl ProcessControl for OsProcessControl {
    fn terminate(&self, pid: Pid, mode: TerminateMode) -> ControlResult {
        self.act(pid, Operation::Terminate(mode))
    }

    fn suspend(&self, pid: Pid) -> ControlResult {
        self.act(pid, Operation::Suspend)
    }

    fn resume(&self, pid: Pid) -> ControlResult {
        self.act(pid, Operation::Resume)
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }
}

#[cfg(unix)]
fn signal_process(pid: Pid, signal: libc::c_int) -> std::io::Result<()> {
    // pid 0 and negative pids address process groups; only single targets are allowed.
    let raw = match libc::pid_t::try_from(pid) {
        Ok(raw) if raw > 0 => raw,
        _ => return Err(std::io::Error::from_raw_os_error(libc::ESRCH)),
    };
    // SAFETY: kill has no memory-safety preconditions; raw is a positive pid.
    if unsafe { libc::kill(raw, signal) } == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(unix)]
fn errno_outcome(err: &std::io::Error) -> ControlOutcome {
    match err.raw_os_error() {
        Some(libc::ESRCH) => ControlOutcome::NotFound,
        Some(libc::EINVAL) => ControlOutcome::PlatformUnsupported,
        _ => ControlOutcome::PermissionDenied,
    }
}
