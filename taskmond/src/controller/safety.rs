use crate::types::Pid;

/// Processes that must never be stopped from the dashboard, matched
/// case-insensitively against the process name.
const PROTECTED_PROCESSES: &[&str] = &[
    "system",
    "system idle process",
    "registry",
    "smss.exe",
    "csrss.exe",
    "wininit.exe",
    "services.exe",
    "lsass.exe",
    "winlogon.exe",
    "dwm.exe",
    "svchost.exe",
    "explorer.exe",
    "systemd",
    "init",
    "launchd",
    "kernel_task",
];

/// Pids at or below this are reserved for boot-time system processes.
const MAX_RESERVED_PID: Pid = 10;

#[derive(Debug, Clone)]
pub struct SafetyGuard {
    extra_names: Vec<String>,
    own_pid: Pid,
}

impl SafetyGuard {
    pub fn new(extra_names: &[String]) -> Self {
        Self {
            extra_names: extra_names
                .iter()
                .map(|n| n.trim().to_lowercase())
                .filter(|n| !n.is_empty())
                .collect(),
            own_pid: std::process::id(),
        }
    }

    pub fn is_safe_to_stop(&self, pid: Pid, name: &str) -> Result<(), String> {
        if pid <= MAX_RESERVED_PID {
            return Err(format!("pid {pid} is reserved for the operating system"));
        }
        if pid == self.own_pid {
            return Err("refusing to stop the monitoring daemon itself".to_string());
        }

        let lower = name.to_lowercase();
        let listed = PROTECTED_PROCESSES.contains(&lower.as_str())
            || self.extra_names.iter().any(|n| *n == lower);
        if listed {
            return Err(format!(
                "Cannot stop '{name}'. This is a protected system process."
            ));
        }
        Ok(())
    }

    pub fn is_protected(&self, pid: Pid, name: &str) -> bool {
        self.is_safe_to_stop(pid, name).is_err()
    }
}

impl Default for SafetyGuard {
    fn default() -> Self {
        Self::new(&[])
    }
}
