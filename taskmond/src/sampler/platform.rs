use crate::types::Pid;

/// Whether a process belongs to the OS rather than to a user session.
/// System processes stay in the raw listing but never form app groups.
pub fn is_system_process(pid: Pid, parent: Option<Pid>, name: &str) -> bool {
    if cfg!(target_os = "linux") {
        // kthreadd (pid 2) parents every kernel thread.
        pid <= 2 || parent == Some(2)
    } else if cfg!(target_os = "windows") {
        const SYSTEM_NAMES: &[&str] = &[
            "system",
            "registry",
            "smss.exe",
            "csrss.exe",
            "wininit.exe",
            "services.exe",
            "lsass.exe",
            "winlogon.exe",
        ];
        pid == 0 || pid == 4 || SYSTEM_NAMES.contains(&name.to_lowercase().as_str())
    } else {
        pid <= 1
    }
}
