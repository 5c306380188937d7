//! Runtime capability probe
//!
//! Process control primitives and GPU telemetry differ by platform and
//! privilege. Callers ask [`probe`] up front instead of assuming an operation
//! will work.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    /// SIGSTOP/SIGCONT (or an equivalent) can be delivered.
    pub suspend_resume: bool,
    /// Signals may be sent to processes owned by other users.
    pub elevated_kill: bool,
    /// A GPU telemetry source was found; otherwise `gpu` is always null.
    pub gpu: bool,
}

pub fn probe() -> Capabilities {
    Capabilities {
        suspend_resume: cfg!(unix),
        elevated_kill: has_elevated_kill(),
        gpu: crate::sampler::gpu::is_available(),
    }
}

#[cfg(target_os = "linux")]
fn has_elevated_kill() -> bool {
    use caps::{CapSet, Capability};

    if is_root() {
        return true;
    }
    match caps::has_cap(None, CapSet::Effective, Capability::CAP_KILL) {
        Ok(has) => has,
        Err(err) => {
            log::debug!("[capability] CAP_KILL probe failed: {err}");
            false
        }
    }
}

#[cfg(all(unix, not(target_os = "linux")))]
fn has_elevated_kill() -> bool {
    is_root()
}

#[cfg(not(unix))]
fn has_elevated_kill() -> bool {
    false
}

#[cfg(unix)]
fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}
