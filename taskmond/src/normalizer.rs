//! Rate normalization
//!
//! Turns two cumulative [`RawSnapshot`]s into point-in-time percentages and
//! throughputs. Per-process CPU follows the task-manager convention: the
//! CPU-time delta is divided by wall time and then by the logical core count,
//! so one saturated core reads 100 and a process can only exceed that by
//! genuinely running on several cores.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use crate::error::DegenerateIntervalError;
use crate::types::{NormalizedSnapshot, ProcessMetric, RawProcessRecord, RawSnapshot};

pub fn normalize(
    previous: &RawSnapshot,
    current: &RawSnapshot,
) -> Result<NormalizedSnapshot, DegenerateIntervalError> {
    let elapsed = match current.taken_at.checked_duration_since(previous.taken_at) {
        Some(elapsed) if !elapsed.is_zero() => elapsed,
        Some(_) => {
            return Err(DegenerateIntervalError {
                behind: Duration::ZERO,
            });
        }
        None => {
            return Err(DegenerateIntervalError {
                behind: previous.taken_at.duration_since(current.taken_at),
            });
        }
    };
    let secs = elapsed.as_secs_f64();
    let core_count = current.cores.len().max(1);

    // Cores are matched by kernel index; a core that just came online has no
    // baseline and reads 0.
    let previous_busy: HashMap<usize, Duration> = previous
        .cores
        .iter()
        .map(|core| (core.index, core.busy))
        .collect();
    let core_deltas: Vec<Duration> = current
        .cores
        .iter()
        .map(|core| {
            previous_busy
                .get(&core.index)
                .map(|prev| core.busy.saturating_sub(*prev))
                .unwrap_or(Duration::ZERO)
        })
        .collect();
    let per_core_cpu_percent = core_deltas
        .iter()
        .map(|delta| clamp_percent(delta.as_secs_f64() / secs * 100.0, 100.0))
        .collect();
    let busy_secs: f64 = core_deltas.iter().map(Duration::as_secs_f64).sum();
    let system_cpu_percent = clamp_percent(busy_secs / (secs * core_count as f64) * 100.0, 100.0);

    let total_memory = current.memory.total;
    let processes = current
        .processes
        .iter()
        .map(|(&pid, record)| {
            let cpu_percent =
                process_cpu_percent(previous.processes.get(&pid), record, elapsed, core_count);
            let metric = ProcessMetric {
                pid,
                start_time: record.start_time,
                cpu_percent,
                memory_bytes: record.resident_memory,
                virtual_memory_bytes: record.virtual_memory,
                memory_percent: ratio_percent(record.resident_memory, total_memory),
                name: record.display_name.clone(),
                executable_path: record.executable_path.clone(),
                thread_count: record.thread_count,
                status: record.status,
                parent: record.parent,
                is_system: record.is_system,
                protected: false,
                command_line: record.command_line.clone(),
                cwd: record.cwd.clone(),
                user: record.user.clone(),
            };
            (pid, metric)
        })
        .collect::<BTreeMap<_, _>>();

    Ok(NormalizedSnapshot {
        taken_at: current.taken_at,
        timestamp: current.wall_clock,
        interval: elapsed,
        core_count,
        system_cpu_percent,
        per_core_cpu_percent,
        memory_percent: ratio_percent(current.memory.used, total_memory),
        disk_percent: ratio_percent(current.disk.used, current.disk.total),
        network_sent_bps: rate(previous.network.sent, current.network.sent, secs),
        network_recv_bps: rate(previous.network.received, current.network.received, secs),
        disk_read_bps: rate(previous.disk.read_bytes, current.disk.read_bytes, secs),
        disk_write_bps: rate(previous.disk.written_bytes, current.disk.written_bytes, secs),
        memory: current.memory,
        disk: current.disk,
        gpu: current.gpu.clone(),
        uptime_secs: current.uptime_secs,
        processes,
    })
}

/// CPU% of one process over `elapsed`, normalized per core. A process with no
/// baseline, or whose pid now belongs to a different lifetime, reads 0.
pub fn process_cpu_percent(
    previous: Option<&RawProcessRecord>,
    current: &RawProcessRecord,
    elapsed: Duration,
    core_count: usize,
) -> f64 {
    let Some(previous) = previous.filter(|p| p.same_lifetime(current)) else {
        return 0.0;
    };
    if elapsed.is_zero() {
        return 0.0;
    }

    let cores = core_count.max(1) as f64;
    let delta = current
        .cumulative_cpu_time
        .saturating_sub(previous.cumulative_cpu_time);
    let pct = delta.as_secs_f64() / elapsed.as_secs_f64() / cores * 100.0;
    clamp_percent(pct, 100.0 * cores)
}

/// Counter delta per second; a counter that went backwards (interface reset,
/// exited processes) yields 0.
fn rate(previous: u64, current: u64, secs: f64) -> f64 {
    current.saturating_sub(previous) as f64 / secs
}

fn ratio_percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    clamp_percent(part as f64 / total as f64 * 100.0, 100.0)
}

fn clamp_percent(value: f64, max: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, max)
    }
}
