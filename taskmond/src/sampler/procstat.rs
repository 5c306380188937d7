//! Per-core busy time from /proc/stat, process start ticks from
//! /proc/<pid>/stat
//!
//! Each `cpuN` line carries cumulative USER_HZ ticks since boot:
//!   cpu0 4705 356 584 3699 23 23 0 0 0 0
//!        user nice system idle iowait irq softirq steal guest guest_nice
//!
//! Busy time is everything except `idle` and `iowait`. `guest` and
//! `guest_nice` are already folded into `user`/`nice` by the kernel and are
//! skipped. Offline CPUs have no line, so the core count is the number of
//! `cpuN` lines present.

use std::env;
use std::fs;
use std::time::Duration;

use crate::error::SamplerError;
use crate::types::CoreTimes;

fn proc_stat_path() -> String {
    env::var("TASKMON_PROC_STAT_PATH").unwrap_or_else(|_| "/proc/stat".to_string())
}

/// Read cumulative busy time for every online core.
pub fn read_core_times() -> Result<Vec<CoreTimes>, SamplerError> {
    let path = proc_stat_path();
    let content = fs::read_to_string(&path).map_err(|source| SamplerError::Io {
        path: path.clone(),
        source,
    })?;

    let busy = parse_core_busy_ticks(&content);
    if busy.is_empty() {
        return Err(SamplerError::Malformed {
            path,
            reason: "no per-core cpu lines".to_string(),
        });
    }

    let tps = ticks_per_second();
    Ok(busy
        .into_iter()
        .map(|(index, ticks)| CoreTimes {
            index,
            busy: ticks_to_duration(ticks, tps),
        })
        .collect())
}

/// `(N, busy ticks)` for each `cpuN` line, in file order. The aggregate `cpu`
/// line is ignored, as are lines with fewer than four counters.
fn parse_core_busy_ticks(content: &str) -> Vec<(usize, u64)> {
    let mut cores = Vec::new();

    for line in content.lines() {
        let mut parts = line.split_whitespace();
        let Some(label) = parts.next() else {
            continue;
        };
        let Some(index) = label
            .strip_prefix("cpu")
            .filter(|n| n.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|n| n.parse::<usize>().ok())
        else {
            continue;
        };

        let fields: Vec<u64> = parts
            .take(8)
            .map_while(|v| v.parse::<u64>().ok())
            .collect();
        if fields.len() < 4 {
            continue;
        }

        let busy = fields
            .iter()
            .enumerate()
            // 3 = idle, 4 = iowait
            .filter(|(i, _)| *i != 3 && *i != 4)
            .fold(0u64, |acc, (_, v)| acc.saturating_add(*v));
        cores.push((index, busy));
    }

    cores
}

/// Start time of `pid` in clock ticks since boot (field 22 of
/// /proc/<pid>/stat). `None` if the process is gone or the file is odd.
pub fn read_start_ticks(pid: u32) -> Option<u64> {
    let content = fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
    parse_start_ticks(&content)
}

fn parse_start_ticks(content: &str) -> Option<u64> {
    // comm may contain spaces and parentheses; fields resume after the last ')'.
    let (_, rest) = content.rsplit_once(')')?;
    // rest starts at field 3 (state), so starttime is the 20th token.
    rest.split_whitespace().nth(19)?.parse().ok()
}

fn ticks_per_second() -> u64 {
    // SAFETY: sysconf has no preconditions.
    let tps = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    if tps > 0 { tps as u64 } else { 100 }
}

fn ticks_to_duration(ticks: u64, tps: u64) -> Duration {
    let tps = tps.max(1);
    Duration::from_secs(ticks / tps) + Duration::from_nanos((ticks % tps) * 1_000_000_000 / tps)
}
