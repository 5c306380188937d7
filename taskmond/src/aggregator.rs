//! Application grouping
//!
//! Rolls per-process metrics up into [`AppGroup`]s keyed by executable
//! identity. Groups are rebuilt from scratch on every call.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::types::{AppGroup, AppKey, NormalizedSnapshot, ProcessMetric, ProcessStatus};

/// Grouping key for one process: the lowercased final component of its
/// executable path, or its lowercased raw name when the path is unknown.
pub fn app_key(process: &ProcessMetric) -> AppKey {
    let exe_name = process
        .executable_path
        .as_deref()
        .and_then(|path| path.file_name())
        .map(|name| name.to_string_lossy().to_lowercase())
        .filter(|name| !name.is_empty());

    match exe_name {
        Some(name) => AppKey::ByExecutablePath(name),
        None => AppKey::ByRawName(process.name.to_lowercase()),
    }
}

/// Ordered by descending memory, then key name, then key kind.
pub fn aggregate(snapshot: &NormalizedSnapshot) -> Vec<AppGroup> {
    let mut members: BTreeMap<AppKey, Vec<&ProcessMetric>> = BTreeMap::new();
    // BTreeMap iteration is pid-ascending, so each member list is too.
    for process in snapshot.processes.values().filter(|p| !p.is_system) {
        members.entry(app_key(process)).or_default().push(process);
    }

    let mut groups: Vec<AppGroup> = members
        .into_iter()
        .filter_map(|(key, procs)| roll_up(key, &procs))
        .collect();

    groups.sort_by(|a, b| {
        b.memory_bytes
            .cmp(&a.memory_bytes)
            .then_with(|| a.key.name().cmp(b.key.name()))
            .then_with(|| a.key.cmp(&b.key))
    });
    groups
}

fn roll_up(key: AppKey, procs: &[&ProcessMetric]) -> Option<AppGroup> {
    let first = procs.first()?;

    let name = match &key {
        AppKey::ByExecutablePath(_) => first
            .executable_path
            .as_deref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| first.name.clone()),
        AppKey::ByRawName(_) => first.name.clone(),
    };

    Some(AppGroup {
        name,
        pids: procs.iter().map(|p| p.pid).collect::<BTreeSet<_>>(),
        cpu_percent: procs.iter().map(|p| p.cpu_percent).sum(),
        memory_bytes: procs.iter().map(|p| p.memory_bytes).sum(),
        memory_percent: procs.iter().map(|p| p.memory_percent).sum(),
        process_count: procs.len(),
        status: group_status(procs),
        executable_path: first.executable_path.clone(),
        is_closeable: procs.iter().all(|p| !p.protected),
        key,
    })
}

/// "running" when any member runs, otherwise the most common member status.
fn group_status(procs: &[&ProcessMetric]) -> ProcessStatus {
    if procs.iter().any(|p| p.status == ProcessStatus::Running) {
        return ProcessStatus::Running;
    }

    let mut counts: HashMap<ProcessStatus, usize> = HashMap::new();
    for p in procs {
        *counts.entry(p.status).or_default() += 1;
    }
    counts
        .into_iter()
        .max_by(|(sa, ca), (sb, cb)| match ca.cmp(cb) {
            // Ties go to the status that sorts first.
            Ordering::Equal => sb.cmp(sa),
            other => other,
        })
        .map(|(status, _)| status)
        .unwrap_or(ProcessStatus::Unknown)
}
