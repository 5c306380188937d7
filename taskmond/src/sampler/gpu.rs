//! Optional GPU telemetry
//!
//! No vendor management library is linked. On Linux, DRM drivers that
//! publish utilization in sysfs (amdgpu and a few others) are read directly:
//!
//!   /sys/class/drm/card0/device/gpu_busy_percent     42
//!   /sys/class/drm/card0/device/mem_info_vram_used   1073741824
//!   /sys/class/drm/card0/device/mem_info_vram_total  8573157376
//!   /sys/class/drm/card0/device/hwmon/hwmon3/temp1_input  51000
//!
//! Without such a card there is no source and snapshots carry `gpu: None`.

use log::debug;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::types::GpuStats;

pub trait GpuSource: Send {
    /// Current reading, or `None` when the device stopped answering.
    fn read(&mut self) -> Option<GpuStats>;
}

fn drm_root() -> PathBuf {
    env::var_os("TASKMON_DRM_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/sys/class/drm"))
}

/// The GPU source for this host, if any.
pub fn detect() -> Option<Box<dyn GpuSource>> {
    if !cfg!(target_os = "linux") {
        return None;
    }
    let source = DrmGpu::discover(&drm_root())?;
    debug!("[gpu] using {} at {}", source.name, source.device.display());
    Some(Box::new(source))
}

pub fn is_available() -> bool {
    cfg!(target_os = "linux") && DrmGpu::discover(&drm_root()).is_some()
}

/// A DRM card whose driver reports busy percentage through sysfs.
#[derive(Debug)]
pub struct DrmGpu {
    device: PathBuf,
    name: String,
}

impl DrmGpu {
    /// First `cardN` under `root` (in card order) that reports a busy value.
    pub fn discover(root: &Path) -> Option<Self> {
        let mut cards: Vec<(u32, PathBuf)> = fs::read_dir(root)
            .ok()?
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let name = entry.file_name();
                // Connector entries look like card0-DP-1.
                let index = name.to_str()?.strip_prefix("card")?.parse().ok()?;
                Some((index, entry.path()))
            })
            .collect();
        cards.sort();

        cards.into_iter().find_map(|(index, card)| {
            let device = card.join("device");
            read_u64(&device.join("gpu_busy_percent"))?;
            let name = fs::read_to_string(device.join("product_name"))
                .ok()
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| format!("card{index}"));
            Some(Self { device, name })
        })
    }

    fn temperature(&self) -> Option<f64> {
        let mut hwmons: Vec<PathBuf> = fs::read_dir(self.device.join("hwmon"))
            .ok()?
            .filter_map(Result::ok)
            .map(|e| e.path())
            .collect();
        hwmons.sort();
        hwmons
            .iter()
            .find_map(|dir| read_u64(&dir.join("temp1_input")))
            .map(|millidegrees| millidegrees as f64 / 1000.0)
    }
}

impl GpuSource for DrmGpu {
    fn read(&mut self) -> Option<GpuStats> {
        let load = read_u64(&self.device.join("gpu_busy_percent"))?;
        Some(GpuStats {
            name: self.name.clone(),
            load_percent: (load as f64).clamp(0.0, 100.0),
            memory_used: read_u64(&self.device.join("mem_info_vram_used")).unwrap_or(0),
            memory_total: read_u64(&self.device.join("mem_info_vram_total")).unwrap_or(0),
            temperature_celsius: self.temperature(),
        })
    }
}

fn read_u64(path: &Path) -> Option<u64> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}
