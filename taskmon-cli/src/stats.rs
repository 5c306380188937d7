use colored::*;
use reqwest::Client;
use serde::Deserialize;
use std::error::Error;

use crate::pretty;

#[derive(Debug, Deserialize)]
struct StatsResponse {
    generation: u64,
    cpu: CpuStats,
    memory: MemoryStats,
    disk: DiskStats,
    network: NetworkStats,
    system: SystemInfo,
    #[serde(default)]
    gpu: Option<GpuStats>,
}

#[derive(Debug, Deserialize)]
struct CpuStats {
    percent: f64,
    core_count: usize,
}

#[derive(Debug, Deserialize)]
struct MemoryStats {
    used: u64,
    total: u64,
    percent: f64,
}

#[derive(Debug, Deserialize)]
struct DiskStats {
    used: u64,
    total: u64,
    percent: f64,
    read_bps: f64,
    write_bps: f64,
}

#[derive(Debug, Deserialize)]
struct NetworkStats {
    sent_bps: f64,
    recv_bps: f64,
}

#[derive(Debug, Deserialize)]
struct GpuStats {
    name: String,
    load: f64,
    memory_used: u64,
    memory_total: u64,
    temperature: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct SystemInfo {
    os: String,
    uptime_seconds: u64,
}

pub async fn run_stats(client: &Client, url: &str) -> Result<(), Box<dyn Error>> {
    let stats: StatsResponse = client
        .get(format!("{url}/api/stats"))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    if stats.generation == 0 {
        println!("{}", "taskmond is still collecting its first samples.".yellow());
        return Ok(());
    }

    println!("{} ({}, up {})", "System".bold(), stats.system.os, pretty::duration(stats.system.uptime_seconds));
    println!(
        "  CPU      {} across {} cores",
        pretty::load_pct(stats.cpu.percent),
        stats.cpu.core_count
    );
    println!(
        "  Memory   {} ({} / {})",
        pretty::load_pct(stats.memory.percent),
        pretty::bytes(stats.memory.used),
        pretty::bytes(stats.memory.total)
    );
    println!(
        "  Disk     {} ({} / {}), read {}/s, write {}/s",
        pretty::load_pct(stats.disk.percent),
        pretty::bytes(stats.disk.used),
        pretty::bytes(stats.disk.total),
        pretty::bytes(stats.disk.read_bps as u64),
        pretty::bytes(stats.disk.write_bps as u64)
    );
    println!(
        "  Network  up {}/s, down {}/s",
        pretty::bytes(stats.network.sent_bps as u64),
        pretty::bytes(stats.network.recv_bps as u64)
    );
    if let Some(gpu) = &stats.gpu {
        let temp = gpu
            .temperature
            .map(|t| format!(", {t:.0}°C"))
            .unwrap_or_default();
        println!(
            "  GPU      {} {} ({} / {}{temp})",
            gpu.name,
            pretty::load_pct(gpu.load),
            pretty::bytes(gpu.memory_used),
            pretty::bytes(gpu.memory_total)
        );
    }
    Ok(())
}
