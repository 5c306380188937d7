use colored::*;
use reqwest::Client;
use serde::Deserialize;
use std::error::Error;

use crate::pretty;

#[derive(Debug, Deserialize)]
struct ProcessListResponse {
    processes: Vec<ProcessInfo>,
    total_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f64,
    pub memory_bytes: u64,
    pub memory_percent: f64,
    pub status: String,
    #[serde(default)]
    pub protected: bool,
}

pub async fn run_processes(client: &Client, url: &str, limit: usize) -> Result<(), Box<dyn Error>> {
    let list: ProcessListResponse = client
        .get(format!("{url}/api/processes"))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    println!(
        "{:<8} {:<8} {:<10} {:<6} {:<9} NAME",
        "PID", "CPU%", "MEM", "MEM%", "STATUS"
    );

    for p in list.processes.iter().take(limit) {
        let name = if p.protected {
            format!("{} {}", p.name, "(protected)".dimmed())
        } else {
            p.name.clone()
        };
        println!(
            "{:<8} {:<8} {:<10} {:<6.1} {:<9} {}",
            p.pid,
            pretty::load_pct(p.cpu_percent),
            pretty::bytes(p.memory_bytes),
            p.memory_percent,
            p.status,
            name
        );
    }

    if list.total_count > limit {
        println!(
            "{}",
            format!("… {} more (use --limit)", list.total_count - limit).dimmed()
        );
    }
    Ok(())
}
