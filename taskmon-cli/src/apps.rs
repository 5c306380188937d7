use colored::*;
use reqwest::Client;
use serde::Deserialize;
use std::error::Error;

use crate::pretty;

#[derive(Debug, Deserialize)]
struct AppsResponse {
    apps: Vec<AppInfo>,
    total_count: usize,
}

#[derive(Debug, Deserialize)]
struct AppInfo {
    name: String,
    pids: Vec<u32>,
    cpu_percent: f64,
    memory_bytes: u64,
    process_count: usize,
    status: String,
}

pub async fn run_apps(client: &Client, url: &str) -> Result<(), Box<dyn Error>> {
    let resp: AppsResponse = client
        .get(format!("{url}/api/apps"))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    if resp.apps.is_empty() {
        println!("{}", "No applications reported yet.".dimmed());
        return Ok(());
    }

    println!(
        "{:<28} {:<6} {:<8} {:<10} {:<9} PIDS",
        "APP", "PROCS", "CPU%", "MEM", "STATUS"
    );
    for app in &resp.apps {
        let pids: Vec<String> = app.pids.iter().map(u32::to_string).collect();
        println!(
            "{:<28} {:<6} {:<8} {:<10} {:<9} {}",
            pretty::truncate(&app.name, 28),
            app.process_count,
            pretty::load_pct(app.cpu_percent),
            pretty::bytes(app.memory_bytes),
            app.status,
            pretty::truncate(&pids.join(","), 40)
        );
    }
    println!("{}", format!("{} applications", resp.total_count).dimmed());
    Ok(())
}
