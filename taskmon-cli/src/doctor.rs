use colored::*;
use reqwest::Client;
use serde::Deserialize;
use std::error::Error;

use crate::pretty;

#[derive(Deserialize, Debug)]
struct HealthResponse {
    #[allow(dead_code)]
    status: String,
}

#[derive(Deserialize, Debug)]
struct StatusResponse {
    version: String,
    uptime_secs: u64,
    generation: u64,
    primed: bool,
    metrics: MetricsSnapshot,
    capabilities: Capabilities,
}

#[derive(Deserialize, Debug)]
struct MetricsSnapshot {
    refresh_cycles: u64,
    sampler_failures: u64,
    degenerate_intervals: u64,
    last_refresh_micros: u64,
    control_timeouts: u64,
    #[serde(default)]
    refresh_panics: u64,
}

#[derive(Deserialize, Debug)]
struct Capabilities {
    suspend_resume: bool,
    elevated_kill: bool,
    #[serde(default)]
    gpu: bool,
}

/// Returns false when a check failed.
pub async fn run_doctor(client: &Client, url: &str) -> Result<bool, Box<dyn Error>> {
    println!("{}", "🩺 Taskmon Doctor".bold().cyan());
    println!("{}", "Checking daemon health...".dimmed());
    println!();

    let mut all_good = true;

    print!("• Daemon Connectivity: ");
    match client.get(format!("{url}/healthz")).send().await {
        Ok(resp) if resp.status().is_success() => {
            if resp.json::<HealthResponse>().await.is_ok() {
                println!("{}", "OK".green());
            } else {
                println!("{}", "OK (Invalid JSON)".yellow());
            }
        }
        Ok(resp) => {
            println!("{}", format!("FAIL (Status {})", resp.status()).red());
            all_good = false;
        }
        Err(e) => {
            println!("{}", format!("FAIL ({e})").red());
            println!("  → Is taskmond running? Try 'systemctl status taskmond'");
            return Ok(false);
        }
    }

    print!("• Daemon Status:       ");
    let status: StatusResponse = match client.get(format!("{url}/status")).send().await {
        Ok(resp) => resp.json().await?,
        Err(e) => {
            println!("{}", format!("FAIL ({e})").red());
            return Ok(false);
        }
    };
    println!("{}", format!("OK (v{})", status.version).green());

    print!("• Uptime:              ");
    if status.uptime_secs < 60 {
        println!("{}", format!("{}s (Just started)", status.uptime_secs).yellow());
    } else {
        println!("{}", pretty::duration(status.uptime_secs).green());
    }

    print!("• Telemetry:           ");
    if status.primed {
        println!(
            "{}",
            format!(
                "Live (generation {}, last refresh {:.1}ms)",
                status.generation,
                status.metrics.last_refresh_micros as f64 / 1000.0
            )
            .green()
        );
    } else {
        println!("{}", "Not primed yet".yellow());
    }

    print!("• Sampler Failures:    ");
    if status.metrics.sampler_failures > 0 {
        println!(
            "{}",
            format!(
                "{} of {} cycles",
                status.metrics.sampler_failures,
                status.metrics.refresh_cycles + status.metrics.sampler_failures
            )
            .red()
        );
        println!("  → The OS telemetry interface is failing; see the daemon log.");
        all_good = false;
    } else {
        println!("{}", "0".green());
    }

    print!("• Clock Anomalies:     ");
    if status.metrics.degenerate_intervals > 0 {
        println!("{}", status.metrics.degenerate_intervals.to_string().yellow());
    } else {
        println!("{}", "0".green());
    }

    print!("• Control Timeouts:    ");
    if status.metrics.control_timeouts > 0 {
        println!("{}", status.metrics.control_timeouts.to_string().yellow());
    } else {
        println!("{}", "0".green());
    }

    print!("• Refresh Panics:      ");
    if status.metrics.refresh_panics > 0 {
        println!("{}", status.metrics.refresh_panics.to_string().yellow());
        println!("  → A refresh cycle crashed and was skipped; see the daemon log.");
    } else {
        println!("{}", "0".green());
    }

    print!("• Suspend/Resume:      ");
    if status.capabilities.suspend_resume {
        println!("{}", "Available".green());
    } else {
        println!("{}", "Unsupported on this platform".dimmed());
    }

    print!("• Kill Privileges:     ");
    if status.capabilities.elevated_kill {
        println!("{}", "Elevated".green());
    } else {
        println!("{}", "Own processes only".yellow());
        println!("  → Run taskmond as root (or with CAP_KILL) to stop other users' processes.");
    }

    print!("• GPU Telemetry:       ");
    if status.capabilities.gpu {
        println!("{}", "Available".green());
    } else {
        println!("{}", "No supported GPU".dimmed());
    }

    println!();
    if all_good {
        println!("{}", "✅ taskmond is healthy.".bold().green());
    } else {
        println!("{}", "⚠️  taskmond has issues. See above.".bold().yellow());
    }

    Ok(all_good)
}
