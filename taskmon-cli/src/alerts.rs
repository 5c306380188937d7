use colored::*;
use reqwest::Client;
use serde::Deserialize;
use std::error::Error;

/// Per-request threshold adjustments, forwarded as query parameters.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct AlertOverrides {
    #[clap(long)]
    cpu_warning: Option<f64>,
    #[clap(long)]
    cpu_critical: Option<f64>,
    #[clap(long)]
    memory_warning: Option<f64>,
    #[clap(long)]
    memory_critical: Option<f64>,
    #[clap(long)]
    disk_warning: Option<f64>,
    #[clap(long)]
    disk_critical: Option<f64>,
}

impl AlertOverrides {
    fn query(&self) -> Vec<(&'static str, f64)> {
        [
            ("cpu_warning", self.cpu_warning),
            ("cpu_critical", self.cpu_critical),
            ("memory_warning", self.memory_warning),
            ("memory_critical", self.memory_critical),
            ("disk_warning", self.disk_warning),
            ("disk_critical", self.disk_critical),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
        .collect()
    }
}

#[derive(Debug, Deserialize)]
struct AlertsResponse {
    alerts: Vec<Alert>,
}

#[derive(Debug, Deserialize)]
struct Alert {
    resource: String,
    severity: Severity,
    current_value: f64,
    threshold: f64,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
enum Severity {
    Warning,
    Critical,
}

pub async fn run_alerts(
    client: &Client,
    url: &str,
    overrides: &AlertOverrides,
) -> Result<(), Box<dyn Error>> {
    let resp = client
        .get(format!("{url}/api/alerts"))
        .query(&overrides.query())
        .send()
        .await?;

    if resp.status() == reqwest::StatusCode::BAD_REQUEST {
        let body: serde_json::Value = resp.json().await?;
        let reason = body["error"].as_str().unwrap_or("invalid thresholds");
        return Err(reason.to_string().into());
    }
    let resp: AlertsResponse = resp.error_for_status()?.json().await?;

    if resp.alerts.is_empty() {
        println!("{}", "No active alerts.".green());
        return Ok(());
    }
    for alert in resp.alerts {
        let label = match alert.severity {
            Severity::Critical => "CRITICAL".red().bold(),
            Severity::Warning => "WARNING".yellow().bold(),
        };
        println!(
            "{label:<10} {:<7} {:.1}% (threshold {:.0}%)",
            alert.resource, alert.current_value, alert.threshold
        );
    }
    Ok(())
}
