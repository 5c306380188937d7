use colored::*;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::error::Error;

#[derive(Debug, Clone, Copy)]
pub enum Action {
    /// `force` overrides the daemon's default terminate mode with SIGKILL.
    Kill { force: bool },
    Suspend,
    Resume,
}

impl Action {
    fn force(self) -> bool {
        matches!(self, Self::Kill { force: true })
    }

    fn path(self) -> &'static str {
        match self {
            Self::Kill { .. } => "kill",
            Self::Suspend => "suspend",
            Self::Resume => "resume",
        }
    }
}

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
enum Outcome {
    Success,
    NotFound,
    PermissionDenied,
    PlatformUnsupported,
}

#[derive(Debug, Deserialize)]
struct ControlResult {
    pid: u32,
    outcome: Outcome,
    message: String,
}

#[derive(Debug, Deserialize)]
struct GroupResult {
    outcomes: Vec<ControlResult>,
    succeeded: usize,
    partial_success: bool,
}

#[derive(Debug, Deserialize)]
struct Pending {
    message: String,
}

/// Prints the daemon's verdict. Returns false unless the action succeeded.
pub async fn run_action(
    client: &Client,
    url: &str,
    action: Action,
    pid: u32,
) -> Result<bool, Box<dyn Error>> {
    let mut req = client.post(format!("{url}/api/process/{pid}/{}", action.path()));
    if action.force() {
        req = req.query(&[("force", "true")]);
    }
    let resp = req.send().await?;

    if resp.status() == StatusCode::ACCEPTED {
        let pending: Pending = resp.json().await?;
        println!("{} {}", "PENDING".yellow().bold(), pending.message);
        return Ok(true);
    }
    if resp.status().is_server_error() && resp.status() != StatusCode::NOT_IMPLEMENTED {
        return Err(format!("taskmond returned {}", resp.status()).into());
    }

    let result: ControlResult = resp.json().await?;
    print_result(&result);
    Ok(result.outcome == Outcome::Success)
}

pub async fn run_close(
    client: &Client,
    url: &str,
    pids: &[u32],
    force: bool,
) -> Result<bool, Box<dyn Error>> {
    let mut req = client.post(format!("{url}/api/app/close")).json(pids);
    if force {
        req = req.query(&[("force", "true")]);
    }
    let resp = req.send().await?;

    match resp.status() {
        StatusCode::ACCEPTED => {
            let pending: Pending = resp.json().await?;
            println!("{} {}", "PENDING".yellow().bold(), pending.message);
            return Ok(true);
        }
        status if status == StatusCode::BAD_REQUEST || status.is_server_error() => {
            return Err(format!("taskmond returned {status}").into());
        }
        _ => {}
    }

    let group: GroupResult = resp.json().await?;
    for result in &group.outcomes {
        print_result(result);
    }
    let summary = format!("{}/{} terminated", group.succeeded, group.outcomes.len());
    if group.partial_success {
        println!("{}", format!("{summary} (partial)").yellow());
    } else if group.succeeded == group.outcomes.len() {
        println!("{}", summary.green());
    } else {
        println!("{}", summary.red());
    }
    Ok(group.succeeded == group.outcomes.len())
}

fn print_result(result: &ControlResult) {
    let label = match result.outcome {
        Outcome::Success => "OK".green().bold(),
        Outcome::NotFound => "NOT FOUND".yellow().bold(),
        Outcome::PermissionDenied => "DENIED".red().bold(),
        Outcome::PlatformUnsupported => "UNSUPPORTED".dimmed(),
    };
    println!("{label} [{}] {}", result.pid, result.message);
    if let Some(hint) = hint(result.outcome) {
        println!("  → {hint}");
    }
}

fn hint(outcome: Outcome) -> Option<&'static str> {
    match outcome {
        Outcome::NotFound => Some("The process already exited or the pid is wrong."),
        Outcome::PermissionDenied => {
            Some("Protected or owned by another user; retry as administrator/root.")
        }
        Outcome::PlatformUnsupported => Some("This operation is not available on this OS."),
        Outcome::Success => None,
    }
}
