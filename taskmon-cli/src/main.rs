use clap::{Parser, Subcommand};
use reqwest::Client;
use std::error::Error;
use std::process::ExitCode;

mod alerts;
mod apps;
mod control;
mod doctor;
mod pretty;
mod processes;
mod stats;

use alerts::AlertOverrides;
use control::Action;

#[derive(clap::Parser, Debug)]
#[clap(name = "taskmon-cli", version, about = "Query and control a running taskmond")]
struct Args {
    /// Base URL of the taskmond service
    #[clap(long, default_value = "http://127.0.0.1:8000")]
    url: String,

    /// Disable colorized output
    #[clap(long)]
    no_color: bool,

    /// Subcommands (defaults to `stats`)
    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// System-wide CPU, memory, disk and network usage
    Stats,
    /// List processes, busiest first
    Processes {
        /// Maximum number of rows to print
        #[clap(long, default_value_t = 25)]
        limit: usize,
    },
    /// List applications (processes grouped by executable)
    Apps,
    /// Show active resource alerts
    Alerts(AlertOverrides),
    /// Terminate a process
    Kill {
        pid: u32,
        /// Kill immediately instead of asking the process to exit
        #[clap(long)]
        force: bool,
    },
    /// Pause a process
    Suspend { pid: u32 },
    /// Continue a suspended process
    Resume { pid: u32 },
    /// Terminate every process of an application
    Close {
        #[clap(required = true, num_args = 1..)]
        pids: Vec<u32>,
        /// Kill immediately instead of asking the processes to exit
        #[clap(long)]
        force: bool,
    },
    /// Check daemon health and connectivity
    Doctor,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn Error>> {
    let args = Args::parse();
    if args.no_color {
        colored::control::set_override(false);
    }
    let client = Client::new();
    let url = args.url.trim_end_matches('/');

    let ok = match args.command.unwrap_or(Command::Stats) {
        Command::Stats => stats::run_stats(&client, url).await.map(|_| true)?,
        Command::Processes { limit } => processes::run_processes(&client, url, limit)
            .await
            .map(|_| true)?,
        Command::Apps => apps::run_apps(&client, url).await.map(|_| true)?,
        Command::Alerts(overrides) => alerts::run_alerts(&client, url, &overrides)
            .await
            .map(|_| true)?,
        Command::Kill { pid, force } => {
            control::run_action(&client, url, Action::Kill { force }, pid).await?
        }
        Command::Suspend { pid } => {
            control::run_action(&client, url, Action::Suspend, pid).await?
        }
        Command::Resume { pid } => control::run_action(&client, url, Action::Resume, pid).await?,
        Command::Close { pids, force } => control::run_close(&client, url, &pids, force).await?,
        Command::Doctor => doctor::run_doctor(&client, url).await?,
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
