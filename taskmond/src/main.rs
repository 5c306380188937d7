use anyhow::Context;
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;

use taskmond::api::{self, ApiState};
use taskmond::cache::TelemetryCache;
use taskmond::controller::{OsProcessControl, ProcessControl, SafetyGuard};
use taskmond::refresh::Refresher;
use taskmond::sampler::SysinfoSampler;
use taskmond::service::TelemetryService;
use taskmond::{Config, Metrics};

#[derive(Parser, Debug)]
#[command(name = "taskmond", version, about = "Telemetry and process-control daemon")]
struct Args {
    /// Config file (defaults to /etc/taskmon/taskmon.toml when present)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Override api.listen, e.g. 0.0.0.0:8000
    #[arg(long)]
    listen: Option<String>,

    /// Override runtime.refresh_interval_ms
    #[arg(long)]
    interval_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let (mut config, source) = Config::load(args.config.as_deref())?;
    if let Some(listen) = args.listen {
        config.api.listen = listen;
    }
    if let Some(interval) = args.interval_ms {
        config.runtime.refresh_interval_ms = interval;
    }
    config.validate().context("invalid configuration")?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    match &source {
        Some(path) => info!("[taskmond] loaded config from {}", path.display()),
        None => info!("[taskmond] no config file, using defaults"),
    }

    let metrics = Arc::new(Metrics::new());
    let cache = Arc::new(TelemetryCache::new());
    let guard = SafetyGuard::new(&config.control.protected_names);

    let control = OsProcessControl::new(guard.clone());
    let caps = control.capabilities();
    info!(
        "[taskmond] capabilities: suspend_resume={} elevated_kill={} gpu={}",
        caps.suspend_resume, caps.elevated_kill, caps.gpu
    );
    if !caps.elevated_kill {
        warn!("[taskmond] not running with kill privileges; other users' processes cannot be stopped");
    }

    let refresher = Refresher::new(
        Box::new(SysinfoSampler::new()),
        Arc::clone(&cache),
        config.alerts,
        guard,
        Arc::clone(&metrics),
    );
    tokio::spawn(refresher.run(
        config.runtime.refresh_interval(),
        config.runtime.prime_delay(),
    ));

    let service = TelemetryService::new(
        cache,
        Arc::new(control),
        config.alerts,
        metrics,
        config.control.timeout(),
        config.control.default_terminate_mode(),
    );
    let app = api::router(Arc::new(ApiState::new(service)), &config.api);

    let addr = config.listen_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("[api] listening on http://{addr}");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("[taskmond] failed to listen for ctrl-c: {err}");
                std::future::pending::<()>().await;
            }
            info!("[taskmond] shutting down");
        })
        .await
        .context("http server failed")?;
    Ok(())
}
