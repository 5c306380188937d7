use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::alerts::AlertThresholds;
use crate::types::TerminateMode;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/taskmon/taskmon.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub runtime: RuntimeConfig,
    pub api: ApiConfig,
    pub alerts: AlertThresholds,
    pub control: ControlConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Period of the background refresh cycle.
    pub refresh_interval_ms: u64,
    /// Gap between the two samples taken at startup to seed rates.
    pub prime_delay_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 1500,
            prime_delay_ms: 200,
        }
    }
}

impl RuntimeConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn prime_delay(&self) -> Duration {
        Duration::from_millis(self.prime_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub listen: String,
    pub cors_permissive: bool,
    /// Non-loopback browser origins trusted with control routes, e.g.
    /// "https://dash.example.org".
    pub allowed_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8000".to_string(),
            cors_permissive: true,
            allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// SIGTERM instead of SIGKILL for terminate requests that do not say.
    pub graceful_terminate: bool,
    pub timeout_ms: u64,
    /// Process names refused in addition to the built-in list.
    pub protected_names: Vec<String>,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            graceful_terminate: false,
            timeout_ms: 3000,
            protected_names: Vec::new(),
        }
    }
}

impl ControlConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn default_terminate_mode(&self) -> TerminateMode {
        TerminateMode::from_force(!self.graceful_terminate)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Read `path`, or fall back to defaults when it is absent. A file that
    /// exists but does not parse or validate is an error.
    pub fn load(path: Option<&Path>) -> anyhow::Result<(Self, Option<PathBuf>)> {
        let candidate = match path {
            Some(explicit) => {
                if !explicit.exists() {
                    bail!("config file {} does not exist", explicit.display());
                }
                Some(explicit.to_path_buf())
            }
            None => Some(PathBuf::from(DEFAULT_CONFIG_PATH)).filter(|p| p.exists()),
        };

        let Some(file) = candidate else {
            return Ok((Self::default(), None));
        };

        let raw = std::fs::read_to_string(&file)
            .with_context(|| format!("reading {}", file.display()))?;
        let config =
            Self::from_toml(&raw).with_context(|| format!("loading {}", file.display()))?;
        Ok((config, Some(file)))
    }

    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(raw).context("invalid TOML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.runtime.refresh_interval_ms == 0 {
            bail!("runtime.refresh_interval_ms must be greater than zero");
        }
        if self.control.timeout_ms == 0 {
            bail!("control.timeout_ms must be greater than zero");
        }
        self.listen_addr()?;
        self.alerts
            .validate()
            .map_err(|e| anyhow::anyhow!("alerts.{e}"))?;
        Ok(())
    }

    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        self.api
            .listen
            .parse()
            .with_context(|| format!("api.listen {:?} is not a socket address", self.api.listen))
    }
}
