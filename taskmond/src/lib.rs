pub mod aggregator;
pub mod alerts;
pub mod api;
pub mod cache;
pub mod capability;
pub mod config;
pub mod controller;
pub mod error;
pub mod metrics;
pub mod normalizer;
pub mod refresh;
pub mod sampler;
pub mod service;
pub mod types;

#[cfg(test)]
mod testing;

pub use config::{ApiConfig, Config, ControlConfig, LoggingConfig, RuntimeConfig};
pub use metrics::Metrics;
