// ===============================
// src/error.rs
// ===============================
use thiserror::Error;

use crate::config::ConfigError;
use crate::gateway::GatewayError;

/// Anything that ends the process with a non-zero exit code.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("none of the configured pairs are listed by the venue: {0:?}")]
    NoPairs(Vec<String>),
    #[error("metrics exporter: {0}")]
    Metrics(#[from] std::io::Error),
}
