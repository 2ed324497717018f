use thiserror::Error;

use crate::gateway::GatewayError;

#[derive(Error, Debug)]
pub enum CamelotError {
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),
}
