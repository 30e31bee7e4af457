pub mod cli;
pub mod config;
pub mod error;
pub mod git;
pub mod hooks;
pub mod managesieve;
pub mod telemetry;
pub mod ui;

pub use config::{resolve_config, DeploymentConfig};
pub use error::{ConfigError, HookError, ProtocolError, Result};
