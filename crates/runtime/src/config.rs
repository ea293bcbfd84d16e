//! Runtime configuration loader.

use interlude_core::AgentError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),
    #[error("Config file is empty")]
    Empty,
    #[error("Invalid YAML: {0}")]
    InvalidYaml(String),
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ConfigError> for AgentError {
    fn from(e: ConfigError) -> Self {
        AgentError::Config(e.to_string())
    }
}

/// Limits and storage settings shared by the runner and the agents it builds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Capacity of the event channel between a run and its iterator.
    pub event_buffer: usize,
    /// Model/tool rounds per chat-model agent invocation.
    pub max_iterations: usize,
    pub max_supervisor_turns: usize,
    pub max_loop_iterations: usize,
    /// Directory for durable checkpoints. Unset keeps them in memory.
    pub checkpoint_dir: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            event_buffer: 64,
            max_iterations: 10,
            max_supervisor_turns: 8,
            max_loop_iterations: 5,
            checkpoint_dir: None,
        }
    }
}

impl RuntimeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let limits = [
            ("event_buffer", self.event_buffer),
            ("max_iterations", self.max_iterations),
            ("max_supervisor_turns", self.max_supervisor_turns),
            ("max_loop_iterations", self.max_loop_iterations),
        ];
        for (field, value) in limits {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Load runtime configuration from a YAML file.
///
/// # Errors
/// Returns error if the file is missing, empty, not valid YAML, or sets a
/// limit to zero.
pub fn load_runtime_config<P: AsRef<Path>>(config_path: P) -> Result<RuntimeConfig, ConfigError> {
    let config_file = config_path.as_ref();

    if !config_file.exists() {
        return Err(ConfigError::NotFound(config_file.display().to_string()));
    }

    let content = std::fs::read_to_string(config_file)?;

    if content.trim().is_empty() {
        return Err(ConfigError::Empty);
    }

    let config: RuntimeConfig =
        serde_yaml::from_str(&content).map_err(|e| ConfigError::InvalidYaml(e.to_string()))?;
    config.validate()?;

    Ok(config)
}
