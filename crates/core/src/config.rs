// Interpreter configuration, read once at startup

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_EXECUTABLE: &str = "wolframscript";

/// How the interpreter is located and bounded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterpreterConfig {
    #[serde(default = "default_executable")]
    pub executable: PathBuf,

    /// Hard ceiling for `evaluate`
    #[serde(default = "default_evaluate_timeout_secs")]
    pub evaluate_timeout_secs: u64,

    /// Hard ceiling for the version and license queries
    #[serde(default = "default_metadata_timeout_secs")]
    pub metadata_timeout_secs: u64,

    /// Per-stream capture bound
    #[serde(default = "default_output_limit_bytes")]
    pub output_limit_bytes: usize,
}

fn default_executable() -> PathBuf {
    PathBuf::from(DEFAULT_EXECUTABLE)
}

fn default_evaluate_timeout_secs() -> u64 {
    300
}

fn default_metadata_timeout_secs() -> u64 {
    10
}

fn default_output_limit_bytes() -> usize {
    1_048_576
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            executable: default_executable(),
            evaluate_timeout_secs: default_evaluate_timeout_secs(),
            metadata_timeout_secs: default_metadata_timeout_secs(),
            output_limit_bytes: default_output_limit_bytes(),
        }
    }
}

impl InterpreterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.executable.as_os_str().is_empty() {
            return Err(ConfigError::EmptyExecutable);
        }
        if self.evaluate_timeout_secs == 0 {
            return Err(ConfigError::NotPositive("evaluate_timeout_secs"));
        }
        if self.metadata_timeout_secs == 0 {
            return Err(ConfigError::NotPositive("metadata_timeout_secs"));
        }
        if self.output_limit_bytes == 0 {
            return Err(ConfigError::NotPositive("output_limit_bytes"));
        }
        Ok(())
    }

    pub fn evaluate_timeout(&self) -> Duration {
        Duration::from_secs(self.evaluate_timeout_secs)
    }

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata_timeout_secs)
    }
}
