use anyhow::{Context, Result};
use mathematica_mcp_core::InterpreterConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "mathematica-mcp.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpConfig {
    #[serde(default)]
    pub interpreter: InterpreterConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive for the log file, e.g. `debug` or `mathematica_mcp=trace`
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default = "default_directory")]
    pub directory: PathBuf,

    /// Write a log file in addition to stderr
    #[serde(default = "default_file")]
    pub file: bool,

    #[serde(default)]
    pub rotation: LogRotation,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

fn default_level() -> String {
    "debug".to_string()
}

fn default_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_file() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            directory: default_directory(),
            file: default_file(),
            rotation: LogRotation::default(),
        }
    }
}

/// Values supplied on the command line or through the environment; they win over the file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub interpreter: Option<PathBuf>,
    pub evaluate_timeout_secs: Option<u64>,
    pub log_dir: Option<PathBuf>,
    pub disable_log_file: bool,
}

impl McpConfig {
    /// Load the configuration file if it exists, otherwise use defaults
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path).with_context(|| {
            format!("Failed to read configuration file {}", config_path.display())
        })?;
        toml::from_str(&content).with_context(|| {
            format!("Failed to parse configuration file {}", config_path.display())
        })
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(interpreter) = overrides.interpreter {
            self.interpreter.executable = interpreter;
        }
        if let Some(timeout) = overrides.evaluate_timeout_secs {
            self.interpreter.evaluate_timeout_secs = timeout;
        }
        if let Some(log_dir) = overrides.log_dir {
            self.logging.directory = log_dir;
        }
        if overrides.disable_log_file {
            self.logging.file = false;
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.interpreter
            .validate()
            .context("Invalid [interpreter] configuration")
    }
}
