// Core types flowing through a single tool call

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// The fixed set of tools exposed over MCP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Evaluate,
    VersionInterpreter,
    VersionEngine,
    LicenseType,
}

impl ToolKind {
    pub const ALL: [ToolKind; 4] = [
        ToolKind::Evaluate,
        ToolKind::VersionInterpreter,
        ToolKind::VersionEngine,
        ToolKind::LicenseType,
    ];

    /// Wire name of the tool
    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::Evaluate => "evaluate",
            ToolKind::VersionInterpreter => "version_interpreter",
            ToolKind::VersionEngine => "version_engine",
            ToolKind::LicenseType => "license_type",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An incoming tool call, as delivered by the protocol layer
#[derive(Debug, Clone)]
pub struct ToolRequest {
    pub tool: String,
    pub arguments: serde_json::Map<String, serde_json::Value>,
}

impl ToolRequest {
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            arguments: serde_json::Map::new(),
        }
    }

    pub fn with_argument(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }

    /// Build a request from an MCP `arguments` value. `null` is treated as no arguments.
    pub fn from_value(tool: impl Into<String>, arguments: serde_json::Value) -> Option<Self> {
        let arguments = match arguments {
            serde_json::Value::Object(map) => map,
            serde_json::Value::Null => serde_json::Map::new(),
            _ => return None,
        };
        Some(Self {
            tool: tool.into(),
            arguments,
        })
    }
}

/// A ready-to-execute external process invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub executable: PathBuf,
    pub args: Vec<String>,
    pub timeout: Duration,
}

/// Raw observation of one finished (or killed) process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    /// Absent when the process was killed, by our timeout or by a signal
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: bool,
    pub stderr_truncated: bool,
    pub elapsed: Duration,
    pub timeout: Duration,
    pub timed_out: bool,
}

/// Machine-readable failure category reported to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ValidationError,
    UnknownTool,
    ExecutableNotFound,
    TimedOut,
    NonZeroExit,
    OutputTooLarge,
    MalformedOutput,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::ValidationError => "validation_error",
            FailureKind::UnknownTool => "unknown_tool",
            FailureKind::ExecutableNotFound => "executable_not_found",
            FailureKind::TimedOut => "timed_out",
            FailureKind::NonZeroExit => "non_zero_exit",
            FailureKind::OutputTooLarge => "output_too_large",
            FailureKind::MalformedOutput => "malformed_output",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The only value handed back to the protocol layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolResult {
    Success { payload: String },
    Failure { kind: FailureKind, detail: String },
}

impl ToolResult {
    pub fn success(payload: impl Into<String>) -> Self {
        Self::Success {
            payload: payload.into(),
        }
    }

    pub fn failure(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self::Failure {
            kind,
            detail: detail.into(),
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }
}
