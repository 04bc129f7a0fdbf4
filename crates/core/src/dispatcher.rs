// Tool dispatcher: request -> argv -> bounded process -> classified result

use crate::classifier::classify;
use crate::commands;
use crate::config::InterpreterConfig;
use crate::error::RunnerError;
use crate::runner::{ProcessRunner, TokioProcessRunner};
use crate::types::{FailureKind, ToolKind, ToolRequest, ToolResult};
use std::sync::Arc;
use std::time::Instant;

/// Stateless entry point for tool calls. Cheap to share behind an `Arc`;
/// concurrent calls need no coordination.
pub struct ToolDispatcher {
    config: Arc<InterpreterConfig>,
    runner: Arc<dyn ProcessRunner>,
}

impl ToolDispatcher {
    pub fn new(config: InterpreterConfig) -> Self {
        let runner = Arc::new(TokioProcessRunner::new(config.output_limit_bytes));
        Self::with_runner(config, runner)
    }

    pub fn with_runner(config: InterpreterConfig, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            config: Arc::new(config),
            runner,
        }
    }

    pub async fn dispatch(&self, request: ToolRequest) -> ToolResult {
        let Some(kind) = ToolKind::parse(&request.tool) else {
            tracing::warn!(tool = %request.tool, "rejected unknown tool");
            return ToolResult::failure(
                FailureKind::UnknownTool,
                format!("unknown tool: {}", request.tool),
            );
        };

        let spec = match commands::build(kind, &request.arguments, &self.config) {
            Ok(spec) => spec,
            Err(err) => {
                tracing::info!(tool = %kind, error = %err, "rejected tool arguments");
                return ToolResult::failure(FailureKind::ValidationError, err.to_string());
            }
        };

        tracing::debug!(tool = %kind, args = ?spec.args, timeout = ?spec.timeout, "dispatching");
        let start = Instant::now();

        let result = match self.runner.run(&spec).await {
            Ok(outcome) => classify(&outcome),
            Err(err @ (RunnerError::NotFound { .. } | RunnerError::Spawn { .. })) => {
                ToolResult::failure(FailureKind::ExecutableNotFound, err.to_string())
            }
            Err(err @ RunnerError::Io(_)) => {
                ToolResult::failure(FailureKind::MalformedOutput, err.to_string())
            }
        };

        match result.failure_kind() {
            None => tracing::info!(tool = %kind, elapsed = ?start.elapsed(), "tool call succeeded"),
            Some(failure) => tracing::warn!(
                tool = %kind,
                kind = %failure,
                elapsed = ?start.elapsed(),
                "tool call failed"
            ),
        }

        result
    }
}
