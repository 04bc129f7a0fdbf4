// The four wolframscript tools, each a thin adapter over the dispatcher

use crate::protocol::{CallToolResult, ToolSchema};
use crate::tools::{json_schema_object, json_schema_string, Tool, ToolRegistry};
use anyhow::Result;
use mathematica_mcp_core::{FailureKind, ToolDispatcher, ToolKind, ToolRequest, ToolResult};
use std::sync::Arc;

pub struct InterpreterTool {
    kind: ToolKind,
    dispatcher: Arc<ToolDispatcher>,
}

impl InterpreterTool {
    pub fn new(kind: ToolKind, dispatcher: Arc<ToolDispatcher>) -> Self {
        Self { kind, dispatcher }
    }

    fn description(&self) -> &'static str {
        match self.kind {
            ToolKind::Evaluate => {
                "Evaluate Wolfram Language code with wolframscript and return the textual result."
            }
            ToolKind::VersionInterpreter => "Report the version of the wolframscript interpreter.",
            ToolKind::VersionEngine => "Report the Wolfram Engine version ($Version).",
            ToolKind::LicenseType => "Report the license type of the Wolfram Engine ($LicenseType).",
        }
    }

    fn input_schema(&self) -> serde_json::Value {
        match self.kind {
            ToolKind::Evaluate => json_schema_object(
                serde_json::json!({
                    "script": json_schema_string("Wolfram Language code to evaluate, e.g. Integrate[x^2, x]")
                }),
                vec!["script"],
            ),
            _ => json_schema_object(serde_json::json!({}), vec![]),
        }
    }
}

#[async_trait::async_trait]
impl Tool for InterpreterTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.kind.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<CallToolResult> {
        let result = match ToolRequest::from_value(self.kind.name(), arguments) {
            Some(request) => self.dispatcher.dispatch(request).await,
            None => ToolResult::failure(
                FailureKind::ValidationError,
                "tool arguments must be a JSON object",
            ),
        };
        Ok(result.into())
    }
}

/// Register one tool per tool kind, all sharing the same dispatcher
pub fn register_interpreter_tools(registry: &mut ToolRegistry, dispatcher: Arc<ToolDispatcher>) {
    for kind in ToolKind::ALL {
        registry.register(Arc::new(InterpreterTool::new(kind, dispatcher.clone())));
    }
}
