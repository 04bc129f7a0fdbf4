// MCP server implementation: newline-delimited JSON-RPC 2.0 over stdio
//
// Each request runs in its own task; a single writer task serializes responses,
// so a long evaluation never holds up other calls.

use crate::protocol::{
    negotiate_protocol_version, CallToolParams, InitializeParams, InitializeResult, JsonRpcError,
    JsonRpcRequest, JsonRpcResponse, ListToolsResult, ServerCapabilities, ServerInfo,
    ToolsCapability, JSONRPC_VERSION,
};
use crate::tools::ToolRegistry;
use anyhow::{Context, Result};
use futures::StreamExt;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tracing::Instrument;

/// Longest accepted JSON-RPC message
pub const MAX_MESSAGE_BYTES: usize = 1_048_576;

const SERVER_NAME: &str = "mathematica-mcp";
const RESPONSE_QUEUE: usize = 64;

pub struct McpServer {
    registry: ToolRegistry,
}

impl McpServer {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    /// Serve on the process's stdin/stdout until stdin closes
    pub async fn start(self) -> Result<()> {
        tracing::info!(tools = self.registry.len(), "MCP server listening on stdio");
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    pub async fn serve<R, W>(self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let server = Arc::new(self);
        let (tx, rx) = mpsc::channel(RESPONSE_QUEUE);
        let writer_task = tokio::spawn(write_responses(writer, rx));

        let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_MESSAGE_BYTES));
        let mut in_flight = JoinSet::new();
        let mut read_error = None;

        while let Some(line) = lines.next().await {
            let line = match line {
                Ok(line) => line,
                Err(LinesCodecError::MaxLineLengthExceeded) => {
                    tracing::warn!(limit = MAX_MESSAGE_BYTES, "dropping oversized message");
                    let _ = tx
                        .send(JsonRpcResponse::error(Value::Null, JsonRpcError::parse_error()))
                        .await;
                    continue;
                }
                Err(LinesCodecError::Io(err)) => {
                    read_error = Some(err);
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            let request = match parse_request(&line) {
                Ok(request) => request,
                Err(response) => {
                    let _ = tx.send(response).await;
                    continue;
                }
            };

            let span = tracing::info_span!("request", method = %request.method, id = ?request.id);
            let server = server.clone();
            let tx = tx.clone();
            in_flight.spawn(
                async move {
                    if let Some(response) = server.handle_request(request).await {
                        if tx.send(response).await.is_err() {
                            tracing::warn!("response dropped, writer has stopped");
                        }
                    }
                }
                .instrument(span),
            );

            while let Some(joined) = in_flight.try_join_next() {
                log_join_error(joined);
            }
        }

        while let Some(joined) = in_flight.join_next().await {
            log_join_error(joined);
        }
        drop(tx);
        writer_task.await.context("response writer panicked")??;

        match read_error {
            Some(err) => Err(err).context("failed to read from stdin"),
            None => {
                tracing::info!("stdin closed, MCP server stopping");
                Ok(())
            }
        }
    }

    /// Handle one request. Notifications produce no response.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.is_notification() {
            tracing::debug!(method = %request.method, "notification received");
            return None;
        }
        let id = request.id.clone().unwrap_or(Value::Null);

        if request.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::error(id, JsonRpcError::invalid_request()));
        }

        let result = match request.method.as_str() {
            "initialize" => self.initialize(request.params),
            "ping" => Ok(serde_json::json!({})),
            "tools/list" => to_result(&ListToolsResult {
                tools: self.registry.list_schemas(),
            }),
            "tools/call" => self.call_tool(request.params).await,
            other => Err(JsonRpcError::method_not_found(other)),
        };

        Some(match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(error) => JsonRpcResponse::error(id, error),
        })
    }

    fn initialize(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: InitializeParams = parse_params(params)?;
        if let Some(client) = &params.client_info {
            tracing::info!(client = %client.name, version = %client.version, "client connected");
        }

        to_result(&InitializeResult {
            protocol_version: negotiate_protocol_version(&params.protocol_version).to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: false,
                }),
            },
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        })
    }

    async fn call_tool(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: CallToolParams = parse_params(params)?;
        let tool = self
            .registry
            .get(&params.name)
            .ok_or_else(|| JsonRpcError::invalid_params(format!("Unknown tool: {}", params.name)))?;

        let result = tool.execute(params.arguments).await.map_err(|err| {
            tracing::error!(tool = %params.name, error = %err, "tool execution fault");
            JsonRpcError::internal_error(format!("Tool {} failed", params.name))
        })?;
        to_result(&result)
    }
}

fn parse_request(line: &str) -> Result<JsonRpcRequest, JsonRpcResponse> {
    let value: Value = serde_json::from_str(line).map_err(|err| {
        tracing::warn!(error = %err, "unparseable message");
        JsonRpcResponse::error(Value::Null, JsonRpcError::parse_error())
    })?;

    let id = value.get("id").cloned().unwrap_or(Value::Null);
    serde_json::from_value(value).map_err(|err| {
        tracing::warn!(error = %err, "malformed request");
        JsonRpcResponse::error(id, JsonRpcError::invalid_request())
    })
}

fn parse_params<T: serde::de::DeserializeOwned>(params: Option<Value>) -> Result<T, JsonRpcError> {
    let params = params.ok_or_else(|| JsonRpcError::invalid_params("Missing params"))?;
    serde_json::from_value(params)
        .map_err(|err| JsonRpcError::invalid_params(format!("Invalid params: {}", err)))
}

fn to_result<T: Serialize>(value: &T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|err| JsonRpcError::internal_error(err.to_string()))
}

fn log_join_error(joined: Result<(), tokio::task::JoinError>) {
    if let Err(err) = joined {
        tracing::error!(error = %err, "request task failed");
    }
}

async fn write_responses<W>(mut writer: W, mut rx: mpsc::Receiver<JsonRpcResponse>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let mut line = serde_json::to_string(&response).context("failed to encode response")?;
        line.push('\n');
        writer
            .write_all(line.as_bytes())
            .await
            .context("failed to write response")?;
        writer.flush().await.context("failed to flush response")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::register_interpreter_tools;
    use mathematica_mcp_core::{
        CommandSpec, ExecutionOutcome, InterpreterConfig, ProcessRunner, RunnerError, ToolDispatcher,
    };
    use std::time::Duration;
    use tokio::io::AsyncReadExt;

    /// Answers `-code <expr>` with canned text; `Pause[...]` takes a while
    struct CannedInterpreter;

    #[async_trait::async_trait]
    impl ProcessRunner for CannedInterpreter {
        async fn run(&self, spec: &CommandSpec) -> Result<ExecutionOutcome, RunnerError> {
            let args: Vec<&str> = spec.args.iter().map(String::as_str).collect();
            let (code, stdout, stderr) = match args.as_slice() {
                ["-version"] => (0, "14.1.0\n", ""),
                ["-code", "1+1"] => (0, "2\n", ""),
                ["-code", "Pause[1]"] => {
                    tokio::time::sleep(Duration::from_millis(300)).await;
                    (0, "Null\n", "")
                }
                _ => (1, "", "Syntax::sntxi: Incomplete expression"),
            };
            Ok(ExecutionOutcome {
                exit_code: Some(code),
                stdout: stdout.as_bytes().to_vec(),
                stderr: stderr.as_bytes().to_vec(),
                stdout_truncated: false,
                stderr_truncated: false,
                elapsed: Duration::from_millis(5),
                timeout: spec.timeout,
                timed_out: false,
            })
        }
    }

    fn server() -> McpServer {
        let dispatcher = Arc::new(ToolDispatcher::with_runner(
            InterpreterConfig::default(),
            Arc::new(CannedInterpreter),
        ));
        let mut registry = ToolRegistry::new();
        register_interpreter_tools(&mut registry, dispatcher);
        McpServer::new(registry)
    }

    async fn call(server: &McpServer, method: &str, params: Value) -> JsonRpcResponse {
        server
            .handle_request(JsonRpcRequest::new(1, method, params))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_initialize() {
        let response = call(
            &server(),
            "initialize",
            serde_json::json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {"name": "test-client", "version": "0.0.1"}
            }),
        )
        .await;

        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], "2024-11-05");
        assert_eq!(result["serverInfo"]["name"], "mathematica-mcp");
        assert_eq!(result["capabilities"]["tools"]["listChanged"], false);
    }

    #[tokio::test]
    async fn test_tools_list() {
        let response = call(&server(), "tools/list", Value::Null).await;
        let tools = response.result.unwrap()["tools"].as_array().unwrap().clone();

        assert_eq!(tools.len(), 4);
        assert_eq!(tools[0]["name"], "evaluate");
        assert!(tools[0]["inputSchema"].is_object());
    }

    #[tokio::test]
    async fn test_tools_call_success() {
        let response = call(
            &server(),
            "tools/call",
            serde_json::json!({"name": "evaluate", "arguments": {"script": "1+1"}}),
        )
        .await;

        let result = response.result.unwrap();
        assert_eq!(result["content"][0]["text"], "2");
        assert!(result.get("isError").is_none());
    }

    #[tokio::test]
    async fn test_tools_call_without_arguments() {
        let response = call(
            &server(),
            "tools/call",
            serde_json::json!({"name": "version_interpreter"}),
        )
        .await;
        assert_eq!(response.result.unwrap()["content"][0]["text"], "14.1.0");
    }

    #[tokio::test]
    async fn test_tools_call_failures_are_results() {
        let server = server();

        let response = call(
            &server,
            "tools/call",
            serde_json::json!({"name": "evaluate", "arguments": {"script": ""}}),
        )
        .await;
        let result = response.result.unwrap();
        assert_eq!(result["isError"], true);
        assert_eq!(result["structuredContent"]["kind"], "validation_error");

        let response = call(
            &server,
            "tools/call",
            serde_json::json!({"name": "evaluate", "arguments": {"script": "1+"}}),
        )
        .await;
        let result = response.result.unwrap();
        assert_eq!(result["structuredContent"]["kind"], "non_zero_exit");
        assert!(result["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("Syntax::sntxi"));
    }

    #[tokio::test]
    async fn test_protocol_errors() {
        let server = server();

        let response = call(&server, "tools/call", serde_json::json!({"name": "shell"})).await;
        assert_eq!(response.error.unwrap().code, -32602);

        let response = call(&server, "tools/call", Value::Null).await;
        assert_eq!(response.error.unwrap().code, -32602);

        let response = call(&server, "resources/list", Value::Null).await;
        assert_eq!(response.error.unwrap().code, -32601);

        let mut request = JsonRpcRequest::new(9, "ping", Value::Null);
        request.jsonrpc = "1.0".to_string();
        let response = server.handle_request(request).await.unwrap();
        assert_eq!(response.error.unwrap().code, -32600);
    }

    #[tokio::test]
    async fn test_notifications_get_no_response() {
        let response = server()
            .handle_request(JsonRpcRequest::notification("notifications/initialized"))
            .await;
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn test_null_id_gets_a_response() {
        let request: JsonRpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":null,"method":"ping"}"#).unwrap();
        let response = server().handle_request(request).await.unwrap();

        assert!(response.id.is_null());
        assert_eq!(response.result, Some(serde_json::json!({})));
    }

    async fn run_session(input: &str) -> Vec<Value> {
        let (mut client, server_io) = tokio::io::duplex(64 * 1024);
        let (reader, writer) = tokio::io::split(server_io);
        let handle = tokio::spawn(server().serve(reader, writer));

        client.write_all(input.as_bytes()).await.unwrap();
        client.shutdown().await.unwrap();

        let mut output = String::new();
        client.read_to_string(&mut output).await.unwrap();
        handle.await.unwrap().unwrap();

        output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_serve_session() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2025-06-18","capabilities":{}}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n\n",
            "this is not json\n",
            r#"{"jsonrpc":"2.0","id":"x","params":{}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"version_interpreter","arguments":{}}}"#,
            "\n",
        );
        let responses = run_session(input).await;
        assert_eq!(responses.len(), 4);

        let by_id = |id: Value| {
            responses
                .iter()
                .find(|response| response["id"] == id)
                .cloned()
                .unwrap()
        };
        assert_eq!(by_id(serde_json::json!(1))["result"]["protocolVersion"], "2025-06-18");
        assert_eq!(by_id(Value::Null)["error"]["code"], -32700);
        assert_eq!(by_id(serde_json::json!("x"))["error"]["code"], -32600);
        assert_eq!(
            by_id(serde_json::json!(2))["result"]["content"][0]["text"],
            "14.1.0"
        );
    }

    #[tokio::test]
    async fn test_slow_call_does_not_block_others() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"evaluate","arguments":{"script":"Pause[1]"}}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#,
            "\n",
        );
        let responses = run_session(input).await;

        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["id"], 2);
        assert_eq!(responses[1]["id"], 1);
        assert_eq!(responses[1]["result"]["content"][0]["text"], "Null");
    }
}
