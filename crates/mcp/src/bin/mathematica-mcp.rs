// Standalone MCP server binary

use anyhow::Result;
use clap::Parser;
use mathematica_mcp::config::{ConfigOverrides, McpConfig, DEFAULT_CONFIG_FILE};
use mathematica_mcp::logging;
use mathematica_mcp::server::McpServer;
use mathematica_mcp::tools::{register_interpreter_tools, ToolRegistry};
use mathematica_mcp_core::runner::resolve_executable;
use mathematica_mcp_core::ToolDispatcher;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "mathematica-mcp")]
#[command(about = "MCP server exposing a local wolframscript interpreter as tools", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "MATHEMATICA_MCP_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Interpreter executable, a name on PATH or a full path
    #[arg(long, env = "MATHEMATICA_MCP_INTERPRETER")]
    interpreter: Option<PathBuf>,

    /// Hard timeout for `evaluate`, in seconds
    #[arg(long, env = "MATHEMATICA_MCP_EVALUATE_TIMEOUT")]
    evaluate_timeout: Option<u64>,

    /// Directory for the log file
    #[arg(long, env = "MATHEMATICA_MCP_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Log to stderr only
    #[arg(long)]
    no_log_file: bool,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            interpreter: self.interpreter.clone(),
            evaluate_timeout_secs: self.evaluate_timeout,
            log_dir: self.log_dir.clone(),
            disable_log_file: self.no_log_file,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = McpConfig::load(&args.config)?;
    config.apply_overrides(args.overrides());
    config.validate()?;

    let _log_guard = logging::init(&config.logging)?;

    tracing::info!("Mathematica MCP server starting...");
    if args.config.exists() {
        tracing::info!("Loaded configuration from {}", args.config.display());
    } else {
        tracing::info!("Configuration file not found, using defaults");
    }

    let interpreter = &config.interpreter;
    match resolve_executable(&interpreter.executable) {
        Some(path) => tracing::info!("Using interpreter {}", path.display()),
        None => tracing::warn!(
            "Interpreter {} not found; tool calls will report executable_not_found",
            interpreter.executable.display()
        ),
    }
    tracing::debug!(
        evaluate_timeout_secs = interpreter.evaluate_timeout_secs,
        metadata_timeout_secs = interpreter.metadata_timeout_secs,
        output_limit_bytes = interpreter.output_limit_bytes,
        "interpreter limits"
    );

    let dispatcher = Arc::new(ToolDispatcher::new(config.interpreter.clone()));

    // Create tool registry
    let mut registry = ToolRegistry::new();
    register_interpreter_tools(&mut registry, dispatcher);

    tracing::info!("Registered {} tools", registry.len());

    // Start MCP server
    let server = McpServer::new(registry);
    server.start().await?;

    Ok(())
}
