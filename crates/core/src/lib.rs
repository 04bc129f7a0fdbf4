// Tool dispatch and bounded process execution for the Mathematica MCP server

pub mod classifier;
pub mod commands;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod runner;
pub mod types;

pub use classifier::classify;
pub use config::InterpreterConfig;
pub use dispatcher::ToolDispatcher;
pub use error::{ConfigError, RunnerError, ValidationError};
pub use runner::{ProcessRunner, TokioProcessRunner};
pub use types::*;
