// MCP (Model Context Protocol) server exposing wolframscript as tools
// to agent clients (Claude Desktop, IDE assistants, etc.)

pub mod config;
pub mod logging;
pub mod protocol;
pub mod server;
pub mod tools;

pub use config::McpConfig;
pub use server::McpServer;
