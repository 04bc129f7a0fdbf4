pub mod interpreter;
mod registry;

pub use interpreter::{register_interpreter_tools, InterpreterTool};
pub use registry::{json_schema_object, json_schema_string, Tool, ToolRegistry};
