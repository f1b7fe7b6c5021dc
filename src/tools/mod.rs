//! Tools invoked by `.cmd` statements and by model tool calls.

pub mod arguments;
pub mod builtin;
pub mod registry;
pub mod tool;
pub mod types;

pub use arguments::ToolArguments;
pub use registry::{ToolDispatch, ToolRegistry, ToolSchemas};
pub use tool::{FnTool, Tool};
pub use types::ToolParameters;
