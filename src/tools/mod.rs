//! Tool layer exposed to the model
//!
//! - `filesystem` - `list_directory` and `read_text_file` handlers
//! - `registry` - tool declarations and the dispatcher

pub mod filesystem;
pub mod registry;

pub use filesystem::{list_directory, read_text_file, MAX_READ_CHARS};
pub use registry::{ToolError, ToolKind, ToolRegistry, ToolResult};
