//! Tool registry - the closed set of capabilities the model may call
//!
//! Each tool call flows through [`ToolRegistry::dispatch`]:
//!
//! ```text
//! ToolCall { name, arguments }
//!        │
//!   ToolKind::from_name ──unknown──► ToolResult { ok: false, "Error: Unknown tool: .." }
//!        │
//!   serde args ──invalid──► ToolResult { ok: false, "Error: Invalid arguments .." }
//!        │
//!   list_directory / read_text_file / run_source_file
//!        │
//!   Result<String, ToolError> ──► ToolResult { ok, text }
//! ```
//!
//! Handlers never panic across this boundary: every failure becomes text the
//! model can read and react to.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::filesystem::{list_directory, read_text_file};
use crate::metrics::TOOL_CALLS;
use crate::ollama::{FunctionCall, Tool, ToolFunction};
use crate::sandbox::{ExecutionEngine, SandboxError, WorkingDirectory};

/// The three capabilities exposed to the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    ListDirectory,
    ReadTextFile,
    RunSourceFile,
}

impl ToolKind {
    pub const ALL: [ToolKind; 3] = [
        ToolKind::ListDirectory,
        ToolKind::ReadTextFile,
        ToolKind::RunSourceFile,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ToolKind::ListDirectory => "list_directory",
            ToolKind::ReadTextFile => "read_text_file",
            ToolKind::RunSourceFile => "run_source_file",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    fn description(self) -> &'static str {
        match self {
            ToolKind::ListDirectory => {
                "Lists files in the specified directory along with their sizes, constrained to the working directory."
            }
            ToolKind::ReadTextFile => {
                "Gets the content of the given file as a string, constrained to the working directory. Content longer than 10000 characters is truncated."
            }
            ToolKind::RunSourceFile => {
                "Runs a Python, JavaScript, C++ or Java file located inside the working directory. Accepts additional CLI args as an optional array."
            }
        }
    }

    /// JSON Schema for the arguments; kept in step with the `*Args` structs below
    fn parameters(self) -> Value {
        match self {
            ToolKind::ListDirectory => json!({
                "type": "object",
                "properties": {
                    "directory": {
                        "type": "string",
                        "description": "The directory to list files from, relative to the working directory. If not provided, lists files in the working directory itself."
                    }
                }
            }),
            ToolKind::ReadTextFile => json!({
                "type": "object",
                "properties": {
                    "file_path": {
                        "type": "string",
                        "description": "The path to the file, relative to the working directory."
                    }
                },
                "required": ["file_path"]
            }),
            ToolKind::RunSourceFile => json!({
                "type": "object",
                "properties": {
                    "file_path": {
                        "type": "string",
                        "description": "File to run, relative to the working directory."
                    },
                    "args": {
                        "type": "array",
                        "description": "Optional list of CLI arguments.",
                        "items": { "type": "string" }
                    }
                },
                "required": ["file_path"]
            }),
        }
    }

    /// Declaration sent to the model service
    pub fn declaration(self) -> Tool {
        Tool {
            tool_type: "function".to_string(),
            function: ToolFunction {
                name: self.name().to_string(),
                description: self.description().to_string(),
                parameters: self.parameters(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListDirectoryArgs {
    #[serde(default = "current_dir", alias = "dir")]
    directory: String,
}

fn current_dir() -> String {
    ".".to_string()
}

#[derive(Debug, Deserialize)]
struct ReadTextFileArgs {
    file_path: String,
}

#[derive(Debug, Deserialize)]
struct RunSourceFileArgs {
    file_path: String,
    #[serde(default)]
    args: Vec<String>,
}

/// Normalized outcome of one tool call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    pub ok: bool,
    pub text: String,
}

impl ToolResult {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            ok: true,
            text: text.into(),
        }
    }

    pub fn failure(error: &ToolError) -> Self {
        Self {
            ok: false,
            text: format!("Error: {}", error),
        }
    }
}

/// Error type for tool dispatch
#[derive(Debug)]
pub enum ToolError {
    /// The model asked for a tool that is not registered
    UnknownTool(String),
    /// Arguments did not match the tool's schema
    InvalidArguments { tool: &'static str, message: String },
    /// The handler failed inside the sandbox
    Sandbox(SandboxError),
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolError::UnknownTool(name) => write!(f, "Unknown tool: {}", name),
            ToolError::InvalidArguments { tool, message } => {
                write!(f, "Invalid arguments for {}: {}", tool, message)
            }
            ToolError::Sandbox(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ToolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ToolError::Sandbox(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SandboxError> for ToolError {
    fn from(e: SandboxError) -> Self {
        ToolError::Sandbox(e)
    }
}

/// Dispatches tool calls against one working directory
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    root: WorkingDirectory,
    engine: ExecutionEngine,
}

impl ToolRegistry {
    pub fn new(root: WorkingDirectory, engine: ExecutionEngine) -> Self {
        Self { root, engine }
    }

    /// Declarations for every registered tool
    pub fn declarations() -> Vec<Tool> {
        ToolKind::ALL.into_iter().map(ToolKind::declaration).collect()
    }

    /// Run one tool call, never failing
    pub async fn dispatch(&self, call: &FunctionCall) -> ToolResult {
        let result = match self.invoke(&call.name, &call.arguments).await {
            Ok(text) => ToolResult::success(text),
            Err(e) => {
                tracing::warn!(tool = %call.name, error = %e, "Tool call failed");
                ToolResult::failure(&e)
            }
        };

        let status = if result.ok { "ok" } else { "error" };
        TOOL_CALLS
            .with_label_values(&[metric_label(&call.name), status])
            .inc();
        result
    }

    async fn invoke(&self, name: &str, arguments: &Value) -> Result<String, ToolError> {
        let kind = ToolKind::from_name(name).ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        match kind {
            ToolKind::ListDirectory => {
                let args: ListDirectoryArgs = parse_arguments(kind, arguments)?;
                Ok(list_directory(&self.root, &args.directory).await?)
            }
            ToolKind::ReadTextFile => {
                let args: ReadTextFileArgs = parse_arguments(kind, arguments)?;
                Ok(read_text_file(&self.root, &args.file_path).await?)
            }
            ToolKind::RunSourceFile => {
                let args: RunSourceFileArgs = parse_arguments(kind, arguments)?;
                let report = self.engine.run(&self.root, &args.file_path, &args.args).await?;
                Ok(report.into_text()?)
            }
        }
    }
}

/// Metric label for a requested tool; unregistered names share one label
fn metric_label(name: &str) -> &'static str {
    ToolKind::from_name(name).map_or("unknown", ToolKind::name)
}

/// Deserialize tool arguments, accepting a missing object or a JSON-encoded string
fn parse_arguments<T: DeserializeOwned>(kind: ToolKind, arguments: &Value) -> Result<T, ToolError> {
    let invalid = |message: String| ToolError::InvalidArguments {
        tool: kind.name(),
        message,
    };

    let value = match arguments {
        Value::Null => json!({}),
        Value::String(raw) => serde_json::from_str(raw).map_err(|e| invalid(e.to_string()))?,
        other => other.clone(),
    };

    serde_json::from_value(value).map_err(|e| invalid(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::test_support::ScratchDir;

    fn registry(scratch: &ScratchDir) -> ToolRegistry {
        let root = WorkingDirectory::open(scratch.path()).unwrap();
        ToolRegistry::new(root, ExecutionEngine::default())
    }

    fn call(name: &str, arguments: Value) -> FunctionCall {
        FunctionCall {
            name: name.to_string(),
            arguments,
        }
    }

    #[test]
    fn test_declarations_match_tool_kinds() {
        let declarations = ToolRegistry::declarations();
        let names: Vec<&str> = declarations.iter().map(|t| t.function.name.as_str()).collect();
        assert_eq!(names, ["list_directory", "read_text_file", "run_source_file"]);
        for tool in &declarations {
            assert_eq!(tool.tool_type, "function");
            assert_eq!(tool.function.parameters["type"], "object");
        }
        assert_eq!(declarations[1].function.parameters["required"][0], "file_path");
        assert_eq!(
            declarations[2].function.parameters["properties"]["args"]["items"]["type"],
            "string"
        );
    }

    #[test]
    fn test_from_name_round_trips() {
        for kind in ToolKind::ALL {
            assert_eq!(ToolKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(ToolKind::from_name("get_file"), None);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_a_result() {
        let scratch = ScratchDir::new("cb_registry");
        let result = registry(&scratch).dispatch(&call("delete_everything", json!({}))).await;
        assert!(!result.ok);
        assert_eq!(result.text, "Error: Unknown tool: delete_everything");
    }

    #[tokio::test]
    async fn test_unknown_tool_metric_label_is_bounded() {
        let scratch = ScratchDir::new("cb_registry");
        let before = TOOL_CALLS.with_label_values(&["unknown", "error"]).get();

        registry(&scratch)
            .dispatch(&call("zz_made_up_tool", json!({})))
            .await;

        assert!(TOOL_CALLS.with_label_values(&["unknown", "error"]).get() >= before + 1.0);
        assert!(!crate::metrics::gather_text().contains("zz_made_up_tool"));
        assert_eq!(metric_label("read_text_file"), "read_text_file");
    }

    #[tokio::test]
    async fn test_invalid_arguments_are_a_result() {
        let scratch = ScratchDir::new("cb_registry");
        let reg = registry(&scratch);

        let result = reg.dispatch(&call("read_text_file", json!({}))).await;
        assert!(!result.ok);
        assert!(result.text.starts_with("Error: Invalid arguments for read_text_file"));

        let result = reg
            .dispatch(&call("run_source_file", json!({"file_path": "a.py", "args": "oops"})))
            .await;
        assert!(!result.ok);
    }

    #[tokio::test]
    async fn test_list_directory_defaults_and_aliases() {
        let scratch = ScratchDir::new("cb_registry");
        scratch.write("hello.py", "print('hello')\n");
        scratch.write("sub/inner.txt", "x");
        let reg = registry(&scratch);

        let result = reg.dispatch(&call("list_directory", Value::Null)).await;
        assert!(result.ok);
        assert!(result.text.contains("- hello.py: file_size=15 bytes, is_dir=false"));

        let result = reg.dispatch(&call("list_directory", json!({"dir": "sub"}))).await;
        assert!(result.ok);
        assert!(result.text.contains("inner.txt"));
    }

    #[tokio::test]
    async fn test_arguments_as_json_string() {
        let scratch = ScratchDir::new("cb_registry");
        scratch.write("notes.txt", "remember the milk");
        let reg = registry(&scratch);

        let result = reg
            .dispatch(&call("read_text_file", json!("{\"file_path\": \"notes.txt\"}")))
            .await;
        assert_eq!(result, ToolResult::success("remember the milk"));
    }

    #[tokio::test]
    async fn test_sandbox_errors_render_as_text() {
        let scratch = ScratchDir::new("cb_registry");
        scratch.write("main.rb", "puts 1");
        let reg = registry(&scratch);

        let result = reg
            .dispatch(&call("read_text_file", json!({"file_path": "../../etc/passwd"})))
            .await;
        assert!(!result.ok);
        assert_eq!(
            result.text,
            "Error: \"../../etc/passwd\" is outside the working directory"
        );

        let result = reg
            .dispatch(&call("run_source_file", json!({"file_path": "main.rb"})))
            .await;
        assert!(!result.ok);
        assert_eq!(result.text, "Error: unsupported file type \".rb\"");
    }
}
