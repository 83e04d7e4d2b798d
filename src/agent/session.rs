//! Session boundary - one request in, one structured result out
//!
//! A session validates the working directory, runs the agent loop against it,
//! and folds every outcome (including failures) into a [`SessionResult`] that
//! serializes to the camelCase JSON shape callers consume.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::controller::{AgentController, AgentError, AgentOutcome, TokenCounts};
use crate::ollama::{ChatModel, FunctionCall};
use crate::sandbox::WorkingDirectory;

/// Incoming session request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub prompt: String,
    #[serde(alias = "working_directory")]
    pub working_directory: PathBuf,
    #[serde(default)]
    pub verbose: bool,
}

impl SessionRequest {
    pub fn new(prompt: impl Into<String>, working_directory: impl Into<PathBuf>) -> Self {
        Self {
            prompt: prompt.into(),
            working_directory: working_directory.into(),
            verbose: false,
        }
    }
}

/// One tool call as reported back to the caller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionCallRecord {
    pub name: String,
    pub args: serde_json::Value,
}

impl From<FunctionCall> for FunctionCallRecord {
    fn from(call: FunctionCall) -> Self {
        Self {
            name: call.name,
            args: call.arguments,
        }
    }
}

/// Outcome of a session
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_response: Option<String>,
    pub function_calls: Vec<FunctionCallRecord>,
    pub total_iterations: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The working directory exactly as requested
    pub working_directory: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_counts: Option<TokenCounts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

impl SessionResult {
    fn failed(working_directory: String, error: impl Into<String>) -> Self {
        Self {
            success: false,
            final_response: None,
            function_calls: Vec::new(),
            total_iterations: 0,
            error: Some(error.into()),
            working_directory,
            token_counts: None,
            trace_id: None,
        }
    }
}

/// Run one session end to end
///
/// Never fails: invalid input, model errors and the round budget running out
/// are all reported through `success = false` and `error`.
pub async fn run_session<M: ChatModel>(
    controller: &AgentController<M>,
    request: &SessionRequest,
) -> SessionResult {
    let display_dir = request.working_directory.display().to_string();

    if request.prompt.trim().is_empty() {
        return SessionResult::failed(display_dir, "Prompt is required");
    }

    let root = match WorkingDirectory::open(&request.working_directory) {
        Ok(root) => root,
        Err(e) => {
            let err = AgentError::WorkingDirectory(format!("{}: {}", display_dir, e));
            warn!(error = %err, "Rejecting session");
            return SessionResult::failed(display_dir, err.to_string());
        }
    };
    let canonical_root = root.path().display().to_string();

    match root.summary() {
        Ok(summary) => info!(
            root = %canonical_root,
            files = summary.file_count,
            dirs = summary.dir_count,
            "Opened working directory"
        ),
        Err(e) => warn!(root = %canonical_root, error = %e, "Could not summarize working directory"),
    }

    let verbose = request.verbose || controller.config().verbose;

    match controller.run_with(&request.prompt, &root, verbose).await {
        Ok(result) => {
            let token_counts = if verbose { result.token_counts } else { None };
            let function_calls = result
                .function_calls
                .into_iter()
                .map(FunctionCallRecord::from)
                .collect();

            let (success, final_response, error) = match result.outcome {
                AgentOutcome::Completed { final_response } => (true, Some(final_response), None),
                AgentOutcome::IterationLimitExceeded => {
                    (false, None, Some("Maximum iterations reached".to_string()))
                }
            };

            SessionResult {
                success,
                final_response,
                function_calls,
                total_iterations: result.iterations,
                error,
                working_directory: display_dir,
                token_counts,
                trace_id: Some(result.trace_id),
            }
        }
        Err(e) => SessionResult::failed(display_dir, e.to_string()),
    }
}
