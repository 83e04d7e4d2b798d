//! Agent Controller - bounded tool-calling loop
//!
//! The AgentController mediates between the model service and the tool
//! registry, feeding every tool result back into the conversation until the
//! model answers in plain text or the round budget runs out.
//!
//! # State Machine
//!
//! ```text
//!            ┌──────────────────────────────────────────┐
//!            ▼                                          │
//!   Awaiting-Model ──tool calls──► Dispatching-Tools ───┘
//!            │                     (sequential, in emission order)
//!            │ no tool calls
//!            ▼
//!          Done ◄── budget exhausted (IterationLimitExceeded)
//! ```

use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::metrics::{AGENT_ITERATIONS, AGENT_SESSIONS, MODEL_CALL_DURATION};
use crate::ollama::{
    parse_tool_calls_from_text, ChatError, ChatMessage, ChatModel, FunctionCall,
    DEFAULT_AGENT_SYSTEM_PROMPT,
};
use crate::sandbox::{ExecutionConfig, ExecutionEngine, WorkingDirectory};
use crate::tools::ToolRegistry;

/// Default round budget per session
pub const DEFAULT_MAX_ITERATIONS: usize = 20;

/// Configuration for the agent controller
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Model to use for Ollama (e.g., "qwen3")
    pub model: String,
    /// Maximum number of rounds (model calls) before stopping
    pub max_iterations: usize,
    /// Custom system prompt (uses default if None)
    pub system_prompt: Option<String>,
    /// Settings for `run_source_file`
    pub execution: ExecutionConfig,
    /// Log tool call arguments and report token counts
    pub verbose: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "qwen3".to_string(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            system_prompt: None,
            execution: ExecutionConfig::default(),
            verbose: false,
        }
    }
}

impl AgentConfig {
    /// Build a config from environment variables, defaulting anything unset
    ///
    /// - `CODEBUDDY_MODEL`
    /// - `CODEBUDDY_MAX_ITERATIONS`
    /// - `CODEBUDDY_EXEC_TIMEOUT_SECS`
    /// - `CODEBUDDY_CLEANUP_ARTIFACTS` (`1` / `true`)
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(model) = std::env::var("CODEBUDDY_MODEL") {
            config.model = model;
        }
        if let Some(max) = env_parse::<usize>("CODEBUDDY_MAX_ITERATIONS").filter(|n| *n > 0) {
            config.max_iterations = max;
        }
        if let Some(secs) = env_parse::<u64>("CODEBUDDY_EXEC_TIMEOUT_SECS").filter(|n| *n > 0) {
            config.execution.timeout = std::time::Duration::from_secs(secs);
        }
        if let Ok(flag) = std::env::var("CODEBUDDY_CLEANUP_ARTIFACTS") {
            config.execution.cleanup_artifacts = matches!(flag.as_str(), "1" | "true" | "yes");
        }

        config
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring unparsable environment variable");
            None
        }
    }
}

/// Token accounting for the last model call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenCounts {
    pub prompt_tokens: u32,
    pub response_tokens: u32,
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentOutcome {
    /// The model answered without requesting tools
    Completed { final_response: String },
    /// Every round requested tools and the budget ran out
    IterationLimitExceeded,
}

/// Result of an agent run
#[derive(Debug, Clone)]
pub struct AgentResult {
    pub outcome: AgentOutcome,
    /// Number of rounds (model calls) made
    pub iterations: usize,
    /// Every tool call requested, in dispatch order
    pub function_calls: Vec<FunctionCall>,
    /// Unique trace ID for this agent run
    pub trace_id: String,
    /// Duration of the first model call in milliseconds (includes model load time)
    pub model_load_time_ms: Option<f64>,
    /// Token counts of the last model call, when reported
    pub token_counts: Option<TokenCounts>,
}

impl AgentResult {
    pub fn final_response(&self) -> Option<&str> {
        match &self.outcome {
            AgentOutcome::Completed { final_response } => Some(final_response),
            AgentOutcome::IterationLimitExceeded => None,
        }
    }
}

/// Error type for agent operations
#[derive(Debug)]
pub enum AgentError {
    /// The working directory does not exist or is not a directory
    WorkingDirectory(String),
    /// The model service failed or returned a malformed/empty reply
    Model(ChatError),
}

impl std::fmt::Display for AgentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentError::WorkingDirectory(msg) => write!(f, "Invalid working directory: {}", msg),
            AgentError::Model(e) => write!(f, "Model error: {}", e),
        }
    }
}

impl std::error::Error for AgentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AgentError::Model(e) => Some(e),
            AgentError::WorkingDirectory(_) => None,
        }
    }
}

impl From<ChatError> for AgentError {
    fn from(e: ChatError) -> Self {
        AgentError::Model(e)
    }
}

/// Agent Controller orchestrating the model and the tool registry
pub struct AgentController<M> {
    chat_client: M,
    config: AgentConfig,
}

impl<M: ChatModel> AgentController<M> {
    /// Create a new agent controller
    ///
    /// # Arguments
    /// * `chat_client` - Model service for chat turns
    /// * `config` - Agent configuration
    pub fn new(chat_client: M, config: AgentConfig) -> Self {
        Self {
            chat_client,
            config,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn chat_client(&self) -> &M {
        &self.chat_client
    }

    /// Run the agent loop for a task using the configured verbosity
    pub async fn run(&self, task: &str, root: &WorkingDirectory) -> Result<AgentResult, AgentError> {
        self.run_with(task, root, self.config.verbose).await
    }

    /// Run the agent loop for a task
    ///
    /// # Arguments
    /// * `task` - The user's request; seeds the conversation
    /// * `root` - Working directory every tool call is confined to
    /// * `verbose` - Log tool call arguments and report token counts
    ///
    /// # Returns
    /// AgentResult with either the final answer or `IterationLimitExceeded`,
    /// plus the tool calls made. Model failures are terminal errors.
    pub async fn run_with(
        &self,
        task: &str,
        root: &WorkingDirectory,
        verbose: bool,
    ) -> Result<AgentResult, AgentError> {
        let trace_id = Uuid::now_v7().to_string();

        let root_span = info_span!(
            "agent_session",
            trace_id = %trace_id,
            model = %self.config.model,
            root = %root.path().display(),
            otel.name = "agent_session"
        );

        let result = self
            .drive(task, root, verbose, &trace_id)
            .instrument(root_span)
            .await;

        let outcome_label = match &result {
            Ok(r) if r.final_response().is_some() => "success",
            Ok(_) => "iteration_limit",
            Err(_) => "model_error",
        };
        AGENT_SESSIONS.with_label_values(&[outcome_label]).inc();
        if let Ok(r) = &result {
            AGENT_ITERATIONS.observe(r.iterations as f64);
        }

        result
    }

    async fn drive(
        &self,
        task: &str,
        root: &WorkingDirectory,
        verbose: bool,
        trace_id: &str,
    ) -> Result<AgentResult, AgentError> {
        info!(trace_id = %trace_id, task = %task, "Starting agent task");

        let registry = ToolRegistry::new(
            root.clone(),
            ExecutionEngine::new(self.config.execution.clone()),
        );
        let tools = ToolRegistry::declarations();

        let system_prompt = ChatMessage::system(
            self.config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_AGENT_SYSTEM_PROMPT.to_string()),
        );

        // Owned by this run only; dropped when the loop ends.
        let mut conversation = vec![ChatMessage::user(task)];

        let mut function_calls = Vec::new();
        let mut model_load_time_ms: Option<f64> = None;
        let mut token_counts = None;

        for iteration in 1..=self.config.max_iterations {
            let llm_span = info_span!(
                "model_call",
                trace_id = %trace_id,
                iteration,
                model = %self.config.model,
                otel.name = "model_call"
            );

            let mut request = Vec::with_capacity(conversation.len() + 1);
            request.push(system_prompt.clone());
            request.extend(conversation.iter().cloned());

            let call_start = Instant::now();
            let response = self
                .chat_client
                .chat(request, &self.config.model, Some(tools.clone()))
                .instrument(llm_span)
                .await
                .map_err(|e| {
                    warn!(trace_id = %trace_id, iteration, error = %e, "Model call failed");
                    AgentError::Model(e)
                })?;

            let call_duration_ms = call_start.elapsed().as_secs_f64() * 1000.0;
            MODEL_CALL_DURATION
                .with_label_values(&[self.config.model.as_str()])
                .observe(call_duration_ms / 1000.0);
            if iteration == 1 {
                model_load_time_ms = Some(call_duration_ms);
            }

            token_counts = Some(TokenCounts {
                prompt_tokens: response.prompt_eval_count,
                response_tokens: response.eval_count,
            });
            if verbose {
                info!(
                    trace_id = %trace_id,
                    iteration,
                    duration_ms = call_duration_ms,
                    prompt_tokens = response.prompt_eval_count,
                    response_tokens = response.eval_count,
                    "Model call completed"
                );
            } else {
                debug!(trace_id = %trace_id, iteration, duration_ms = call_duration_ms, "Model call completed");
            }

            let message = response.message;

            // Native tool calls first, then JSON written into the text
            let tool_calls = message
                .tool_calls
                .clone()
                .filter(|tc| !tc.is_empty())
                .unwrap_or_else(|| parse_tool_calls_from_text(&message.content));

            if tool_calls.is_empty() {
                if message.content.trim().is_empty() {
                    warn!(trace_id = %trace_id, iteration, "Model returned an empty turn");
                    return Err(AgentError::Model(ChatError::EmptyResponse));
                }

                info!(
                    trace_id = %trace_id,
                    iterations = iteration,
                    tool_calls = function_calls.len(),
                    "Agent task completed"
                );
                return Ok(AgentResult {
                    outcome: AgentOutcome::Completed {
                        final_response: message.content,
                    },
                    iterations: iteration,
                    function_calls,
                    trace_id: trace_id.to_string(),
                    model_load_time_ms,
                    token_counts,
                });
            }

            conversation.push(ChatMessage::assistant_with_tool_calls(
                message.content,
                tool_calls.clone(),
            ));

            for tool_call in tool_calls {
                let call = tool_call.function;

                if verbose {
                    info!(trace_id = %trace_id, tool = %call.name, args = %call.arguments, "Calling tool");
                } else {
                    info!(trace_id = %trace_id, tool = %call.name, "Calling tool");
                }

                let tool_span = info_span!(
                    "tool_call",
                    trace_id = %trace_id,
                    tool = %call.name,
                    otel.name = "tool_call"
                );
                let result = registry.dispatch(&call).instrument(tool_span).await;
                debug!(trace_id = %trace_id, tool = %call.name, ok = result.ok, "Tool call finished");

                conversation.push(ChatMessage::tool(call.name.clone(), result.text));
                function_calls.push(call);
            }
        }

        warn!(
            trace_id = %trace_id,
            iterations = self.config.max_iterations,
            tool_calls = function_calls.len(),
            "Max iterations reached"
        );

        Ok(AgentResult {
            outcome: AgentOutcome::IterationLimitExceeded,
            iterations: self.config.max_iterations,
            function_calls,
            trace_id: trace_id.to_string(),
            model_load_time_ms,
            token_counts,
        })
    }
}
