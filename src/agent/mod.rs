//! Agent module for LLM-driven code exploration and execution
//!
//! This module provides the agent loop that orchestrates:
//! - Ollama LLM with tool calling (/api/chat)
//! - The tool registry, confined to one working directory
//! - Source execution with a hard timeout
//!
//! # Architecture
//!
//! ```text
//! SessionRequest → run_session → WorkingDirectory::open
//!                      ↓
//!               AgentController → Ollama /api/chat (with tools)
//!                      ↓
//!           Tool Call: list_directory / read_text_file / run_source_file
//!                      ↓
//!               ToolRegistry.dispatch() → PathGuard → handler
//!                      ↓
//!           Feed result back to Ollama → Loop or Complete
//!                      ↓
//!               SessionResult (camelCase JSON)
//! ```

pub mod controller;
pub mod session;

pub use controller::{
    AgentConfig, AgentController, AgentError, AgentOutcome, AgentResult, TokenCounts,
    DEFAULT_MAX_ITERATIONS,
};
pub use session::{run_session, FunctionCallRecord, SessionRequest, SessionResult};
