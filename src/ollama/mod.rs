//! Ollama LLM integration module
//!
//! This module provides the model service the agent loop talks to:
//! chat messages, tool declarations, and tool calls for Ollama's
//! `/api/chat` endpoint.

pub mod tool_use;

// Re-export public types from the tool_use module
pub use tool_use::{
    parse_tool_calls_from_text, ChatClient, ChatError, ChatMessage, ChatModel, ChatResponse,
    FunctionCall, Tool, ToolCall, ToolFunction, DEFAULT_AGENT_SYSTEM_PROMPT, DEFAULT_OLLAMA_URL,
};
