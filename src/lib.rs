//! codebuddy - a bounded tool-calling coding agent over one working directory
//!
//! A local model (Ollama) is given three tools and a directory. It may list,
//! read and run source files inside that directory, and nowhere else.
//!
//! # Modules
//!
//! - `sandbox` - working directory confinement and timed source execution
//! - `tools` - the closed tool set and its dispatcher
//! - `ollama` - chat wire types and the Ollama `/api/chat` client
//! - `agent` - the bounded agent loop and the session boundary
//! - `metrics` - Prometheus metrics for observability
//! - `tracing` - structured logging with optional OTLP export
//!
//! # Quick Start
//!
//! ```ignore
//! use codebuddy::{run_session, AgentConfig, AgentController, ChatClient, SessionRequest};
//!
//! let controller = AgentController::new(ChatClient::from_env(), AgentConfig::default());
//! let request = SessionRequest::new("What does main.py print?", "/path/to/project");
//! let result = run_session(&controller, &request).await;
//! ```

pub mod agent;
pub mod metrics;
pub mod ollama;
pub mod sandbox;
pub mod tools;
pub mod tracing;

// Re-export commonly used types at crate root for convenience
pub use agent::{
    run_session, AgentConfig, AgentController, AgentError, AgentOutcome, AgentResult,
    SessionRequest, SessionResult,
};
pub use ollama::{ChatClient, ChatModel};
pub use sandbox::{ExecutionEngine, SandboxError, WorkingDirectory};
pub use tools::ToolRegistry;
