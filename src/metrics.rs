//! Prometheus metrics for agent sessions and sandboxed execution
//!
//! All metrics live in the default prometheus registry and can be rendered
//! with [`gather_text`].

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram, register_histogram_vec, CounterVec, Encoder,
    Histogram, HistogramVec, TextEncoder,
};

lazy_static! {
    // ─────────────────────────────────────────────────────────────────────────────
    // Agent Loop Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Finished agent sessions by outcome.
    ///
    /// Labels:
    /// - outcome: "success", "iteration_limit", "model_error"
    pub static ref AGENT_SESSIONS: CounterVec = register_counter_vec!(
        "codebuddy_sessions_total",
        "Agent sessions finished, by outcome",
        &["outcome"]
    ).expect("failed to register AGENT_SESSIONS metric");

    /// Model rounds used per session.
    pub static ref AGENT_ITERATIONS: Histogram = register_histogram!(
        "codebuddy_session_iterations",
        "Model rounds used per agent session",
        vec![1.0, 2.0, 3.0, 5.0, 8.0, 13.0, 20.0]
    ).expect("failed to register AGENT_ITERATIONS metric");

    /// Tool calls dispatched through the registry.
    ///
    /// Labels:
    /// - tool: tool name as requested by the model
    /// - status: "ok" or "error"
    pub static ref TOOL_CALLS: CounterVec = register_counter_vec!(
        "codebuddy_tool_calls_total",
        "Tool calls dispatched, by tool and status",
        &["tool", "status"]
    ).expect("failed to register TOOL_CALLS metric");

    /// Latency of model service calls.
    pub static ref MODEL_CALL_DURATION: HistogramVec = register_histogram_vec!(
        "codebuddy_model_call_duration_seconds",
        "Latency of chat calls to the model service",
        &["model"]
    ).expect("failed to register MODEL_CALL_DURATION metric");

    // ─────────────────────────────────────────────────────────────────────────────
    // Execution Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Source file executions.
    ///
    /// Labels:
    /// - language: "python", "javascript", "cpp", "java"
    /// - status: "success", "error", "timeout", "compile_error"
    pub static ref EXECUTIONS_TOTAL: CounterVec = register_counter_vec!(
        "codebuddy_executions_total",
        "Source file executions, by language and status",
        &["language", "status"]
    ).expect("failed to register EXECUTIONS_TOTAL metric");

    /// Wall-clock time of executions, compile step included.
    pub static ref EXECUTION_DURATION: HistogramVec = register_histogram_vec!(
        "codebuddy_execution_duration_seconds",
        "Wall-clock duration of source file executions",
        &["language"],
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    ).expect("failed to register EXECUTION_DURATION metric");
}

/// Render every registered metric in the Prometheus text format
pub fn gather_text() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_includes_touched_metrics() {
        TOOL_CALLS.with_label_values(&["list_directory", "ok"]).inc();
        let text = gather_text();
        assert!(text.contains("codebuddy_tool_calls_total"));
    }
}
