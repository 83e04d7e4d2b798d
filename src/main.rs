//! codebuddy - ask a local model to explore and run code in one directory
//!
//! Usage: codebuddy [--verbose] [--json] [--metrics] <working_directory> <prompt...>

use std::env;
use std::process;

use codebuddy::agent::{run_session, AgentConfig, AgentController, SessionRequest};
use codebuddy::metrics::gather_text;
use codebuddy::ollama::ChatClient;
use codebuddy::tracing::{init_tracing, shutdown_tracing, OTLP_ENDPOINT_ENV};

const USAGE: &str = "Usage: codebuddy [--verbose] [--json] [--metrics] <working_directory> <prompt...>";

struct CliArgs {
    verbose: bool,
    json: bool,
    metrics: bool,
    working_directory: String,
    prompt: String,
}

fn parse_args(args: impl Iterator<Item = String>) -> Result<CliArgs, String> {
    let mut verbose = false;
    let mut json = false;
    let mut metrics = false;
    let mut positional = Vec::new();

    for arg in args {
        match arg.as_str() {
            "--verbose" | "-v" => verbose = true,
            "--json" => json = true,
            "--metrics" => metrics = true,
            "--help" | "-h" => return Err(USAGE.to_string()),
            flag if flag.starts_with("--") => return Err(format!("Unknown flag: {}\n{}", flag, USAGE)),
            other => positional.push(other.to_string()),
        }
    }

    if positional.len() < 2 {
        return Err(USAGE.to_string());
    }
    let working_directory = positional.remove(0);

    Ok(CliArgs {
        verbose,
        json,
        metrics,
        working_directory,
        prompt: positional.join(" "),
    })
}

#[tokio::main]
async fn main() {
    let cli = match parse_args(env::args().skip(1)) {
        Ok(cli) => cli,
        Err(message) => {
            eprintln!("{}", message);
            process::exit(2);
        }
    };

    let otlp_endpoint = env::var(OTLP_ENDPOINT_ENV).ok();
    if let Err(e) = init_tracing("codebuddy", otlp_endpoint.as_deref()) {
        eprintln!("Failed to initialize tracing: {}", e);
    }

    let config = AgentConfig::from_env();
    let controller = AgentController::new(ChatClient::from_env(), config);

    let mut request = SessionRequest::new(cli.prompt, cli.working_directory);
    request.verbose = cli.verbose;

    let result = run_session(&controller, &request).await;

    if cli.json {
        match serde_json::to_string_pretty(&result) {
            Ok(body) => println!("{}", body),
            Err(e) => eprintln!("Failed to serialize result: {}", e),
        }
    } else {
        if cli.verbose {
            for call in &result.function_calls {
                println!(" - Calling function: {}({})", call.name, call.args);
            }
        }
        if let Some(response) = &result.final_response {
            println!("{}", response);
        }
        if let Some(error) = &result.error {
            eprintln!("Error: {}", error);
        }
        if let Some(tokens) = &result.token_counts {
            println!("Prompt tokens: {}", tokens.prompt_tokens);
            println!("Response tokens: {}", tokens.response_tokens);
        }
    }

    if cli.metrics {
        eprint!("{}", gather_text());
    }

    shutdown_tracing();
    process::exit(if result.success { 0 } else { 1 });
}
