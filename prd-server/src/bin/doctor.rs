//! Provider connectivity check.
//!
//! Prints which provider variables are set, then sends one short chat
//! completion through the same client the server uses.
//!
//! Usage:
//!   OPENAI_API_KEY=... cargo run --bin prd-doctor
//!   cargo run --bin prd-doctor -- --base-url https://api.openai.com/v1 --model gpt-4o-mini

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::Parser;
use prd_agents::{CallOptions, LlmAdapter, LlmClient, Message, ReasoningEffort};
use prd_server::config::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "prd-doctor", about = "Check the LLM provider configuration")]
struct Args {
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[arg(long, env = "CEREBRAS_API_KEY", hide = true, hide_env_values = true)]
    cerebras_api_key: Option<String>,

    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    #[arg(long, env = "MODEL_NAME", default_value = DEFAULT_MODEL)]
    model: String,

    #[arg(long, env = "REASONING_EFFORT")]
    reasoning_effort: Option<ReasoningEffort>,

    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,
}

/// Show only the last four characters of a secret.
fn mask(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{tail}", "*".repeat(8))
}

fn show(name: &str, value: Option<&str>) {
    let state = if value.is_some_and(|v| !v.trim().is_empty()) { "set" } else { "not set" };
    println!("  {name:<18} {state}");
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "prd_agents=info".into()),
        )
        .init();

    let args = Args::parse();
    let key = args
        .api_key
        .as_deref()
        .or(args.cerebras_api_key.as_deref())
        .map(str::trim)
        .filter(|k| !k.is_empty());

    println!("Provider configuration:");
    match key {
        Some(k) => println!("  {:<18} {}", "API key", mask(k)),
        None => println!("  {:<18} not set", "API key"),
    }
    show("OPENAI_API_KEY", args.api_key.as_deref());
    show("CEREBRAS_API_KEY", args.cerebras_api_key.as_deref());

    let Some(key) = key else {
        println!("  {:<18} {}", "Base URL", args.base_url);
        bail!("no API key: set OPENAI_API_KEY (or CEREBRAS_API_KEY)");
    };

    let client = LlmClient::new(key.to_string(), &args.base_url)
        .with_timeout(Duration::from_secs(args.timeout_secs))?;
    println!("  {:<18} {}/chat/completions", "Endpoint", client.base_url());
    let llm = LlmAdapter::new(Arc::new(client), args.model.clone())
        .with_reasoning_effort(args.reasoning_effort);
    println!("  {:<18} {}", "Model", llm.model());

    let messages = [
        Message::system("You are a connectivity check. Answer in one short sentence."),
        Message::user("Reply with the word OK and nothing else."),
    ];
    let options = CallOptions {
        max_tokens: 64,
        ..CallOptions::default()
    };

    println!("\nSending test completion...");
    let started = Instant::now();
    let reply = llm
        .try_send(&messages, &options)
        .await
        .context("test completion failed")?;
    println!("  OK in {:.2?}: {}", started.elapsed(), reply.trim());
    Ok(())
}
