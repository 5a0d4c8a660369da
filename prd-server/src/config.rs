//! Server configuration: command-line flags with environment fallbacks.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use prd_agents::{CallOptions, ReasoningEffort, StepFailurePolicy};

pub const DEFAULT_BASE_URL: &str = "https://api.cerebras.ai/v1";
pub const DEFAULT_MODEL: &str = "gpt-oss-120b";

#[derive(Debug, Clone, Parser)]
#[command(name = "prd-server", about = "Generate PRDs, stack advice and roadmaps from a product idea")]
pub struct ServerConfig {
    /// Address to bind.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// Directory generated documents are written to and served from.
    #[arg(long, env = "OUTPUT_DIR", default_value = "outputs")]
    pub output_dir: PathBuf,

    /// Provider API key. Without one the crew is not started.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Legacy variable name for the provider key.
    #[arg(long, env = "CEREBRAS_API_KEY", hide = true, hide_env_values = true)]
    pub cerebras_api_key: Option<String>,

    /// OpenAI-compatible API base URL.
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    #[arg(long, env = "MODEL_NAME", default_value = DEFAULT_MODEL)]
    pub model: String,

    #[arg(long, default_value_t = 0.7)]
    pub temperature: f32,

    #[arg(long, default_value_t = 4096)]
    pub max_tokens: u32,

    /// low, medium or high.
    #[arg(long, env = "REASONING_EFFORT", default_value = "medium")]
    pub reasoning_effort: ReasoningEffort,

    #[arg(long, default_value_t = 300)]
    pub request_timeout_secs: u64,

    /// TOML file with agents and steps (built-in crew if unset).
    #[arg(long, env = "PRD_PIPELINE_CONFIG")]
    pub pipeline_config: Option<PathBuf>,

    /// What to do when a step fails twice: abort or degrade.
    #[arg(long, env = "PRD_STEP_FAILURE", default_value = "abort")]
    pub step_failure: StepFailurePolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            output_dir: PathBuf::from("outputs"),
            api_key: None,
            cerebras_api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            max_tokens: 4096,
            reasoning_effort: ReasoningEffort::Medium,
            request_timeout_secs: 300,
            pipeline_config: None,
            step_failure: StepFailurePolicy::Abort,
        }
    }
}

impl ServerConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The provider key, from either variable. Blank values count as unset.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .iter()
            .chain(self.cerebras_api_key.iter())
            .map(|k| k.trim())
            .find(|k| !k.is_empty())
    }

    pub fn call_options(&self) -> CallOptions {
        CallOptions {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stop: None,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
