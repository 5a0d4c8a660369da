//! prd-agents: a sequential agent crew that turns a product idea into documents.
//!
//! - LLM adapter over an OpenAI-compatible chat-completions endpoint
//! - Template tools (PRD skeleton, tech-stack advice, development guide)
//! - Pipeline configuration and the crew that runs it
//! - Artifact store for the generated Markdown files

pub mod agents;
pub mod artifacts;
pub mod crew;
pub mod llm;
pub mod tools;

pub use agents::Agent;
pub use artifacts::{ArtifactError, ArtifactInfo, ArtifactStore};
pub use crew::{
    ConfigError, Crew, CrewError, CrewOutput, GenerationRequest, Pipeline, RunState,
    StepFailurePolicy, StepOutput,
};
pub use llm::{CallOptions, ChatBackend, LlmAdapter, LlmClient, LlmError, Message, ReasoningEffort};
pub use tools::{Tool, ToolError};
