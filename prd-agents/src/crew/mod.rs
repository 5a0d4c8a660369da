//! The crew: runs a validated pipeline step by step through the LLM adapter.
//!
//! Runs are serialized. The output directory is one shared workspace, so a
//! second request waits for the first to finish instead of interleaving
//! writes; the files on disk always come from a single run.

pub mod config;

use std::fmt;

use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::{Mutex, RwLock};

use crate::agents::Agent;
use crate::artifacts::{ArtifactError, ArtifactStore};
use crate::llm::{LlmAdapter, LlmError, Message};
use crate::tools::Tool;

pub use config::{ConfigError, Pipeline, PipelineConfig, Step};

/// One generation request. Built per call, never stored on the crew.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    pub idea_description: String,
    pub timestamp: String,
    pub session_id: String,
}

impl GenerationRequest {
    /// Replace `{idea_description}`, `{timestamp}` and `{session_id}` in one
    /// pass. Substituted text is never scanned again; unknown `{...}` stays.
    pub fn interpolate(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let tail = &rest[open..];
            let value = tail.find('}').and_then(|close| {
                let value = match &tail[1..close] {
                    "idea_description" => &self.idea_description,
                    "timestamp" => &self.timestamp,
                    "session_id" => &self.session_id,
                    _ => return None,
                };
                Some((value, close))
            });
            match value {
                Some((value, close)) => {
                    out.push_str(value);
                    rest = &tail[close + 1..];
                }
                None => {
                    out.push('{');
                    rest = &tail[1..];
                }
            }
        }
        out.push_str(rest);
        out
    }

    /// Short project name taken from the first words of the idea.
    pub fn project_name(&self) -> String {
        let words: Vec<&str> = self.idea_description.split_whitespace().take(6).collect();
        if words.is_empty() {
            "Untitled Project".to_string()
        } else {
            words.join(" ")
        }
    }

    /// Date part of the timestamp when it looks like ISO-8601.
    fn date(&self) -> Option<&str> {
        let date = self.timestamp.get(..10)?;
        chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
        Some(date)
    }
}

/// What to do when a step still fails after its retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepFailurePolicy {
    /// Fail the whole run; later steps do not run.
    #[default]
    Abort,
    /// Record the step as degraded and keep going.
    Degrade,
}

impl fmt::Display for StepFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepFailurePolicy::Abort => write!(f, "abort"),
            StepFailurePolicy::Degrade => write!(f, "degrade"),
        }
    }
}

impl std::str::FromStr for StepFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "abort" => Ok(StepFailurePolicy::Abort),
            "degrade" => Ok(StepFailurePolicy::Degrade),
            other => Err(format!("unknown step failure policy '{other}' (expected abort or degrade)")),
        }
    }
}

/// Crew run state. Steps are numbered from 1.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    Created,
    Running {
        step: usize,
        #[serde(rename = "step_name")]
        name: String,
    },
    Completed,
    Failed {
        step: usize,
        #[serde(rename = "step_name")]
        name: String,
        message: String,
    },
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Created => write!(f, "created"),
            RunState::Running { step, name } => write!(f, "running step {step} ({name})"),
            RunState::Completed => write!(f, "completed"),
            RunState::Failed { step, name, message } => {
                write!(f, "failed at step {step} ({name}): {message}")
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CrewError {
    #[error("step '{step}' failed: {source}")]
    Step {
        step: String,
        #[source]
        source: LlmError,
    },
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

/// Result of one completed step.
#[derive(Debug, Clone, Serialize)]
pub struct StepOutput {
    pub name: String,
    pub agent: String,
    pub text: String,
    pub output_file: Option<String>,
}

/// Result of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct CrewOutput {
    pub session_id: String,
    /// Text of the last step that produced output.
    pub raw: String,
    pub steps: Vec<StepOutput>,
    pub artifacts: Vec<String>,
    pub degraded_steps: Vec<String>,
}

impl CrewOutput {
    /// One-paragraph summary for API responses.
    pub fn summary(&self) -> String {
        let mut text = format!(
            "Completed {} step(s) for session {}. Generated: {}.",
            self.steps.len(),
            self.session_id,
            if self.artifacts.is_empty() {
                "no files".to_string()
            } else {
                self.artifacts.join(", ")
            }
        );
        if !self.degraded_steps.is_empty() {
            text.push_str(&format!(" Degraded: {}.", self.degraded_steps.join(", ")));
        }
        text
    }
}

/// Sequential pipeline executor.
pub struct Crew {
    pipeline: Pipeline,
    llm: LlmAdapter,
    store: ArtifactStore,
    policy: StepFailurePolicy,
    state: RwLock<RunState>,
    run_lock: Mutex<()>,
}

impl Crew {
    pub fn new(pipeline: Pipeline, llm: LlmAdapter, store: ArtifactStore) -> Self {
        Self {
            pipeline,
            llm,
            store,
            policy: StepFailurePolicy::default(),
            state: RwLock::new(RunState::Created),
            run_lock: Mutex::new(()),
        }
    }

    pub fn with_failure_policy(mut self, policy: StepFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Current state, or the final state of the last run.
    pub async fn state(&self) -> RunState {
        self.state.read().await.clone()
    }

    async fn set_state(&self, state: RunState) {
        *self.state.write().await = state;
    }

    /// Run every step in order. Waits for any run already in progress.
    pub async fn run(&self, request: &GenerationRequest) -> Result<CrewOutput, CrewError> {
        let _guard = self.run_lock.lock().await;
        tracing::info!(
            session = %request.session_id,
            model = %self.llm.model(),
            steps = self.pipeline.steps().len(),
            "Crew run started"
        );

        let steps = self.pipeline.steps();
        let mut outputs: Vec<Option<String>> = vec![None; steps.len()];
        let mut completed = Vec::new();
        let mut artifacts = Vec::new();
        let mut degraded = Vec::new();

        for (index, step) in steps.iter().enumerate() {
            let agent = self.pipeline.agent_for(step);
            self.set_state(RunState::Running {
                step: index + 1,
                name: step.name.clone(),
            })
            .await;
            tracing::info!(step = %step.name, agent = %agent.role, "Step started");

            let messages = self.step_messages(step, agent, request, &outputs);
            let text = match self.call_with_retry(&step.name, &messages).await {
                Ok(text) => text,
                Err(e) => match self.policy {
                    StepFailurePolicy::Abort => {
                        tracing::error!(step = %step.name, error = %e, "Step failed, aborting run");
                        self.set_state(RunState::Failed {
                            step: index + 1,
                            name: step.name.clone(),
                            message: e.to_string(),
                        })
                        .await;
                        return Err(CrewError::Step {
                            step: step.name.clone(),
                            source: e,
                        });
                    }
                    StepFailurePolicy::Degrade => {
                        tracing::warn!(step = %step.name, error = %e, "Step degraded, continuing");
                        degraded.push(step.name.clone());
                        continue;
                    }
                },
            };

            if let Some(file) = &step.output_file {
                if let Err(e) = self.store.write(file, &text).await {
                    tracing::error!(step = %step.name, file = %file, error = %e, "Failed to write artifact");
                    self.set_state(RunState::Failed {
                        step: index + 1,
                        name: step.name.clone(),
                        message: e.to_string(),
                    })
                    .await;
                    return Err(e.into());
                }
                artifacts.push(file.clone());
            }

            tracing::info!(step = %step.name, chars = text.len(), "Step finished");
            completed.push(StepOutput {
                name: step.name.clone(),
                agent: agent.role.clone(),
                text: text.clone(),
                output_file: step.output_file.clone(),
            });
            outputs[index] = Some(text);
        }

        self.set_state(RunState::Completed).await;
        tracing::info!(
            session = %request.session_id,
            artifacts = artifacts.len(),
            degraded = degraded.len(),
            "Crew run completed"
        );

        let raw = completed.last().map(|s| s.text.clone()).unwrap_or_default();
        Ok(CrewOutput {
            session_id: request.session_id.clone(),
            raw,
            steps: completed,
            artifacts,
            degraded_steps: degraded,
        })
    }

    /// One retry, then the error goes to the failure policy.
    async fn call_with_retry(&self, step: &str, messages: &[Message]) -> Result<String, LlmError> {
        let options = self.llm.defaults();
        match self.llm.try_send(messages, options).await {
            Ok(text) => Ok(text),
            Err(e) => {
                tracing::warn!(step, error = %e, "LLM call failed, retrying once");
                self.llm.try_send(messages, options).await
            }
        }
    }

    fn step_messages(
        &self,
        step: &Step,
        agent: &Agent,
        request: &GenerationRequest,
        outputs: &[Option<String>],
    ) -> Vec<Message> {
        let mut prompt = format!(
            "{}\n\nExpected output:\n{}",
            request.interpolate(&step.description).trim(),
            request.interpolate(&step.expected_output).trim()
        );

        for &input in &step.inputs {
            if let Some(text) = outputs.get(input).and_then(Option::as_ref) {
                let name = &self.pipeline.steps()[input].name;
                prompt.push_str(&format!("\n\n## Output of {name}\n\n{text}"));
            }
        }

        if let Some(tool) = agent.tool {
            match tool.generate(&tool_input(tool, request)) {
                Ok(template) => prompt.push_str(&format!(
                    "\n\n## Reference template ({})\n\n_{}_\n\n{template}",
                    tool.display_name(),
                    tool.description()
                )),
                Err(e) => tracing::warn!(step = %step.name, error = %e, "Reference template unavailable"),
            }
        }

        vec![agent.system_message(), Message::user(prompt)]
    }
}

/// Tool input derived from the request alone, so templates stay deterministic.
fn tool_input(tool: Tool, request: &GenerationRequest) -> Value {
    match tool {
        Tool::PrdTemplate => json!({
            "project_name": request.project_name(),
            "requirements_data": { "idea_description": request.idea_description },
            "stakeholders": ["Product Manager", "Engineering Team", "Design Team", "QA Team"],
            "date": request.date(),
        }),
        Tool::TechStackAdvice => json!({
            "project_type": guess_project_type(&request.idea_description),
            "requirements": { "idea_description": request.idea_description },
            "scale": "medium",
        }),
        Tool::DevGuide => json!({
            "project_data": {
                "project_name": request.project_name(),
                "idea_description": request.idea_description,
            },
            "methodology": "agile",
        }),
    }
}

fn guess_project_type(idea: &str) -> &'static str {
    let idea = idea.to_ascii_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| idea.contains(w));
    if has(&["mobile", "ios", "android", "smartphone"]) {
        "mobile"
    } else if has(&["desktop", "windows app", "macos app"]) {
        "desktop"
    } else {
        "web"
    }
}
