//! Pipeline configuration: agents and steps, loaded from TOML and validated once.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::agents::Agent;
use crate::artifacts::ArtifactStore;
use crate::tools::Tool;

const DEFAULT_PIPELINE: &str = include_str!("default_pipeline.toml");

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read pipeline config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse pipeline config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("pipeline has no steps")]
    Empty,
    #[error("agent '{0}' is defined twice")]
    DuplicateAgent(String),
    #[error("step '{0}' is defined twice")]
    DuplicateStep(String),
    #[error("output file '{0}' is written by more than one step")]
    DuplicateOutput(String),
    #[error("output file '{0}' must be a plain .md file name")]
    InvalidOutputFile(String),
    #[error("step '{step}' uses unknown agent '{agent}'")]
    UnknownAgent { step: String, agent: String },
    #[error("agent '{agent}' uses unknown tool '{tool}'")]
    UnknownTool { agent: String, tool: String },
    #[error("step '{step}' reads unknown step '{input}'")]
    UnknownInput { step: String, input: String },
    #[error("step '{step}' reads '{input}', which does not run before it")]
    ForwardReference { step: String, input: String },
}

/// Raw agent entry as written in the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub name: String,
    pub role: String,
    pub goal: String,
    pub backstory: String,
    #[serde(default)]
    pub tool: Option<String>,
}

/// Raw step entry as written in the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    pub name: String,
    pub agent: String,
    pub description: String,
    pub expected_output: String,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub output_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub agents: Vec<AgentConfig>,
    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

impl PipelineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Validate into a runnable [`Pipeline`].
    pub fn validate(self) -> Result<Pipeline, ConfigError> {
        if self.steps.is_empty() {
            return Err(ConfigError::Empty);
        }

        let mut agents: Vec<Agent> = Vec::with_capacity(self.agents.len());
        for a in self.agents {
            if agents.iter().any(|existing| existing.name == a.name) {
                return Err(ConfigError::DuplicateAgent(a.name));
            }
            let tool = match a.tool.as_deref() {
                Some(name) => Some(Tool::from_name(name).map_err(|_| ConfigError::UnknownTool {
                    agent: a.name.clone(),
                    tool: name.to_string(),
                })?),
                None => None,
            };
            agents.push(Agent {
                name: a.name,
                role: a.role,
                goal: a.goal,
                backstory: a.backstory,
                tool,
            });
        }

        let declared: HashSet<String> = self.steps.iter().map(|s| s.name.clone()).collect();
        let mut steps: Vec<Step> = Vec::with_capacity(self.steps.len());
        let mut outputs = HashSet::new();
        for s in self.steps {
            if steps.iter().any(|existing| existing.name == s.name) {
                return Err(ConfigError::DuplicateStep(s.name));
            }
            let agent = agents
                .iter()
                .position(|a| a.name == s.agent)
                .ok_or_else(|| ConfigError::UnknownAgent {
                    step: s.name.clone(),
                    agent: s.agent.clone(),
                })?;

            let mut inputs = Vec::with_capacity(s.inputs.len());
            for input in &s.inputs {
                match steps.iter().position(|earlier| &earlier.name == input) {
                    Some(index) => inputs.push(index),
                    None if declared.contains(input) => {
                        return Err(ConfigError::ForwardReference {
                            step: s.name.clone(),
                            input: input.clone(),
                        });
                    }
                    None => {
                        return Err(ConfigError::UnknownInput {
                            step: s.name.clone(),
                            input: input.clone(),
                        });
                    }
                }
            }

            if let Some(file) = &s.output_file {
                if ArtifactStore::validate_name(file).is_err() || !file.ends_with(".md") {
                    return Err(ConfigError::InvalidOutputFile(file.clone()));
                }
                if !outputs.insert(file.clone()) {
                    return Err(ConfigError::DuplicateOutput(file.clone()));
                }
            }

            steps.push(Step {
                name: s.name,
                agent,
                description: s.description,
                expected_output: s.expected_output,
                inputs,
                output_file: s.output_file,
            });
        }

        Ok(Pipeline { agents, steps })
    }
}

/// A validated step. `agent` and `inputs` are indices into the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub name: String,
    pub agent: usize,
    pub description: String,
    pub expected_output: String,
    pub inputs: Vec<usize>,
    pub output_file: Option<String>,
}

/// Validated, immutable pipeline definition.
#[derive(Debug, Clone)]
pub struct Pipeline {
    agents: Vec<Agent>,
    steps: Vec<Step>,
}

impl Pipeline {
    /// The built-in PRD crew.
    pub fn builtin() -> Result<Self, ConfigError> {
        PipelineConfig::from_toml_str(DEFAULT_PIPELINE)?.validate()
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        PipelineConfig::from_toml_str(s)?.validate()
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn agent_for(&self, step: &Step) -> &Agent {
        &self.agents[step.agent]
    }

    /// Output files the pipeline declares, in step order.
    pub fn output_files(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter_map(|s| s.output_file.as_deref())
            .collect()
    }
}
