//! Pipeline definition types.
//!
//! These types represent the user-authored pipeline YAML configuration.
//! A config is validated once at construction and immutable afterwards.

use crate::error::{Error, Result};
use crate::interpolation;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub triggers: Vec<TriggerConfig>,
    /// Process-wide environment, the bottom layer of the env overlay.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// When set, the first failing job instance cancels every other
    /// still-running instance of the run.
    #[serde(default)]
    pub fail_fast: bool,
    pub jobs: Vec<JobDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    #[serde(rename = "type")]
    pub trigger_type: TriggerType,
    #[serde(default)]
    pub branches: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    Push,
    PullRequest,
    Manual,
    Schedule,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDefinition {
    pub name: String,
    #[serde(default = "default_runs_on")]
    pub runs_on: String,
    /// Job-level environment, overlaid on the pipeline env.
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub matrix: Option<MatrixConfig>,
    pub steps: Vec<StepDefinition>,
}

fn default_runs_on() -> String {
    "host".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixConfig {
    /// Axis name -> ordered values. Declaration order is preserved and
    /// determines expansion order.
    pub axes: IndexMap<String, Vec<serde_json::Value>>,
    #[serde(default)]
    pub include: Vec<IndexMap<String, serde_json::Value>>,
    #[serde(default)]
    pub exclude: Vec<IndexMap<String, serde_json::Value>>,
    #[serde(default)]
    pub max_parallel: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDefinition {
    #[serde(default)]
    pub name: Option<String>,
    /// Step-level environment, the top layer of the env overlay.
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default = "default_step_timeout")]
    pub timeout_minutes: u32,
    #[serde(flatten)]
    pub kind: StepKind,
}

fn default_step_timeout() -> u32 {
    30
}

/// Two-case sum: a step is either a reference to a reusable, versioned
/// action or an inline shell command. Exactly one variant is populated;
/// the step executor switches on this tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepKind {
    Action {
        /// Action reference in `name@version` form.
        uses: String,
        #[serde(default)]
        with: IndexMap<String, String>,
    },
    Command {
        run: String,
        #[serde(default)]
        working_directory: Option<String>,
        #[serde(default = "default_shell")]
        shell: String,
    },
}

fn default_shell() -> String {
    "sh".to_string()
}

impl StepDefinition {
    /// Label used in reports and output lookups: the explicit name, the
    /// action name, or the step index as a last resort.
    pub fn label(&self, index: usize) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        match &self.kind {
            StepKind::Action { uses, .. } => uses
                .split_once('@')
                .map(|(n, _)| n.to_string())
                .unwrap_or_else(|| uses.clone()),
            StepKind::Command { .. } => format!("step-{}", index + 1),
        }
    }

    /// All interpolatable strings in this step, for validation scans.
    pub fn templates(&self) -> Vec<&str> {
        match &self.kind {
            StepKind::Action { with, .. } => with.values().map(|v| v.as_str()).collect(),
            StepKind::Command {
                run,
                working_directory,
                ..
            } => {
                let mut t = vec![run.as_str()];
                if let Some(wd) = working_directory {
                    t.push(wd.as_str());
                }
                t
            }
        }
    }
}

impl PipelineConfig {
    /// Load and validate a pipeline configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate a pipeline configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration. Construction-time errors here are fatal
    /// to the whole run; nothing executes if validation fails.
    pub fn validate(&self) -> Result<()> {
        if self.triggers.is_empty() {
            return Err(Error::MalformedConfig(
                "pipeline declares no triggers".to_string(),
            ));
        }
        if self.jobs.is_empty() {
            return Err(Error::MalformedConfig(
                "pipeline declares no jobs".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for job in &self.jobs {
            if !seen.insert(job.name.as_str()) {
                return Err(Error::DuplicateJobName(job.name.clone()));
            }
            job.validate()?;
        }

        Ok(())
    }
}

impl JobDefinition {
    fn validate(&self) -> Result<()> {
        if self.steps.is_empty() {
            return Err(Error::MalformedConfig(format!(
                "job '{}' has no steps",
                self.name
            )));
        }

        // Every `matrix.X` reference in a step template must name a
        // declared axis, otherwise it would silently resolve to "".
        let axes: HashSet<&str> = self
            .matrix
            .as_ref()
            .map(|m| m.axes.keys().map(|k| k.as_str()).collect())
            .unwrap_or_default();

        for (index, step) in self.steps.iter().enumerate() {
            for template in step.templates() {
                for axis in interpolation::matrix_refs(template) {
                    if !axes.contains(axis.as_str()) {
                        return Err(Error::UnknownAxis {
                            job: self.name.clone(),
                            step: step.label(index),
                            axis,
                        });
                    }
                }
            }
        }

        Ok(())
    }
}
