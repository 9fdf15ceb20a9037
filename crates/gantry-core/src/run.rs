//! Run and report types.
//!
//! A triggered run produces one `PipelineReport` containing one `JobReport`
//! per job instance, each with an ordered list of `StepResult`s. Reports are
//! always complete: execution failures are recorded here, never thrown.

use crate::ids::{JobId, RunId};
use crate::pipeline::TriggerType;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Success,
    Failure,
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Success)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Success,
    Failure,
    /// Remaining steps were skipped-cancelled because a sibling instance
    /// failed under fail-fast. Distinct from `Failure`: the job never ran
    /// to a conclusion of its own.
    Cancelled,
}

impl JobStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, JobStatus::Success)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Success,
    Failure,
    /// Not executed because an earlier step in the same instance failed.
    Skipped,
    /// Not executed because the run was cancelled under fail-fast.
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub name: String,
    pub index: usize,
    pub status: StepStatus,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// Outputs published by the step (`key=value` via the output file).
    #[serde(default)]
    pub outputs: HashMap<String, String>,
    pub duration_ms: u64,
}

impl StepResult {
    pub fn success(&self) -> bool {
        matches!(self.status, StepStatus::Success)
    }

    /// A step that never ran because an earlier one failed.
    pub fn skipped(name: String, index: usize) -> Self {
        Self::unexecuted(name, index, StepStatus::Skipped)
    }

    /// A step that never ran because the run was cancelled.
    pub fn cancelled(name: String, index: usize) -> Self {
        Self::unexecuted(name, index, StepStatus::Cancelled)
    }

    fn unexecuted(name: String, index: usize, status: StepStatus) -> Self {
        Self {
            name,
            index,
            status,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            outputs: HashMap::new(),
            duration_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub job_id: JobId,
    pub job_name: String,
    /// Position of this instance within its job's matrix expansion.
    pub instance_index: usize,
    /// Concrete axis assignment for this instance; empty for jobs
    /// without a matrix.
    pub axes: IndexMap<String, String>,
    pub display_name: String,
    pub status: JobStatus,
    pub steps: Vec<StepResult>,
    /// Set when the instance never executed (e.g. its expansion failed).
    #[serde(default)]
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
}

impl JobReport {
    pub fn success(&self) -> bool {
        self.status.is_success()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerInfo {
    pub trigger_type: TriggerType,
    pub branch: Option<String>,
    pub actor: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub run_id: RunId,
    pub pipeline_name: String,
    pub trigger: TriggerInfo,
    pub status: RunStatus,
    pub jobs: Vec<JobReport>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
}

impl PipelineReport {
    /// A run succeeds iff every job report succeeded.
    pub fn success(&self) -> bool {
        self.jobs.iter().all(|job| job.success())
    }
}
