//! Run lifecycle events emitted to the report sink.

use crate::ids::{JobId, MatrixId, RunId};
use crate::pipeline::TriggerType;
use crate::run::{JobStatus, RunStatus, StepStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// All events emitted during a pipeline run, in lifecycle order per run:
/// run started, per-job matrix expansion, interleaved job/step events from
/// concurrent instances, then run completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    RunStarted(RunStartedPayload),
    MatrixExpanded(MatrixExpandedPayload),
    JobStarted(JobStartedPayload),
    StepStarted(StepStartedPayload),
    StepCompleted(StepCompletedPayload),
    JobCompleted(JobCompletedPayload),
    RunCancelled(RunCancelledPayload),
    RunCompleted(RunCompletedPayload),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStartedPayload {
    pub run_id: RunId,
    pub pipeline_name: String,
    pub trigger: TriggerType,
    pub job_count: usize,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixExpandedPayload {
    pub run_id: RunId,
    pub matrix_id: MatrixId,
    pub job_name: String,
    pub instance_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStartedPayload {
    pub run_id: RunId,
    pub job_id: JobId,
    pub job_name: String,
    pub display_name: String,
    pub instance_index: usize,
    pub step_count: usize,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepStartedPayload {
    pub run_id: RunId,
    pub job_id: JobId,
    pub step_name: String,
    pub step_index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepCompletedPayload {
    pub run_id: RunId,
    pub job_id: JobId,
    pub step_name: String,
    pub step_index: usize,
    pub status: StepStatus,
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobCompletedPayload {
    pub run_id: RunId,
    pub job_id: JobId,
    pub job_name: String,
    pub display_name: String,
    pub status: JobStatus,
    pub steps_passed: usize,
    pub steps_failed: usize,
    pub duration_ms: u64,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunCancelledPayload {
    pub run_id: RunId,
    /// The job instance whose failure triggered fail-fast cancellation.
    pub failed_job: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunCompletedPayload {
    pub run_id: RunId,
    pub pipeline_name: String,
    pub status: RunStatus,
    pub duration_ms: u64,
    pub completed_at: DateTime<Utc>,
}
