//! Pipeline runner: orchestrates one triggered run end to end.
//!
//! A run moves through Expanding (matrix expansion per job), Running
//! (instances execute concurrently, steps sequentially within each), and
//! Aggregating (reports combine into one `PipelineReport`). Execution
//! errors are captured into the report; only configuration errors abort
//! before anything runs.

use crate::executor::{StepContext, StepExecutor};
use crate::matrix::{JobInstance, MatrixExpander};
use crate::triggers::{TriggerEvent, TriggerMatcher};
use gantry_core::env;
use gantry_core::events::*;
use gantry_core::ids::RunId;
use gantry_core::pipeline::PipelineConfig;
use gantry_core::ports::ReportSink;
use gantry_core::run::{JobReport, JobStatus, PipelineReport, RunStatus, StepResult};
use gantry_core::{Error, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Options for a pipeline run.
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// Root under which each job instance gets its own working directory.
    pub workspace: PathBuf,
    /// Extra environment overlaid on the pipeline env (e.g. CLI `--var`).
    pub variables: HashMap<String, String>,
    /// Run-wide cap on concurrently executing instances.
    pub max_parallel: Option<usize>,
    /// When set, a failed matrix expansion aborts the run instead of
    /// failing only the affected job.
    pub strict: bool,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            workspace: PathBuf::from("."),
            variables: HashMap::new(),
            max_parallel: None,
            strict: false,
        }
    }
}

/// Orchestrates pipeline runs over the collaborator ports.
pub struct PipelineRunner {
    executor: Arc<StepExecutor>,
    sink: Arc<dyn ReportSink>,
    matcher: TriggerMatcher,
    expander: MatrixExpander,
    options: RunnerOptions,
}

impl PipelineRunner {
    pub fn new(executor: StepExecutor, sink: Arc<dyn ReportSink>) -> Self {
        Self::with_options(executor, sink, RunnerOptions::default())
    }

    pub fn with_options(
        executor: StepExecutor,
        sink: Arc<dyn ReportSink>,
        options: RunnerOptions,
    ) -> Self {
        Self {
            executor: Arc::new(executor),
            sink,
            matcher: TriggerMatcher::new(),
            expander: MatrixExpander::new(),
            options,
        }
    }

    /// Handle a trigger event: run the pipeline if any declared trigger
    /// matches, otherwise do nothing.
    pub async fn handle_event(
        &self,
        config: &PipelineConfig,
        event: &TriggerEvent,
    ) -> Result<Option<PipelineReport>> {
        if !self.matcher.matches(config, event) {
            debug!(pipeline = %config.name, "No trigger matched event");
            return Ok(None);
        }
        self.run(config, event).await.map(Some)
    }

    /// Execute one triggered run to completion and return its report.
    pub async fn run(
        &self,
        config: &PipelineConfig,
        event: &TriggerEvent,
    ) -> Result<PipelineReport> {
        config.validate()?;

        let run_id = RunId::new();
        let started_at = Utc::now();
        let start = Instant::now();

        info!(run_id = %run_id, pipeline = %config.name, "Starting pipeline run");
        emit(
            &self.sink,
            RunEvent::RunStarted(RunStartedPayload {
                run_id,
                pipeline_name: config.name.clone(),
                trigger: event.trigger_type(),
                job_count: config.jobs.len(),
                started_at,
            }),
        )
        .await;

        // Expanding
        let mut ordinal = 0usize;
        let mut instances: Vec<(usize, JobInstance)> = Vec::new();
        let mut expansion_failures: Vec<(usize, JobReport)> = Vec::new();

        for job in &config.jobs {
            match self.expander.expand(job) {
                Ok(expanded) => {
                    emit(
                        &self.sink,
                        RunEvent::MatrixExpanded(MatrixExpandedPayload {
                            run_id,
                            matrix_id: expanded
                                .first()
                                .map(|i| i.matrix_id)
                                .unwrap_or_default(),
                            job_name: job.name.clone(),
                            instance_count: expanded.len(),
                        }),
                    )
                    .await;
                    for instance in expanded {
                        instances.push((ordinal, instance));
                        ordinal += 1;
                    }
                }
                Err(e @ Error::EmptyAxis { .. }) if !self.options.strict => {
                    warn!(job = %job.name, error = %e, "Expansion failed, job marked failed");
                    expansion_failures.push((ordinal, expansion_failure_report(job, &e)));
                    ordinal += 1;
                }
                Err(e) => return Err(e),
            }
        }

        // Running
        let cancel = Arc::new(AtomicBool::new(false));
        let global_permits = self
            .options
            .max_parallel
            .map(|n| Arc::new(Semaphore::new(n.max(1))));
        let matrix_permits: HashMap<String, Arc<Semaphore>> = config
            .jobs
            .iter()
            .filter_map(|job| {
                let max = job.matrix.as_ref()?.max_parallel?;
                Some((job.name.clone(), Arc::new(Semaphore::new(max.max(1) as usize))))
            })
            .collect();

        let base_env = env::layered([&config.env, &self.options.variables]);

        let mut join_set = JoinSet::new();
        for (ordinal, instance) in instances {
            let task = InstanceTask {
                run_id,
                executor: self.executor.clone(),
                sink: self.sink.clone(),
                cancel: cancel.clone(),
                fail_fast: config.fail_fast,
                base_env: base_env.clone(),
                workspace: self.options.workspace.clone(),
                global_permits: global_permits.clone(),
                matrix_permits: matrix_permits.get(&instance.job_name).cloned(),
            };
            join_set.spawn(async move { (ordinal, task.execute(instance).await) });
        }

        let mut reports: Vec<(usize, JobReport)> = expansion_failures;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(entry) => reports.push(entry),
                Err(e) => {
                    // A panicking instance task must not lose the rest of
                    // the report.
                    error!(error = %e, "Job instance task panicked");
                }
            }
        }

        // Aggregating
        reports.sort_by_key(|(ordinal, _)| *ordinal);
        let jobs: Vec<JobReport> = reports.into_iter().map(|(_, report)| report).collect();

        let status = if jobs.iter().all(|job| job.success()) {
            RunStatus::Success
        } else {
            RunStatus::Failure
        };
        let duration_ms = start.elapsed().as_millis() as u64;
        let completed_at = Utc::now();

        info!(run_id = %run_id, ?status, duration_ms, "Pipeline run finished");
        emit(
            &self.sink,
            RunEvent::RunCompleted(RunCompletedPayload {
                run_id,
                pipeline_name: config.name.clone(),
                status,
                duration_ms,
                completed_at,
            }),
        )
        .await;

        Ok(PipelineReport {
            run_id,
            pipeline_name: config.name.clone(),
            trigger: event.info(),
            status,
            jobs,
            started_at,
            completed_at: Some(completed_at),
            duration_ms,
        })
    }
}

/// Everything one spawned job instance needs. Instances share nothing
/// mutable except the cancellation flag.
struct InstanceTask {
    run_id: RunId,
    executor: Arc<StepExecutor>,
    sink: Arc<dyn ReportSink>,
    cancel: Arc<AtomicBool>,
    fail_fast: bool,
    base_env: HashMap<String, String>,
    workspace: PathBuf,
    global_permits: Option<Arc<Semaphore>>,
    matrix_permits: Option<Arc<Semaphore>>,
}

impl InstanceTask {
    async fn execute(self, instance: JobInstance) -> JobReport {
        // Permits bound concurrency; they release when the instance ends.
        let _global = match &self.global_permits {
            Some(sem) => sem.clone().acquire_owned().await.ok(),
            None => None,
        };
        let _matrix = match &self.matrix_permits {
            Some(sem) => sem.clone().acquire_owned().await.ok(),
            None => None,
        };

        let definition = instance.definition.clone();
        let started_at = Utc::now();
        let start = Instant::now();

        info!(job = %instance.display_name, "Job instance started");
        self.emit(RunEvent::JobStarted(JobStartedPayload {
            run_id: self.run_id,
            job_id: instance.id,
            job_name: instance.job_name.clone(),
            display_name: instance.display_name.clone(),
            instance_index: instance.index,
            step_count: definition.steps.len(),
            started_at,
        }))
        .await;

        let job_env = env::layered([&self.base_env, &definition.env]);
        let workdir = self.workspace.join(instance.slug());

        let mut steps: Vec<StepResult> = Vec::with_capacity(definition.steps.len());
        let mut outputs: HashMap<String, String> = HashMap::new();
        let mut failed = false;
        let mut cancelled = false;

        for (index, step) in definition.steps.iter().enumerate() {
            let label = step.label(index);

            // Fail-stop: after this instance's first failure, nothing else
            // in it executes.
            if failed {
                steps.push(StepResult::skipped(label, index));
                continue;
            }

            // Fail-fast cancellation is observed between steps only; an
            // in-flight command runs to completion.
            if self.cancel.load(Ordering::SeqCst) {
                cancelled = true;
                steps.push(StepResult::cancelled(label, index));
                continue;
            }

            self.emit(RunEvent::StepStarted(StepStartedPayload {
                run_id: self.run_id,
                job_id: instance.id,
                step_name: label.clone(),
                step_index: index,
            }))
            .await;

            let ctx = StepContext {
                env: job_env.clone(),
                workdir: workdir.clone(),
                axes: instance.axes.clone(),
                outputs: outputs.clone(),
            };
            let result = self.executor.execute(step, index, &ctx).await;

            for (key, value) in &result.outputs {
                outputs.insert(format!("{}.{}", label, key), value.clone());
            }

            self.emit(RunEvent::StepCompleted(StepCompletedPayload {
                run_id: self.run_id,
                job_id: instance.id,
                step_name: label.clone(),
                step_index: index,
                status: result.status,
                exit_code: result.exit_code,
                duration_ms: result.duration_ms,
            }))
            .await;

            if !result.success() {
                warn!(job = %instance.display_name, step = %label, "Step failed");
                failed = true;
                if self.fail_fast && !self.cancel.swap(true, Ordering::SeqCst) {
                    self.emit(RunEvent::RunCancelled(RunCancelledPayload {
                        run_id: self.run_id,
                        failed_job: instance.display_name.clone(),
                    }))
                    .await;
                }
            }

            steps.push(result);
        }

        let status = if failed {
            JobStatus::Failure
        } else if cancelled {
            JobStatus::Cancelled
        } else {
            JobStatus::Success
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let completed_at = Utc::now();
        let steps_passed = steps.iter().filter(|s| s.success()).count();
        let steps_failed = steps
            .iter()
            .filter(|s| matches!(s.status, gantry_core::run::StepStatus::Failure))
            .count();

        self.emit(RunEvent::JobCompleted(JobCompletedPayload {
            run_id: self.run_id,
            job_id: instance.id,
            job_name: instance.job_name.clone(),
            display_name: instance.display_name.clone(),
            status,
            steps_passed,
            steps_failed,
            duration_ms,
            completed_at,
        }))
        .await;

        JobReport {
            job_id: instance.id,
            job_name: instance.job_name,
            instance_index: instance.index,
            axes: instance.axes,
            display_name: instance.display_name,
            status,
            steps,
            error: None,
            started_at: Some(started_at),
            completed_at: Some(completed_at),
            duration_ms,
        }
    }

    async fn emit(&self, event: RunEvent) {
        emit(&self.sink, event).await;
    }
}

async fn emit(sink: &Arc<dyn ReportSink>, event: RunEvent) {
    if let Err(e) = sink.publish(event).await {
        warn!(error = %e, "Report sink rejected event");
    }
}

fn expansion_failure_report(
    job: &gantry_core::pipeline::JobDefinition,
    error: &Error,
) -> JobReport {
    JobReport {
        job_id: gantry_core::ids::JobId::new(),
        job_name: job.name.clone(),
        instance_index: 0,
        axes: indexmap::IndexMap::new(),
        display_name: job.name.clone(),
        status: JobStatus::Failure,
        steps: Vec::new(),
        error: Some(error.to_string()),
        started_at: None,
        completed_at: None,
        duration_ms: 0,
    }
}
