//! Step executor: runs a single step through the collaborator ports.
//!
//! The executor owns no side effects. It interpolates templates, layers the
//! environment, switches on the step tag (action vs command), and interprets
//! the collaborator's reported status uniformly into a `StepResult`.

use gantry_core::env;
use gantry_core::interpolation::InterpolationContext;
use gantry_core::pipeline::{StepDefinition, StepKind};
use gantry_core::ports::{ActionRegistry, CommandExecutor, ResolvedAction};
use gantry_core::run::{StepResult, StepStatus};
use gantry_core::{Error, Result};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{Duration, sleep, timeout};
use tracing::{debug, info, warn};

/// Configuration for step execution.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Override for per-step `timeout_minutes` when set.
    pub timeout_seconds: Option<u64>,
    /// Retries when a collaborator reports itself unavailable.
    pub retry_count: u32,
    pub retry_delay_ms: u64,
    pub exponential_backoff: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: None,
            retry_count: 2,
            retry_delay_ms: 500,
            exponential_backoff: true,
        }
    }
}

/// Resolved execution environment for one step: the layered env below the
/// step's own overlay, the instance working directory, the instance's axis
/// assignment, and outputs of earlier steps in the same instance.
#[derive(Debug, Clone)]
pub struct StepContext {
    pub env: HashMap<String, String>,
    pub workdir: PathBuf,
    pub axes: IndexMap<String, String>,
    pub outputs: HashMap<String, String>,
}

/// Executes a single step.
pub struct StepExecutor {
    commands: Arc<dyn CommandExecutor>,
    actions: Arc<dyn ActionRegistry>,
    config: ExecutorConfig,
}

impl StepExecutor {
    pub fn new(commands: Arc<dyn CommandExecutor>, actions: Arc<dyn ActionRegistry>) -> Self {
        Self::with_config(commands, actions, ExecutorConfig::default())
    }

    pub fn with_config(
        commands: Arc<dyn CommandExecutor>,
        actions: Arc<dyn ActionRegistry>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            commands,
            actions,
            config,
        }
    }

    /// Execute one step and report its result. Execution problems —
    /// non-zero exits, unreachable collaborators, timeouts — are recorded
    /// in the result, never raised.
    pub async fn execute(
        &self,
        step: &StepDefinition,
        index: usize,
        ctx: &StepContext,
    ) -> StepResult {
        let name = step.label(index);
        let started = Instant::now();

        let step_env = env::layered([&ctx.env, &step.env]);
        let mut interp = InterpolationContext::new();
        interp.env = step_env.clone();
        interp.matrix = ctx.axes.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        interp.outputs = ctx.outputs.clone();

        info!(step = %name, "Executing step");

        match &step.kind {
            StepKind::Command {
                run,
                working_directory,
                ..
            } => {
                let command = interp.interpolate(run);
                let cwd = match working_directory {
                    Some(dir) => ctx.workdir.join(interp.interpolate(dir)),
                    None => ctx.workdir.clone(),
                };
                self.run_command(step, &name, index, &command, &step_env, &cwd, started)
                    .await
            }
            StepKind::Action { uses, with } => {
                let (action_name, version) = match parse_action_ref(uses) {
                    Ok(parsed) => parsed,
                    Err(e) => return failure(name, index, &e.to_string(), started),
                };

                let resolved = match self.resolve_action(&action_name, &version).await {
                    Ok(resolved) => resolved,
                    Err(e) => return failure(name, index, &e.to_string(), started),
                };

                let inputs = match action_inputs(&resolved, with, &interp) {
                    Ok(inputs) => inputs,
                    Err(e) => return failure(name, index, &e.to_string(), started),
                };

                // Inputs reach the runnable both as ${{ inputs.* }} template
                // references and as INPUT_* environment variables.
                let mut action_env = step_env.clone();
                for (key, value) in &inputs {
                    action_env.insert(input_env_name(key), value.clone());
                }
                interp.inputs = inputs;

                let command = interp.interpolate(&resolved.command);
                self.run_command(step, &name, index, &command, &action_env, &ctx.workdir, started)
                    .await
            }
        }
    }

    async fn resolve_action(&self, name: &str, version: &str) -> Result<ResolvedAction> {
        let mut attempt = 0;
        loop {
            match self.actions.resolve(name, version).await {
                Ok(resolved) => return Ok(resolved),
                Err(Error::Unavailable(msg)) if attempt < self.config.retry_count => {
                    attempt += 1;
                    warn!(action = %name, attempt, error = %msg, "Registry unavailable, retrying");
                    sleep(self.retry_delay(attempt)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_command(
        &self,
        step: &StepDefinition,
        name: &str,
        index: usize,
        command: &str,
        env: &HashMap<String, String>,
        cwd: &std::path::Path,
        started: Instant,
    ) -> StepResult {
        let timeout_secs = self
            .config
            .timeout_seconds
            .unwrap_or(step.timeout_minutes as u64 * 60);
        let deadline = Duration::from_secs(timeout_secs);

        debug!(step = %name, command = %command, cwd = %cwd.display(), "Dispatching command");

        let mut attempt = 0;
        loop {
            match timeout(deadline, self.commands.execute(command, env, cwd)).await {
                Err(_) => {
                    warn!(step = %name, timeout_secs, "Step timed out");
                    return failure(
                        name.to_string(),
                        index,
                        &Error::StepTimeout {
                            minutes: step.timeout_minutes,
                        }
                        .to_string(),
                        started,
                    );
                }
                Ok(Ok(output)) => {
                    let status = if output.success() {
                        StepStatus::Success
                    } else {
                        StepStatus::Failure
                    };
                    return StepResult {
                        name: name.to_string(),
                        index,
                        status,
                        exit_code: Some(output.exit_code),
                        stdout: output.stdout_lossy(),
                        stderr: output.stderr_lossy(),
                        outputs: output.outputs,
                        duration_ms: started.elapsed().as_millis() as u64,
                    };
                }
                Ok(Err(Error::Unavailable(msg))) if attempt < self.config.retry_count => {
                    attempt += 1;
                    warn!(step = %name, attempt, error = %msg, "Executor unavailable, retrying");
                    sleep(self.retry_delay(attempt)).await;
                }
                Ok(Err(e)) => {
                    return failure(name.to_string(), index, &e.to_string(), started);
                }
            }
        }
    }

    fn retry_delay(&self, attempt: u32) -> Duration {
        let base = self.config.retry_delay_ms;
        if self.config.exponential_backoff {
            Duration::from_millis(base * 2u64.pow(attempt.saturating_sub(1)))
        } else {
            Duration::from_millis(base)
        }
    }
}

fn failure(name: String, index: usize, message: &str, started: Instant) -> StepResult {
    StepResult {
        name,
        index,
        status: StepStatus::Failure,
        exit_code: None,
        stdout: String::new(),
        stderr: message.to_string(),
        outputs: HashMap::new(),
        duration_ms: started.elapsed().as_millis() as u64,
    }
}

fn parse_action_ref(uses: &str) -> Result<(String, String)> {
    let (name, version) = match uses.split_once('@') {
        Some((name, version)) => (name, version),
        None => (uses, ""),
    };
    if name.is_empty() {
        return Err(Error::InvalidActionRef(uses.to_string()));
    }
    let version = if version.is_empty() { "latest" } else { version };
    Ok((name.to_string(), version.to_string()))
}

/// Merge declared defaults with the step's `with` mapping; reject missing
/// required inputs. `with` values are interpolated before use so matrix
/// axes and env can parameterize actions.
fn action_inputs(
    resolved: &ResolvedAction,
    with: &IndexMap<String, String>,
    interp: &InterpolationContext,
) -> Result<HashMap<String, String>> {
    let mut inputs: HashMap<String, String> = HashMap::new();
    for input in &resolved.inputs {
        if let Some(default) = &input.default {
            inputs.insert(input.name.clone(), default.clone());
        }
    }
    for (key, value) in with {
        inputs.insert(key.clone(), interp.interpolate(value));
    }
    for input in &resolved.inputs {
        if input.required && !inputs.contains_key(&input.name) {
            return Err(Error::MissingActionInput {
                action: format!("{}@{}", resolved.name, resolved.version),
                input: input.name.clone(),
            });
        }
    }
    Ok(inputs)
}

fn input_env_name(input: &str) -> String {
    format!("INPUT_{}", input.to_uppercase().replace('-', "_"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gantry_core::ports::{ActionInput, CommandOutput};
    use std::sync::Mutex;

    /// Records every dispatched command; fails those containing a marker.
    struct RecordingExecutor {
        log: Mutex<Vec<(String, HashMap<String, String>, PathBuf)>>,
        fail_marker: Option<String>,
        unavailable_times: Mutex<u32>,
        delay: Option<Duration>,
    }

    impl RecordingExecutor {
        fn new() -> Self {
            Self {
                log: Mutex::new(Vec::new()),
                fail_marker: None,
                unavailable_times: Mutex::new(0),
                delay: None,
            }
        }

        fn commands(&self) -> Vec<String> {
            self.log.lock().unwrap().iter().map(|(c, _, _)| c.clone()).collect()
        }
    }

    #[async_trait]
    impl CommandExecutor for RecordingExecutor {
        async fn execute(
            &self,
            command: &str,
            env: &HashMap<String, String>,
            cwd: &std::path::Path,
        ) -> Result<CommandOutput> {
            {
                let mut remaining = self.unavailable_times.lock().unwrap();
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(Error::Unavailable("executor offline".to_string()));
                }
            }
            if let Some(delay) = self.delay {
                sleep(delay).await;
            }
            self.log
                .lock()
                .unwrap()
                .push((command.to_string(), env.clone(), cwd.to_path_buf()));
            if let Some(marker) = &self.fail_marker {
                if command.contains(marker.as_str()) {
                    return Ok(CommandOutput {
                        exit_code: 1,
                        stderr: b"boom".to_vec(),
                        ..CommandOutput::default()
                    });
                }
            }
            Ok(CommandOutput::ok())
        }
    }

    struct StaticActions;

    #[async_trait]
    impl ActionRegistry for StaticActions {
        async fn resolve(&self, name: &str, version: &str) -> Result<ResolvedAction> {
            match name {
                "setup-rust" => Ok(ResolvedAction {
                    name: name.to_string(),
                    version: version.to_string(),
                    command: "rustup toolchain install ${{ inputs.toolchain }}".to_string(),
                    inputs: vec![ActionInput {
                        name: "toolchain".to_string(),
                        required: true,
                        default: None,
                    }],
                }),
                "checkout" => Ok(ResolvedAction {
                    name: name.to_string(),
                    version: version.to_string(),
                    command: "git checkout ${{ inputs.ref }}".to_string(),
                    inputs: vec![ActionInput {
                        name: "ref".to_string(),
                        required: false,
                        default: Some("HEAD".to_string()),
                    }],
                }),
                _ => Err(Error::ActionNotFound(name.to_string())),
            }
        }
    }

    fn step(yaml: &str) -> StepDefinition {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn ctx() -> StepContext {
        StepContext {
            env: HashMap::new(),
            workdir: PathBuf::from("/tmp/work"),
            axes: IndexMap::new(),
            outputs: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_command_step_interpolates_env_and_matrix() {
        let commands = Arc::new(RecordingExecutor::new());
        let executor = StepExecutor::new(commands.clone(), Arc::new(StaticActions));

        let mut context = ctx();
        context.env.insert("TARGET_DIR".to_string(), "out".to_string());
        context.axes.insert("os".to_string(), "ubuntu".to_string());

        let step = step("run: build --os ${{ matrix.os }} --dir ${{ env.TARGET_DIR }}");
        let result = executor.execute(&step, 0, &context).await;

        assert!(result.success());
        assert_eq!(commands.commands(), ["build --os ubuntu --dir out"]);
    }

    #[tokio::test]
    async fn test_step_env_overrides_job_env() {
        let commands = Arc::new(RecordingExecutor::new());
        let executor = StepExecutor::new(commands.clone(), Arc::new(StaticActions));

        let mut context = ctx();
        context.env.insert("MODE".to_string(), "debug".to_string());

        let step = step("run: make\nenv:\n  MODE: release");
        executor.execute(&step, 0, &context).await;

        let log = commands.log.lock().unwrap();
        assert_eq!(log[0].1.get("MODE"), Some(&"release".to_string()));
    }

    #[tokio::test]
    async fn test_working_directory_is_interpolated_and_joined() {
        let commands = Arc::new(RecordingExecutor::new());
        let executor = StepExecutor::new(commands.clone(), Arc::new(StaticActions));

        let mut context = ctx();
        context.axes.insert("crate".to_string(), "core".to_string());

        let step = step("run: cargo test\nworking_directory: crates/${{ matrix.crate }}");
        executor.execute(&step, 0, &context).await;

        let log = commands.log.lock().unwrap();
        assert_eq!(log[0].2, PathBuf::from("/tmp/work/crates/core"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_failure_result() {
        let mut commands = RecordingExecutor::new();
        commands.fail_marker = Some("test".to_string());
        let executor = StepExecutor::new(Arc::new(commands), Arc::new(StaticActions));

        let step = step("run: cargo test");
        let result = executor.execute(&step, 0, &ctx()).await;

        assert_eq!(result.status, StepStatus::Failure);
        assert_eq!(result.exit_code, Some(1));
        assert_eq!(result.stderr, "boom");
    }

    #[tokio::test]
    async fn test_action_resolution_and_input_interpolation() {
        let commands = Arc::new(RecordingExecutor::new());
        let executor = StepExecutor::new(commands.clone(), Arc::new(StaticActions));

        let mut context = ctx();
        context.axes.insert("rust".to_string(), "beta".to_string());

        let step = step("uses: setup-rust@v1\nwith:\n  toolchain: ${{ matrix.rust }}");
        let result = executor.execute(&step, 0, &context).await;

        assert!(result.success());
        assert_eq!(commands.commands(), ["rustup toolchain install beta"]);
        let log = commands.log.lock().unwrap();
        assert_eq!(log[0].1.get("INPUT_TOOLCHAIN"), Some(&"beta".to_string()));
    }

    #[tokio::test]
    async fn test_action_default_input_applies() {
        let commands = Arc::new(RecordingExecutor::new());
        let executor = StepExecutor::new(commands.clone(), Arc::new(StaticActions));

        let step = step("uses: checkout@v2");
        let result = executor.execute(&step, 0, &ctx()).await;

        assert!(result.success());
        assert_eq!(commands.commands(), ["git checkout HEAD"]);
    }

    #[tokio::test]
    async fn test_missing_required_input_is_failure() {
        let executor =
            StepExecutor::new(Arc::new(RecordingExecutor::new()), Arc::new(StaticActions));

        let step = step("uses: setup-rust@v1");
        let result = executor.execute(&step, 0, &ctx()).await;

        assert_eq!(result.status, StepStatus::Failure);
        assert!(result.stderr.contains("toolchain"));
    }

    #[tokio::test]
    async fn test_unknown_action_is_failure_not_panic() {
        let executor =
            StepExecutor::new(Arc::new(RecordingExecutor::new()), Arc::new(StaticActions));

        let step = step("uses: deploy-to-mars@v9");
        let result = executor.execute(&step, 0, &ctx()).await;

        assert_eq!(result.status, StepStatus::Failure);
        assert!(result.stderr.contains("deploy-to-mars"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_executor_retried_then_succeeds() {
        let commands = Arc::new(RecordingExecutor {
            unavailable_times: Mutex::new(2),
            ..RecordingExecutor::new()
        });
        let executor = StepExecutor::new(commands.clone(), Arc::new(StaticActions));

        let step = step("run: make");
        let result = executor.execute(&step, 0, &ctx()).await;

        assert!(result.success());
        assert_eq!(commands.commands().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_executor_exhausts_retries() {
        let commands = Arc::new(RecordingExecutor {
            unavailable_times: Mutex::new(10),
            ..RecordingExecutor::new()
        });
        let executor = StepExecutor::new(commands, Arc::new(StaticActions));

        let step = step("run: make");
        let result = executor.execute(&step, 0, &ctx()).await;

        assert_eq!(result.status, StepStatus::Failure);
        assert!(result.stderr.contains("unavailable"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_timeout_is_failure() {
        let commands = Arc::new(RecordingExecutor {
            delay: Some(Duration::from_secs(120)),
            ..RecordingExecutor::new()
        });
        let config = ExecutorConfig {
            timeout_seconds: Some(1),
            ..ExecutorConfig::default()
        };
        let executor = StepExecutor::with_config(commands, Arc::new(StaticActions), config);

        let step = step("run: sleep forever");
        let result = executor.execute(&step, 0, &ctx()).await;

        assert_eq!(result.status, StepStatus::Failure);
        assert!(result.stderr.contains("timeout"));
    }

    #[test]
    fn test_parse_action_ref() {
        assert_eq!(
            parse_action_ref("checkout@v4").unwrap(),
            ("checkout".to_string(), "v4".to_string())
        );
        assert_eq!(
            parse_action_ref("checkout").unwrap(),
            ("checkout".to_string(), "latest".to_string())
        );
        assert!(parse_action_ref("@v1").is_err());
    }
}
