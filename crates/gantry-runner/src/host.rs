//! Shell-based command execution on the host.

use async_trait::async_trait;
use gantry_core::ports::{CommandExecutor, CommandOutput};
use gantry_core::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tracing::{debug, info};

/// Configuration for the host executor.
#[derive(Debug, Clone)]
pub struct HostExecutorConfig {
    /// Shell the command is handed to (`<shell> -c <command>`).
    pub shell: String,
    /// When false, the child only sees the mapping provided by the engine,
    /// not the parent process environment.
    pub inherit_env: bool,
}

impl Default for HostExecutorConfig {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
            inherit_env: true,
        }
    }
}

/// Command executor that spawns `sh -c` processes on the host.
pub struct HostExecutor {
    config: HostExecutorConfig,
}

impl HostExecutor {
    pub fn new(config: HostExecutorConfig) -> Self {
        Self { config }
    }

    async fn ensure_workdir(&self, cwd: &Path) -> Result<()> {
        if !cwd.exists() {
            tokio::fs::create_dir_all(cwd).await.map_err(|e| {
                Error::Unavailable(format!(
                    "cannot create working directory {}: {}",
                    cwd.display(),
                    e
                ))
            })?;
            debug!(path = %cwd.display(), "Working directory created");
        }
        Ok(())
    }
}

impl Default for HostExecutor {
    fn default() -> Self {
        Self::new(HostExecutorConfig::default())
    }
}

#[async_trait]
impl CommandExecutor for HostExecutor {
    async fn execute(
        &self,
        command: &str,
        env: &HashMap<String, String>,
        cwd: &Path,
    ) -> Result<CommandOutput> {
        self.ensure_workdir(cwd).await?;

        // Commands publish step outputs by appending `key=value` lines to
        // the file named by $GANTRY_OUTPUT.
        let output_file = output_file_path(cwd);

        info!(command = %command, cwd = %cwd.display(), "Executing shell command");

        let mut cmd = tokio::process::Command::new(&self.config.shell);
        cmd.arg("-c")
            .arg(command)
            .current_dir(cwd)
            .env("GANTRY_OUTPUT", &output_file)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // The engine may drop us on timeout; the child must not outlive
            // that.
            .kill_on_drop(true);

        if !self.config.inherit_env {
            cmd.env_clear();
        }
        cmd.envs(env);

        let output = cmd
            .output()
            .await
            .map_err(|e| Error::Unavailable(format!("failed to spawn {}: {}", self.config.shell, e)))?;

        let exit_code = output.status.code().unwrap_or(-1);
        debug!(exit_code, "Command completed");

        let outputs = read_outputs(&output_file).await;

        Ok(CommandOutput {
            exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
            outputs,
        })
    }
}

fn output_file_path(cwd: &Path) -> PathBuf {
    cwd.join(format!(".gantry_output_{}", std::process::id()))
}

/// Parse and remove the output file, if the command wrote one.
/// Format: one `key=value` per line; blank lines ignored.
async fn read_outputs(path: &Path) -> HashMap<String, String> {
    let mut outputs = HashMap::new();
    if let Ok(content) = tokio::fs::read_to_string(path).await {
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                if !key.is_empty() {
                    outputs.insert(key.to_string(), value.trim().to_string());
                }
            }
        }
        let _ = tokio::fs::remove_file(path).await;
    }
    outputs
}
