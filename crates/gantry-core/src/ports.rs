//! Port traits (hexagonal architecture).
//!
//! These traits define the interfaces between the orchestration core and
//! external collaborators. All side effects — process spawning, action
//! resolution, report delivery — happen behind these ports, which keeps
//! the core pure and testable with fakes.

use crate::error::Result;
use crate::events::RunEvent;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;

/// Output of one executed command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Outputs the command published through the output-file protocol.
    pub outputs: HashMap<String, String>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Successful empty output, for fakes and no-op commands.
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Command-execution collaborator.
///
/// The core never spawns processes itself; it hands a fully interpolated
/// command, a resolved environment, and a working directory to this port
/// and interprets the reported exit status. A non-zero exit code is a
/// normal `Ok` outcome; `Err(Error::Unavailable)` means the collaborator
/// itself could not be reached and the call may be retried.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(
        &self,
        command: &str,
        env: &HashMap<String, String>,
        cwd: &Path,
    ) -> Result<CommandOutput>;
}

/// Declared input parameter of an action.
#[derive(Debug, Clone)]
pub struct ActionInput {
    pub name: String,
    pub required: bool,
    pub default: Option<String>,
}

/// A resolved action: a command template plus its declared inputs.
///
/// Once resolved, the core treats the runnable exactly like a command
/// step; `${{ inputs.* }}` references in the template are filled from the
/// step's `with` mapping and the declared defaults.
#[derive(Debug, Clone)]
pub struct ResolvedAction {
    pub name: String,
    pub version: String,
    pub command: String,
    pub inputs: Vec<ActionInput>,
}

/// Action-registry collaborator: resolves `name@version` references.
#[async_trait]
pub trait ActionRegistry: Send + Sync {
    async fn resolve(&self, name: &str, version: &str) -> Result<ResolvedAction>;
}

/// Report sink: receives run lifecycle events. Delivery failures are the
/// sink's problem — the runner logs and keeps going.
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn publish(&self, event: RunEvent) -> Result<()>;
}

/// Sink that discards all events.
pub struct NullSink;

#[async_trait]
impl ReportSink for NullSink {
    async fn publish(&self, _event: RunEvent) -> Result<()> {
        Ok(())
    }
}
