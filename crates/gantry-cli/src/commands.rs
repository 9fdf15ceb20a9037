//! CLI command definitions.

use clap::{Args, Subcommand};
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new pipeline file
    Init,

    /// Validate a pipeline configuration
    Validate {
        /// Path to the pipeline file
        path: Option<String>,
    },

    /// List the job instances a pipeline expands to
    Jobs {
        /// Path to the pipeline file
        path: Option<String>,
    },

    /// Run a pipeline locally
    Run(RunArgs),
}

#[derive(Args)]
pub struct RunArgs {
    /// Path to the pipeline file
    pub path: Option<String>,

    /// Trigger event type
    #[arg(long, default_value = "manual", value_parser = ["push", "pull_request", "tag", "manual", "schedule"])]
    pub event: String,

    /// Branch for push and pull_request events, tag name for tag events
    #[arg(short, long, default_value = "main")]
    pub branch: String,

    /// Extra environment overlaid on the pipeline env
    #[arg(long = "var", value_name = "KEY=VALUE")]
    pub vars: Vec<String>,

    /// Root directory for job instance workspaces
    #[arg(short, long)]
    pub workspace: Option<PathBuf>,

    /// Cap on concurrently running job instances
    #[arg(long)]
    pub max_parallel: Option<usize>,

    /// Enable fail-fast cancellation regardless of the pipeline setting
    #[arg(long)]
    pub fail_fast: bool,

    /// Abort the run when a matrix expansion fails instead of failing
    /// only the affected job
    #[arg(long)]
    pub strict: bool,

    /// Emit run events as JSON lines instead of styled output
    #[arg(long)]
    pub json: bool,
}
