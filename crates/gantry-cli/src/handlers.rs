//! Command handlers.

use crate::commands::RunArgs;
use crate::sink::{ConsoleSink, JsonLinesSink};
use anyhow::{Context, bail};
use console::style;
use gantry_actions::builtin_registry;
use gantry_core::pipeline::PipelineConfig;
use gantry_core::ports::ReportSink;
use gantry_engine::{PipelineRunner, RunnerOptions, StepExecutor, TriggerEvent};
use gantry_runner::HostExecutor;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const TEMPLATE: &str = r#"name: my-pipeline

triggers:
  - type: push
    branches: [main]

env:
  CI: "true"

jobs:
  - name: test
    matrix:
      axes:
        rust: [stable]
    steps:
      - uses: setup-rust@v1
        with:
          toolchain: ${{ matrix.rust }}

      - name: test
        run: |
          echo "Testing..."
          # Add your test commands here
"#;

/// Initialize a new pipeline file.
pub fn init() -> anyhow::Result<()> {
    let path = Path::new("gantry.yaml");

    if path.exists() {
        println!("{} gantry.yaml already exists", style("!").yellow());
        return Ok(());
    }

    std::fs::write(path, TEMPLATE)?;
    println!("{} Created gantry.yaml", style("✓").green());
    Ok(())
}

/// Validate a pipeline configuration.
pub fn validate(path: Option<&str>) -> anyhow::Result<()> {
    let (path, config) = load(path)?;

    println!(
        "{} Pipeline \"{}\" is valid ({})",
        style("✓").green(),
        config.name,
        path.display()
    );
    println!("  Jobs: {}", config.jobs.len());
    for job in &config.jobs {
        println!("    - {} ({} steps)", job.name, job.steps.len());
    }

    Ok(())
}

/// List the job instances a pipeline expands to.
pub fn jobs(path: Option<&str>) -> anyhow::Result<()> {
    let (_, config) = load(path)?;
    let expander = gantry_engine::MatrixExpander::new();

    for job in &config.jobs {
        let instances = expander.expand(job)?;
        println!("{}", style(&job.name).bold());
        for instance in instances {
            println!("  [{}] {}", instance.index, instance.display_name);
        }
    }

    Ok(())
}

/// Run a pipeline locally. Returns whether the run succeeded; an event
/// that matches no trigger counts as success (nothing ran).
pub async fn run(args: RunArgs) -> anyhow::Result<bool> {
    let (path, mut config) = load(args.path.as_deref())?;
    if args.fail_fast {
        config.fail_fast = true;
    }
    let event = trigger_event(&args)?;

    let sink: Arc<dyn ReportSink> = if args.json {
        Arc::new(JsonLinesSink)
    } else {
        Arc::new(ConsoleSink)
    };

    let options = RunnerOptions {
        workspace: match args.workspace {
            Some(dir) => dir,
            None => std::env::current_dir()?,
        },
        variables: parse_vars(&args.vars)?,
        max_parallel: args.max_parallel,
        strict: args.strict,
    };

    let executor = StepExecutor::new(
        Arc::new(HostExecutor::default()),
        Arc::new(builtin_registry()),
    );
    let runner = PipelineRunner::with_options(executor, sink, options);

    match runner.handle_event(&config, &event).await? {
        Some(report) => Ok(report.success()),
        None => {
            println!(
                "{} No trigger in {} matches event '{}'",
                style("⊘").yellow(),
                path.display(),
                args.event
            );
            Ok(true)
        }
    }
}

fn trigger_event(args: &RunArgs) -> anyhow::Result<TriggerEvent> {
    let event = match args.event.as_str() {
        "push" => TriggerEvent::Push {
            branch: args.branch.clone(),
        },
        "pull_request" => TriggerEvent::PullRequest {
            source_branch: args.branch.clone(),
            target_branch: args.branch.clone(),
        },
        "tag" => TriggerEvent::Tag {
            name: args.branch.clone(),
        },
        "manual" => TriggerEvent::Manual {
            actor: std::env::var("USER").ok(),
        },
        "schedule" => TriggerEvent::Schedule,
        other => bail!("unknown event type: {}", other),
    };
    Ok(event)
}

fn parse_vars(vars: &[String]) -> anyhow::Result<HashMap<String, String>> {
    let mut parsed = HashMap::new();
    for var in vars {
        let Some((key, value)) = var.split_once('=') else {
            bail!("invalid --var '{}': expected KEY=VALUE", var);
        };
        parsed.insert(key.to_string(), value.to_string());
    }
    Ok(parsed)
}

fn load(path: Option<&str>) -> anyhow::Result<(PathBuf, PipelineConfig)> {
    let cwd = std::env::current_dir()?;
    let path = find_pipeline_file(&cwd, path)
        .context("no pipeline file found (looked for gantry.yaml, .gantry/pipeline.yaml)")?;
    let config = PipelineConfig::from_file(&path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    Ok((path, config))
}

/// Find the pipeline file: an explicit path wins, otherwise the standard
/// locations under `dir`.
fn find_pipeline_file(dir: &Path, explicit: Option<&str>) -> Option<PathBuf> {
    if let Some(p) = explicit {
        let path = PathBuf::from(p);
        return path.exists().then_some(path);
    }

    let candidates = [
        "gantry.yaml",
        "gantry.yml",
        ".gantry/pipeline.yaml",
        ".gantry/pipeline.yml",
    ];

    candidates
        .iter()
        .map(|candidate| dir.join(candidate))
        .find(|path| path.exists())
}
