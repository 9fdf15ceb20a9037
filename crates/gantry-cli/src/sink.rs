//! Report sinks for the CLI.

use async_trait::async_trait;
use console::style;
use gantry_core::Result;
use gantry_core::events::RunEvent;
use gantry_core::ports::ReportSink;
use gantry_core::run::{JobStatus, RunStatus, StepStatus};

fn secs(duration_ms: u64) -> f64 {
    duration_ms as f64 / 1000.0
}

/// Styled console output, one line per lifecycle event.
pub struct ConsoleSink;

#[async_trait]
impl ReportSink for ConsoleSink {
    async fn publish(&self, event: RunEvent) -> Result<()> {
        match event {
            RunEvent::RunStarted(p) => {
                println!(
                    "\n{} Running pipeline: {} ({} jobs)",
                    style("▶").cyan().bold(),
                    style(&p.pipeline_name).bold(),
                    p.job_count
                );
            }
            RunEvent::MatrixExpanded(p) => {
                if p.instance_count != 1 {
                    println!(
                        "  {} {} expands to {} instances",
                        style("≡").dim(),
                        p.job_name,
                        p.instance_count
                    );
                }
            }
            RunEvent::JobStarted(p) => {
                println!(
                    "{} Job: {}",
                    style("━━▶").cyan(),
                    style(&p.display_name).bold()
                );
            }
            RunEvent::StepStarted(_) => {}
            RunEvent::StepCompleted(p) => match p.status {
                StepStatus::Success => println!(
                    "    {} {} ({:.2}s)",
                    style("✓").green(),
                    p.step_name,
                    secs(p.duration_ms)
                ),
                StepStatus::Failure => println!(
                    "    {} {} exit code {} ({:.2}s)",
                    style("✗").red(),
                    p.step_name,
                    p.exit_code.map_or("-".to_string(), |c| c.to_string()),
                    secs(p.duration_ms)
                ),
                StepStatus::Skipped => {
                    println!("    {} {} (skipped)", style("⊘").dim(), style(&p.step_name).dim())
                }
                StepStatus::Cancelled => println!(
                    "    {} {} (cancelled)",
                    style("⊘").yellow(),
                    style(&p.step_name).dim()
                ),
            },
            RunEvent::JobCompleted(p) => match p.status {
                JobStatus::Success => println!(
                    "    {} Job {} passed ({:.2}s)\n",
                    style("✓").green(),
                    style(&p.display_name).dim(),
                    secs(p.duration_ms)
                ),
                JobStatus::Failure => println!(
                    "    {} Job {} failed ({:.2}s)\n",
                    style("✗").red(),
                    style(&p.display_name).dim(),
                    secs(p.duration_ms)
                ),
                JobStatus::Cancelled => println!(
                    "    {} Job {} cancelled\n",
                    style("⊘").yellow(),
                    style(&p.display_name).dim()
                ),
            },
            RunEvent::RunCancelled(p) => {
                println!(
                    "{} Fail-fast: cancelling remaining instances after failure in {}",
                    style("⚠").yellow().bold(),
                    style(&p.failed_job).bold()
                );
            }
            RunEvent::RunCompleted(p) => {
                if p.status == RunStatus::Success {
                    println!(
                        "{} Pipeline completed successfully in {:.2}s",
                        style("✓").green().bold(),
                        secs(p.duration_ms)
                    );
                } else {
                    println!(
                        "{} Pipeline failed after {:.2}s",
                        style("✗").red().bold(),
                        secs(p.duration_ms)
                    );
                }
            }
        }
        Ok(())
    }
}

/// One JSON object per event, for machine consumers.
pub struct JsonLinesSink;

#[async_trait]
impl ReportSink for JsonLinesSink {
    async fn publish(&self, event: RunEvent) -> Result<()> {
        println!("{}", serde_json::to_string(&event)?);
        Ok(())
    }
}
