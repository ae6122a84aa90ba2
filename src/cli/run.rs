//! `range-probe test`: build and test the package against every candidate.
//!
//! Each candidate runs in its own copy of the package; progress is shown as a
//! live table on stderr, followed by a summary. The command fails when any
//! candidate failed.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use super::common::{CommandContext, GlobalOptions};
use crate::core::ProbeError;
use crate::sandbox::{ProcessRunner, Sandbox, SandboxSettings, StageCommands};
use crate::scheduler::{RunReport, run_all};
use crate::tracker::{ProgressTracker, TableOutput};

/// Test every candidate version of a dependency.
#[derive(Args, Debug)]
pub struct TestCommand {
    /// Identity of the dependency, as declared in the manifest
    pub dependency: String,

    /// Number of versions tested at once (overrides `run.jobs`)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Directory in which workspaces are created (overrides `sandbox.workspace_root`)
    #[arg(long)]
    pub workspace_root: Option<PathBuf>,
}

impl TestCommand {
    pub async fn execute(self, options: &GlobalOptions) -> Result<()> {
        let context = CommandContext::prepare(options, &self.dependency).await?;
        context.require_candidates()?;

        let workspace_root = match self.workspace_root {
            Some(root) => root,
            None => context.config.workspace_root()?,
        };
        let jobs = self.jobs.unwrap_or(context.config.run.jobs);

        let settings = SandboxSettings {
            package_path: options.package_path.clone(),
            package_name: context.package.name.clone(),
            dependency: context.dependency.identity.clone(),
            workspace_root,
            exclude: context.config.sandbox.exclude.clone(),
            commands: StageCommands::from_config(&context.config.commands)?,
        };
        let sandbox = Sandbox::new(ProcessRunner, settings);

        eprintln!(
            "Testing {} against {} versions of {} {}",
            context.package.name.bold(),
            context.candidates.len(),
            context.dependency.identity.bold(),
            context.range
        );

        let tracker = ProgressTracker::new(
            context.candidates.iter().map(|candidate| candidate.version.clone()),
            TableOutput::stderr(options.no_progress),
            context.config.tick_interval(),
        );
        tracker.route_logs_above_table().await;
        let report = run_all(&sandbox, &tracker, &context.candidates, jobs).await;

        print_summary(&report);
        if report.all_passed() {
            Ok(())
        } else {
            Err(ProbeError::AttemptsFailed {
                failed: report.failed(),
                total: report.outcomes.len(),
            }
            .into())
        }
    }
}

fn print_summary(report: &RunReport) {
    let passed = format!("{} passed", report.passed());
    let failed = format!("{} failed", report.failed());
    let failed = if report.failed() > 0 {
        failed.red().bold()
    } else {
        failed.normal()
    };
    eprintln!("\n{}, {}", passed.green(), failed);
}
