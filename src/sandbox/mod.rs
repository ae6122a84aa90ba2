//! Isolated attempts: one candidate version tested in a private copy of the
//! package.
//!
//! An attempt runs these stages in order and stops at the first failure:
//!
//! | Stage            | Config key | What happens                                   |
//! |------------------|------------|------------------------------------------------|
//! | `copy`           | -          | fresh workspace, package tree copied into it   |
//! | `clean`          | `clean`    | build and cache state removed                  |
//! | `resolveAll`     | `resolve`  | every dependency resolved                      |
//! | `resolveVersion` | `pin`      | dependency under test pinned to the candidate  |
//! | `test`           | `test`     | the compatibility test                         |
//!
//! The workspace is removed when the attempt ends, whatever the outcome.
//! Attempt failures never escape as errors; they are reported as
//! [`Outcome::Failed`].

pub mod runner;
pub mod workspace;

pub use runner::{ActionRunner, ActionStatus, CommandTemplate, LineSink, ProcessRunner, TemplateVars};
pub use workspace::Workspace;

use crate::config::CommandsConfig;
use crate::utils::fs::copy_tree;
use anyhow::{Context, Result};
use semver::Version;
use std::fmt;
use std::path::PathBuf;
use tokio::sync::mpsc;

/// A step of an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Copy,
    Clean,
    ResolveAll,
    ResolveVersion,
    Test,
}

impl Stage {
    /// Stages that run an external command, in execution order.
    pub const COMMANDS: [Self; 4] = [Self::Clean, Self::ResolveAll, Self::ResolveVersion, Self::Test];

    /// Key of the stage's command under `[commands]`.
    #[must_use]
    pub const fn config_key(self) -> &'static str {
        match self {
            Self::Copy => "copy",
            Self::Clean => "clean",
            Self::ResolveAll => "resolve",
            Self::ResolveVersion => "pin",
            Self::Test => "test",
        }
    }

    fn announcement(self, dependency: &str, version: &Version) -> String {
        match self {
            Self::Copy => "Copying package...".to_string(),
            Self::Clean => "Cleaning workspace...".to_string(),
            Self::ResolveAll => "Resolving dependencies...".to_string(),
            Self::ResolveVersion => format!("Pinning {dependency} to {version}..."),
            Self::Test => "Running tests...".to_string(),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Copy => "copy",
            Self::Clean => "clean",
            Self::ResolveAll => "resolveAll",
            Self::ResolveVersion => "resolveVersion",
            Self::Test => "test",
        };
        f.write_str(label)
    }
}

/// Result of one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Failed {
        stage: Stage,
        reason: String,
    },
}

impl Outcome {
    #[must_use]
    pub const fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }

    fn failed(stage: Stage, reason: impl Into<String>) -> Self {
        Self::Failed {
            stage,
            reason: reason.into(),
        }
    }
}

/// Validated commands for every command stage.
#[derive(Debug, Clone)]
pub struct StageCommands {
    pub clean: CommandTemplate,
    pub resolve: CommandTemplate,
    pub pin: CommandTemplate,
    pub test: CommandTemplate,
}

impl StageCommands {
    pub fn from_config(commands: &CommandsConfig) -> Result<Self> {
        Ok(Self {
            clean: CommandTemplate::new(Stage::Clean.config_key(), commands.clean.clone())?,
            resolve: CommandTemplate::new(Stage::ResolveAll.config_key(), commands.resolve.clone())?,
            pin: CommandTemplate::new(Stage::ResolveVersion.config_key(), commands.pin.clone())?,
            test: CommandTemplate::new(Stage::Test.config_key(), commands.test.clone())?,
        })
    }

    const fn for_stage(&self, stage: Stage) -> Option<&CommandTemplate> {
        match stage {
            Stage::Copy => None,
            Stage::Clean => Some(&self.clean),
            Stage::ResolveAll => Some(&self.resolve),
            Stage::ResolveVersion => Some(&self.pin),
            Stage::Test => Some(&self.test),
        }
    }
}

/// Everything an attempt needs besides the version.
#[derive(Debug, Clone)]
pub struct SandboxSettings {
    /// The package under test
    pub package_path: PathBuf,
    /// Package name, used in workspace names and `{package}`
    pub package_name: String,
    /// Identity of the dependency being varied
    pub dependency: String,
    /// Parent directory of workspaces
    pub workspace_root: PathBuf,
    /// Directory names not copied into workspaces
    pub exclude: Vec<String>,
    pub commands: StageCommands,
}

/// Runs attempts, each in its own workspace.
pub struct Sandbox<R> {
    runner: R,
    settings: SandboxSettings,
}

impl<R: ActionRunner> Sandbox<R> {
    pub const fn new(runner: R, settings: SandboxSettings) -> Self {
        Self {
            runner,
            settings,
        }
    }

    #[must_use]
    pub const fn settings(&self) -> &SandboxSettings {
        &self.settings
    }

    /// Test `version` in a fresh workspace.
    ///
    /// A short line announcing each stage, followed by the stage's own output,
    /// is sent to `lines`. The sender is dropped when the attempt ends.
    pub async fn run_attempt(&self, version: &Version, lines: LineSink) -> Outcome {
        let name = Workspace::directory_name(
            &self.settings.package_name,
            &self.settings.dependency,
            &version.to_string(),
        );
        let _ = lines.send(Stage::Copy.announcement(&self.settings.dependency, version));

        let workspace = match Workspace::claim(self.settings.workspace_root.join(name)).await {
            Ok(workspace) => workspace,
            Err(e) => return Outcome::failed(Stage::Copy, format!("{e:#}")),
        };
        tracing::debug!(target: "sandbox", "({}) Workspace {}", version, workspace.path().display());

        let outcome = match self.copy_package(&workspace).await {
            Ok(()) => self.run_stages(&workspace, version, &lines).await,
            Err(e) => Outcome::failed(Stage::Copy, format!("{e:#}")),
        };

        workspace.cleanup().await;
        match &outcome {
            Outcome::Passed => tracing::info!(target: "sandbox", "({}) passed", version),
            Outcome::Failed {
                stage,
                reason,
            } => tracing::info!(target: "sandbox", "({}) failed at {}: {}", version, stage, reason),
        }
        outcome
    }

    async fn copy_package(&self, workspace: &Workspace) -> Result<()> {
        let src = self.settings.package_path.clone();
        let dst = workspace.path().to_path_buf();
        let exclude = self.settings.exclude.clone();
        let skip = self.nested_workspace_root();

        tokio::task::spawn_blocking(move || copy_tree(&src, &dst, &exclude, skip.as_deref()))
            .await
            .context("Copy task panicked")?
    }

    /// The workspace root, when it lies inside the package tree.
    fn nested_workspace_root(&self) -> Option<PathBuf> {
        let package = self.settings.package_path.canonicalize().ok()?;
        let root = self.settings.workspace_root.canonicalize().ok()?;
        if root.starts_with(&package) && root != package {
            // The walk sees paths under the package path as given, not canonical ones
            let relative = root.strip_prefix(&package).ok()?;
            Some(self.settings.package_path.join(relative))
        } else {
            None
        }
    }

    async fn run_stages(&self, workspace: &Workspace, version: &Version, lines: &LineSink) -> Outcome {
        let vars = TemplateVars {
            dependency: self.settings.dependency.clone(),
            version: version.to_string(),
            package: self.settings.package_name.clone(),
            workspace: workspace.path().to_path_buf(),
        };

        for stage in Stage::COMMANDS {
            let Some(template) = self.settings.commands.for_stage(stage) else {
                continue;
            };
            if template.is_empty() {
                tracing::trace!(target: "sandbox", "({}) No command for {}, skipping", version, stage);
                continue;
            }

            let _ = lines.send(stage.announcement(&self.settings.dependency, version));
            if let Err(reason) = self.run_step(&template.render(&vars), workspace, lines).await {
                return Outcome::failed(stage, reason);
            }
        }

        Outcome::Passed
    }

    /// Run one command, relaying its output; the error is the failure reason.
    async fn run_step(&self, argv: &[String], workspace: &Workspace, lines: &LineSink) -> Result<(), String> {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        let invoke = async move {
            let result = self.runner.invoke(argv, workspace.path(), &tx).await;
            drop(tx);
            result
        };
        let relay = async {
            let mut last = None;
            while let Some(line) = rx.recv().await {
                tracing::debug!(target: "sandbox", "({}) {}", workspace.path().display(), line);
                if !line.trim().is_empty() {
                    last = Some(line.trim().to_string());
                }
                let _ = lines.send(line);
            }
            last
        };

        let (result, last_line) = tokio::join!(invoke, relay);
        match result {
            Ok(status) if status.success => Ok(()),
            Ok(status) => Err(last_line.unwrap_or_else(|| status.describe())),
            Err(e) => Err(format!("{e:#}")),
        }
    }
}
