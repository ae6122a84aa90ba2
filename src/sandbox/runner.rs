//! Running external commands inside a workspace.
//!
//! [`ActionRunner`] is the seam between the sandbox and the operating system:
//! [`ProcessRunner`] spawns real processes, tests substitute a scripted fake.
//! Commands come from configuration as [`CommandTemplate`]s and are rendered
//! per attempt with [`TemplateVars`].

use crate::core::ProbeError;
use anyhow::{Context, Result};
use regex::{Captures, Regex};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::OnceLock;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

/// Receives output lines as they are produced.
pub type LineSink = mpsc::UnboundedSender<String>;

/// Placeholders a command template may reference.
pub const PLACEHOLDERS: [&str; 4] = ["dependency", "version", "package", "workspace"];

/// How a finished command exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionStatus {
    /// Whether the command exited successfully
    pub success: bool,
    /// Exit code; `None` when terminated by a signal
    pub code: Option<i32>,
}

impl ActionStatus {
    #[must_use]
    pub const fn succeeded() -> Self {
        Self {
            success: true,
            code: Some(0),
        }
    }

    #[must_use]
    pub const fn failed(code: i32) -> Self {
        Self {
            success: false,
            code: Some(code),
        }
    }

    /// Short description used when a failed command printed nothing.
    #[must_use]
    pub fn describe(&self) -> String {
        match self.code {
            Some(code) => format!("exited with code {code}"),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Runs one external command to completion.
///
/// Every line of output (stdout and stderr interleaved) is sent to `lines`
/// while the command runs. An `Err` means the command could not be run at all.
pub trait ActionRunner: Send + Sync {
    fn invoke(
        &self,
        argv: &[String],
        working_dir: &Path,
        lines: &LineSink,
    ) -> impl Future<Output = Result<ActionStatus>> + Send;
}

/// Spawns commands as child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ActionRunner for ProcessRunner {
    async fn invoke(
        &self,
        argv: &[String],
        working_dir: &Path,
        lines: &LineSink,
    ) -> Result<ActionStatus> {
        let (program, args) = argv.split_first().context("Cannot run an empty command")?;

        tracing::debug!(target: "sandbox", "Executing command: {} (in {})", argv.join(" "), working_dir.display());

        let mut child = Command::new(program)
            .args(args)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to execute {program}"))?;

        let stdout = child.stdout.take().context("Child stdout was not captured")?;
        let stderr = child.stderr.take().context("Child stderr was not captured")?;

        let (out, err) = tokio::join!(forward_lines(stdout, lines), forward_lines(stderr, lines));
        out.with_context(|| format!("Failed to read output of {program}"))?;
        err.with_context(|| format!("Failed to read output of {program}"))?;

        let status = child.wait().await.with_context(|| format!("Failed to wait for {program}"))?;

        tracing::trace!(target: "sandbox", "{} finished with {}", program, status);
        Ok(ActionStatus {
            success: status.success(),
            code: status.code(),
        })
    }
}

async fn forward_lines<R: AsyncRead + Unpin>(reader: R, lines: &LineSink) -> std::io::Result<()> {
    let mut segments = BufReader::new(reader).split(b'\n');
    while let Some(segment) = segments.next_segment().await? {
        let line = String::from_utf8_lossy(&segment);
        // Receivers going away only means nobody is watching any more
        let _ = lines.send(line.trim_end_matches('\r').to_string());
    }
    Ok(())
}

/// Values substituted into command templates.
#[derive(Debug, Clone)]
pub struct TemplateVars {
    pub dependency: String,
    pub version: String,
    pub package: String,
    pub workspace: PathBuf,
}

impl TemplateVars {
    fn lookup(&self, name: &str) -> Option<String> {
        match name {
            "dependency" => Some(self.dependency.clone()),
            "version" => Some(self.version.clone()),
            "package" => Some(self.package.clone()),
            "workspace" => Some(self.workspace.display().to_string()),
            _ => None,
        }
    }
}

/// A configured argv with `{placeholder}` references.
///
/// Only `{name}` where `name` is lowercase ASCII letters or `_` counts as a
/// placeholder, so shell syntax such as `${HOME}` passes through untouched.
/// An empty template means the step is skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    args: Vec<String>,
}

impl CommandTemplate {
    /// Validate `args`, rejecting unknown placeholders.
    ///
    /// `step` is the configuration key, used in the error.
    pub fn new(step: &str, args: Vec<String>) -> Result<Self, ProbeError> {
        let Some(placeholder) = placeholder_regex() else {
            return Err(ProbeError::InvalidCommandTemplate {
                step: step.to_string(),
                reason: "placeholder pattern failed to compile".to_string(),
            });
        };
        for arg in &args {
            for caps in placeholder.captures_iter(arg) {
                let name = &caps[1];
                if !PLACEHOLDERS.contains(&name) {
                    return Err(ProbeError::InvalidCommandTemplate {
                        step: step.to_string(),
                        reason: format!("unknown placeholder {{{name}}} in '{arg}'"),
                    });
                }
            }
        }
        if args.first().is_some_and(|program| program.trim().is_empty()) {
            return Err(ProbeError::InvalidCommandTemplate {
                step: step.to_string(),
                reason: "the program name is blank".to_string(),
            });
        }
        Ok(Self {
            args,
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Substitute every placeholder.
    #[must_use]
    pub fn render(&self, vars: &TemplateVars) -> Vec<String> {
        self.args.iter().map(|arg| substitute(arg, vars)).collect()
    }
}

const PLACEHOLDER_PATTERN: &str = r"\{([a-z_]+)\}";

fn placeholder_regex() -> Option<&'static Regex> {
    static PLACEHOLDER: OnceLock<Option<Regex>> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(PLACEHOLDER_PATTERN).ok()).as_ref()
}

fn substitute(arg: &str, vars: &TemplateVars) -> String {
    let Some(placeholder) = placeholder_regex() else {
        return arg.to_string();
    };
    placeholder
        .replace_all(arg, |caps: &Captures<'_>| vars.lookup(&caps[1]).unwrap_or_else(|| caps[0].to_string()))
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| (*s).to_string()).collect()
    }

    fn vars() -> TemplateVars {
        TemplateVars {
            dependency: "swift-nio".to_string(),
            version: "2.1.0".to_string(),
            package: "Demo".to_string(),
            workspace: PathBuf::from("/tmp/ws"),
        }
    }

    #[test]
    fn test_render_substitutes_placeholders() {
        let template = CommandTemplate::new(
            "pin",
            argv(&["swift", "package", "resolve", "{dependency}", "--version", "{version}"]),
        )
        .unwrap();

        assert_eq!(
            template.render(&vars()),
            ["swift", "package", "resolve", "swift-nio", "--version", "2.1.0"]
        );
    }

    #[test]
    fn test_render_inside_larger_argument() {
        let template =
            CommandTemplate::new("test", argv(&["sh", "-c", "echo {package}@{version} > ${OUT}"]))
                .unwrap();
        assert_eq!(template.render(&vars())[2], "echo Demo@2.1.0 > ${OUT}");

        let template = CommandTemplate::new("clean", argv(&["rm", "-rf", "{workspace}/.build"])).unwrap();
        assert_eq!(template.render(&vars())[2], "/tmp/ws/.build");
    }

    #[test]
    fn test_unknown_placeholder_is_rejected() {
        let err = CommandTemplate::new("pin", argv(&["pin", "{tag}"])).unwrap_err();
        assert!(matches!(
            err,
            ProbeError::InvalidCommandTemplate { ref step, ref reason } if step == "pin" && reason.contains("{tag}")
        ));
    }

    #[test]
    fn test_braces_that_are_not_placeholders() {
        let template = CommandTemplate::new("test", argv(&["awk", "{ print $1 }", "{}", "{"])).unwrap();
        assert_eq!(template.render(&vars()), ["awk", "{ print $1 }", "{}", "{"]);
    }

    #[test]
    fn test_empty_template_is_a_skip() {
        let template = CommandTemplate::new("clean", Vec::new()).unwrap();
        assert!(template.is_empty());
        assert!(CommandTemplate::new("clean", argv(&[" "])).is_err());
    }

    #[test]
    fn test_status_description() {
        assert_eq!(ActionStatus::failed(2).describe(), "exited with code 2");
        let signalled = ActionStatus {
            success: false,
            code: None,
        };
        assert_eq!(signalled.describe(), "terminated by signal");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_runner_merges_output() {
        let temp = tempfile::TempDir::new().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let status = ProcessRunner
            .invoke(&argv(&["sh", "-c", "echo out; echo err >&2; exit 3"]), temp.path(), &tx)
            .await
            .unwrap();
        drop(tx);

        assert_eq!(status, ActionStatus::failed(3));
        let mut lines = Vec::new();
        while let Some(line) = rx.recv().await {
            lines.push(line);
        }
        lines.sort();
        assert_eq!(lines, ["err", "out"]);
    }

    #[tokio::test]
    async fn test_process_runner_spawn_failure() {
        let temp = tempfile::TempDir::new().unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();

        let result = ProcessRunner
            .invoke(&argv(&["range-probe-no-such-program"]), temp.path(), &tx)
            .await;
        assert!(result.is_err());
    }
}
