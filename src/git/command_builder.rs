//! Builder for git commands with consistent logging, timeouts and errors.

use anyhow::{Context, Result};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::core::ProbeError;
use crate::git::get_git_command;

/// Fluent builder for a single git invocation.
///
/// Output is always captured. Failures are reported as
/// [`ProbeError::GitCommandError`] carrying the subcommand and its stderr.
///
/// # Examples
///
/// ```rust,no_run
/// use range_probe::git::command_builder::GitCommand;
///
/// # async fn example() -> anyhow::Result<()> {
/// let refs = GitCommand::ls_remote_tags("https://github.com/apple/swift-nio.git")
///     .with_context("swift-nio")
///     .execute_stdout()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct GitCommand {
    /// Command arguments to pass to git
    args: Vec<String>,

    /// Environment variables to set for the git process
    env_vars: Vec<(String, String)>,

    /// Maximum duration to wait for completion (None = no timeout)
    timeout_duration: Option<Duration>,

    /// Identifier included in log lines, typically the dependency name
    context: Option<String>,
}

impl Default for GitCommand {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            env_vars: Vec::new(),
            timeout_duration: Some(Duration::from_secs(300)),
            context: None,
        }
    }
}

impl GitCommand {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// Set a custom timeout for the command (None for no timeout)
    pub const fn with_timeout(mut self, duration: Option<Duration>) -> Self {
        self.timeout_duration = duration;
        self
    }

    /// Set a context for logging (e.g., dependency name)
    ///
    /// With context, log messages include the identifier:
    /// ```text
    /// (swift-nio) Executing command: git ls-remote --tags https://...
    /// ```
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Execute the command and return the output
    pub async fn execute(self) -> Result<GitCommandOutput> {
        let start = std::time::Instant::now();
        let git_command = get_git_command();
        let mut cmd = Command::new(git_command);

        let full_args = self.args.clone();
        cmd.args(&full_args);
        let ctx = self.context.as_deref().map(|c| format!("({c}) ")).unwrap_or_default();

        tracing::debug!(
            target: "git",
            "{}Executing command: {} {}",
            ctx,
            git_command,
            full_args.join(" ")
        );

        for (key, value) in &self.env_vars {
            tracing::trace!(target: "git", "Setting env var: {}={}", key, value);
            cmd.env(key, value);
        }

        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let operation = self.args.first().cloned().unwrap_or_else(|| "unknown".to_string());
        let output_future = cmd.output();

        let output = if let Some(duration) = self.timeout_duration {
            if let Ok(result) = timeout(duration, output_future).await {
                result.with_context(|| format!("Failed to execute git {}", full_args.join(" ")))?
            } else {
                tracing::warn!(
                    target: "git",
                    "{}Command timed out after {} seconds: git {}",
                    ctx,
                    duration.as_secs(),
                    full_args.join(" ")
                );
                return Err(ProbeError::GitCommandError {
                    operation,
                    stderr: format!(
                        "Git command timed out after {} seconds. This may indicate:\n\
                        - Network connectivity issues\n\
                        - Authentication prompts waiting for input\n\
                        Try running the command manually: git {}",
                        duration.as_secs(),
                        full_args.join(" ")
                    ),
                }
                .into());
            }
        } else {
            output_future
                .await
                .with_context(|| format!("Failed to execute git {}", full_args.join(" ")))?
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);

            tracing::debug!(
                target: "git",
                "{}Command failed with exit code: {:?}",
                ctx,
                output.status.code()
            );
            if !stderr.is_empty() {
                tracing::debug!(target: "git", "{}Error: {}", ctx, stderr.trim());
            }

            return Err(ProbeError::GitCommandError {
                operation,
                stderr: stderr.to_string(),
            }
            .into());
        }

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr);
        // Warnings such as redirects still come through on success
        if !stderr.trim().is_empty() {
            tracing::debug!(target: "git", "{}stderr: {}", ctx, stderr.trim());
        }

        let elapsed = start.elapsed();
        if elapsed.as_secs() > 1 {
            tracing::info!(target: "git::perf", "{}Git {} took {:.2}s", ctx, operation, elapsed.as_secs_f64());
        } else if elapsed.as_millis() > 100 {
            tracing::debug!(target: "git::perf", "{}Git {} took {}ms", ctx, operation, elapsed.as_millis());
        }

        Ok(GitCommandOutput {
            stdout,
        })
    }

    /// Execute the command and return only stdout as a trimmed string
    pub async fn execute_stdout(self) -> Result<String> {
        let output = self.execute().await?;
        Ok(output.stdout.trim().to_string())
    }
}

/// Output from a git command
pub struct GitCommandOutput {
    /// Standard output from the git command
    pub stdout: String,
}

// Convenience builders for common git operations

impl GitCommand {
    /// List the tag refs of a remote without cloning it.
    pub fn ls_remote_tags(url: &str) -> Self {
        Self::new()
            .args(["ls-remote", "--tags", url])
            .env("GIT_TERMINAL_PROMPT", "0")
    }
}
