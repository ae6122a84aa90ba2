//! Git integration: listing the published tags of a dependency.
//!
//! range-probe never clones a dependency. It asks the remote for its tag refs
//! with `git ls-remote --tags` and hands the raw lines to
//! [`crate::version::resolve`], which is responsible for reducing them to tag
//! names.
//!
//! # Examples
//!
//! ```rust,no_run
//! use range_probe::git::{ensure_git_available, list_remote_tags};
//!
//! # async fn example() -> anyhow::Result<()> {
//! ensure_git_available()?;
//! let refs = list_remote_tags("https://github.com/apple/swift-nio.git", "swift-nio").await?;
//! for line in &refs {
//!     println!("{line}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod command_builder;

use crate::constants::GIT_LS_REMOTE_TIMEOUT;
use crate::core::ProbeError;
use anyhow::Result;
use command_builder::GitCommand;

/// Name of the git executable for the current platform.
#[must_use]
pub const fn get_git_command() -> &'static str {
    if cfg!(windows) {
        "git.exe"
    } else {
        "git"
    }
}

/// Whether a usable git executable is on PATH.
#[must_use]
pub fn is_git_installed() -> bool {
    which::which(get_git_command()).is_ok()
}

/// Fail with [`ProbeError::GitNotFound`] unless git is installed.
pub fn ensure_git_available() -> Result<()> {
    if !is_git_installed() {
        return Err(ProbeError::GitNotFound.into());
    }
    Ok(())
}

/// List the raw tag ref lines of the repository at `url`.
///
/// Each returned line has the shape `<sha>\trefs/tags/<name>` (annotated tags
/// additionally appear peeled, with a `^{}` suffix). Any failure is reported
/// as [`ProbeError::TagListingFailed`].
pub async fn list_remote_tags(url: &str, dependency: &str) -> Result<Vec<String>> {
    let stdout = GitCommand::ls_remote_tags(url)
        .with_timeout(Some(GIT_LS_REMOTE_TIMEOUT))
        .with_context(dependency)
        .execute_stdout()
        .await
        .map_err(|e| {
            let reason = match e.downcast_ref::<ProbeError>() {
                Some(ProbeError::GitCommandError {
                    stderr,
                    ..
                }) => stderr.trim().to_string(),
                _ => format!("{e:#}"),
            };
            ProbeError::TagListingFailed {
                url: url.to_string(),
                reason,
            }
        })?;

    let refs: Vec<String> = stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(std::string::ToString::to_string)
        .collect();

    tracing::debug!(target: "git", "({}) {} refs listed from {}", dependency, refs.len(), url);
    Ok(refs)
}
