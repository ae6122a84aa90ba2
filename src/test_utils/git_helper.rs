//! Git test helper utilities
//!
//! Builds small local repositories whose tags stand in for published
//! versions of a dependency.

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Git command wrapper for tests
pub struct TestGit {
    repo_path: PathBuf,
}

impl TestGit {
    fn run_git_command(&self, args: &[&str], action: &str) -> Result<std::process::Output> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_path)
            .output()
            .with_context(|| action.to_string())?;

        if !output.status.success() {
            bail!("{} failed: {}", action, String::from_utf8_lossy(&output.stderr));
        }

        Ok(output)
    }

    /// Create a new TestGit instance for the given repository path
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
        }
    }

    pub fn init(&self) -> Result<()> {
        self.run_git_command(&["init"], "Failed to initialize git repository")?;
        Ok(())
    }

    /// Configure git user for tests
    pub fn config_user(&self) -> Result<()> {
        self.run_git_command(
            &["config", "user.email", "test@range-probe.example"],
            "Failed to configure git user email",
        )?;
        self.run_git_command(&["config", "user.name", "Test User"], "Failed to configure git user name")?;
        self.run_git_command(&["config", "commit.gpgsign", "false"], "Failed to disable commit signing")?;
        self.run_git_command(&["config", "tag.gpgsign", "false"], "Failed to disable tag signing")?;
        Ok(())
    }

    pub fn add_all(&self) -> Result<()> {
        self.run_git_command(&["add", "."], "Failed to add files to git")?;
        Ok(())
    }

    pub fn commit(&self, message: &str) -> Result<()> {
        self.run_git_command(&["commit", "-m", message], "Failed to create git commit")?;
        Ok(())
    }

    /// Initialize the repository with one commit, ready for tagging
    pub fn init_with_commit(&self) -> Result<()> {
        std::fs::create_dir_all(&self.repo_path)?;
        self.init()?;
        self.config_user()?;
        std::fs::write(self.repo_path.join("README.md"), "# test dependency\n")?;
        self.add_all()?;
        self.commit("Initial commit")
    }

    /// Create a lightweight tag
    pub fn tag(&self, tag_name: &str) -> Result<()> {
        self.run_git_command(&["tag", tag_name], &format!("Failed to create tag: {tag_name}"))?;
        Ok(())
    }

    /// Create an annotated tag; `ls-remote` lists it twice (plain and peeled)
    pub fn annotated_tag(&self, tag_name: &str) -> Result<()> {
        self.run_git_command(
            &["tag", "-a", tag_name, "-m", tag_name],
            &format!("Failed to create annotated tag: {tag_name}"),
        )?;
        Ok(())
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }
}
