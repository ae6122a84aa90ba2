//! Per-attempt workspace directories with RAII cleanup.

use crate::constants::WORKSPACE_PREFIX;
use crate::utils::fs::{ensure_dir, remove_dir_all, sanitize_component};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// A private copy of the package for one attempt.
///
/// The directory is removed by [`cleanup`](Self::cleanup), or on drop if the
/// attempt is abandoned early. Removal failures are logged, never returned.
///
/// Claiming and cleanup run on the blocking pool; only the drop fallback
/// removes in place.
#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
    removed: bool,
}

impl Workspace {
    /// Directory name for an attempt; the token keeps concurrent and repeated
    /// attempts apart.
    #[must_use]
    pub fn directory_name(package: &str, dependency: &str, version: &str) -> String {
        format!(
            "{}_{}_{}_{}_{}",
            WORKSPACE_PREFIX,
            sanitize_component(package),
            sanitize_component(dependency),
            sanitize_component(version),
            uuid::Uuid::new_v4().simple()
        )
    }

    /// Claim `path` as a fresh, empty workspace.
    ///
    /// Anything left at `path` by an earlier run is removed first.
    pub async fn claim(path: PathBuf) -> Result<Self> {
        tokio::task::spawn_blocking(move || Self::claim_blocking(path))
            .await
            .context("Workspace setup task panicked")?
    }

    fn claim_blocking(path: PathBuf) -> Result<Self> {
        if path.exists() {
            tracing::debug!(target: "sandbox", "Removing stale workspace {}", path.display());
            remove_dir_all(&path)?;
        }
        ensure_dir(&path)?;

        Ok(Self {
            path,
            removed: false,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the workspace now.
    pub async fn cleanup(mut self) {
        let path = self.path.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || self.remove()).await {
            tracing::warn!(target: "sandbox", "Workspace cleanup task failed for {}: {}", path.display(), e);
        }
    }

    fn remove(&mut self) {
        if self.removed {
            return;
        }
        self.removed = true;
        if let Err(e) = remove_dir_all(&self.path) {
            tracing::warn!(target: "sandbox", "Failed to remove workspace {}: {:#}", self.path.display(), e);
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.remove();
    }
}
