//! Setup shared by the `resolve` and `test` commands.
//!
//! Both commands start the same way: load configuration, read the manifest
//! description, look up the dependency, check that it has a range and a
//! remote, list its tags and resolve candidates. Every failure here is
//! run-level and stops the command before any attempt starts.

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::config::ProbeConfig;
use crate::core::ProbeError;
use crate::git::{ensure_git_available, list_remote_tags};
use crate::manifest::{Dependency, DescriptionSource, PackageDescription, VersionRange, load_description};
use crate::utils::progress::Spinner;
use crate::version::{Candidate, resolve};

/// Options that apply to every subcommand.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    /// Explicit configuration file
    pub config_path: Option<PathBuf>,
    /// Directory of the package under test
    pub package_path: PathBuf,
    /// Pre-generated manifest description
    pub description: Option<PathBuf>,
    /// Disable spinners and live redraws
    pub no_progress: bool,
}

/// Everything known about the run once candidates are resolved.
#[derive(Debug)]
pub struct CommandContext {
    pub config: ProbeConfig,
    pub package: PackageDescription,
    pub dependency: Dependency,
    pub range: VersionRange,
    pub candidates: Vec<Candidate>,
}

impl CommandContext {
    /// Load, look up and resolve `dependency` for the package in `options`.
    pub async fn prepare(options: &GlobalOptions, dependency: &str) -> Result<Self> {
        let config = ProbeConfig::discover(options.config_path.as_deref(), &options.package_path).await?;

        let source = description_source(options, &config)?;
        let package = load_description(&source, &options.package_path).await?;
        let dependency = package.dependency(dependency)?.clone();

        let range = dependency.tested_range()?.clone();
        let Some(location) = dependency.location.clone() else {
            return Err(ProbeError::NoRemoteLocation {
                name: dependency.identity.clone(),
            }
            .into());
        };

        ensure_git_available()?;
        let spinner = Spinner::start(format!("Listing tags of {}", dependency.identity), options.no_progress);
        let refs = list_remote_tags(&location, &dependency.identity).await;
        spinner.finish_and_clear();

        let candidates = resolve(&dependency, refs?)?;
        tracing::info!(
            "{} candidate versions of '{}' in {}",
            candidates.len(),
            dependency.identity,
            range
        );

        Ok(Self {
            config,
            package,
            dependency,
            range,
            candidates,
        })
    }

    /// Fail with [`ProbeError::NoCandidates`] when nothing is left to test.
    pub fn require_candidates(&self) -> Result<()> {
        if self.candidates.is_empty() {
            return Err(ProbeError::NoCandidates {
                name: self.dependency.identity.clone(),
                range: self.range.to_string(),
            }
            .into());
        }
        Ok(())
    }
}

fn description_source(options: &GlobalOptions, config: &ProbeConfig) -> Result<DescriptionSource> {
    if let Some(path) = &options.description {
        return Ok(DescriptionSource::File(path.clone()));
    }
    ensure_package_dir(&options.package_path)?;
    if config.commands.describe.is_empty() {
        return Err(ProbeError::ManifestDescriptionFailed {
            path: options.package_path.display().to_string(),
            reason: "no manifest description given and no describe command configured".to_string(),
        }
        .into());
    }
    Ok(DescriptionSource::Command(config.commands.describe.clone()))
}

fn ensure_package_dir(path: &Path) -> Result<()> {
    if !path.is_dir() {
        return Err(ProbeError::ManifestDescriptionFailed {
            path: path.display().to_string(),
            reason: "package directory does not exist".to_string(),
        }
        .into());
    }
    Ok(())
}
