//! Structured description of a package manifest.
//!
//! range-probe does not parse package manifests itself. An external tool
//! produces a JSON description of the package, which is read here either from
//! a file or from the stdout of the configured `describe` command:
//!
//! ```json
//! {
//!   "name": "MyPackage",
//!   "dependencies": [
//!     {
//!       "identity": "swift-nio",
//!       "location": "https://github.com/apple/swift-nio.git",
//!       "requirement": { "range": { "lowerBound": "2.0.0", "upperBound": "3.0.0" } }
//!     },
//!     { "identity": "local-helpers", "location": null, "requirement": { "branch": "main" } },
//!     { "identity": "pinned", "location": "https://example.com/pinned.git",
//!       "requirement": { "exact": "1.4.2" } }
//!   ]
//! }
//! ```
//!
//! Only a [`DependencyRequirement::Range`] has candidates to test; the other
//! variants stop the run with [`ProbeError::NoRangeToTest`].

use crate::core::ProbeError;
use anyhow::{Context, Result};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Half-open version range `[lower_bound, upper_bound)`.
///
/// An inverted range is not rejected; it simply contains no version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionRange {
    /// Inclusive lower bound
    pub lower_bound: Version,
    /// Exclusive upper bound
    pub upper_bound: Version,
}

impl VersionRange {
    #[must_use]
    pub const fn new(lower_bound: Version, upper_bound: Version) -> Self {
        Self {
            lower_bound,
            upper_bound,
        }
    }

    /// Whether `version` satisfies `lower <= version < upper`.
    #[must_use]
    pub fn contains(&self, version: &Version) -> bool {
        self.lower_bound <= *version && *version < self.upper_bound
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.lower_bound, self.upper_bound)
    }
}

/// The constraint a manifest declares on one dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DependencyRequirement {
    /// Any version inside the range
    Range(VersionRange),
    /// Exactly this version
    Exact(String),
    /// Whatever the branch points at
    Branch(String),
}

impl DependencyRequirement {
    /// Human readable form of a pin, `None` for ranges.
    #[must_use]
    pub fn pin_description(&self) -> Option<String> {
        match self {
            Self::Range(_) => None,
            Self::Exact(version) => Some(format!("exact version {version}")),
            Self::Branch(branch) => Some(format!("branch {branch}")),
        }
    }
}

/// One dependency of the described package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    /// Package-manager identity, e.g. `swift-nio`
    pub identity: String,
    /// Remote URL; `None` for local path dependencies
    #[serde(default)]
    pub location: Option<String>,
    /// Declared requirement
    pub requirement: DependencyRequirement,
}

impl Dependency {
    /// The declared range, or [`ProbeError::NoRangeToTest`] for a pin.
    pub fn tested_range(&self) -> Result<&VersionRange, ProbeError> {
        match &self.requirement {
            DependencyRequirement::Range(range) => Ok(range),
            pinned => Err(ProbeError::NoRangeToTest {
                name: self.identity.clone(),
                pin: pinned.pin_description().unwrap_or_default(),
            }),
        }
    }
}

/// The parts of a package manifest range-probe consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDescription {
    /// Package name, used in workspace directory names
    pub name: String,
    /// Declared dependencies
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
}

impl PackageDescription {
    /// Parse a description from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Manifest description is not valid JSON")
    }

    /// Look up a dependency by identity (ASCII case-insensitive).
    #[must_use]
    pub fn find_dependency(&self, identity: &str) -> Option<&Dependency> {
        self.dependencies.iter().find(|dep| dep.identity.eq_ignore_ascii_case(identity))
    }

    /// Like [`find_dependency`](Self::find_dependency) but reports a missing
    /// dependency as [`ProbeError::DependencyNotFound`].
    pub fn dependency(&self, identity: &str) -> Result<&Dependency, ProbeError> {
        self.find_dependency(identity).ok_or_else(|| ProbeError::DependencyNotFound {
            name: identity.to_string(),
            package: self.name.clone(),
        })
    }
}

/// Where the manifest description comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptionSource {
    /// A JSON file written beforehand
    File(std::path::PathBuf),
    /// A command run in the package directory that prints JSON on stdout
    Command(Vec<String>),
}

/// Load the package description from `source`.
///
/// Any failure is reported as [`ProbeError::ManifestDescriptionFailed`].
pub async fn load_description(
    source: &DescriptionSource,
    package_path: &Path,
) -> Result<PackageDescription> {
    let (origin, json) = match source {
        DescriptionSource::File(path) => {
            let json = tokio::fs::read_to_string(path).await.map_err(|e| {
                ProbeError::ManifestDescriptionFailed {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                }
            })?;
            (path.display().to_string(), json)
        }
        DescriptionSource::Command(argv) => {
            let json = run_describe_command(argv, package_path).await.map_err(|e| {
                ProbeError::ManifestDescriptionFailed {
                    path: package_path.display().to_string(),
                    reason: format!("{e:#}"),
                }
            })?;
            (package_path.display().to_string(), json)
        }
    };

    let description = PackageDescription::from_json(&json).map_err(|e| {
        ProbeError::ManifestDescriptionFailed {
            path: origin,
            reason: format!("{e:#}"),
        }
    })?;

    tracing::debug!(
        "Loaded description of '{}' with {} dependencies",
        description.name,
        description.dependencies.len()
    );
    Ok(description)
}

async fn run_describe_command(argv: &[String], package_path: &Path) -> Result<String> {
    let (program, args) =
        argv.split_first().context("The describe command is empty")?;

    tracing::debug!("Executing describe command: {}", argv.join(" "));

    let output = Command::new(program)
        .args(args)
        .current_dir(package_path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .with_context(|| format!("Failed to execute {program}"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("{} exited with {}: {}", argv.join(" "), output.status, stderr.trim());
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
