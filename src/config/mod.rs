//! Configuration for range-probe.
//!
//! Configuration is a TOML file. The first one found wins:
//!
//! 1. `--config <FILE>` (or `RANGE_PROBE_CONFIG`)
//! 2. `<package>/.range-probe.toml`
//! 3. the global file, `<config dir>/range-probe/config.toml`
//!    (`~/.config/range-probe/config.toml` on Linux)
//!
//! When none exists the defaults below are used.
//!
//! # File Format
//!
//! ```toml
//! [commands]
//! # Prints the JSON manifest description on stdout (no default)
//! describe = ["./scripts/describe-package.sh"]
//! clean = ["swift", "package", "reset"]
//! resolve = ["swift", "package", "resolve"]
//! pin = ["swift", "package", "resolve", "{dependency}", "--version", "{version}"]
//! test = ["swift", "build", "--build-tests"]
//!
//! [run]
//! jobs = 2
//! tick_interval_ms = 200
//!
//! [sandbox]
//! workspace_root = "~/.cache/range-probe"
//! exclude = [".git", ".build"]
//! ```
//!
//! An empty command list skips that step. Command arguments may use the
//! placeholders `{dependency}`, `{version}`, `{package}` and `{workspace}`.

use crate::constants::{DEFAULT_JOBS, DEFAULT_TICK_INTERVAL, PACKAGE_CONFIG_FILE};
use crate::core::ProbeError;
use crate::sandbox::{CommandTemplate, Stage};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Complete configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProbeConfig {
    /// External commands
    pub commands: CommandsConfig,
    /// Scheduling and rendering
    pub run: RunConfig,
    /// Workspace placement
    pub sandbox: SandboxConfig,
}

/// External command templates, one argv array per step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CommandsConfig {
    /// Prints the manifest description as JSON; empty means "not configured"
    pub describe: Vec<String>,
    /// Removes build and cache state from the workspace copy
    pub clean: Vec<String>,
    /// Resolves every dependency at its current state
    pub resolve: Vec<String>,
    /// Re-resolves the dependency under test to `{version}`
    pub pin: Vec<String>,
    /// The compatibility test itself
    pub test: Vec<String>,
}

fn argv(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| (*s).to_string()).collect()
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            describe: Vec::new(),
            clean: argv(&["swift", "package", "reset"]),
            resolve: argv(&["swift", "package", "resolve"]),
            pin: argv(&["swift", "package", "resolve", "{dependency}", "--version", "{version}"]),
            test: argv(&["swift", "build", "--build-tests"]),
        }
    }
}

/// Scheduling and rendering settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Attempts run at once
    pub jobs: usize,
    /// Spinner frame interval in milliseconds
    pub tick_interval_ms: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            jobs: DEFAULT_JOBS,
            tick_interval_ms: DEFAULT_TICK_INTERVAL.as_millis() as u64,
        }
    }
}

/// Workspace placement settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SandboxConfig {
    /// Parent directory of attempt workspaces; system temp dir when unset
    pub workspace_root: Option<String>,
    /// Directory names not copied into workspaces
    pub exclude: Vec<String>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            workspace_root: None,
            exclude: vec![".git".to_string()],
        }
    }
}

impl ProbeConfig {
    /// Load and validate a configuration file.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let config: Self = toml::from_str(&content).map_err(|e| ProbeError::ConfigError {
            message: format!("{}: {e}", path.display()),
        })?;
        config.validate()?;

        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Find and load the configuration that applies to `package_path`.
    ///
    /// An explicit path must exist; the implicit locations are optional.
    pub async fn discover(explicit: Option<&Path>, package_path: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(ProbeError::ConfigError {
                    message: format!("Configuration file not found: {}", path.display()),
                }
                .into());
            }
            return Self::load_from(path).await;
        }

        let package_config = package_path.join(PACKAGE_CONFIG_FILE);
        if package_config.exists() {
            return Self::load_from(&package_config).await;
        }

        if let Some(global) = Self::default_global_path() {
            if global.exists() {
                return Self::load_from(&global).await;
            }
        }

        tracing::debug!("No configuration file found, using defaults");
        Ok(Self::default())
    }

    /// Location of the user-wide configuration file.
    #[must_use]
    pub fn default_global_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("range-probe").join("config.toml"))
    }

    /// Reject templates that would fail at attempt time.
    pub fn validate(&self) -> Result<()> {
        for (stage, args) in [
            (Stage::Clean, &self.commands.clean),
            (Stage::ResolveAll, &self.commands.resolve),
            (Stage::ResolveVersion, &self.commands.pin),
            (Stage::Test, &self.commands.test),
        ] {
            CommandTemplate::new(stage.config_key(), args.clone())?;
        }
        if self.run.tick_interval_ms == 0 {
            return Err(ProbeError::ConfigError {
                message: "run.tick_interval_ms must be greater than zero".to_string(),
            }
            .into());
        }
        Ok(())
    }

    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.run.tick_interval_ms)
    }

    /// Directory under which attempt workspaces are created.
    ///
    /// `~` and environment variables in the configured value are expanded.
    pub fn workspace_root(&self) -> Result<PathBuf> {
        match &self.sandbox.workspace_root {
            Some(root) => {
                let expanded = shellexpand::full(root).map_err(|e| ProbeError::ConfigError {
                    message: format!("Cannot expand sandbox.workspace_root '{root}': {e}"),
                })?;
                Ok(PathBuf::from(expanded.as_ref()))
            }
            None => Ok(std::env::temp_dir()),
        }
    }
}
