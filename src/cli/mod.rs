//! Command-line interface for range-probe.
//!
//! # Commands
//!
//! - `resolve <DEPENDENCY> [--matrix]`: print the candidate versions as JSON
//! - `test <DEPENDENCY> [--jobs N] [--workspace-root DIR]`: test the package
//!   against every candidate and show a live status table
//!
//! # Global Options
//!
//! - `--verbose` / `--quiet`: more or less logging (`RUST_LOG` overrides both)
//! - `--config <FILE>`: configuration file (also `RANGE_PROBE_CONFIG`)
//! - `--package-path <DIR>`: the package under test (default: `.`)
//! - `--description <FILE>`: pre-generated manifest description
//! - `--no-progress`: no spinner or live table (also `RANGE_PROBE_NO_PROGRESS`)
//!
//! # Exit Codes
//!
//! `0` when every candidate passed (or `resolve` succeeded), `1` on any
//! run-level error or when at least one candidate failed.

pub mod common;
mod resolve;
mod run;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::constants::CONFIG_ENV_VAR;
use crate::utils::progress::ProgressAwareStderr;

pub use common::GlobalOptions;

#[derive(Parser)]
#[command(
    name = "range-probe",
    about = "Test a package against every published version of a dependency",
    version,
    long_about = "range-probe finds every stable, published version of a dependency that falls \
                  inside the range the package declares, then builds and tests the package \
                  against each of them in isolated workspaces."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Path to a configuration file
    #[arg(short, long, global = true, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    /// Directory of the package under test
    #[arg(long, global = true, default_value = ".")]
    package_path: PathBuf,

    /// JSON manifest description to use instead of running the describe command
    #[arg(long, global = true)]
    description: Option<PathBuf>,

    /// Disable progress spinners and the live status table
    #[arg(long, global = true)]
    no_progress: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the candidate versions of a dependency as JSON
    Resolve(resolve::ResolveCommand),

    /// Build and test the package against every candidate version
    Test(run::TestCommand),
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        init_logging(self.log_level());
        let options = self.global_options();

        match self.command {
            Commands::Resolve(cmd) => cmd.execute(&options).await,
            Commands::Test(cmd) => cmd.execute(&options).await,
        }
    }

    /// Default log filter for the verbosity flags.
    #[must_use]
    pub const fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "warn"
        }
    }

    #[must_use]
    pub fn global_options(&self) -> GlobalOptions {
        GlobalOptions {
            config_path: self.config.clone(),
            package_path: self.package_path.clone(),
            description: self.description.clone(),
            no_progress: self.no_progress,
        }
    }
}

/// Send `tracing` output to stderr, filtered by `RUST_LOG` or `default_level`.
///
/// Events are printed above the status table while it is live.
pub fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(ProgressAwareStderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resolve() {
        let cli = Cli::try_parse_from(["range-probe", "resolve", "swift-nio", "--matrix"]).unwrap();
        assert!(matches!(cli.command, Commands::Resolve(ref cmd) if cmd.matrix && cmd.dependency == "swift-nio"));
        assert_eq!(cli.log_level(), "warn");
        assert_eq!(cli.global_options().package_path, PathBuf::from("."));
    }

    #[test]
    fn test_parse_test_with_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "range-probe",
            "test",
            "dep",
            "--jobs",
            "3",
            "--package-path",
            "/work/pkg",
            "--verbose",
            "--no-progress",
        ])
        .unwrap();

        let Commands::Test(ref cmd) = cli.command else {
            panic!("expected the test command");
        };
        assert_eq!(cmd.jobs, Some(3));
        assert_eq!(cli.log_level(), "debug");

        let options = cli.global_options();
        assert!(options.no_progress);
        assert_eq!(options.package_path, PathBuf::from("/work/pkg"));
    }

    #[test]
    fn test_verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["range-probe", "-v", "-q", "resolve", "dep"]).is_err());
    }

    #[test]
    #[serial_test::serial]
    fn test_config_path_from_env() {
        let previous = std::env::var_os(CONFIG_ENV_VAR);
        unsafe { std::env::set_var(CONFIG_ENV_VAR, "/etc/range-probe.toml") };
        let from_env = Cli::try_parse_from(["range-probe", "resolve", "dep"]).unwrap();
        let from_flag =
            Cli::try_parse_from(["range-probe", "resolve", "dep", "--config", "/work/ci.toml"]).unwrap();
        match previous {
            Some(value) => unsafe { std::env::set_var(CONFIG_ENV_VAR, value) },
            None => unsafe { std::env::remove_var(CONFIG_ENV_VAR) },
        }

        assert_eq!(from_env.global_options().config_path, Some(PathBuf::from("/etc/range-probe.toml")));
        assert_eq!(from_flag.global_options().config_path, Some(PathBuf::from("/work/ci.toml")));
    }

    #[test]
    fn test_dependency_is_required() {
        assert!(Cli::try_parse_from(["range-probe", "test"]).is_err());
    }
}
