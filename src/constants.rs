//! Global constants used throughout the range-probe codebase.
//!
//! This module contains timeout durations, intervals, and other numeric
//! constants that are used across multiple modules.

use std::time::Duration;

/// Interval between spinner frames of the live status table (200ms).
///
/// The ticker re-renders the table on this cadence even when no status has
/// changed, so long-running commands still show movement.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(200);

/// Number of attempts run at once when neither the CLI nor the config says otherwise.
pub const DEFAULT_JOBS: usize = 1;

/// Timeout for `git ls-remote` (60 seconds).
///
/// Listing tags is a single network round-trip; anything slower usually
/// means an authentication prompt is waiting for input.
pub const GIT_LS_REMOTE_TIMEOUT: Duration = Duration::from_secs(60);

/// Prefix carried by every tag ref in `git ls-remote` output.
pub const TAG_REF_PREFIX: &str = "refs/tags/";

/// Suffix git appends to peeled annotated tag refs.
pub const PEELED_REF_SUFFIX: &str = "^{}";

/// Name of the per-package configuration file.
pub const PACKAGE_CONFIG_FILE: &str = ".range-probe.toml";

/// Environment variable pointing at an explicit configuration file.
pub const CONFIG_ENV_VAR: &str = "RANGE_PROBE_CONFIG";

/// Environment variable that disables live progress rendering.
pub const NO_PROGRESS_ENV_VAR: &str = "RANGE_PROBE_NO_PROGRESS";

/// Prefix of every sandbox workspace directory name.
pub const WORKSPACE_PREFIX: &str = "range-probe";
