//! Integration test suite for range-probe
//!
//! End-to-end runs of the `range-probe` binary against local git repositories
//! whose tags play the role of published versions. Build and test steps are
//! replaced by small shell commands through the configuration file, so the
//! suite needs `git` and a POSIX shell but no package manager.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **resolve**: candidate listing, JSON output and run-level errors
//! - **run**: per-candidate attempts, failure containment and cleanup

mod common;
mod resolve;
#[cfg(unix)]
mod run;
