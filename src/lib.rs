//! range-probe: test a package against every published version of a
//! dependency that its manifest allows.
//!
//! # Overview
//!
//! A package declares a dependency with a version range such as
//! `[2.0.0, 3.0.0)`. range-probe lists the dependency's published tags,
//! keeps the stable versions inside that range, and for each of them builds
//! and tests the package in a throwaway copy with the dependency pinned to
//! that version. Progress is shown as a live table, one row per version.
//!
//! # Architecture
//!
//! - [`version`]: pure resolution of tag refs into ordered candidates
//! - [`sandbox`]: one isolated attempt per candidate
//! - [`scheduler`]: bounded-concurrency driver over all candidates
//! - [`tracker`]: serialized live status table
//! - [`manifest`] and [`git`]: the manifest description and tag listing inputs
//! - [`config`], [`core`], [`cli`]: configuration, errors and the command line
//!
//! # Example
//!
//! ```text
//! $ range-probe resolve swift-nio
//! ["2.40.0","2.41.0","2.42.1"]
//!
//! $ range-probe test swift-nio --jobs 2
//! 1 ⠹ 2.40.0  ✓ Passed.
//! 2 ⠹ 2.41.0  Running tests...
//! 3 ⠹ 2.42.1  Resolving dependencies...
//! ```

pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod git;
pub mod manifest;
pub mod sandbox;
pub mod scheduler;
pub mod tracker;
pub mod utils;
pub mod version;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
