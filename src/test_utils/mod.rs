//! Test support shared by unit and integration tests.
//!
//! - [`TestGit`] builds local repositories whose tags act as published versions
//! - [`ScriptedRunner`] replaces real build commands with scripted results
//! - [`RecordingTerm`] models a terminal behind the status table and keeps
//!   every frame; [`SharedBuffer`] captures plain output
//! - [`init_test_logging`] routes `tracing` output to the test harness

pub mod git_helper;
pub mod scripted;
pub mod terminal;

pub use git_helper::TestGit;
pub use scripted::{RecordedCall, ScriptedRunner};
pub use terminal::{RecordingTerm, SharedBuffer};

use std::sync::Once;
use tokio::sync::mpsc;
use tracing::Level;
use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Uses `level` when given, otherwise `RUST_LOG` if set; with neither, logging
/// stays off. Safe to call from every test.
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .try_init();
    });
}

/// Drain `lines` until every sender is gone.
pub async fn collect_lines(mut lines: mpsc::UnboundedReceiver<String>) -> Vec<String> {
    let mut collected = Vec::new();
    while let Some(line) = lines.recv().await {
        collected.push(line);
    }
    collected
}
