//! Utility modules shared across range-probe.
//!
//! - [`fs`]: blocking file system helpers used to build attempt workspaces
//! - [`progress`]: an `indicatif` spinner for one-off steps

pub mod fs;
pub mod progress;

pub use fs::{copy_tree, ensure_dir, remove_dir_all};
pub use progress::Spinner;
