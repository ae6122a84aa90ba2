//! Formatting of status table rows.
//!
//! A row is `<index> <glyph> <version>  <status>`. In the live table the
//! index is the bar prefix, the glyph is the `indicatif` spinner and the rest
//! is the bar message, which `indicatif` cuts to the terminal width.

use super::VersionStatus;
use crate::utils::progress::tick_strings;
use colored::Colorize;
use indicatif::ProgressStyle;
use semver::Version;

/// Glyph left in the spinner column once the table is final.
pub const FINISHED_GLYPH: &str = "⠿";

/// Style shared by every row of the live table.
#[must_use]
pub fn row_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix} {spinner:.cyan} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&tick_strings(FINISHED_GLYPH))
}

/// 1-based `index`, zero-padded to the width of the row count.
#[must_use]
pub fn index_label(index: usize, row_count: usize) -> String {
    let width = row_count.to_string().len();
    format!("{:0width$}", index + 1)
}

/// Width of the version column.
#[must_use]
pub fn version_width<'a>(versions: impl IntoIterator<Item = &'a Version>) -> usize {
    versions.into_iter().map(|version| version.to_string().len()).max().unwrap_or(0)
}

/// Everything after the glyph: the padded version and the status text.
#[must_use]
pub fn row_message(version: &Version, version_width: usize, status: &VersionStatus) -> String {
    format!("{:version_width$}  {}", version.to_string(), status_text(status))
}

/// The finished table as plain lines, for output that is printed once.
#[must_use]
pub fn final_rows(rows: &[(Version, VersionStatus)]) -> Vec<String> {
    let width = version_width(rows.iter().map(|(version, _)| version));
    rows.iter()
        .enumerate()
        .map(|(i, (version, status))| {
            format!(
                "{} {} {}",
                index_label(i, rows.len()),
                FINISHED_GLYPH.cyan(),
                row_message(version, width, status)
            )
        })
        .collect()
}

fn status_text(status: &VersionStatus) -> String {
    match status {
        VersionStatus::Pending => "Pending...".dimmed().to_string(),
        VersionStatus::InProgress(None) => "In progress...".to_string(),
        VersionStatus::InProgress(Some(message)) => message.clone(),
        VersionStatus::Passed => "✓ Passed.".green().to_string(),
        VersionStatus::Failed(None) => "✗ Failed.".red().to_string(),
        VersionStatus::Failed(Some(reason)) => format!("✗ {reason}").red().to_string(),
    }
}
