//! Error handling for range-probe
//!
//! Run-level failures (anything that stops the whole run before a single
//! candidate is attempted) are modelled as [`ProbeError`] variants. Failures of
//! an individual attempt are *not* errors at this level: they become a
//! [`crate::sandbox::Outcome::Failed`] recorded in the status table.
//!
//! # Architecture
//!
//! - [`ProbeError`] - strongly-typed run-level failures
//! - [`ErrorContext`] - wrapper that adds user-facing details and a suggestion
//! - [`user_friendly_error`] - converts any [`anyhow::Error`] into an [`ErrorContext`]
//!
//! # Examples
//!
//! ```rust,no_run
//! use range_probe::core::{ProbeError, user_friendly_error};
//!
//! let err = anyhow::Error::from(ProbeError::DependencyNotFound {
//!     name: "swift-nio".to_string(),
//!     package: "MyPackage".to_string(),
//! });
//! user_friendly_error(err).display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// Run-level failures.
///
/// Every variant aborts the run before any candidate version is attempted.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// The manifest description could not be produced or parsed.
    #[error("Failed to read the manifest description of {path}")]
    ManifestDescriptionFailed {
        /// Package directory (or description file) that was read
        path: String,
        /// Underlying cause
        reason: String,
    },

    /// The named dependency is not declared by the package.
    #[error("Dependency '{name}' is not declared by package '{package}'")]
    DependencyNotFound {
        /// Requested dependency identity
        name: String,
        /// Package that was searched
        package: String,
    },

    /// The dependency is pinned to an exact version or branch.
    #[error("Dependency '{name}' is pinned to {pin}; there is no range to test")]
    NoRangeToTest {
        /// Dependency identity
        name: String,
        /// Human readable pin, e.g. `exact version 1.2.3` or `branch main`
        pin: String,
    },

    /// The dependency has no remote location to list tags from.
    #[error("Dependency '{name}' has no remote location")]
    NoRemoteLocation {
        /// Dependency identity
        name: String,
    },

    /// `git ls-remote` failed.
    #[error("Failed to list tags of {url}")]
    TagListingFailed {
        /// Remote location
        url: String,
        /// Underlying cause
        reason: String,
    },

    /// `git` is not on PATH.
    #[error("Git is not installed or not found in PATH")]
    GitNotFound,

    /// A git command exited unsuccessfully.
    #[error("Git operation failed: {operation}")]
    GitCommandError {
        /// Git subcommand, e.g. `ls-remote`
        operation: String,
        /// Captured standard error
        stderr: String,
    },

    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the problem
        message: String,
    },

    /// A command template is unusable (e.g. an unknown placeholder).
    #[error("Invalid command template for '{step}': {reason}")]
    InvalidCommandTemplate {
        /// Configuration key of the template
        step: String,
        /// Description of the problem
        reason: String,
    },

    /// Resolution yielded no version to test.
    #[error("No published version of '{name}' falls inside {range}")]
    NoCandidates {
        /// Dependency identity
        name: String,
        /// Declared range, formatted as `[lower, upper)`
        range: String,
    },

    /// At least one candidate version failed its attempt.
    #[error("{failed} of {total} candidate versions failed")]
    AttemptsFailed {
        /// Attempts that ended in `Failed`
        failed: usize,
        /// Attempts run
        total: usize,
    },

    #[error("{message}")]
    Other {
        message: String,
    },
}

/// A [`ProbeError`] plus optional details and a suggestion for the user.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: ProbeError,
    /// Actionable advice shown below the error
    pub suggestion: Option<String>,
    /// Additional explanation
    pub details: Option<String>,
}

impl ErrorContext {
    #[must_use]
    pub const fn new(error: ProbeError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr with colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] suitable for display.
///
/// Known [`ProbeError`] variants get tailored suggestions; anything else is
/// reported with its full cause chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(probe_error) = error.downcast_ref::<ProbeError>() {
        return create_error_context(probe_error);
    }

    if let Some(toml_error) = error.downcast_ref::<toml::de::Error>() {
        return ErrorContext::new(ProbeError::ConfigError {
            message: toml_error.to_string(),
        })
        .with_suggestion("Check the TOML syntax of your range-probe configuration file");
    }

    let mut message = error.to_string();
    let chain: Vec<String> = error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(ProbeError::Other {
        message,
    })
}

fn create_error_context(error: &ProbeError) -> ErrorContext {
    match error {
        ProbeError::ManifestDescriptionFailed { path, reason } => {
            ErrorContext::new(ProbeError::ManifestDescriptionFailed {
                path: path.clone(),
                reason: reason.clone(),
            })
            .with_details(reason.clone())
            .with_suggestion(
                "Pass --description <FILE> or set [commands].describe in .range-probe.toml",
            )
        }

        ProbeError::DependencyNotFound { name, package } => {
            ErrorContext::new(ProbeError::DependencyNotFound {
                name: name.clone(),
                package: package.clone(),
            })
            .with_suggestion("Check the dependency identity; it is matched case-insensitively")
        }

        ProbeError::NoRangeToTest { name, pin } => ErrorContext::new(ProbeError::NoRangeToTest {
            name: name.clone(),
            pin: pin.clone(),
        })
        .with_details("Only dependencies declared with a version range have candidates to test"),

        ProbeError::NoRemoteLocation { name } => ErrorContext::new(ProbeError::NoRemoteLocation {
            name: name.clone(),
        })
        .with_details("Local path dependencies have no published tags"),

        ProbeError::TagListingFailed { url, reason } => {
            ErrorContext::new(ProbeError::TagListingFailed {
                url: url.clone(),
                reason: reason.clone(),
            })
            .with_details(reason.clone())
            .with_suggestion(format!("Try running 'git ls-remote --tags {url}' manually"))
        }

        ProbeError::GitNotFound => ErrorContext::new(ProbeError::GitNotFound)
            .with_suggestion("Install git from https://git-scm.com/ or your package manager")
            .with_details("range-probe lists published versions with 'git ls-remote'"),

        ProbeError::GitCommandError { operation, stderr } => {
            ErrorContext::new(ProbeError::GitCommandError {
                operation: operation.clone(),
                stderr: stderr.clone(),
            })
            .with_details(stderr.trim().to_string())
            .with_suggestion("Check your network connection and access to the repository")
        }

        ProbeError::InvalidCommandTemplate { step, reason } => {
            ErrorContext::new(ProbeError::InvalidCommandTemplate {
                step: step.clone(),
                reason: reason.clone(),
            })
            .with_suggestion(
                "Supported placeholders are {dependency}, {version}, {package} and {workspace}",
            )
        }

        ProbeError::NoCandidates { name, range } => ErrorContext::new(ProbeError::NoCandidates {
            name: name.clone(),
            range: range.clone(),
        })
        .with_details("Pre-release tags and tags that are not semantic versions are ignored"),

        ProbeError::AttemptsFailed { failed, total } => {
            ErrorContext::new(ProbeError::AttemptsFailed {
                failed: *failed,
                total: *total,
            })
            .with_suggestion("Re-run with --verbose --no-progress to see the output of each step")
        }

        ProbeError::ConfigError { message } => ErrorContext::new(ProbeError::ConfigError {
            message: message.clone(),
        }),

        ProbeError::Other { message } => ErrorContext::new(ProbeError::Other {
            message: message.clone(),
        }),
    }
}
