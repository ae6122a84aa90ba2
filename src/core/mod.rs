//! Core types shared across range-probe.
//!
//! At the moment this is the error layer: [`ProbeError`] for run-level
//! failures and [`ErrorContext`] for presenting them to the user.

pub mod error;

pub use error::{ErrorContext, ProbeError, user_friendly_error};
