//! Candidate version resolution.
//!
//! Turns a [`Dependency`] plus the raw refs printed by
//! `git ls-remote --tags` into the ordered set of versions worth testing.
//!
//! # Resolution Strategy
//!
//! 1. **Short-circuit pins**: `Exact` and `Branch` requirements have nothing
//!    to test and fail with [`ProbeError::NoRangeToTest`]
//! 2. **Ref reduction**: keep refs under `refs/tags/`, drop everything else
//!    (branch heads, `HEAD`), and strip the peeled-tag suffix `^{}`
//! 3. **Semantic parsing**: strip a single `v`/`V` prefix and parse; tags that
//!    are not semantic versions are skipped
//! 4. **Filtering**: keep stable versions inside `[lower, upper)`
//! 5. **Ordering**: ascending, one entry per distinct version
//!
//! The resolver performs no I/O, so the same input always yields the same
//! candidate list.
//!
//! # Examples
//!
//! ```rust
//! use range_probe::manifest::{Dependency, DependencyRequirement, VersionRange};
//! use range_probe::version::resolve;
//! use semver::Version;
//!
//! let dependency = Dependency {
//!     identity: "swift-nio".to_string(),
//!     location: Some("https://github.com/apple/swift-nio.git".to_string()),
//!     requirement: DependencyRequirement::Range(VersionRange::new(
//!         Version::new(1, 0, 0),
//!         Version::new(2, 0, 0),
//!     )),
//! };
//! let refs = [
//!     "a1b2c3\trefs/tags/v1.0.0",
//!     "d4e5f6\trefs/tags/1.1.0",
//!     "0a0b0c\trefs/heads/main",
//!     "9f8e7d\trefs/tags/2.0.0",
//! ];
//!
//! let candidates = resolve(&dependency, refs).unwrap();
//! let versions: Vec<String> = candidates.iter().map(|c| c.version.to_string()).collect();
//! assert_eq!(versions, ["1.0.0", "1.1.0"]);
//! ```

use crate::constants::{PEELED_REF_SUFFIX, TAG_REF_PREFIX};
use crate::core::ProbeError;
use crate::manifest::{Dependency, VersionRange};
use anyhow::{Context, Result};
use semver::Version;
use std::collections::BTreeMap;
use std::fmt;

/// A stable version inside the declared range, with the tag that produced it.
///
/// Ordering and equality only look at `version`; `tag` is the first tag name
/// that mapped to it and is kept for logging.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Parsed version
    pub version: Version,
    /// Original tag name, e.g. `v1.2.3`
    pub tag: String,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.version.cmp(&other.version)
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.version)
    }
}

/// Whether a version has neither pre-release nor build metadata.
#[must_use]
pub fn is_stable(version: &Version) -> bool {
    version.pre.is_empty() && version.build.is_empty()
}

/// Reduce one raw ref line to its tag name.
///
/// Accepts `<sha>\trefs/tags/<name>` as printed by `git ls-remote` as well as
/// a bare `refs/tags/<name>`. Anything that is not a tag ref yields `None`.
#[must_use]
pub fn tag_name_from_ref(raw: &str) -> Option<&str> {
    let reference = raw.split_whitespace().last()?;
    let name = reference.strip_prefix(TAG_REF_PREFIX)?;
    let name = name.strip_suffix(PEELED_REF_SUFFIX).unwrap_or(name);
    (!name.is_empty()).then_some(name)
}

/// Parse a tag name as a semantic version, tolerating a `v`/`V` prefix.
pub fn parse_tag(tag: &str) -> Result<Version> {
    let cleaned = tag.strip_prefix(['v', 'V']).unwrap_or(tag);

    Version::parse(cleaned).with_context(|| format!("Failed to parse version from tag: {tag}"))
}

/// Resolve raw `ls-remote` ref lines into ascending, deduplicated candidates
/// for `dependency`.
pub fn resolve<I, S>(dependency: &Dependency, raw_refs: I) -> Result<Vec<Candidate>, ProbeError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let range = dependency.tested_range()?;
    let refs: Vec<S> = raw_refs.into_iter().collect();
    let names = refs.iter().filter_map(|raw| tag_name_from_ref(raw.as_ref()));
    Ok(collect_candidates(range, names))
}

fn collect_candidates<'a>(
    range: &VersionRange,
    tag_names: impl Iterator<Item = &'a str>,
) -> Vec<Candidate> {
    let mut by_version: BTreeMap<Version, String> = BTreeMap::new();

    for tag in tag_names {
        let Ok(version) = parse_tag(tag) else {
            tracing::trace!("Skipping tag '{}': not a semantic version", tag);
            continue;
        };
        if !is_stable(&version) || !range.contains(&version) {
            continue;
        }
        by_version.entry(version).or_insert_with(|| tag.to_string());
    }

    by_version
        .into_iter()
        .map(|(version, tag)| Candidate {
            version,
            tag,
        })
        .collect()
}
