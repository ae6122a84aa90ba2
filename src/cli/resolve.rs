//! `range-probe resolve`: print the candidate versions as JSON.
//!
//! Output goes to stdout so it can be piped into CI tooling:
//!
//! ```text
//! $ range-probe resolve swift-nio
//! ["2.40.0","2.41.0","2.42.1"]
//! $ range-probe resolve swift-nio --matrix
//! {"include":[{"version":"2.40.0"},{"version":"2.41.0"},{"version":"2.42.1"}]}
//! ```
//!
//! An empty list is a valid answer here and is printed as `[]`.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use super::common::{CommandContext, GlobalOptions};
use crate::version::Candidate;

/// Print the versions that `test` would try.
#[derive(Args, Debug)]
pub struct ResolveCommand {
    /// Identity of the dependency, as declared in the manifest
    pub dependency: String,

    /// Print a CI matrix object instead of a plain array
    #[arg(long)]
    pub matrix: bool,
}

#[derive(Serialize)]
struct MatrixEntry {
    version: String,
}

#[derive(Serialize)]
struct Matrix {
    include: Vec<MatrixEntry>,
}

impl ResolveCommand {
    pub async fn execute(self, options: &GlobalOptions) -> Result<()> {
        let context = CommandContext::prepare(options, &self.dependency).await?;
        println!("{}", render_output(&context.candidates, self.matrix)?);
        Ok(())
    }
}

fn render_output(candidates: &[Candidate], matrix: bool) -> Result<String> {
    let versions = candidates.iter().map(|candidate| candidate.version.to_string());
    let json = if matrix {
        serde_json::to_string(&Matrix {
            include: versions
                .map(|version| MatrixEntry {
                    version,
                })
                .collect(),
        })?
    } else {
        serde_json::to_string(&versions.collect::<Vec<_>>())?
    };
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use semver::Version;

    fn candidates() -> Vec<Candidate> {
        ["1.0.0", "1.1.0"]
            .iter()
            .map(|v| Candidate {
                version: Version::parse(v).unwrap(),
                tag: format!("v{v}"),
            })
            .collect()
    }

    #[test]
    fn test_plain_array() {
        assert_eq!(render_output(&candidates(), false).unwrap(), r#"["1.0.0","1.1.0"]"#);
    }

    #[test]
    fn test_matrix_object() {
        assert_eq!(
            render_output(&candidates(), true).unwrap(),
            r#"{"include":[{"version":"1.0.0"},{"version":"1.1.0"}]}"#
        );
    }

    #[test]
    fn test_empty_output() {
        assert_eq!(render_output(&[], false).unwrap(), "[]");
        assert_eq!(render_output(&[], true).unwrap(), r#"{"include":[]}"#);
    }
}
