//! Runs one attempt per candidate with bounded concurrency.
//!
//! Attempts are admitted in ascending version order and at most `limit` run
//! at once; with a limit of one each attempt, cleanup included, finishes
//! before the next starts. Every candidate reaches exactly one outcome, and a
//! failing attempt never stops the others.

use crate::sandbox::{ActionRunner, Outcome, Sandbox};
use crate::tracker::ProgressTracker;
use crate::version::Candidate;
use futures::stream::{self, StreamExt};
use semver::Version;
use tokio::sync::mpsc;

/// Outcomes of a run, in candidate order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub outcomes: Vec<(Version, Outcome)>,
}

impl RunReport {
    #[must_use]
    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|(_, outcome)| outcome.is_passed()).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.passed()
    }

    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }
}

/// Test every candidate, reporting progress to `tracker`.
///
/// A `limit` of zero is treated as one. The ticker is started before the
/// first attempt and the tracker is finished once all attempts are done.
pub async fn run_all<R: ActionRunner>(
    sandbox: &Sandbox<R>,
    tracker: &ProgressTracker,
    candidates: &[Candidate],
    limit: usize,
) -> RunReport {
    let limit = limit.max(1);
    tracing::debug!(target: "scheduler", "Testing {} versions, {} at a time", candidates.len(), limit);

    tracker.start_ticker().await;

    let mut outcomes: Vec<(usize, Version, Outcome)> = stream::iter(candidates.iter().enumerate())
        .map(|(index, candidate)| async move {
            tracing::debug!(target: "scheduler", "Starting {} (tag {})", candidate.version, candidate.tag);
            let outcome = run_one(sandbox, tracker, &candidate.version).await;
            (index, candidate.version.clone(), outcome)
        })
        .buffer_unordered(limit)
        .collect()
        .await;

    tracker.finish().await;

    outcomes.sort_by_key(|(index, _, _)| *index);
    RunReport {
        outcomes: outcomes.into_iter().map(|(_, version, outcome)| (version, outcome)).collect(),
    }
}

async fn run_one<R: ActionRunner>(sandbox: &Sandbox<R>, tracker: &ProgressTracker, version: &Version) -> Outcome {
    tracker.mark_in_progress(version, None).await;

    let (lines, mut received) = mpsc::unbounded_channel::<String>();
    let relay = async {
        while let Some(mut line) = received.recv().await {
            // Only the latest line is shown, skip the backlog
            while let Ok(newer) = received.try_recv() {
                line = newer;
            }
            tracker.mark_in_progress(version, Some(line)).await;
        }
    };
    let (outcome, ()) = tokio::join!(sandbox.run_attempt(version, lines), relay);

    match &outcome {
        Outcome::Passed => tracker.mark_passed(version).await,
        Outcome::Failed {
            stage,
            reason,
        } => tracker.mark_failed(version, Some(format!("Failed at {stage}: {reason}"))).await,
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CommandsConfig;
    use crate::sandbox::{SandboxSettings, Stage, StageCommands};
    use crate::test_utils::{RecordingTerm, ScriptedRunner, init_test_logging};
    use crate::tracker::{TableOutput, VersionStatus};
    use std::time::Duration;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| (*s).to_string()).collect()
    }

    fn candidates(versions: &[&str]) -> Vec<Candidate> {
        versions
            .iter()
            .map(|v| Candidate {
                version: Version::parse(v).unwrap(),
                tag: (*v).to_string(),
            })
            .collect()
    }

    fn sandbox(temp: &tempfile::TempDir, runner: ScriptedRunner) -> Sandbox<ScriptedRunner> {
        let package = temp.path().join("pkg");
        std::fs::create_dir_all(&package).unwrap();
        std::fs::write(package.join("Package.swift"), "").unwrap();
        let commands = StageCommands::from_config(&CommandsConfig {
            describe: Vec::new(),
            clean: Vec::new(),
            resolve: argv(&["resolve"]),
            pin: argv(&["pin", "{version}"]),
            test: argv(&["test", "{version}"]),
        })
        .unwrap();

        Sandbox::new(
            runner,
            SandboxSettings {
                package_path: package,
                package_name: "Demo".to_string(),
                dependency: "dep".to_string(),
                workspace_root: temp.path().to_path_buf(),
                exclude: Vec::new(),
                commands,
            },
        )
    }

    fn tracker(candidates: &[Candidate], live: bool) -> (ProgressTracker, RecordingTerm) {
        let term = RecordingTerm::new(100);
        let output = if live {
            TableOutput::Live(term.draw_target())
        } else {
            TableOutput::Quiet(Box::new(std::io::sink()))
        };
        let tracker =
            ProgressTracker::new(candidates.iter().map(|c| c.version.clone()), output, Duration::from_millis(5));
        (tracker, term)
    }

    /// Versions in the order their rows first left `Pending`.
    fn start_order(term: &RecordingTerm) -> Vec<String> {
        let mut started: Vec<String> = Vec::new();
        for frame in term.frames() {
            for row in frame {
                if row.contains("Pending...") {
                    continue;
                }
                // `<index> <glyph> <version> ...`
                if let Some(version) = row.split_whitespace().nth(2) {
                    if !started.iter().any(|v| v == version) {
                        started.push(version.to_string());
                    }
                }
            }
        }
        started
    }

    #[tokio::test]
    async fn test_every_candidate_gets_one_outcome() {
        let temp = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new().fail_on(&["test", "1.1.0"], &["error: API removed"]);
        let sandbox = sandbox(&temp, runner);
        let candidates = candidates(&["1.0.0", "1.1.0", "1.2.0"]);
        let (tracker, _term) = tracker(&candidates, false);

        let report = run_all(&sandbox, &tracker, &candidates, 2).await;

        let versions: Vec<String> = report.outcomes.iter().map(|(v, _)| v.to_string()).collect();
        assert_eq!(versions, ["1.0.0", "1.1.0", "1.2.0"]);
        assert_eq!(report.passed(), 2);
        assert_eq!(report.failed(), 1);
        assert!(!report.all_passed());
        assert_eq!(
            report.outcomes[1].1,
            Outcome::Failed {
                stage: Stage::Test,
                reason: "error: API removed".to_string(),
            }
        );

        let snapshot = tracker.snapshot().await;
        assert_eq!(snapshot[0].1, VersionStatus::Passed);
        assert_eq!(snapshot[1].1, VersionStatus::Failed(Some("Failed at test: error: API removed".to_string())));
        assert_eq!(snapshot[2].1, VersionStatus::Passed);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let temp = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new().with_delay(Duration::from_millis(20));
        let sandbox = sandbox(&temp, runner.clone());
        let candidates = candidates(&["1.0.0", "1.1.0", "1.2.0", "1.3.0", "1.4.0"]);
        let (tracker, _term) = tracker(&candidates, false);

        let report = run_all(&sandbox, &tracker, &candidates, 2).await;

        assert!(report.all_passed());
        assert_eq!(tracker.peak_in_progress().await, 2);
        assert!(runner.peak_concurrency() <= 2);
    }

    #[tokio::test]
    async fn test_sequential_attempts_do_not_overlap() {
        let temp = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new().with_delay(Duration::from_millis(5));
        let sandbox = sandbox(&temp, runner.clone());
        let candidates = candidates(&["1.0.0", "1.1.0", "1.2.0"]);
        let (tracker, _term) = tracker(&candidates, false);

        run_all(&sandbox, &tracker, &candidates, 1).await;

        assert_eq!(tracker.peak_in_progress().await, 1);
        let pinned: Vec<String> = runner
            .calls()
            .into_iter()
            .filter(|call| call.argv[0] == "pin")
            .map(|call| call.argv[1].clone())
            .collect();
        assert_eq!(pinned, ["1.0.0", "1.1.0", "1.2.0"]);
        // Only the package copy remains; every workspace was removed
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_zero_limit_runs_sequentially() {
        let temp = tempfile::tempdir().unwrap();
        let sandbox = sandbox(&temp, ScriptedRunner::new());
        let candidates = candidates(&["1.0.0", "1.1.0"]);
        let (tracker, _term) = tracker(&candidates, false);

        let report = run_all(&sandbox, &tracker, &candidates, 0).await;
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(tracker.peak_in_progress().await, 1);
    }

    #[tokio::test]
    async fn test_empty_candidate_list() {
        let temp = tempfile::tempdir().unwrap();
        let sandbox = sandbox(&temp, ScriptedRunner::new());
        let (tracker, term) = tracker(&[], true);

        let report = run_all(&sandbox, &tracker, &[], 4).await;
        assert!(report.outcomes.is_empty());
        assert!(report.all_passed());
        assert!(term.screen().is_empty());
    }

    #[tokio::test]
    async fn test_live_table_stays_consistent() {
        let temp = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new()
            .with_delay(Duration::from_millis(3))
            .fail_on(&["resolve"], &["warning: stale cache", "error: cannot resolve"]);
        let sandbox = sandbox(&temp, runner);
        let candidates = candidates(&["1.0.0", "1.1.0", "1.2.0", "1.3.0"]);
        let (tracker, term) = tracker(&candidates, true);

        let report = run_all(&sandbox, &tracker, &candidates, 3).await;

        assert_eq!(report.failed(), 4);
        let frames = term.frames();
        let first_full = frames.iter().position(|frame| frame.len() == 4).unwrap();
        assert!(frames[first_full..].iter().all(|frame| frame.len() == 4));
        let screen = term.screen();
        assert_eq!(screen.len(), 4);
        assert!(screen.iter().all(|row| row.contains("Failed at resolveAll: error: cannot resolve")));
    }

    #[tokio::test]
    async fn test_admission_is_ascending_whatever_the_completion_order() {
        init_test_logging(None);
        let temp = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new()
            .with_delay_on(&["1.0.0"], Duration::from_millis(60))
            .with_delay_on(&["1.1.0"], Duration::from_millis(5))
            .with_delay_on(&["1.2.0"], Duration::from_millis(40))
            .with_delay_on(&["1.3.0"], Duration::from_millis(1))
            .with_delay_on(&["1.4.0"], Duration::from_millis(20))
            .with_delay_on(&["1.5.0"], Duration::from_millis(2));
        let sandbox = sandbox(&temp, runner.clone());
        let versions = ["1.0.0", "1.1.0", "1.2.0", "1.3.0", "1.4.0", "1.5.0"];
        let candidates = candidates(&versions);
        let (tracker, term) = tracker(&candidates, true);

        let report = run_all(&sandbox, &tracker, &candidates, 2).await;

        assert!(report.all_passed());
        assert_eq!(start_order(&term), versions);
        assert_eq!(tracker.peak_in_progress().await, 2);

        let mut pinned: Vec<String> = runner
            .calls()
            .into_iter()
            .filter(|call| call.argv[0] == "pin")
            .map(|call| call.argv[1].clone())
            .collect();
        pinned.sort();
        assert_eq!(pinned, versions);
        let reported: Vec<String> = report.outcomes.iter().map(|(v, _)| v.to_string()).collect();
        assert_eq!(reported, versions);
    }
}
