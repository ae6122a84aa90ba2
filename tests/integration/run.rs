//! `range-probe test` end to end, with shell commands standing in for the
//! package manager.

use predicates::prelude::*;

use crate::common::{ProbeFixture, scripted_config};

const RANGE_1_TO_2: &str = r#"{"range": {"lowerBound": "1.0.0", "upperBound": "2.0.0"}}"#;

fn workspaces_left(fixture: &ProbeFixture) -> usize {
    std::fs::read_dir(fixture.workspace_root()).unwrap().count()
}

#[test]
fn test_all_candidates_pass() {
    let fixture = ProbeFixture::new(&["1.0.0", "1.1.0", "2.0.0"], RANGE_1_TO_2);
    fixture.write_config(&scripted_config(&fixture.workspace_root(), "9.9.9"));

    fixture
        .command_with_description(&["test", "dep"])
        .assert()
        .success()
        .stderr(predicate::str::contains("2 passed"))
        .stderr(predicate::str::contains("0 failed"));

    assert_eq!(workspaces_left(&fixture), 0);
}

#[test]
fn test_failure_is_contained_to_its_candidate() {
    let fixture = ProbeFixture::new(&["1.0.0", "1.1.0", "1.2.0"], RANGE_1_TO_2);
    fixture.write_config(&scripted_config(&fixture.workspace_root(), "1.1.0"));

    fixture
        .command_with_description(&["test", "dep", "--jobs", "2"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Failed at test: error: incompatible API"))
        .stderr(predicate::str::contains("2 passed"))
        .stderr(predicate::str::contains("1 failed"))
        .stderr(predicate::str::contains("1 of 3 candidate versions failed"));

    assert_eq!(workspaces_left(&fixture), 0);
}

#[test]
fn test_workspace_root_flag_overrides_config() {
    let fixture = ProbeFixture::new(&["1.0.0"], RANGE_1_TO_2);
    let elsewhere = fixture.workspace_root().join("nested");
    std::fs::create_dir_all(&elsewhere).unwrap();
    fixture.write_config(&scripted_config(&fixture.workspace_root(), "9.9.9"));

    let elsewhere_arg = elsewhere.display().to_string();
    fixture
        .command_with_description(&["test", "dep", "--workspace-root", &elsewhere_arg])
        .assert()
        .success();

    assert_eq!(std::fs::read_dir(&elsewhere).unwrap().count(), 0);
}

#[test]
fn test_failing_resolve_is_reported_per_candidate() {
    let fixture = ProbeFixture::new(&["1.0.0", "1.1.0"], RANGE_1_TO_2);
    fixture.write_config(&format!(
        "[commands]\nclean = []\nresolve = [\"sh\", \"-c\", \"echo 'network unreachable' >&2; exit 2\"]\n\
         pin = []\ntest = []\n\n[sandbox]\nworkspace_root = \"{}\"\n",
        fixture.workspace_root().display()
    ));

    fixture
        .command_with_description(&["test", "dep"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed at resolveAll: network unreachable"))
        .stderr(predicate::str::contains("2 failed"));

    assert_eq!(workspaces_left(&fixture), 0);
}

#[test]
fn test_no_candidates_is_an_error() {
    let fixture = ProbeFixture::new(&["3.0.0"], RANGE_1_TO_2);
    fixture.write_config(&scripted_config(&fixture.workspace_root(), "9.9.9"));

    fixture
        .command_with_description(&["test", "dep"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No published version of 'dep' falls inside [1.0.0, 2.0.0)"));
}

#[test]
fn test_invalid_template_stops_the_run() {
    let fixture = ProbeFixture::new(&["1.0.0"], RANGE_1_TO_2);
    fixture.write_config("[commands]\ntest = [\"make\", \"{target}\"]\n");

    fixture
        .command_with_description(&["test", "dep"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid command template for 'test'"));
}
