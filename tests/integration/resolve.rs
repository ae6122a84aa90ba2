//! `range-probe resolve` end to end.

use predicates::prelude::*;

use crate::common::ProbeFixture;

const RANGE_1_TO_2: &str = r#"{"range": {"lowerBound": "1.0.0", "upperBound": "2.0.0"}}"#;

#[test]
fn test_resolve_prints_ascending_candidates() {
    let fixture = ProbeFixture::new(&["1.1.0", "2.0.0", "1.0.0", "v1.0.0", "1.2.0-rc.1", "latest"], RANGE_1_TO_2);

    fixture
        .command_with_description(&["resolve", "dep"])
        .assert()
        .success()
        .stdout("[\"1.0.0\",\"1.1.0\"]\n");
}

#[test]
fn test_resolve_matrix() {
    let fixture = ProbeFixture::new(&["1.0.0", "1.1.0", "2.0.0"], RANGE_1_TO_2);

    fixture
        .command_with_description(&["resolve", "dep", "--matrix"])
        .assert()
        .success()
        .stdout("{\"include\":[{\"version\":\"1.0.0\"},{\"version\":\"1.1.0\"}]}\n");
}

#[test]
fn test_resolve_with_no_candidates_prints_empty_array() {
    let fixture = ProbeFixture::new(&["0.9.0", "2.0.0"], RANGE_1_TO_2);

    fixture.command_with_description(&["resolve", "dep"]).assert().success().stdout("[]\n");
}

#[test]
fn test_resolve_with_describe_command() {
    let fixture = ProbeFixture::new(&["1.0.0", "1.5.0"], RANGE_1_TO_2);
    std::fs::copy(fixture.description_path(), fixture.package_path().join("description.json")).unwrap();
    fixture.write_config("[commands]\ndescribe = [\"cat\", \"description.json\"]\n");

    fixture.command(&["resolve", "DEP"]).assert().success().stdout("[\"1.0.0\",\"1.5.0\"]\n");
}

#[test]
fn test_branch_pin_has_no_range() {
    let fixture = ProbeFixture::new(&["1.0.0"], r#"{"branch": "main"}"#);

    fixture
        .command_with_description(&["resolve", "dep"])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("pinned to branch main"));
}

#[test]
fn test_unknown_dependency() {
    let fixture = ProbeFixture::new(&["1.0.0"], RANGE_1_TO_2);

    fixture
        .command_with_description(&["resolve", "other"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("'other' is not declared by package 'Demo'"));
}

#[test]
fn test_missing_description() {
    let fixture = ProbeFixture::new(&["1.0.0"], RANGE_1_TO_2);

    fixture
        .command(&["resolve", "dep"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read the manifest description"));
}

#[test]
fn test_unreachable_remote() {
    let fixture = ProbeFixture::new(&["1.0.0"], RANGE_1_TO_2);
    std::fs::remove_dir_all(fixture.remote_path()).unwrap();

    fixture
        .command_with_description(&["resolve", "dep"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to list tags"));
}
