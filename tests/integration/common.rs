//! Fixture shared by the integration tests: a local "remote" repository whose
//! tags stand in for published versions, and a package that depends on it.

use assert_cmd::Command;
use range_probe::test_utils::TestGit;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct ProbeFixture {
    temp: TempDir,
}

impl ProbeFixture {
    /// A dependency tagged `tags` and a package declaring `requirement` on it.
    ///
    /// `requirement` is the JSON requirement object, e.g.
    /// `{"range": {"lowerBound": "1.0.0", "upperBound": "2.0.0"}}`.
    pub fn new(tags: &[&str], requirement: &str) -> Self {
        let temp = TempDir::new().unwrap();
        let fixture = Self {
            temp,
        };

        let remote = TestGit::new(fixture.remote_path());
        remote.init_with_commit().unwrap();
        for tag in tags {
            remote.tag(tag).unwrap();
        }

        std::fs::create_dir_all(fixture.package_path().join("Sources")).unwrap();
        std::fs::write(fixture.package_path().join("Package.swift"), "// swift-tools-version:5.9\n").unwrap();
        std::fs::write(fixture.package_path().join("Sources/main.swift"), "print(\"hi\")\n").unwrap();
        std::fs::create_dir_all(fixture.workspace_root()).unwrap();
        std::fs::create_dir_all(fixture.config_home()).unwrap();

        let description = format!(
            r#"{{"name": "Demo", "dependencies": [
                {{"identity": "dep", "location": "{}", "requirement": {requirement}}}
            ]}}"#,
            fixture.remote_path().display()
        );
        std::fs::write(fixture.description_path(), description).unwrap();
        fixture
    }

    pub fn remote_path(&self) -> PathBuf {
        self.temp.path().join("remote")
    }

    pub fn package_path(&self) -> PathBuf {
        self.temp.path().join("package")
    }

    pub fn workspace_root(&self) -> PathBuf {
        self.temp.path().join("work")
    }

    pub fn description_path(&self) -> PathBuf {
        self.temp.path().join("description.json")
    }

    fn config_home(&self) -> PathBuf {
        self.temp.path().join("config-home")
    }

    /// Write `.range-probe.toml` into the package.
    pub fn write_config(&self, content: &str) {
        std::fs::write(self.package_path().join(".range-probe.toml"), content).unwrap();
    }

    /// `range-probe` isolated from the user's configuration and environment.
    pub fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::cargo_bin("range-probe").unwrap();
        cmd.args(args)
            .arg("--package-path")
            .arg(self.package_path())
            .arg("--no-progress")
            .env("XDG_CONFIG_HOME", self.config_home())
            .env("RANGE_PROBE_NO_PROGRESS", "1")
            .env("NO_COLOR", "1")
            .env_remove("RANGE_PROBE_CONFIG")
            .env_remove("RUST_LOG");
        cmd
    }

    /// Like [`command`](Self::command) with `--description` pointing at the
    /// fixture's description file.
    pub fn command_with_description(&self, args: &[&str]) -> Command {
        let mut cmd = self.command(args);
        cmd.arg("--description").arg(self.description_path());
        cmd
    }
}

/// Configuration whose test step fails for `failing_version`.
pub fn scripted_config(workspace_root: &Path, failing_version: &str) -> String {
    format!(
        r#"
[commands]
clean = []
resolve = ["sh", "-c", "echo resolving {{package}}"]
pin = ["sh", "-c", "echo {{version}} > pinned.txt"]
test = ["sh", "-c", "if [ \"$(cat pinned.txt)\" = \"{failing_version}\" ]; then echo 'error: incompatible API'; exit 1; fi; echo ok"]

[run]
tick_interval_ms = 20

[sandbox]
workspace_root = "{}"
"#,
        workspace_root.display()
    )
}
