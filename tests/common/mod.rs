//! Shared test infrastructure for integration tests.
//!
//! A fixture is a scratch main directory holding projects, a scenario
//! catalog and `sh` scripts standing in for the launcher and discoverer.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

pub const SAMPLE_PROJECT: &str = r#"<ges version='0.3'>
  <project properties='properties;' metadatas='metadatas;'>
    <timeline properties='properties;' metadatas='metadatas, duration=(guint64)30000000000;'>
    </timeline>
  </project>
</ges>
"#;

/// Report fields the integration tests look at.
#[derive(Debug)]
pub struct ReportedTest {
    pub classname: String,
    pub outcome: String,
    pub error: String,
}

pub struct LauncherFixture {
    pub temp_dir: TempDir,
    launcher_body: String,
    discoverer_duration: String,
}

impl LauncherFixture {
    /// Main directory with one `sample.xges` and a one-entry scenario catalog.
    pub fn new() -> anyhow::Result<Self> {
        let temp_dir = TempDir::new()?;
        let projects = temp_dir.path().join("gst-qa-assets/ges-projects");
        fs::create_dir_all(&projects)?;
        fs::write(projects.join("sample.xges"), SAMPLE_PROJECT)?;
        fs::write(
            temp_dir.path().join("scenarios.json"),
            r#"[{"name": "play_15s", "description": "Play 15 seconds"}]"#,
        )?;
        Ok(Self {
            temp_dir,
            launcher_body: "exit 0".to_string(),
            discoverer_duration: "0:00:30.000000000".to_string(),
        })
    }

    /// Shell snippet the fake launcher runs for real (non `--help`) invocations.
    pub fn with_launcher_body(mut self, body: &str) -> Self {
        self.launcher_body = body.to_string();
        self
    }

    pub fn with_discoverer_duration(mut self, duration: &str) -> Self {
        self.discoverer_duration = duration.to_string();
        self
    }

    pub fn main_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.main_dir().join("logs")
    }

    fn write_scripts(&self) -> anyhow::Result<(PathBuf, PathBuf)> {
        let launcher = self.main_dir().join("fake-ges-launch.sh");
        fs::write(
            &launcher,
            format!(
                "if [ \"$1\" = \"--help\" ]; then\n  echo '  --set-scenario=SCENARIO'\n  exit 0\nfi\necho \"launched: $*\"\n{}\n",
                self.launcher_body
            ),
        )?;
        let discoverer = self.main_dir().join("fake-discoverer.sh");
        fs::write(
            &discoverer,
            format!(
                "echo \"Analyzing $1\"\necho \"Duration: {}\"\n",
                self.discoverer_duration
            ),
        )?;
        Ok((launcher, discoverer))
    }

    /// Run the launcher binary against this fixture.
    pub fn run(&self, extra: &[&str]) -> anyhow::Result<Output> {
        let (launcher, discoverer) = self.write_scripts()?;
        let output = Command::new(env!("CARGO_BIN_EXE_validate-launcher"))
            .arg("-M")
            .arg(self.main_dir())
            .arg("--ges-launch")
            .arg(format!("sh {}", shell_words::quote(&launcher.display().to_string())))
            .arg("--discoverer")
            .arg(format!("sh {}", shell_words::quote(&discoverer.display().to_string())))
            .arg("--scenarios-file")
            .arg(self.main_dir().join("scenarios.json"))
            .arg("-n")
            .args(extra)
            .env_remove("RUST_LOG")
            .output()?;
        Ok(output)
    }

    /// Parse `report.json` from the logs directory.
    pub fn report(&self) -> anyhow::Result<Vec<ReportedTest>> {
        let text = fs::read_to_string(self.logs_dir().join("report.json"))?;
        let raw: serde_json::Value = serde_json::from_str(&text)?;
        let tests = raw["tests"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .map(|test| ReportedTest {
                        classname: test["classname"].as_str().unwrap_or_default().to_string(),
                        outcome: test["outcome"].as_str().unwrap_or_default().to_string(),
                        error: test["error"].as_str().unwrap_or_default().to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(tests)
    }
}
