//! Scenario catalog: named playback scripts looked up by the playback family.

use crate::interrupt::is_interrupted;
use crate::supervise::run_captured;
use crate::util::CommandLine;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::time::Duration;

/// Scenario file extension understood by the validate tools.
pub const SCENARIO_EXTENSION: &str = "scenario";

/// Scenarios shipped with the validate tools, used when nothing else is available.
pub const BUILTIN_SCENARIOS: &[(&str, &str)] = &[
    ("play_15s", "Play the media for 15 seconds"),
    ("seek_forward", "Seek forward a few times"),
    ("seek_backward", "Seek backward a few times"),
    (
        "scrub_forward_seeking",
        "Seek repeatedly forward, simulating scrubbing",
    ),
];

/// One catalog entry.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Where the catalog is loaded from, most specific first.
#[derive(Debug, Default, Clone)]
pub struct ScenarioSources {
    pub file: Option<PathBuf>,
    pub dir: Option<PathBuf>,
    pub validate_command: Option<CommandLine>,
}

/// Read-only name -> scenario lookup shared by all families.
#[derive(Debug, Default, Clone)]
pub struct ScenarioCatalog {
    scenarios: BTreeMap<String, Scenario>,
}

/// `none` (any case) means "no scripted scenario".
pub fn is_none_name(name: &str) -> bool {
    name.trim().eq_ignore_ascii_case("none")
}

/// Validate a scenario name; returns errors if any.
///
/// Names end up inside dotted classnames and on the launcher's command line.
pub fn validate_scenario_name(name: &str) -> Option<Vec<String>> {
    let mut errors = Vec::new();
    if name.trim().is_empty() {
        errors.push("name is required".to_string());
    }
    if name.contains('.') {
        errors.push("name contains '.'".to_string());
    }
    if name.chars().any(char::is_whitespace) {
        errors.push("name contains whitespace".to_string());
    }
    if name.contains('\0') {
        errors.push("name contains NUL".to_string());
    }
    if is_none_name(name) {
        errors.push("name is reserved".to_string());
    }
    if errors.is_empty() {
        None
    } else {
        Some(errors)
    }
}

impl ScenarioCatalog {
    pub fn from_entries(entries: impl IntoIterator<Item = Scenario>) -> Self {
        let mut scenarios = BTreeMap::new();
        for entry in entries {
            if let Some(errors) = validate_scenario_name(&entry.name) {
                tracing::warn!(name = %entry.name, errors = %errors.join("; "), "skipping scenario");
                continue;
            }
            scenarios.insert(entry.name.clone(), entry);
        }
        Self { scenarios }
    }

    pub fn builtin() -> Self {
        Self::from_entries(BUILTIN_SCENARIOS.iter().map(|(name, description)| Scenario {
            name: name.to_string(),
            description: description.to_string(),
        }))
    }

    /// Load a JSON list of `{ "name": .., "description": .. }` objects.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
        let entries: Vec<Scenario> = serde_json::from_slice(&bytes)
            .with_context(|| format!("parse scenarios {}", path.display()))?;
        Ok(Self::from_entries(entries))
    }

    /// Load every `*.scenario` file in `dir`; the file stem is the scenario name.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let entries = fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))?;
        let mut scenarios = Vec::new();
        for entry in entries {
            let path = entry
                .with_context(|| format!("read entry in {}", dir.display()))?
                .path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(SCENARIO_EXTENSION) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let text =
                fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
            scenarios.push(Scenario {
                name: name.to_string(),
                description: first_statement(&text),
            });
        }
        Ok(Self::from_entries(scenarios))
    }

    /// Parse the key-file dump written by `--scenarios-defs-output-file`.
    pub fn from_keyfile_text(text: &str) -> Self {
        let mut scenarios: Vec<Scenario> = Vec::new();
        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(name) = line.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) {
                scenarios.push(Scenario {
                    name: name.trim().to_string(),
                    description: String::new(),
                });
                continue;
            }
            if let (Some(current), Some((key, value))) = (scenarios.last_mut(), line.split_once('='))
            {
                if key.trim() == "description" {
                    current.description = value.trim().to_string();
                }
            }
        }
        Self::from_entries(scenarios)
    }

    /// Ask the validate tool to dump its scenario definitions.
    pub fn discover(validate: &CommandLine, timeout: Duration, cancel: &AtomicBool) -> Result<Self> {
        let output_file = tempfile::NamedTempFile::new().context("create scenario defs file")?;
        let mut cmd = validate.command();
        cmd.arg("--scenarios-defs-output-file").arg(output_file.path());
        let output = run_captured(&mut cmd, timeout, cancel)
            .with_context(|| format!("run {}", validate.program))?;
        if output.timed_out {
            return Err(anyhow!(
                "{} did not list scenarios within {:.1}s",
                validate.program,
                timeout.as_secs_f64()
            ));
        }
        if !output.success() {
            return Err(anyhow!(
                "{} failed to list scenarios (exit code {:?})",
                validate.program,
                output.exit_code
            ));
        }
        let text = fs::read_to_string(output_file.path())
            .with_context(|| format!("read {}", output_file.path().display()))?;
        let catalog = Self::from_keyfile_text(&text);
        if catalog.is_empty() {
            return Err(anyhow!("{} listed no scenarios", validate.program));
        }
        Ok(catalog)
    }

    /// Resolve the catalog from the configured sources.
    ///
    /// An explicit file or directory must load; discovery through the validate
    /// tool falls back to the built-in list unless the operator interrupted it.
    pub fn load(sources: &ScenarioSources, timeout: Duration, cancel: &AtomicBool) -> Result<Self> {
        if let Some(file) = &sources.file {
            return Self::from_json_file(file);
        }
        if let Some(dir) = &sources.dir {
            return Self::from_dir(dir);
        }
        if let Some(validate) = &sources.validate_command {
            match Self::discover(validate, timeout, cancel) {
                Ok(catalog) => return Ok(catalog),
                Err(err) if is_interrupted(&err) => return Err(err),
                Err(err) => {
                    tracing::info!(error = %format!("{err:#}"), "using built-in scenarios");
                }
            }
        }
        Ok(Self::builtin())
    }

    pub fn get(&self, name: &str) -> Option<&Scenario> {
        self.scenarios.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.scenarios.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}

fn first_statement(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
        .unwrap_or_default()
        .to_string()
}
