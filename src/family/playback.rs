//! Playback family: every project under each scripted scenario.
use super::{classname, check_launcher, FamilyContext, GesProject, TestFamily};
use crate::media::parse_gst_time;
use crate::options::RunOptions;
use crate::test_case::{TestCase, TestKind};
use anyhow::Result;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::OnceLock;

pub const FAMILY_NAME: &str = "playback";

/// Scenarios each project is played under, in expansion order.
pub const SCENARIOS: &[&str] = &[
    "play_15s",
    "seek_forward",
    "seek_backward",
    "scrub_forward_seeking",
];

fn position_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"<position:\s*(\d+:\d{1,2}:\d{1,2}\.\d+)").expect("static position regex")
    })
}

/// Last reported playback position in a launcher log, in nanoseconds.
pub fn last_position(log: &str) -> Option<u64> {
    position_regex()
        .captures_iter(log)
        .last()
        .and_then(|caps| parse_gst_time(&caps[1]))
}

#[derive(Debug)]
pub struct PlaybackKind {
    project: GesProject,
}

impl PlaybackKind {
    pub fn new(project: GesProject) -> Self {
        Self { project }
    }
}

impl TestKind for PlaybackKind {
    fn build_arguments(&self, args: &mut Vec<String>) -> Result<()> {
        self.project.build_arguments(args);
        Ok(())
    }

    fn current_value(&self, log_path: &Path) -> Option<u64> {
        let bytes = fs::read(log_path).ok()?;
        last_position(&String::from_utf8_lossy(&bytes))
    }
}

#[derive(Default)]
pub struct PlaybackFamily {
    tests: Vec<TestCase>,
}

pub fn new_family() -> Box<dyn TestFamily> {
    Box::new(PlaybackFamily::default())
}

impl TestFamily for PlaybackFamily {
    fn name(&self) -> &'static str {
        FAMILY_NAME
    }

    fn description(&self) -> &'static str {
        "Play every project under each scripted scenario"
    }

    fn init(&mut self, options: &RunOptions, cancel: &AtomicBool) -> Result<bool> {
        check_launcher(&options.ges_launch, options.timeout, cancel)
    }

    fn expand(&mut self, context: &FamilyContext<'_>) -> Result<()> {
        let options = context.options;
        for input in context.inputs {
            let project = GesProject::load(input, options);
            for name in SCENARIOS {
                let Some(scenario) = context.scenarios.get(name) else {
                    tracing::debug!(scenario = *name, "scenario not in catalog; skipping");
                    continue;
                };
                self.tests.push(TestCase::new(
                    classname(FAMILY_NAME, name, input),
                    options.ges_launch.clone(),
                    options.timeout,
                    Some(scenario.clone()),
                    Box::new(PlaybackKind::new(project.clone())),
                ));
            }
        }
        tracing::debug!(family = FAMILY_NAME, tests = self.tests.len(), "expanded");
        Ok(())
    }

    fn tests(&self) -> &[TestCase] {
        &self.tests
    }

    fn take_tests(&mut self) -> Vec<TestCase> {
        std::mem::take(&mut self.tests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::family::ProjectInput;
    use crate::scenario::{Scenario, ScenarioCatalog};
    use std::path::PathBuf;

    fn input(name: &str) -> ProjectInput {
        ProjectInput {
            path: PathBuf::from(format!("/nonexistent/{name}.xges")),
            uri: format!("file:///nonexistent/{name}.xges"),
            basename: name.to_string(),
        }
    }

    fn catalog(names: &[&str]) -> ScenarioCatalog {
        ScenarioCatalog::from_entries(names.iter().map(|name| Scenario {
            name: name.to_string(),
            description: String::new(),
        }))
    }

    fn expand(scenarios: &ScenarioCatalog, inputs: &[ProjectInput]) -> Vec<String> {
        let temp = tempfile::tempdir().expect("tempdir");
        let options = RunOptions::with_main_dir(temp.path()).expect("options");
        let mut family = PlaybackFamily::default();
        family
            .expand(&FamilyContext {
                options: &options,
                scenarios,
                inputs,
            })
            .expect("expand");
        family
            .tests()
            .iter()
            .map(|test| test.classname().to_string())
            .collect()
    }

    #[test]
    fn one_test_per_input_and_known_scenario() {
        let names = expand(
            &catalog(&["play_15s", "seek_forward", "unrelated"]),
            &[input("a"), input("b")],
        );
        assert_eq!(
            names,
            vec![
                "playback.play_15s.a",
                "playback.seek_forward.a",
                "playback.play_15s.b",
                "playback.seek_forward.b",
            ]
        );
    }

    #[test]
    fn missing_scenarios_and_inputs_produce_nothing() {
        assert!(expand(&catalog(&[]), &[input("a")]).is_empty());
        assert!(expand(&ScenarioCatalog::builtin(), &[]).is_empty());
    }

    #[test]
    fn scenario_is_passed_first() {
        let temp = tempfile::tempdir().expect("tempdir");
        let options = RunOptions::with_main_dir(temp.path()).expect("options");
        let scenarios = catalog(&["play_15s"]);
        let inputs = [input("a")];
        let mut family = PlaybackFamily::default();
        family
            .expand(&FamilyContext {
                options: &options,
                scenarios: &scenarios,
                inputs: &inputs,
            })
            .expect("expand");
        let mut tests = family.take_tests();
        assert!(family.tests().is_empty());
        tests[0].build_arguments().expect("build");
        let args = tests[0].arguments();
        assert_eq!(&args[..2], ["--set-scenario", "play_15s"]);
        assert_eq!(args.last().map(String::as_str), Some("file:///nonexistent/a.xges"));
    }

    #[test]
    fn last_position_wins() {
        let log = "<position: 0:00:01.000000000 duration: 0:00:30.000000000>\r\
                   <position: 0:00:02.500000000 duration: 0:00:30.000000000>\r";
        assert_eq!(last_position(log), Some(2_500_000_000));
        assert_eq!(last_position("no progress"), None);
    }
}
