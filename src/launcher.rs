//! Wiring for one launcher invocation: options, catalog, families, runner.
use crate::cli::RootArgs;
use crate::family::{self, discover_projects, FamilyContext, TestFamily};
use crate::options::RunOptions;
use crate::reporter::{Printer, RunSummary, XunitReporter};
use crate::runner::TestRunner;
use crate::scenario::ScenarioCatalog;
use crate::util::mkdir;
use anyhow::Result;
use std::sync::atomic::AtomicBool;

/// What a run produced: a summary, or the listing of selected tests.
#[derive(Debug)]
pub enum RunResult {
    Listed(Vec<String>),
    Executed(RunSummary),
}

pub fn run(args: &RootArgs, cancel: &AtomicBool) -> Result<RunResult> {
    let options = RunOptions::from_args(args)?;
    run_with_options(&options, cancel)
}

pub fn run_with_options(options: &RunOptions, cancel: &AtomicBool) -> Result<RunResult> {
    let mut runner = prepare(options, cancel)?;
    if options.list_only {
        return Ok(RunResult::Listed(
            runner
                .selected()
                .map(|test| test.classname().to_string())
                .collect(),
        ));
    }

    mkdir(&options.dest)?;
    let mut reporter = XunitReporter::new(options.logs_dir.clone(), Printer::new(options.color))?;
    let summary = runner.run_tests(&mut reporter, cancel)?;
    Ok(RunResult::Executed(summary))
}

/// Build the populated runner: usable families expanded over the discovered inputs.
fn prepare(options: &RunOptions, cancel: &AtomicBool) -> Result<TestRunner> {
    let (families, projects) = family::select(&options.targets);
    let mut usable: Vec<Box<dyn TestFamily>> = Vec::new();
    for mut family in families {
        if family.init(options, cancel)? {
            usable.push(family);
        } else {
            tracing::warn!(
                family = family.name(),
                description = family.description(),
                "family unusable on this host; skipping"
            );
        }
    }
    if usable.is_empty() {
        tracing::warn!(
            launcher = %options.ges_launch.display_with(&[]),
            "no usable test family; nothing to run"
        );
    }

    let scenarios = ScenarioCatalog::load(&options.scenario_sources, options.timeout, cancel)?;
    let inputs = discover_projects(options, &projects)?;
    tracing::info!(
        projects = inputs.len(),
        scenarios = scenarios.len(),
        families = usable.len(),
        "expanding tests"
    );
    let context = FamilyContext {
        options,
        scenarios: &scenarios,
        inputs: &inputs,
    };
    let mut runner = TestRunner::new(&options.wanted_tests)?;
    for family in usable.iter_mut() {
        family.expand(&context)?;
        runner.register(family.as_mut());
    }
    Ok(runner)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::util::CommandLine;
    use std::fs;
    use std::path::Path;

    fn fake_launcher(dir: &Path, help: &str) -> CommandLine {
        let script = dir.join("ges-launch.sh");
        fs::write(
            &script,
            format!("if [ \"$1\" = \"--help\" ]; then echo '{help}'; fi\nexit 0\n"),
        )
        .expect("write launcher");
        CommandLine {
            program: "sh".to_string(),
            args: vec![script.display().to_string()],
        }
    }

    fn options_with_project(dir: &Path, help: &str) -> RunOptions {
        let mut options = RunOptions::with_main_dir(dir).expect("options");
        fs::create_dir_all(&options.projects_paths).expect("mkdir");
        fs::write(
            options.projects_paths.join("sample.xges"),
            "<ges><timeline metadatas='metadatas, duration=(guint64)30000000000;'/></ges>",
        )
        .expect("write project");
        options.ges_launch = fake_launcher(dir, help);
        options.scenario_sources.validate_command = None;
        options.color = false;
        options
    }

    #[test]
    fn listing_applies_family_selection_and_filter() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut options = options_with_project(temp.path(), "  --set-scenario=NAME");
        options.list_only = true;
        options.targets = vec!["render".to_string()];
        options.wanted_tests = vec!["ogg|webm".to_string()];
        let cancel = AtomicBool::new(false);
        let RunResult::Listed(names) = run_with_options(&options, &cancel).expect("run") else {
            panic!("expected a listing");
        };
        assert_eq!(
            names,
            vec!["render.ogg_vorbis_theora.sample", "render.webm_vorbis_vp8.sample"]
        );
        assert!(!options.logs_dir.exists());
    }

    #[test]
    fn incapable_launcher_skips_every_family() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut options = options_with_project(temp.path(), "usage: ges-launch");
        options.list_only = true;
        let cancel = AtomicBool::new(false);
        let RunResult::Listed(names) = run_with_options(&options, &cancel).expect("run") else {
            panic!("expected a listing");
        };
        assert!(names.is_empty());
    }

    #[test]
    fn playback_listing_uses_builtin_scenarios() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut options = options_with_project(temp.path(), "  --set-scenario=NAME");
        options.list_only = true;
        options.targets = vec!["playback".to_string()];
        let cancel = AtomicBool::new(false);
        let RunResult::Listed(names) = run_with_options(&options, &cancel).expect("run") else {
            panic!("expected a listing");
        };
        assert_eq!(
            names,
            vec![
                "playback.play_15s.sample",
                "playback.seek_forward.sample",
                "playback.seek_backward.sample",
                "playback.scrub_forward_seeking.sample",
            ]
        );
    }
}
