//! Render family: every project into each encoding target, with a duration
//! check on the produced file.
use super::{classname, check_launcher, FamilyContext, GesProject, TestFamily};
use crate::encoding::{MediaFormatCombination, ENCODING_TARGET_COMBINATIONS};
use crate::media::{
    compare_rendered_with_original, format_gst_time, media_duration, within_tolerance,
    DURATION_TOLERANCE,
};
use crate::interrupt::is_interrupted;
use crate::options::RunOptions;
use crate::outcome::{Outcome, Verdict, TAG_ERROR, TAG_MISSING_EOS};
use crate::test_case::{ResultContext, TestCase, TestKind};
use crate::util::{mkdir, path_to_uri, CommandLine};
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

pub const FAMILY_NAME: &str = "render";

/// Destination of a render test: `<dest>/<classname as path>.<container>`.
pub fn destination_path(dest: &Path, classname: &str, container: &str) -> PathBuf {
    let mut path = dest.to_path_buf();
    for part in classname.split('.') {
        path.push(part);
    }
    path.set_extension(container);
    path
}

#[derive(Debug)]
pub struct RenderKind {
    project: GesProject,
    combination: MediaFormatCombination,
    dest: PathBuf,
    discoverer: CommandLine,
}

impl RenderKind {
    pub fn new(
        project: GesProject,
        combination: MediaFormatCombination,
        dest: PathBuf,
        discoverer: CommandLine,
    ) -> Self {
        Self {
            project,
            combination,
            dest,
            discoverer,
        }
    }

    pub fn dest(&self) -> &Path {
        &self.dest
    }

    fn rendered_duration(&self, context: &ResultContext<'_>) -> Result<u64> {
        media_duration(
            &self.discoverer,
            &path_to_uri(&self.dest),
            context.timeout,
            context.cancel,
        )
    }
}

impl TestKind for RenderKind {
    fn build_arguments(&self, args: &mut Vec<String>) -> Result<()> {
        let profile = self
            .combination
            .profile()
            .ok_or_else(|| anyhow!("no encoding profile for {}", self.combination))?;
        if let Some(parent) = self.dest.parent() {
            mkdir(parent)?;
        }
        match fs::remove_file(&self.dest) {
            Ok(()) => tracing::debug!(dest = %self.dest.display(), "removed stale render"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(err).with_context(|| format!("remove stale {}", self.dest.display()))
            }
        }
        self.project.build_arguments(args);
        args.push("-f".to_string());
        args.push(profile);
        args.push("-o".to_string());
        args.push(path_to_uri(&self.dest));
        Ok(())
    }

    fn check_results(&self, context: &ResultContext<'_>, base: Verdict) -> Verdict {
        match base.outcome {
            Outcome::Passed if context.scenario.is_none() => match self.rendered_duration(context) {
                Ok(measured) => {
                    compare_rendered_with_original(self.project.duration, measured, DURATION_TOLERANCE)
                }
                Err(err) if is_interrupted(&err) => base,
                Err(err) => Verdict::new(
                    Outcome::Failed,
                    format!("Could not check rendered duration: {err:#}"),
                    TAG_ERROR,
                ),
            },
            Outcome::Timeout => match self.rendered_duration(context) {
                Ok(measured)
                    if within_tolerance(self.project.duration, measured, DURATION_TOLERANCE) =>
                {
                    tracing::info!(
                        dest = %self.dest.display(),
                        duration = %format_gst_time(measured),
                        "timed out with a complete render"
                    );
                    Verdict::new(
                        Outcome::Timeout,
                        "The rendered file has the right duration, missing EOS?",
                        TAG_MISSING_EOS,
                    )
                }
                Ok(_) => base,
                Err(err) => {
                    tracing::debug!(error = %format!("{err:#}"), "cannot measure partial render");
                    base
                }
            },
            _ => base,
        }
    }

    fn current_value(&self, _log_path: &Path) -> Option<u64> {
        fs::metadata(&self.dest).ok().map(|meta| meta.len())
    }
}

#[derive(Default)]
pub struct RenderFamily {
    tests: Vec<TestCase>,
}

pub fn new_family() -> Box<dyn TestFamily> {
    Box::new(RenderFamily::default())
}

impl TestFamily for RenderFamily {
    fn name(&self) -> &'static str {
        FAMILY_NAME
    }

    fn description(&self) -> &'static str {
        "Render every project into each encoding target"
    }

    fn init(&mut self, options: &RunOptions, cancel: &AtomicBool) -> Result<bool> {
        check_launcher(&options.ges_launch, options.timeout, cancel)
    }

    fn expand(&mut self, context: &FamilyContext<'_>) -> Result<()> {
        let options = context.options;
        for input in context.inputs {
            let project = GesProject::load(input, options);
            for combination in ENCODING_TARGET_COMBINATIONS {
                let classname = classname(FAMILY_NAME, &combination.identifier(), input);
                let dest = destination_path(&options.dest, &classname, combination.container);
                let kind = RenderKind::new(
                    project.clone(),
                    *combination,
                    dest,
                    options.discoverer.clone(),
                );
                self.tests.push(TestCase::new(
                    classname,
                    options.ges_launch.clone(),
                    options.timeout,
                    None,
                    Box::new(kind),
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
