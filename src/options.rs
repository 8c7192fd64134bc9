//! Resolved run options shared (read-only) by families and test cases.
use crate::cli::RootArgs;
use crate::scenario::ScenarioSources;
use crate::util::{resolve_command, CommandLine};
use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[cfg(windows)]
pub const GES_LAUNCH_COMMAND: &str = "ges-launch-1.0.exe";
#[cfg(not(windows))]
pub const GES_LAUNCH_COMMAND: &str = "ges-launch-1.0";
pub const DISCOVERER_COMMAND: &str = "gst-discoverer-1.0";
pub const VALIDATE_COMMAND: &str = "gst-validate-1.0";

pub const GES_LAUNCH_ENV: &str = "VALIDATE_GES_LAUNCH";
pub const DISCOVERER_ENV: &str = "VALIDATE_DISCOVERER";
pub const VALIDATE_ENV: &str = "VALIDATE_COMMAND";

const MAIN_DIR_NAME: &str = "gst-validate";

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub main_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub dest: PathBuf,
    pub projects_paths: PathBuf,
    /// Media search paths handed to the launcher; empty means "project directory".
    pub sample_paths: Vec<String>,
    pub mute: bool,
    pub disable_recurse: bool,
    pub timeout: Duration,
    pub wanted_tests: Vec<String>,
    pub list_only: bool,
    pub color: bool,
    pub ges_launch: CommandLine,
    pub discoverer: CommandLine,
    pub scenario_sources: ScenarioSources,
    /// Positional arguments: family names and project paths, unsplit.
    pub targets: Vec<String>,
}

impl RunOptions {
    /// Defaults rooted at `main_dir`, with the stock executables.
    pub fn with_main_dir(main_dir: &Path) -> Result<Self> {
        Ok(Self {
            main_dir: main_dir.to_path_buf(),
            logs_dir: main_dir.join("logs"),
            dest: main_dir.join("rendered"),
            projects_paths: main_dir.join("gst-qa-assets").join("ges-projects"),
            sample_paths: Vec::new(),
            mute: false,
            disable_recurse: false,
            timeout: Duration::from_secs_f64(crate::cli::DEFAULT_TIMEOUT_SECS),
            wanted_tests: Vec::new(),
            list_only: false,
            color: true,
            ges_launch: CommandLine::parse(GES_LAUNCH_COMMAND)?,
            discoverer: CommandLine::parse(DISCOVERER_COMMAND)?,
            scenario_sources: ScenarioSources {
                file: None,
                dir: None,
                validate_command: Some(CommandLine::parse(VALIDATE_COMMAND)?),
            },
            targets: Vec::new(),
        })
    }

    pub fn from_args(args: &RootArgs) -> Result<Self> {
        let main_dir = match &args.main_dir {
            Some(dir) => dir.clone(),
            None => default_main_dir()?,
        };
        let mut options = Self::with_main_dir(&main_dir)?;
        if let Some(dir) = &args.logs_dir {
            options.logs_dir = dir.clone();
        }
        if let Some(dir) = &args.dest {
            options.dest = dir.clone();
        }
        if let Some(dir) = &args.projects_paths {
            options.projects_paths = dir.clone();
        }
        options.sample_paths = args.paths.clone();
        options.mute = args.mute;
        options.disable_recurse = args.disable_recurse;
        options.timeout = parse_timeout(args.timeout)?;
        options.wanted_tests = split_patterns(args.wanted_tests.as_deref());
        options.list_only = args.list_tests;
        options.color = !args.no_color;
        options.ges_launch = CommandLine::parse(&resolve_command(
            args.ges_launch.as_deref(),
            GES_LAUNCH_ENV,
            GES_LAUNCH_COMMAND,
        ))?;
        options.discoverer = CommandLine::parse(&resolve_command(
            args.discoverer.as_deref(),
            DISCOVERER_ENV,
            DISCOVERER_COMMAND,
        ))?;
        options.scenario_sources = ScenarioSources {
            file: args.scenarios_file.clone(),
            dir: args.scenarios_dir.clone(),
            validate_command: Some(CommandLine::parse(&resolve_command(
                args.validate_command.as_deref(),
                VALIDATE_ENV,
                VALIDATE_COMMAND,
            ))?),
        };
        options.targets = args.targets.clone();
        Ok(options)
    }
}

fn default_main_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    Ok(home.join(MAIN_DIR_NAME))
}

fn parse_timeout(seconds: f64) -> Result<Duration> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(anyhow!("--timeout must be a positive number of seconds"));
    }
    Duration::try_from_secs_f64(seconds).map_err(|err| anyhow!("--timeout {seconds}: {err}"))
}

/// Split a comma-separated pattern list, dropping empty entries.
pub fn split_patterns(value: Option<&str>) -> Vec<String> {
    value
        .map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|pattern| !pattern.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn directories_default_under_main_dir() {
        let args = RootArgs::try_parse_from(["validate-launcher", "-M", "/srv/qa"]).expect("parse");
        let options = RunOptions::from_args(&args).expect("options");
        assert_eq!(options.logs_dir, PathBuf::from("/srv/qa/logs"));
        assert_eq!(options.dest, PathBuf::from("/srv/qa/rendered"));
        assert_eq!(
            options.projects_paths,
            PathBuf::from("/srv/qa/gst-qa-assets/ges-projects")
        );
        assert!(options.color);
    }

    #[test]
    fn explicit_commands_are_split() {
        let args = RootArgs::try_parse_from([
            "validate-launcher",
            "-M",
            "/srv/qa",
            "--ges-launch",
            "sh /tmp/fake-launch.sh",
            "-n",
        ])
        .expect("parse");
        let options = RunOptions::from_args(&args).expect("options");
        assert_eq!(options.ges_launch.program, "sh");
        assert_eq!(options.ges_launch.args, vec!["/tmp/fake-launch.sh"]);
        assert!(!options.color);
    }

    #[test]
    fn non_positive_timeout_is_rejected() {
        let args = RootArgs::try_parse_from(["validate-launcher", "-M", "/srv/qa", "--timeout", "0"])
            .expect("parse");
        assert!(RunOptions::from_args(&args).is_err());
    }

    #[test]
    fn huge_timeout_is_an_error_not_a_panic() {
        let args = RootArgs::try_parse_from(["validate-launcher", "-M", "/srv/qa", "--timeout", "1e30"])
            .expect("parse");
        let err = RunOptions::from_args(&args).expect_err("out of range");
        assert!(err.to_string().starts_with("--timeout 1000000000000000000000000000000"));
        assert!(parse_timeout(1e30).is_err());
        assert_eq!(parse_timeout(2.5).expect("timeout"), Duration::from_millis(2500));
    }

    #[test]
    fn patterns_are_split_and_trimmed() {
        assert_eq!(
            split_patterns(Some("ogg, webm,,render\\..*")),
            vec!["ogg", "webm", "render\\..*"]
        );
        assert!(split_patterns(None).is_empty());
    }
}
