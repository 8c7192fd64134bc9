//! CLI argument parsing for the launcher.
//!
//! The CLI only collects values; defaults and validation live in
//! [`crate::options::RunOptions`].
use clap::Parser;
use std::path::PathBuf;

/// Default per-test timeout, in seconds.
pub const DEFAULT_TIMEOUT_SECS: f64 = 30.0;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "validate-launcher",
    version,
    about = "Run GStreamer Editing Services playback and render tests",
    after_help = "Families:\n  playback  Play every project under each scripted scenario\n  render    Render every project into each encoding target\n\nExamples:\n  validate-launcher\n  validate-launcher render -t 'ogg'\n  validate-launcher playback /some/ges/project.xges\n  validate-launcher -L -t 'playback\\.seek_.*'"
)]
pub struct RootArgs {
    /// Families to run (default: all) and/or explicit project files
    #[arg(value_name = "FAMILY|PROJECT")]
    pub targets: Vec<String>,

    /// Comma-separated regular expressions; only matching classnames run
    #[arg(short = 't', long, value_name = "PATTERNS")]
    pub wanted_tests: Option<String>,

    /// Print the selected test classnames and exit
    #[arg(short = 'L', long)]
    pub list_tests: bool,

    /// Main directory (default: ~/gst-validate)
    #[arg(short = 'M', long, value_name = "DIR")]
    pub main_dir: Option<PathBuf>,

    /// Directory for per-test logs and reports (default: <main-dir>/logs)
    #[arg(short = 'o', long, value_name = "DIR")]
    pub logs_dir: Option<PathBuf>,

    /// Directory for rendered files (default: <main-dir>/rendered)
    #[arg(short = 'd', long, value_name = "DIR")]
    pub dest: Option<PathBuf>,

    /// Directory searched for projects when none are given
    #[arg(short = 'P', long, value_name = "DIR")]
    pub projects_paths: Option<PathBuf>,

    /// Paths in which to look for moved media (repeatable)
    #[arg(short = 'p', long = "paths", value_name = "PATH")]
    pub paths: Vec<String>,

    /// Run the launcher muted
    #[arg(short = 'm', long)]
    pub mute: bool,

    /// Do not recurse into media paths
    #[arg(short = 'r', long = "disable-recurse-paths")]
    pub disable_recurse: bool,

    /// Per-test timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: f64,

    /// Directory of *.scenario files forming the scenario catalog
    #[arg(long, value_name = "DIR", conflicts_with = "scenarios_file")]
    pub scenarios_dir: Option<PathBuf>,

    /// JSON scenario catalog ([{"name": .., "description": ..}])
    #[arg(long, value_name = "PATH")]
    pub scenarios_file: Option<PathBuf>,

    /// Disable coloured console output
    #[arg(short = 'n', long)]
    pub no_color: bool,

    /// Launcher command (env: VALIDATE_GES_LAUNCH)
    #[arg(long, value_name = "CMD")]
    pub ges_launch: Option<String>,

    /// Media inspection command (env: VALIDATE_DISCOVERER)
    #[arg(long, value_name = "CMD")]
    pub discoverer: Option<String>,

    /// Validate tool used to list scenarios (env: VALIDATE_COMMAND)
    #[arg(long, value_name = "CMD")]
    pub validate_command: Option<String>,

    /// Emit debug diagnostics
    #[arg(short = 'v', long)]
    pub verbose: bool,
}
