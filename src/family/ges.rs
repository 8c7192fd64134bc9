//! Project discovery and the launcher arguments shared by GES families.
use crate::interrupt::is_interrupted;
use crate::media::{project_duration, DEFAULT_PROJECT_DURATION};
use crate::options::RunOptions;
use crate::supervise::run_captured;
use crate::util::{collect_files_recursive, path_to_uri, quote_uri, CommandLine};
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::time::Duration;

pub const PROJECT_EXTENSION: &str = "xges";
/// Option that only scenario-capable launcher builds advertise in `--help`.
const SCENARIO_CAPABILITY: &str = "--set-scenario=";

/// A discovered project file and its classname-safe basename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectInput {
    pub path: PathBuf,
    pub uri: String,
    pub basename: String,
}

/// Inputs for this run: explicit project paths when given, otherwise every
/// `*.xges` under the projects directory. Sorted, basenames made unique.
pub fn discover_projects(options: &RunOptions, explicit: &[String]) -> Result<Vec<ProjectInput>> {
    let mut paths = Vec::new();
    if explicit.is_empty() {
        let root = &options.projects_paths;
        if !root.is_dir() {
            tracing::info!(path = %root.display(), "projects directory not found; no inputs");
            return Ok(Vec::new());
        }
        for path in collect_files_recursive(root)? {
            if path.extension().and_then(|ext| ext.to_str()) == Some(PROJECT_EXTENSION) {
                paths.push(path);
            }
        }
    } else {
        for arg in explicit {
            let path = PathBuf::from(arg);
            if !path.is_file() {
                tracing::warn!(path = %path.display(), "project not found; skipping");
                continue;
            }
            let path = fs::canonicalize(&path)
                .with_context(|| format!("resolve {}", path.display()))?;
            paths.push(path);
        }
    }
    paths.sort();
    paths.dedup();
    Ok(make_inputs(paths))
}

fn make_inputs(paths: Vec<PathBuf>) -> Vec<ProjectInput> {
    let mut taken: HashSet<String> = HashSet::new();
    paths
        .into_iter()
        .map(|path| {
            let base = normalize_basename(&path);
            let mut basename = base.clone();
            let mut suffix = 2;
            while taken.contains(&basename) {
                basename = format!("{base}_{suffix}");
                suffix += 1;
            }
            taken.insert(basename.clone());
            ProjectInput {
                uri: path_to_uri(&path),
                path,
                basename,
            }
        })
        .collect()
}

/// File name without `.xges`, with dots and whitespace replaced by `_`.
pub fn normalize_basename(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name
        .strip_suffix(&format!(".{PROJECT_EXTENSION}"))
        .unwrap_or(&name);
    stem.chars()
        .map(|ch| if ch == '.' || ch.is_whitespace() { '_' } else { ch })
        .collect()
}

/// Per-project launcher arguments, resolved once at expansion time.
#[derive(Debug, Clone)]
pub struct GesProject {
    pub uri: String,
    pub duration: u64,
    pub mute: bool,
    pub sample_paths: Vec<String>,
    pub recurse: bool,
}

impl GesProject {
    pub fn load(input: &ProjectInput, options: &RunOptions) -> Self {
        let duration = match project_duration(&input.path) {
            Ok(Some(duration)) => duration,
            Ok(None) => {
                tracing::debug!(project = %input.path.display(), "no duration in project; using default");
                DEFAULT_PROJECT_DURATION
            }
            Err(err) => {
                tracing::warn!(
                    project = %input.path.display(),
                    error = %format!("{err:#}"),
                    "cannot read project duration; using default"
                );
                DEFAULT_PROJECT_DURATION
            }
        };
        let sample_paths = if !options.sample_paths.is_empty() {
            options.sample_paths.clone()
        } else if options.disable_recurse {
            Vec::new()
        } else {
            input
                .path
                .parent()
                .map(|dir| vec![dir.display().to_string()])
                .unwrap_or_default()
        };
        Self {
            uri: input.uri.clone(),
            duration,
            mute: options.mute,
            sample_paths,
            recurse: !options.disable_recurse,
        }
    }

    /// `[--mute] <sample paths> -l <project-uri>`
    pub fn build_arguments(&self, args: &mut Vec<String>) {
        if self.mute {
            args.push("--mute".to_string());
        }
        let flag = if self.recurse {
            "--sample-path-recurse"
        } else {
            "--sample-path"
        };
        for path in &self.sample_paths {
            args.push(flag.to_string());
            args.push(quote_uri(path));
        }
        args.push("-l".to_string());
        args.push(self.uri.clone());
    }
}

/// Check that the launcher exists and supports scripted scenarios.
///
/// Only an interrupt is an error; a launcher that fails, hangs or lacks
/// scenario support makes the family unusable.
pub fn check_launcher(launcher: &CommandLine, timeout: Duration, cancel: &AtomicBool) -> Result<bool> {
    if let Err(err) = launcher.locate() {
        tracing::warn!(error = %format!("{err:#}"), "launcher not found");
        return Ok(false);
    }
    let mut cmd = launcher.command();
    cmd.arg("--help");
    let output = match run_captured(&mut cmd, timeout, cancel) {
        Ok(output) => output,
        Err(err) if is_interrupted(&err) => return Err(err),
        Err(err) => {
            tracing::warn!(program = %launcher.program, error = %format!("{err:#}"), "cannot run launcher");
            return Ok(false);
        }
    };
    if output.timed_out {
        tracing::warn!(program = %launcher.program, "launcher --help did not finish");
        return Ok(false);
    }
    if !output.success() {
        tracing::warn!(program = %launcher.program, exit_code = ?output.exit_code, "launcher --help failed");
        return Ok(false);
    }
    if !output.text.contains(SCENARIO_CAPABILITY) {
        tracing::warn!(
            program = %launcher.program,
            "launcher was built without scenario support"
        );
        return Ok(false);
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(root: &Path) -> RunOptions {
        RunOptions::with_main_dir(root).expect("options")
    }

    #[test]
    fn basenames_are_normalised_and_unique() {
        let inputs = make_inputs(vec![
            PathBuf::from("/a/my project.v2.xges"),
            PathBuf::from("/b/my project.v2.xges"),
            PathBuf::from("/c/other.xges"),
        ]);
        let names: Vec<_> = inputs.iter().map(|input| input.basename.as_str()).collect();
        assert_eq!(names, vec!["my_project_v2", "my_project_v2_2", "other"]);
        assert_eq!(inputs[2].uri, "file:///c/other.xges");
    }

    #[test]
    fn suffixed_names_never_collide() {
        let inputs = make_inputs(vec![
            PathBuf::from("/x/a.xges"),
            PathBuf::from("/x/a_2.xges"),
            PathBuf::from("/y/a.xges"),
        ]);
        let names: Vec<_> = inputs.iter().map(|input| input.basename.as_str()).collect();
        assert_eq!(names, vec!["a", "a_2", "a_3"]);
        let unique: HashSet<_> = names.iter().collect();
        assert_eq!(unique.len(), names.len());
    }

    #[test]
    fn missing_projects_dir_yields_no_inputs() {
        let temp = tempfile::tempdir().expect("tempdir");
        let inputs = discover_projects(&options(temp.path()), &[]).expect("discover");
        assert!(inputs.is_empty());
    }

    #[test]
    fn projects_dir_is_walked_for_xges_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        let options = options(temp.path());
        let nested = options.projects_paths.join("nested");
        fs::create_dir_all(&nested).expect("mkdir");
        fs::write(options.projects_paths.join("b.xges"), "<ges/>").expect("write");
        fs::write(nested.join("a.xges"), "<ges/>").expect("write");
        fs::write(nested.join("notes.txt"), "ignore").expect("write");
        let inputs = discover_projects(&options, &[]).expect("discover");
        let names: Vec<_> = inputs.iter().map(|input| input.basename.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn explicit_missing_project_is_skipped() {
        let temp = tempfile::tempdir().expect("tempdir");
        let project = temp.path().join("real.xges");
        fs::write(&project, "<ges/>").expect("write");
        let explicit = vec![
            project.display().to_string(),
            temp.path().join("gone.xges").display().to_string(),
        ];
        let inputs = discover_projects(&options(temp.path()), &explicit).expect("discover");
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].basename, "real");
    }

    #[test]
    fn arguments_include_mute_sample_paths_and_project() {
        let temp = tempfile::tempdir().expect("tempdir");
        let project = temp.path().join("sample.xges");
        fs::write(
            &project,
            "<ges><timeline metadatas='metadatas, duration=(guint64)30000000000;'/></ges>",
        )
        .expect("write");
        let input = make_inputs(vec![project]).remove(0);
        let mut options = options(temp.path());
        options.mute = true;
        options.sample_paths = vec!["/media/my clips".to_string()];
        let ges = GesProject::load(&input, &options);
        assert_eq!(ges.duration, 30_000_000_000);
        let mut args = Vec::new();
        ges.build_arguments(&mut args);
        assert_eq!(
            args,
            vec![
                "--mute".to_string(),
                "--sample-path-recurse".to_string(),
                "file:///media/my%20clips".to_string(),
                "-l".to_string(),
                input.uri.clone(),
            ]
        );
    }

    #[test]
    fn disabled_recursion_without_paths_passes_none() {
        let temp = tempfile::tempdir().expect("tempdir");
        let project = temp.path().join("plain.xges");
        fs::write(&project, "<ges/>").expect("write");
        let input = make_inputs(vec![project]).remove(0);
        let mut options = options(temp.path());
        options.disable_recurse = true;
        let ges = GesProject::load(&input, &options);
        assert_eq!(ges.duration, DEFAULT_PROJECT_DURATION);
        let mut args = Vec::new();
        ges.build_arguments(&mut args);
        assert_eq!(args, vec!["-l".to_string(), input.uri.clone()]);
    }

    #[cfg(unix)]
    #[test]
    fn launcher_check_requires_scenario_support() {
        let temp = tempfile::tempdir().expect("tempdir");
        let capable = temp.path().join("capable.sh");
        fs::write(&capable, "echo '  --set-scenario=NAME'\n").expect("write");
        let plain = temp.path().join("plain.sh");
        fs::write(&plain, "echo 'usage: ges-launch'\n").expect("write");
        let sh = |path: &Path| CommandLine {
            program: "sh".to_string(),
            args: vec![path.display().to_string()],
        };
        let cancel = AtomicBool::new(false);
        let timeout = Duration::from_secs(5);
        assert!(check_launcher(&sh(&capable), timeout, &cancel).expect("check"));
        assert!(!check_launcher(&sh(&plain), timeout, &cancel).expect("check"));
        let missing = CommandLine::parse("/nonexistent/ges-launch-1.0").expect("cmd");
        assert!(!check_launcher(&missing, timeout, &cancel).expect("check"));
    }

    #[cfg(unix)]
    #[test]
    fn hanging_launcher_help_is_unusable() {
        let temp = tempfile::tempdir().expect("tempdir");
        let script = temp.path().join("hang.sh");
        fs::write(&script, "sleep 4\necho '  --set-scenario=NAME'\n").expect("write");
        let launcher = CommandLine {
            program: "sh".to_string(),
            args: vec![script.display().to_string()],
        };
        let cancel = AtomicBool::new(false);
        let started = std::time::Instant::now();
        let usable = check_launcher(&launcher, Duration::from_millis(200), &cancel).expect("check");
        assert!(!usable);
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[cfg(unix)]
    #[test]
    fn interrupted_launcher_check_is_an_error() {
        let launcher = CommandLine::parse("sh -c 'sleep 4'").expect("cmd");
        let cancel = AtomicBool::new(true);
        let err = check_launcher(&launcher, Duration::from_secs(5), &cancel).expect_err("interrupted");
        assert!(is_interrupted(&err));
    }
}
