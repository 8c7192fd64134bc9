//! Media timing helpers: project durations, discoverer output and the
//! rendered-duration check.
use crate::outcome::{Outcome, Verdict, TAG_WRONG_DURATION};
use crate::supervise::run_captured;
use crate::util::CommandLine;
use anyhow::{anyhow, Context, Result};
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::OnceLock;
use std::time::Duration;

pub const GST_SECOND: u64 = 1_000_000_000;
/// Accepted difference between a rendered file and its source project.
pub const DURATION_TOLERANCE: u64 = GST_SECOND / 2;
/// Substituted when a project does not declare its duration.
pub const DEFAULT_PROJECT_DURATION: u64 = 2 * 60 * GST_SECOND;

fn gst_time_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d+):(\d{1,2}):(\d{1,2})\.(\d+)").expect("static gst time regex")
    })
}

fn timeline_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"<timeline\b[^>]*?\bmetadatas\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
            .expect("static timeline regex")
    })
}

fn metadata_duration_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"duration=\(guint64\)(\d+)").expect("static duration regex")
    })
}

/// Parse `H:MM:SS.fraction` into nanoseconds. The fraction is scaled to nine digits.
pub fn parse_gst_time(text: &str) -> Option<u64> {
    let caps = gst_time_regex().captures(text)?;
    let hours: u64 = caps[1].parse().ok()?;
    let minutes: u64 = caps[2].parse().ok()?;
    let seconds: u64 = caps[3].parse().ok()?;
    let fraction = &caps[4];
    let mut digits: String = fraction.chars().take(9).collect();
    while digits.len() < 9 {
        digits.push('0');
    }
    let nanos: u64 = digits.parse().ok()?;
    hours
        .checked_mul(3600)?
        .checked_add(minutes * 60 + seconds)?
        .checked_mul(GST_SECOND)?
        .checked_add(nanos)
}

pub fn format_gst_time(nanos: u64) -> String {
    let secs = nanos / GST_SECOND;
    format!(
        "{}:{:02}:{:02}.{:09}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60,
        nanos % GST_SECOND
    )
}

/// Read the duration declared on the `timeline` element of a project file.
pub fn project_duration_from_text(text: &str) -> Option<u64> {
    let caps = timeline_regex().captures(text)?;
    let metadatas = caps.get(1).or_else(|| caps.get(2))?.as_str();
    let duration = metadata_duration_regex().captures(metadatas)?;
    duration[1].parse().ok()
}

/// Project duration in nanoseconds, or `None` when the project does not declare one.
pub fn project_duration(path: &Path) -> Result<Option<u64>> {
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    Ok(project_duration_from_text(&text))
}

/// Extract the first `Duration: ` value from discoverer output; 0 when absent.
pub fn duration_from_discoverer_output(output: &str) -> u64 {
    output
        .lines()
        .find_map(|line| {
            let (_, rest) = line.split_once("Duration: ")?;
            parse_gst_time(rest)
        })
        .unwrap_or(0)
}

/// Ask the media-inspection tool for the duration of `uri`.
///
/// A non-zero exit is tolerated (the discoverer fails on non-seekable media).
/// Failing to launch, hanging past `timeout` or an interrupt is an error.
pub fn media_duration(
    discoverer: &CommandLine,
    uri: &str,
    timeout: Duration,
    cancel: &AtomicBool,
) -> Result<u64> {
    let mut cmd = discoverer.command();
    cmd.arg(uri);
    let output = run_captured(&mut cmd, timeout, cancel)
        .with_context(|| format!("run {} on {uri}", discoverer.program))?;
    if output.timed_out {
        return Err(anyhow!(
            "{} did not answer within {:.1}s",
            discoverer.program,
            timeout.as_secs_f64()
        ));
    }
    if !output.success() {
        tracing::debug!(uri, exit_code = ?output.exit_code, "discoverer returned non-zero");
    }
    Ok(duration_from_discoverer_output(&output.text))
}

pub fn within_tolerance(expected: u64, measured: u64, tolerance: u64) -> bool {
    expected.abs_diff(measured) <= tolerance
}

/// Compare a rendered duration with the source duration.
pub fn compare_rendered_with_original(expected: u64, measured: u64, tolerance: u64) -> Verdict {
    if within_tolerance(expected, measured, tolerance) {
        Verdict::passed()
    } else {
        Verdict::new(
            Outcome::Failed,
            format!(
                "Duration of encoded file is wrong ({} instead of {})",
                format_gst_time(measured),
                format_gst_time(expected)
            ),
            TAG_WRONG_DURATION,
        )
    }
}
