//! Outcome kinds and the shared result classifier.
//!
//! Every test kind runs the same base classification on a finished child
//! before applying its own overrides, so the exit-code policy lives here once.
use serde::Serialize;
use std::fmt;

/// Exit code reported for a child killed by SIGSEGV (shell convention `128 + signal`).
pub const SEGFAULT_EXIT_CODE: i32 = 128 + libc::SIGSEGV;

/// Marker emitted by the tool under test in front of critical issues.
pub const CRITICAL_MARKER: &str = "critical : ";

pub const TAG_SEGFAULT: &str = "segfault";
pub const TAG_ERROR: &str = "error";
pub const TAG_TIMEOUT: &str = "timeout";
pub const TAG_WRONG_DURATION: &str = "wrong-duration";
pub const TAG_MISSING_EOS: &str = "missing-eos";

/// Closed set of outcome kinds a test can end in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    NotRun,
    Passed,
    Failed,
    Timeout,
    KnownError,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::NotRun => "Not run",
            Outcome::Passed => "Passed",
            Outcome::Failed => "Failed",
            Outcome::Timeout => "Timeout",
            Outcome::KnownError => "Known error",
        }
    }

    /// True for outcomes that should carry a reproduction command.
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed | Outcome::Timeout)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome kind plus the human message and triage tag attached to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub outcome: Outcome,
    pub message: String,
    pub error: String,
}

impl Verdict {
    pub fn new(outcome: Outcome, message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            outcome,
            message: message.into(),
            error: error.into(),
        }
    }

    pub fn not_run() -> Self {
        Self::new(Outcome::NotRun, "", "")
    }

    pub fn passed() -> Self {
        Self::new(Outcome::Passed, "", "")
    }

    pub fn timeout() -> Self {
        Self::new(Outcome::Timeout, "Application timed out", TAG_TIMEOUT)
    }
}

/// Classify a finished child from its exit code, the supervision timeout
/// flag and the captured log text.
///
/// Returns the verdict and whether a backtrace should be captured.
pub fn classify(exit_code: Option<i32>, timed_out: bool, log: &str) -> (Verdict, bool) {
    if timed_out {
        return (Verdict::timeout(), false);
    }
    match exit_code {
        Some(0) => (Verdict::passed(), false),
        Some(SEGFAULT_EXIT_CODE) => (
            Verdict::new(Outcome::Failed, "Application segfaulted", TAG_SEGFAULT),
            true,
        ),
        Some(code) => (
            Verdict::new(
                Outcome::Failed,
                format!(
                    "Application returned {code} (issues: {})",
                    critical_errors(log)
                ),
                TAG_ERROR,
            ),
            false,
        ),
        None => (
            Verdict::new(
                Outcome::Failed,
                format!(
                    "Application terminated without exit code (issues: {})",
                    critical_errors(log)
                ),
                TAG_ERROR,
            ),
            false,
        ),
    }
}

/// Collect distinct critical messages from a log, in first-seen order.
pub fn critical_messages(log: &str) -> Vec<String> {
    let mut errors: Vec<String> = Vec::new();
    for line in log.lines() {
        let Some((_, message)) = line.split_once(CRITICAL_MARKER) else {
            continue;
        };
        let message = message.trim_end_matches('\r').to_string();
        if !errors.contains(&message) {
            errors.push(message);
        }
    }
    errors
}

/// Render the critical messages as `[a, b]`, or `No critical` when there are none.
pub fn critical_errors(log: &str) -> String {
    let errors = critical_messages(log);
    if errors.is_empty() {
        "No critical".to_string()
    } else {
        format!("[{}]", errors.join(", "))
    }
}
