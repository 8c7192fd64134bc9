//! A single schedulable test: builds its command, runs it under supervision
//! and classifies the result.
//!
//! Family-specific behaviour plugs in through [`TestKind`]: extra arguments,
//! result overrides applied after the shared classification, and a progress
//! value.
use crate::interrupt::is_interrupted;
use crate::outcome::{classify, Outcome, Verdict, TAG_ERROR};
use crate::reporter::{LogSink, TestRecord};
use crate::scenario::Scenario;
use crate::supervise::{spawn_logged, supervise, terminate, Supervisor};
use crate::util::CommandLine;
use anyhow::{anyhow, Result};
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

/// What `check_results` gets to look at besides the base verdict.
pub struct ResultContext<'a> {
    pub scenario: Option<&'a Scenario>,
    /// Bound for helper tools run while checking.
    pub timeout: Duration,
    pub cancel: &'a AtomicBool,
}

/// Family-specific part of a test case.
pub trait TestKind: fmt::Debug {
    /// Append this kind's arguments after the shared ones.
    fn build_arguments(&self, args: &mut Vec<String>) -> Result<()>;

    /// Adjust the shared classification. The default keeps it.
    fn check_results(&self, _context: &ResultContext<'_>, base: Verdict) -> Verdict {
        base
    }

    /// Progress value sampled while the child runs.
    fn current_value(&self, _log_path: &Path) -> Option<u64> {
        None
    }
}

#[derive(Debug)]
pub struct TestCase {
    classname: String,
    application: CommandLine,
    timeout: Duration,
    scenario: Option<Scenario>,
    kind: Box<dyn TestKind>,
    arguments: Vec<String>,
    command: String,
    verdict: Verdict,
    elapsed: Duration,
}

impl TestCase {
    pub fn new(
        classname: String,
        application: CommandLine,
        timeout: Duration,
        scenario: Option<Scenario>,
        kind: Box<dyn TestKind>,
    ) -> Self {
        let command = application.display_with(&[]);
        Self {
            classname,
            application,
            timeout,
            scenario,
            kind,
            arguments: Vec::new(),
            command,
            verdict: Verdict::not_run(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn classname(&self) -> &str {
        &self.classname
    }

    pub fn outcome(&self) -> Outcome {
        self.verdict.outcome
    }

    pub fn verdict(&self) -> &Verdict {
        &self.verdict
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    /// Shell-quoted command line of the last build, for reproduction.
    pub fn command_line(&self) -> &str {
        &self.command
    }

    /// Rebuild the argument list from scratch. Calling it twice yields the same list.
    pub fn build_arguments(&mut self) -> Result<()> {
        let mut args = Vec::new();
        if let Some(scenario) = &self.scenario {
            args.push("--set-scenario".to_string());
            args.push(scenario.name.clone());
        }
        self.kind.build_arguments(&mut args)?;
        self.command = self.application.display_with(&args);
        self.arguments = args;
        Ok(())
    }

    /// Run the test once, writing child output to `sink`.
    ///
    /// Only an operator interrupt is returned as an error; every other failure
    /// becomes this test's outcome.
    pub fn run(&mut self, sink: &LogSink, cancel: &AtomicBool) -> Result<()> {
        if self.verdict.outcome != Outcome::NotRun {
            return Err(anyhow!("{} has already run", self.classname));
        }
        let start = Instant::now();
        if let Err(err) = self.build_arguments() {
            self.finish(
                start,
                Verdict::new(
                    Outcome::Failed,
                    format!("Could not build arguments: {err:#}"),
                    TAG_ERROR,
                ),
            );
            return Ok(());
        }
        tracing::debug!(classname = %self.classname, command = %self.command, "launching");

        let mut cmd = self.application.command();
        cmd.args(&self.arguments);
        let mut child = match spawn_logged(&mut cmd, &sink.file) {
            Ok(child) => child,
            Err(err) => {
                tracing::warn!(classname = %self.classname, error = %format!("{err:#}"), "launch failed");
                self.finish(
                    start,
                    Verdict::new(
                        Outcome::Failed,
                        format!("Could not launch {}: {err:#}", self.application.program),
                        TAG_ERROR,
                    ),
                );
                return Ok(());
            }
        };

        let limits = Supervisor::new(self.timeout, cancel);
        let kind = self.kind.as_ref();
        let classname = self.classname.as_str();
        let mut progress = || {
            if let Some(value) = kind.current_value(&sink.path) {
                tracing::debug!(classname, value, "progress");
            }
        };
        let observation = match supervise(&mut child, start, &limits, &mut progress) {
            Ok(observation) => observation,
            Err(err) if is_interrupted(&err) => {
                terminate(&mut child);
                return Err(err);
            }
            Err(err) => {
                terminate(&mut child);
                self.finish(
                    start,
                    Verdict::new(
                        Outcome::Failed,
                        format!("Supervision failed: {err:#}"),
                        TAG_ERROR,
                    ),
                );
                return Ok(());
            }
        };

        let log = sink.read_text().unwrap_or_else(|err| {
            tracing::warn!(classname = %self.classname, error = %format!("{err:#}"), "cannot read test log");
            String::new()
        });
        let (base, wants_backtrace) = classify(observation.exit_code, observation.timed_out, &log);
        tracing::debug!(
            classname = %self.classname,
            exit_code = ?observation.exit_code,
            timed_out = observation.timed_out,
            "child finished"
        );
        if wants_backtrace {
            capture_backtrace(observation.pid, &sink.path);
        }
        let context = ResultContext {
            scenario: self.scenario.as_ref(),
            timeout: self.timeout,
            cancel,
        };
        let verdict = self.kind.check_results(&context, base);
        terminate(&mut child);
        self.finish(start, verdict);
        Ok(())
    }

    /// Record a failure that happened outside `run` (e.g. no log sink).
    pub fn record_error(&mut self, err: &anyhow::Error) {
        if self.verdict.outcome == Outcome::NotRun {
            self.verdict = Verdict::new(Outcome::Failed, format!("{err:#}"), TAG_ERROR);
        }
    }

    fn finish(&mut self, start: Instant, verdict: Verdict) {
        self.verdict = verdict;
        self.elapsed = start.elapsed();
        tracing::info!(
            classname = %self.classname,
            outcome = %self.verdict.outcome,
            elapsed_ms = self.elapsed.as_millis() as u64,
            "test finished"
        );
    }

    /// Report record for the finished test.
    pub fn record(&self, log_path: Option<&Path>) -> TestRecord {
        TestRecord {
            classname: self.classname.clone(),
            outcome: self.verdict.outcome,
            message: self.verdict.message.clone(),
            error: self.verdict.error.clone(),
            elapsed_secs: self.elapsed.as_secs_f64(),
            command: self
                .verdict
                .outcome
                .is_failure()
                .then(|| self.command.clone()),
            log_path: log_path.map(|path| path.display().to_string()),
        }
    }
}

impl fmt::Display for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.classname)?;
        if self.verdict.outcome != Outcome::NotRun {
            write!(f, ": {}", self.verdict.outcome)?;
            if self.verdict.outcome.is_failure() {
                write!(
                    f,
                    " '{}'\n       You can reproduce with: {}",
                    self.verdict.message, self.command
                )?;
            }
        }
        Ok(())
    }
}

/// Best-effort crash diagnostics appended to the test log. Never fails the run.
fn capture_backtrace(pid: u32, log_path: &Path) {
    if let Err(err) = try_capture_backtrace(pid, log_path) {
        tracing::debug!(pid, error = %format!("{err:#}"), "backtrace capture skipped");
    }
}

fn try_capture_backtrace(pid: u32, log_path: &Path) -> Result<()> {
    let coredumpctl = which::which("coredumpctl")?;
    let output = Command::new(coredumpctl)
        .arg("info")
        .arg(pid.to_string())
        .stdin(Stdio::null())
        .output()?;
    let mut log = OpenOptions::new().append(true).open(log_path)?;
    writeln!(log, "\n=== SEGFAULT backtrace (pid {pid}) ===")?;
    log.write_all(&output.stdout)?;
    log.write_all(&output.stderr)?;
    tracing::info!(pid, "backtrace appended to test log");
    Ok(())
}
