//! Test reporting: per-test log sinks, result records and the final report.
//!
//! The reporter is the only resource shared across test cases. It opens one
//! log sink per test and records exactly one [`TestRecord`] per executed test;
//! nothing else writes to it while a test runs.
use crate::outcome::Outcome;
use crate::test_case::TestCase;
use crate::util::mkdir;
use anyhow::{Context, Result};
use quick_junit::{NonSuccessKind, Report, TestCase as JunitCase, TestCaseStatus, TestSuite};
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const REPORT_SCHEMA_VERSION: u32 = 1;
pub const XUNIT_FILE_NAME: &str = "xunit.xml";
pub const JSON_REPORT_FILE_NAME: &str = "report.json";
const SUITE_NAME: &str = "validate-launcher";

/// Where a single test's child output goes.
#[derive(Debug)]
pub struct LogSink {
    pub path: PathBuf,
    pub file: File,
}

impl LogSink {
    /// Create (truncating) a log file at `path`.
    pub fn create(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            mkdir(parent)?;
        }
        let file = File::create(&path).with_context(|| format!("create {}", path.display()))?;
        Ok(Self { path, file })
    }

    pub fn read_text(&self) -> Result<String> {
        let bytes = fs::read(&self.path).with_context(|| format!("read {}", self.path.display()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Final, immutable result of one executed test.
#[derive(Debug, Clone, Serialize)]
pub struct TestRecord {
    pub classname: String,
    pub outcome: Outcome,
    pub message: String,
    pub error: String,
    pub elapsed_secs: f64,
    /// Reproduction command, present for failures and timeouts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_path: Option<String>,
}

/// Counts per outcome kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub timeout: usize,
    pub known_error: usize,
    pub not_run: usize,
}

impl RunSummary {
    pub fn from_records(records: &[TestRecord]) -> Self {
        let mut summary = Self {
            total: records.len(),
            ..Default::default()
        };
        for record in records {
            match record.outcome {
                Outcome::Passed => summary.passed += 1,
                Outcome::Failed => summary.failed += 1,
                Outcome::Timeout => summary.timeout += 1,
                Outcome::KnownError => summary.known_error += 1,
                Outcome::NotRun => summary.not_run += 1,
            }
        }
        summary
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0 && self.timeout == 0
    }
}

/// Test-begin / test-end event consumer.
pub trait Reporter {
    /// Open a fresh log sink for `test`.
    fn before_test(&mut self, test: &TestCase) -> Result<LogSink>;
    /// Record the final status of the test that was just run.
    fn after_test(&mut self, record: TestRecord) -> Result<()>;
    /// Emit the aggregate report.
    fn final_report(&mut self) -> Result<()>;
    fn results(&self) -> &[TestRecord];
}

const HEADER: &str = "\x1b[95m";
const OKBLUE: &str = "\x1b[94m";
const OKGREEN: &str = "\x1b[92m";
const WARNING: &str = "\x1b[93m";
const FAIL: &str = "\x1b[91m";
const ENDC: &str = "\x1b[0m";

/// Console output; colour is an explicit setting.
#[derive(Debug, Clone, Copy)]
pub struct Printer {
    pub color: bool,
}

impl Printer {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.color {
            format!("{color}{text}{ENDC}")
        } else {
            text.to_string()
        }
    }

    pub fn title(&self, text: &str) {
        let width = text.lines().map(str::len).max().unwrap_or(0).max(1);
        let rule = "=".repeat(width);
        println!("{}", self.paint(HEADER, &format!("{rule}\n{text}\n{rule}")));
    }

    pub fn launching(&self, classname: &str, log_path: &Path) {
        println!(
            "{} '{classname}' -- logs are in {}",
            self.paint(OKBLUE, "Launching:"),
            log_path.display()
        );
    }

    pub fn result(&self, record: &TestRecord) {
        let color = match record.outcome {
            Outcome::Failed => FAIL,
            Outcome::Timeout => WARNING,
            Outcome::Passed => OKGREEN,
            _ => OKBLUE,
        };
        let mut line = format!("{}: {}", record.classname, record.outcome);
        if record.outcome.is_failure() {
            line.push_str(&format!(" '{}'", record.message));
            if let Some(command) = &record.command {
                line.push_str(&format!("\n       You can reproduce with: {command}"));
            }
        }
        println!("{}", self.paint(color, &line));
    }

    pub fn summary(&self, summary: &RunSummary) {
        self.title(&format!(
            "Total: {} | Passed: {} | Failed: {} | Timeout: {} | Known error: {}",
            summary.total, summary.passed, summary.failed, summary.timeout, summary.known_error
        ));
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    schema_version: u32,
    generated_at_epoch_ms: u128,
    summary: RunSummary,
    tests: &'a [TestRecord],
}

/// Writes per-test logs under `logs_dir`, plus `xunit.xml` and `report.json`.
pub struct XunitReporter {
    logs_dir: PathBuf,
    printer: Printer,
    results: Vec<TestRecord>,
}

impl XunitReporter {
    pub fn new(logs_dir: PathBuf, printer: Printer) -> Result<Self> {
        mkdir(&logs_dir)?;
        Ok(Self {
            logs_dir,
            printer,
            results: Vec::new(),
        })
    }

    pub fn log_path_for(&self, classname: &str) -> PathBuf {
        self.logs_dir.join(format!("{classname}.log"))
    }

    pub fn xunit_path(&self) -> PathBuf {
        self.logs_dir.join(XUNIT_FILE_NAME)
    }

    pub fn json_path(&self) -> PathBuf {
        self.logs_dir.join(JSON_REPORT_FILE_NAME)
    }

    fn write_json_report(&self, summary: RunSummary) -> Result<()> {
        let report = JsonReport {
            schema_version: REPORT_SCHEMA_VERSION,
            generated_at_epoch_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .context("system clock before epoch")?
                .as_millis(),
            summary,
            tests: &self.results,
        };
        let path = self.json_path();
        let bytes = serde_json::to_vec_pretty(&report).context("serialize report")?;
        fs::write(&path, bytes).with_context(|| format!("write {}", path.display()))
    }

    fn write_xunit_report(&self) -> Result<()> {
        let path = self.xunit_path();
        let mut out = File::create(&path).with_context(|| format!("create {}", path.display()))?;
        out.write_all(render_xunit(&self.results)?.as_bytes())
            .with_context(|| format!("write {}", path.display()))
    }
}

impl Reporter for XunitReporter {
    fn before_test(&mut self, test: &TestCase) -> Result<LogSink> {
        let sink = LogSink::create(self.log_path_for(test.classname()))?;
        self.printer.launching(test.classname(), &sink.path);
        Ok(sink)
    }

    fn after_test(&mut self, record: TestRecord) -> Result<()> {
        self.printer.result(&record);
        self.results.push(record);
        Ok(())
    }

    fn final_report(&mut self) -> Result<()> {
        let summary = RunSummary::from_records(&self.results);
        self.write_xunit_report()?;
        self.write_json_report(summary)?;
        self.printer.summary(&summary);
        tracing::info!(
            xunit = %self.xunit_path().display(),
            json = %self.json_path().display(),
            "report written"
        );
        Ok(())
    }

    fn results(&self) -> &[TestRecord] {
        &self.results
    }
}

/// Render records as a JUnit-style document.
///
/// Failures and timeouts are `<failure>`s carrying the command line; known
/// errors and tests that never ran are `<skipped>`.
pub fn render_xunit(records: &[TestRecord]) -> Result<String> {
    let mut suite = TestSuite::new(SUITE_NAME);
    let mut total = Duration::ZERO;
    for record in records {
        let (class, name) = match record.classname.rsplit_once('.') {
            Some((class, name)) => (class, name),
            None => ("", record.classname.as_str()),
        };
        let status = match record.outcome {
            Outcome::Passed => TestCaseStatus::success(),
            Outcome::Failed | Outcome::Timeout => {
                let mut status = TestCaseStatus::non_success(NonSuccessKind::Failure);
                status.set_type(record.error.as_str());
                status.set_message(record.message.as_str());
                if let Some(command) = &record.command {
                    status.set_description(command.as_str());
                }
                status
            }
            Outcome::KnownError | Outcome::NotRun => {
                let mut status = TestCaseStatus::skipped();
                status.set_message(format!("{}: {}", record.outcome, record.message));
                status
            }
        };
        let elapsed = Duration::try_from_secs_f64(record.elapsed_secs).unwrap_or_default();
        total += elapsed;
        let mut case = JunitCase::new(name, status);
        case.set_classname(class);
        case.set_time(elapsed);
        suite.add_test_case(case);
    }
    suite.set_time(total);
    let mut report = Report::new(SUITE_NAME);
    report.set_time(total);
    report.add_test_suite(suite);
    report.to_string().context("serialize xunit report")
}
