//! Sequential scheduler: ordered queue, wanted-test filter, reporter lifecycle.
use crate::family::TestFamily;
use crate::interrupt::{is_interrupted, Interrupted};
use crate::reporter::{Reporter, RunSummary};
use crate::test_case::TestCase;
use anyhow::{Context, Result};
use regex::Regex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

pub struct TestRunner {
    tests: Vec<TestCase>,
    wanted: Vec<Regex>,
}

impl TestRunner {
    /// An empty pattern list runs everything.
    pub fn new(patterns: &[String]) -> Result<Self> {
        let wanted = patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).with_context(|| format!("invalid test pattern {pattern:?}"))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            tests: Vec::new(),
            wanted,
        })
    }

    /// Append a family's tests after everything registered so far.
    pub fn register(&mut self, family: &mut dyn TestFamily) {
        let tests = family.take_tests();
        tracing::debug!(family = family.name(), tests = tests.len(), "registered");
        self.tests.extend(tests);
    }

    pub fn add_test(&mut self, test: TestCase) {
        self.tests.push(test);
    }

    pub fn is_wanted(&self, classname: &str) -> bool {
        self.wanted.is_empty() || self.wanted.iter().any(|re| re.is_match(classname))
    }

    /// Tests that pass the filter, in queue order.
    pub fn selected(&self) -> impl Iterator<Item = &TestCase> {
        self.tests.iter().filter(|test| self.is_wanted(test.classname()))
    }

    pub fn tests(&self) -> &[TestCase] {
        &self.tests
    }

    /// Run every selected test in order, then finalise the report.
    ///
    /// An operator interrupt stops the queue; the report is still written for
    /// the tests that completed and the interrupt is returned.
    pub fn run_tests(
        &mut self,
        reporter: &mut dyn Reporter,
        cancel: &AtomicBool,
    ) -> Result<RunSummary> {
        let started = Instant::now();
        let selected: Vec<usize> = (0..self.tests.len())
            .filter(|&index| self.is_wanted(self.tests[index].classname()))
            .collect();
        let mut interrupted = None;
        for index in selected {
            let test = &mut self.tests[index];
            if cancel.load(Ordering::SeqCst) {
                interrupted = Some(anyhow::Error::new(Interrupted));
                break;
            }
            let sink = match reporter.before_test(test) {
                Ok(sink) => sink,
                Err(err) => {
                    tracing::warn!(
                        classname = test.classname(),
                        error = %format!("{err:#}"),
                        "cannot open test log"
                    );
                    test.record_error(&err);
                    reporter.after_test(test.record(None))?;
                    continue;
                }
            };
            match test.run(&sink, cancel) {
                Ok(()) => {}
                Err(err) if is_interrupted(&err) => {
                    interrupted = Some(err);
                    break;
                }
                Err(err) => {
                    tracing::warn!(
                        classname = test.classname(),
                        error = %format!("{err:#}"),
                        "test run failed"
                    );
                    test.record_error(&err);
                }
            }
            reporter.after_test(test.record(Some(&sink.path)))?;
        }

        reporter.final_report()?;
        let summary = RunSummary::from_records(reporter.results());
        tracing::info!(
            total = summary.total,
            passed = summary.passed,
            failed = summary.failed,
            timeout = summary.timeout,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "run finished"
        );
        match interrupted {
            Some(err) => Err(err),
            None => Ok(summary),
        }
    }
}
