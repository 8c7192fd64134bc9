//! Child process supervision: spawn into a log sink, poll, time out, terminate.
use crate::interrupt::Interrupted;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Liveness check granularity.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);
/// How long a timed-out child gets to honour SIGTERM before it is killed.
pub const TERMINATE_GRACE: Duration = Duration::from_secs(5);
/// How often progress values are sampled while a child runs.
pub const PROGRESS_INTERVAL: Duration = Duration::from_secs(5);
/// Grace period for helper commands (discoverer, capability checks).
pub const HELPER_GRACE: Duration = Duration::from_secs(1);

/// Supervision limits for one child.
pub struct Supervisor<'a> {
    pub timeout: Duration,
    pub cancel: &'a AtomicBool,
    pub poll_interval: Duration,
    pub grace: Duration,
    pub progress_interval: Duration,
}

impl<'a> Supervisor<'a> {
    pub fn new(timeout: Duration, cancel: &'a AtomicBool) -> Self {
        Self {
            timeout,
            cancel,
            poll_interval: POLL_INTERVAL,
            grace: TERMINATE_GRACE,
            progress_interval: PROGRESS_INTERVAL,
        }
    }
}

/// What supervision observed about a finished child.
#[derive(Debug, Clone, Copy)]
pub struct Observation {
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub pid: u32,
}

/// Spawn `cmd` with stdout and stderr appended to `log`.
pub fn spawn_logged(cmd: &mut Command, log: &File) -> Result<Child> {
    let stdout = log.try_clone().context("clone log handle for stdout")?;
    let stderr = log.try_clone().context("clone log handle for stderr")?;
    cmd.stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr));
    cmd.spawn().context("spawn child")
}

/// Poll `child` until it exits.
///
/// Crossing the timeout marks the run as timed out and asks the child to
/// terminate; it is killed if still alive after the grace period. A raised
/// cancel flag kills the child and returns [`Interrupted`].
pub fn supervise(
    child: &mut Child,
    start: Instant,
    limits: &Supervisor<'_>,
    progress: &mut dyn FnMut(),
) -> Result<Observation> {
    let pid = child.id();
    let mut timed_out = false;
    let mut terminate_sent: Option<Instant> = None;
    let mut killed = false;
    let mut last_progress = Instant::now();

    let status = loop {
        if let Some(status) = child.try_wait().context("check child status")? {
            break status;
        }
        if limits.cancel.load(Ordering::SeqCst) {
            tracing::warn!(pid, "interrupt received; killing child");
            let _ = child.kill();
            let _ = child.wait();
            return Err(Interrupted.into());
        }
        if start.elapsed() > limits.timeout {
            match terminate_sent {
                None => {
                    timed_out = true;
                    tracing::warn!(
                        pid,
                        timeout_ms = limits.timeout.as_millis() as u64,
                        "child timed out; asking it to terminate"
                    );
                    request_terminate(child);
                    terminate_sent = Some(Instant::now());
                }
                Some(sent) if !killed && sent.elapsed() > limits.grace => {
                    tracing::warn!(pid, "child ignored termination request; killing");
                    let _ = child.kill();
                    killed = true;
                }
                Some(_) => {}
            }
        }
        if last_progress.elapsed() >= limits.progress_interval {
            progress();
            last_progress = Instant::now();
        }
        std::thread::sleep(limits.poll_interval);
    };

    Ok(Observation {
        exit_code: exit_code_of(&status),
        timed_out,
        pid,
    })
}

/// Output of a short-lived helper command, stdout and stderr merged.
#[derive(Debug, Clone)]
pub struct CapturedOutput {
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub text: String,
}

impl CapturedOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Run a helper command to completion under the same timeout and cancel
/// rules as a test child. Output goes through an unnamed temp file, so a
/// grandchild holding the handle open cannot block the caller.
pub fn run_captured(
    cmd: &mut Command,
    timeout: Duration,
    cancel: &AtomicBool,
) -> Result<CapturedOutput> {
    let mut capture = tempfile::tempfile().context("create capture file")?;
    let mut child = spawn_logged(cmd, &capture)?;
    let limits = Supervisor {
        grace: HELPER_GRACE,
        ..Supervisor::new(timeout, cancel)
    };
    let observation = supervise(&mut child, Instant::now(), &limits, &mut || {})?;
    terminate(&mut child);
    capture
        .seek(SeekFrom::Start(0))
        .context("rewind capture file")?;
    let mut bytes = Vec::new();
    capture
        .read_to_end(&mut bytes)
        .context("read captured output")?;
    Ok(CapturedOutput {
        exit_code: observation.exit_code,
        timed_out: observation.timed_out,
        text: String::from_utf8_lossy(&bytes).into_owned(),
    })
}

/// Ask the child to stop. On Unix this is SIGTERM; elsewhere a kill.
pub fn request_terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        // SAFETY: kill(2) takes no pointers; the pid is our child, not yet reaped.
        let rc = unsafe { libc::kill(child.id() as libc::pid_t, libc::SIGTERM) };
        if rc != 0 {
            tracing::debug!(pid = child.id(), "SIGTERM not delivered (already exited?)");
        }
    }
    #[cfg(not(unix))]
    {
        let _ = child.kill();
    }
}

/// Force termination; a child that already exited is not an error.
pub fn terminate(child: &mut Child) {
    if let Err(err) = child.kill() {
        tracing::debug!(pid = child.id(), error = %err, "terminate ignored");
    }
    let _ = child.wait();
}

/// Exit code with signal terminations folded in as `128 + signal`.
pub fn exit_code_of(status: &ExitStatus) -> Option<i32> {
    if let Some(code) = status.code() {
        return Some(code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return Some(128 + signal);
        }
    }
    None
}
