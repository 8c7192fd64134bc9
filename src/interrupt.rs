//! Operator cancellation.
//!
//! A SIGINT handler flips a process-wide flag. The supervision loop polls a
//! cancel flag (this one in the binary), kills the in-flight child and
//! returns [`Interrupted`].
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// The operator asked the run to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interrupted;

impl fmt::Display for Interrupted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("interrupted by operator")
    }
}

impl std::error::Error for Interrupted {}

#[cfg(unix)]
extern "C" fn on_sigint(_signal: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Install the SIGINT handler. Safe to call more than once.
#[cfg(unix)]
pub fn install_handler() {
    let handler = on_sigint as extern "C" fn(libc::c_int);
    // SAFETY: `on_sigint` only does an atomic store (async-signal-safe).
    unsafe {
        libc::signal(libc::SIGINT, handler as libc::sighandler_t);
    }
}

#[cfg(not(unix))]
pub fn install_handler() {}

/// The flag set by the SIGINT handler; the runner polls this.
pub fn flag() -> &'static AtomicBool {
    &INTERRUPTED
}

/// True when an error chain carries an operator interrupt.
pub fn is_interrupted(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| cause.is::<Interrupted>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupt_is_found_through_context() {
        let err = anyhow::Error::from(Interrupted).context("run render.ogg_vorbis_theora.a");
        assert!(is_interrupted(&err));
        assert!(!is_interrupted(&anyhow::anyhow!("exit code 1")));
    }

    #[cfg(unix)]
    #[test]
    fn sigint_sets_the_flag() {
        install_handler();
        // SAFETY: raise(3) takes no pointers; the handler above is installed.
        let rc = unsafe { libc::raise(libc::SIGINT) };
        assert_eq!(rc, 0);
        assert!(flag().load(Ordering::SeqCst));
    }
}
