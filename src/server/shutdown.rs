//! Signal escalation for stopping a server process.
//!
//! Each signal in [`ESCALATION`] is sent in turn, waiting up to the timeout
//! for the process to exit before moving on. Surviving the wait after
//! `SIGKILL` is a hard [`Error::ShutdownTimeout`], never a retry loop.
//!
//! Two flavours exist: [`shutdown_child`] awaits the exit of a child owned
//! by the supervisor, and [`shutdown_blocking`] polls, for use from `Drop`
//! and the exit hook where no async context is available.

use crate::error::{Error, Result};
use async_process::Child;
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use std::time::{Duration, Instant};
use tokio::time;

/// Signals sent, in order, until the process exits.
pub const ESCALATION: [Signal; 3] = [Signal::SIGTERM, Signal::SIGINT, Signal::SIGKILL];

/// A process that can be signalled and reaped without blocking.
#[cfg_attr(test, mockall::automock)]
pub(crate) trait SignalTarget {
    /// Process identifier.
    fn pid(&self) -> u32;

    /// Deliver a signal. A process that is already gone is not an error.
    fn signal(&mut self, signal: Signal) -> Result<()>;

    /// Returns `true` once the process has exited (and has been reaped, if
    /// it is our child).
    fn try_reap(&mut self) -> Result<bool>;
}

fn send_signal(pid: u32, sig: Signal) -> Result<()> {
    match signal::kill(Pid::from_raw(pid as i32), sig) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(Error::Signal(format!(
            "Failed to send {} to process {}: {}",
            sig.as_str(),
            pid,
            e
        ))),
    }
}

impl SignalTarget for Child {
    fn pid(&self) -> u32 {
        self.id()
    }

    fn signal(&mut self, signal: Signal) -> Result<()> {
        send_signal(self.id(), signal)
    }

    fn try_reap(&mut self) -> Result<bool> {
        self.try_status()
            .map(|status| status.is_some())
            .map_err(|e| Error::Signal(format!("Failed to check process {}: {}", self.id(), e)))
    }
}

/// A process known only by its pid, as recorded for the exit hook.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PidTarget(pub u32);

impl SignalTarget for PidTarget {
    fn pid(&self) -> u32 {
        self.0
    }

    fn signal(&mut self, signal: Signal) -> Result<()> {
        send_signal(self.0, signal)
    }

    fn try_reap(&mut self) -> Result<bool> {
        let pid = Pid::from_raw(self.0 as i32);
        match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => Ok(false),
            Ok(_) => Ok(true),
            // Reaped elsewhere or not our child; fall back to an existence probe
            Err(Errno::ECHILD) => Ok(matches!(signal::kill(pid, None), Err(Errno::ESRCH))),
            Err(e) => Err(Error::Signal(format!("Failed to reap process {}: {}", self.0, e))),
        }
    }
}

/// Stop a child process, awaiting its exit after each signal.
///
/// # Errors
///
/// Returns [`Error::ShutdownTimeout`] if the process is still running after
/// the wait that follows `SIGKILL`, or [`Error::Signal`] if a signal could
/// not be delivered.
#[tracing::instrument(skip(child), fields(pid = child.id()))]
pub(crate) async fn shutdown_child(child: &mut Child, timeout: Duration) -> Result<()> {
    let pid = child.id();

    for sig in ESCALATION {
        tracing::debug!(signal = sig.as_str(), "Sending signal");
        child.signal(sig)?;

        match time::timeout(timeout, child.status()).await {
            Ok(Ok(status)) => {
                tracing::debug!(%status, "Process exited");
                return Ok(());
            }
            Ok(Err(e)) => {
                return Err(Error::Signal(format!(
                    "Failed to wait for process {}: {}",
                    pid, e
                )));
            }
            Err(_) => {
                tracing::warn!(
                    signal = sig.as_str(),
                    "Process still running after {:?}",
                    timeout
                );
            }
        }
    }

    Err(Error::ShutdownTimeout { pid, timeout })
}

/// Stop a process by polling for its exit after each signal.
///
/// Same escalation and errors as [`shutdown_child`], but blocks the calling
/// thread.
pub(crate) fn shutdown_blocking<T: SignalTarget + ?Sized>(
    target: &mut T,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<()> {
    let pid = target.pid();

    for sig in ESCALATION {
        tracing::debug!(pid, signal = sig.as_str(), "Sending signal");
        target.signal(sig)?;

        let deadline = Instant::now() + timeout;
        loop {
            if target.try_reap()? {
                tracing::debug!(pid, "Process exited");
                return Ok(());
            }
            if Instant::now() >= deadline {
                break;
            }
            std::thread::sleep(poll_interval);
        }

        tracing::warn!(
            pid,
            signal = sig.as_str(),
            "Process still running after {:?}",
            timeout
        );
    }

    Err(Error::ShutdownTimeout { pid, timeout })
}

/// Whether a process with this pid exists (zombies included).
pub fn process_exists(pid: u32) -> bool {
    !matches!(
        signal::kill(Pid::from_raw(pid as i32), None),
        Err(Errno::ESRCH)
    )
}
