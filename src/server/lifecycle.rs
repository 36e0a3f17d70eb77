//! Safety net that stops a ready server when the caller never does.
//!
//! Explicit [`ServerProcess::stop`](crate::ServerProcess::stop) is the
//! primary cleanup path. Behind it sit two fallbacks:
//!
//! * [`LifecycleGuard`] is dropped with the handle and stops the process
//!   synchronously.
//! * Every armed guard is also recorded in a process-wide registry that an
//!   `atexit` hook drains, covering `std::process::exit` and other exits that
//!   skip destructors.
//!
//! Both fallbacks check the [`OwnerTag`] first and log failures instead of
//! returning them, since nobody is left to receive an error.

use crate::error::{Error, Result};
use crate::owner::OwnerTag;
use crate::server::process::ServerId;
use crate::server::shutdown::{shutdown_blocking, shutdown_child, PidTarget};
use async_process::Child;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, Once, OnceLock};
use std::time::Duration;

/// What the exit hook needs to clean up one server.
#[derive(Debug, Clone)]
struct Registration {
    pid: u32,
    owner: OwnerTag,
    timeout: Duration,
    poll_interval: Duration,
    scratch_dir: PathBuf,
}

impl Registration {
    fn cleanup(&self, id: ServerId) {
        if !self.owner.is_current() {
            return;
        }

        tracing::debug!(server_id = %id, pid = self.pid, "Stopping server at exit");
        if let Err(e) = shutdown_blocking(&mut PidTarget(self.pid), self.timeout, self.poll_interval) {
            tracing::error!(server_id = %id, error = %e, "Failed to stop server at exit");
            return;
        }

        match std::fs::remove_dir_all(&self.scratch_dir) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                tracing::error!(
                    server_id = %id,
                    path = %self.scratch_dir.display(),
                    error = %e,
                    "Failed to remove scratch directory at exit"
                );
            }
        }
    }
}

fn registry() -> &'static Mutex<HashMap<ServerId, Registration>> {
    static REGISTRY: OnceLock<Mutex<HashMap<ServerId, Registration>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

fn register(id: ServerId, registration: Registration) -> Result<()> {
    install_exit_hook();
    registry()
        .lock()
        .map_err(|_| Error::Other("Failed to lock server registry".to_string()))?
        .insert(id, registration);
    Ok(())
}

fn unregister(id: ServerId) {
    if let Ok(mut registry) = registry().lock() {
        registry.remove(&id);
    }
}

/// Whether a server is still recorded for cleanup at process exit.
pub fn is_registered(id: ServerId) -> bool {
    registry()
        .lock()
        .map(|registry| registry.contains_key(&id))
        .unwrap_or(false)
}

/// Stop every server that is still registered for cleanup at exit.
///
/// This is what the exit hook runs. It can also be called directly, e.g.
/// from a signal handler, before the process terminates. Servers owned by
/// another process are skipped, and failures are logged rather than
/// returned.
pub fn stop_all_registered() {
    // try_lock: never block process exit on a lock held by another thread
    let drained: Vec<(ServerId, Registration)> = match registry().try_lock() {
        Ok(mut registry) => registry.drain().collect(),
        Err(_) => return,
    };

    for (id, registration) in drained {
        registration.cleanup(id);
    }
}

extern "C" fn run_exit_hook() {
    stop_all_registered();
}

fn install_exit_hook() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        // SAFETY: `run_exit_hook` is a plain `extern "C"` function with no
        // arguments that does not unwind.
        let rc = unsafe { libc::atexit(run_exit_hook) };
        if rc != 0 {
            tracing::warn!("Could not register exit hook; servers leaked by std::process::exit will survive");
        }
    });
}

/// Owns a ready server process and stops it if dropped.
///
/// The guard captures everything it needs by value (pid, owner, timeouts),
/// so it works no matter what state the rest of the handle is in.
#[derive(Debug)]
pub struct LifecycleGuard {
    id: ServerId,
    pid: u32,
    owner: OwnerTag,
    timeout: Duration,
    poll_interval: Duration,
    child: Option<Child>,
}

impl LifecycleGuard {
    /// Take ownership of a ready child and register it with the exit hook.
    pub(crate) fn arm(
        id: ServerId,
        child: Child,
        owner: OwnerTag,
        timeout: Duration,
        poll_interval: Duration,
        scratch_dir: &Path,
    ) -> Result<Self> {
        let pid = child.id();
        let guard = Self {
            id,
            pid,
            owner,
            timeout,
            poll_interval,
            child: Some(child),
        };

        register(
            id,
            Registration {
                pid,
                owner,
                timeout,
                poll_interval,
                scratch_dir: scratch_dir.to_path_buf(),
            },
        )?;

        Ok(guard)
    }

    /// Process identifier of the guarded server.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Process that spawned the server.
    pub fn owner(&self) -> OwnerTag {
        self.owner
    }

    /// Stop the process with signal escalation and disarm the guard.
    ///
    /// Does nothing in a process other than the owner. If the process
    /// survives `SIGKILL` the error is returned and the server stays
    /// registered with the exit hook for one more attempt.
    pub(crate) async fn shutdown(mut self) -> Result<()> {
        if !self.owner.is_current() {
            return Ok(());
        }
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        shutdown_child(&mut child, self.timeout).await?;
        unregister(self.id);
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn set_owner(&mut self, owner: OwnerTag) {
        self.owner = owner;
    }
}

impl Drop for LifecycleGuard {
    fn drop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        if !self.owner.is_current() {
            // Dropping the handle would kill the process (kill_on_drop)
            std::mem::forget(child);
            return;
        }

        tracing::warn!(
            server_id = %self.id,
            pid = self.pid,
            "Server dropped without stop(); stopping it now"
        );
        match shutdown_blocking(&mut child, self.timeout, self.poll_interval) {
            Ok(()) => unregister(self.id),
            Err(e) => {
                tracing::error!(server_id = %self.id, pid = self.pid, error = %e, "Failed to stop dropped server");
            }
        }
    }
}
