// src/server/process.rs
use crate::config::{merge_defaults, render, validate_config, validator, Config, ServerConfig};
use crate::error::{Error, Result, StartupFailure};
use crate::owner::OwnerTag;
use crate::scratch::ScratchDirectory;
use crate::server::connect::ConnectInfo;
use crate::server::lifecycle::LifecycleGuard;
use crate::server::readiness::{read_log, wait_until_ready, Readiness};
use crate::server::shutdown::shutdown_child;
use async_process::{Child, Command, Stdio};
use std::fmt;
use std::fs::OpenOptions;
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::time;
use uuid::Uuid;

/// Unique identifier for a server process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServerId(Uuid);

impl ServerId {
    // Private constructor, only usable within our crate
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of a server process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    /// Not started, or stopped
    Idle,
    /// Spawned, waiting for the readiness marker
    Starting,
    /// Accepting connections
    Ready,
    /// Signals are being sent
    Stopping,
    /// Start or stop failed; the handle cannot be started again
    Failed,
}

/// One supervised server instance.
///
/// A handle goes `Idle → Starting → Ready → Stopping → Idle`. Each start
/// gets its own scratch directory holding `redis.conf`, `redis.log` and,
/// by default, the unix socket; the directory is removed when the server
/// stops. Dropping a ready handle stops the server as well.
///
/// The handle is not meant to be shared: `start` and `stop` take `&mut self`.
///
/// # Examples
///
/// ```no_run
/// use ephemeral_redis::{Config, ServerProcess};
///
/// # async fn demo() -> ephemeral_redis::Result<()> {
/// let mut server = ServerProcess::new(Config::new());
/// let info = server.start().await?.expect("fresh handle");
/// println!("redis listening on {}", info);
/// server.stop().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ServerProcess {
    /// Launcher configuration
    config: Config,
    /// Server ID
    id: ServerId,
    /// Process that created the handle
    owner: OwnerTag,
    /// Server status
    status: ServerStatus,
    /// Merged options of the current run
    effective: Option<ServerConfig>,
    /// Ready process; declared before `scratch` so it drops first
    guard: Option<LifecycleGuard>,
    /// Scratch directory of the current run
    scratch: Option<ScratchDirectory>,
}

impl ServerProcess {
    /// Create a handle in the `Idle` state. Nothing is spawned yet.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            id: ServerId::new(),
            owner: OwnerTag::current(),
            status: ServerStatus::Idle,
            effective: None,
            guard: None,
            scratch: None,
        }
    }

    /// Start a server, hand its connection info to `f`, then stop it.
    ///
    /// The server is stopped whether or not `f` succeeds; if `f` panics the
    /// handle is dropped, which stops it too.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use ephemeral_redis::{Config, ServerProcess};
    ///
    /// # async fn demo() -> ephemeral_redis::Result<()> {
    /// let url = ServerProcess::run(Config::new().with_option("port", 6390), |info| async move {
    ///     info.to_string()
    /// })
    /// .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn run<F, Fut, T>(config: Config, f: F) -> Result<T>
    where
        F: FnOnce(ConnectInfo) -> Fut,
        Fut: Future<Output = T>,
    {
        let mut server = Self::new(config);
        let info = server.launch().await?;
        let output = f(info).await;
        server.stop().await?;
        Ok(output)
    }

    /// Get the server ID
    pub fn id(&self) -> ServerId {
        self.id
    }

    /// Get the server status
    pub fn status(&self) -> ServerStatus {
        self.status
    }

    /// Launcher configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Process that created this handle
    pub fn owner(&self) -> OwnerTag {
        self.owner
    }

    /// Pid of the running server
    pub fn pid(&self) -> Option<u32> {
        self.guard.as_ref().map(LifecycleGuard::pid)
    }

    /// Scratch directory of the current run
    pub fn scratch_dir(&self) -> Option<&Path> {
        self.scratch.as_ref().map(ScratchDirectory::path)
    }

    /// Server log of the current run
    pub fn log_path(&self) -> Option<PathBuf> {
        self.scratch.as_ref().map(ScratchDirectory::log_path)
    }

    /// Options written to the config file of the current run
    pub fn effective_config(&self) -> Option<&ServerConfig> {
        self.effective.as_ref()
    }

    /// Current contents of the server log
    pub async fn read_log(&self) -> Result<String> {
        match self.log_path() {
            Some(path) => read_log(&path).await,
            None => Ok(String::new()),
        }
    }

    /// Where to connect, while the server is ready.
    pub fn connect_info(&self) -> Option<ConnectInfo> {
        if self.status != ServerStatus::Ready {
            return None;
        }
        self.effective
            .as_ref()
            .and_then(|config| ConnectInfo::from_config(config, &self.config.url_scheme))
    }

    /// Start the server process and wait until it is ready.
    ///
    /// Returns `Ok(None)` without doing anything if the server is already
    /// running.
    ///
    /// # Errors
    ///
    /// * [`Error::Startup`] if the executable cannot be spawned, exits before
    ///   becoming ready, or is not ready within the timeout. The server log
    ///   is attached and no process is left running.
    /// * [`Error::StartAfterFailure`] if an earlier start on this handle failed.
    /// * [`Error::ConfigInvalid`] or [`Error::Filesystem`] for problems
    ///   before the spawn.
    #[tracing::instrument(skip(self), fields(server_id = %self.id))]
    pub async fn start(&mut self) -> Result<Option<ConnectInfo>> {
        match self.status {
            ServerStatus::Ready => {
                tracing::debug!("Server already running");
                Ok(None)
            }
            _ => self.launch().await.map(Some),
        }
    }

    /// Start the server, hand its connection info to `f`, then stop it.
    ///
    /// Returns `Ok(None)` without calling `f` if the server is already
    /// running.
    pub async fn start_with<F, Fut, T>(&mut self, f: F) -> Result<Option<T>>
    where
        F: FnOnce(ConnectInfo) -> Fut,
        Fut: Future<Output = T>,
    {
        let Some(info) = self.start().await? else {
            return Ok(None);
        };
        let output = f(info).await;
        self.stop().await?;
        Ok(Some(output))
    }

    async fn launch(&mut self) -> Result<ConnectInfo> {
        match self.status {
            ServerStatus::Idle => {}
            ServerStatus::Failed => return Err(Error::StartAfterFailure),
            // Left behind by a cancelled start() or stop() future
            other => {
                return Err(Error::Other(format!("Cannot start server while {:?}", other)));
            }
        }
        validate_config(&self.config)?;

        tracing::info!(executable = %self.config.executable, "Starting server");
        self.status = ServerStatus::Starting;

        let mut scratch = match ScratchDirectory::create(self.config.tmpdir.as_deref()) {
            Ok(scratch) => scratch,
            Err(e) => {
                self.status = ServerStatus::Failed;
                return Err(e);
            }
        };

        match self.spawn_and_wait(&scratch).await {
            Ok((guard, effective, info)) => {
                tracing::info!(pid = guard.pid(), %info, "Server ready");
                self.guard = Some(guard);
                self.effective = Some(effective);
                self.scratch = Some(scratch);
                self.status = ServerStatus::Ready;
                Ok(info)
            }
            Err(e) => {
                tracing::error!(error = %e, "Server failed to start");
                // Nothing was spawned for a rejected config; the handle stays usable
                self.status = match e {
                    Error::ConfigInvalid(_) => ServerStatus::Idle,
                    _ => ServerStatus::Failed,
                };
                if let Err(cleanup) = scratch.delete() {
                    tracing::warn!(error = %cleanup, "Failed to remove scratch directory");
                }
                Err(e)
            }
        }
    }

    async fn spawn_and_wait(
        &self,
        scratch: &ScratchDirectory,
    ) -> Result<(LifecycleGuard, ServerConfig, ConnectInfo)> {
        let effective = merge_defaults(&self.config.server, scratch.path());
        validator::validate_endpoint(&effective)?;
        let info = ConnectInfo::from_config(&effective, &self.config.url_scheme).ok_or_else(|| {
            Error::ConfigInvalid("Cannot derive connection info".to_string())
        })?;

        let config_path = scratch.config_path();
        tokio::fs::write(&config_path, render(&effective))
            .await
            .map_err(|e| Error::filesystem(&config_path, e))?;

        let log_path = scratch.log_path();
        let mut child = self.spawn(&config_path, &log_path).await?;
        let pid = child.id();
        tracing::debug!(pid, "Spawned server process");

        let waited = time::timeout(
            self.config.timeout,
            wait_until_ready(
                &mut child,
                &log_path,
                &self.config.readiness_marker,
                self.config.poll_interval,
            ),
        )
        .await;

        let failure = match waited {
            Ok(Ok(Readiness::Ready)) => {
                let guard = LifecycleGuard::arm(
                    self.id,
                    child,
                    self.owner,
                    self.config.timeout,
                    self.config.poll_interval,
                    scratch.path(),
                )?;
                return Ok((guard, effective, info));
            }
            Ok(Ok(Readiness::Exited(code))) => StartupFailure::Exited { code },
            Ok(Err(e)) => {
                self.abort(&mut child).await;
                return Err(e);
            }
            Err(_) => {
                tracing::warn!(pid, "Server not ready after {:?}", self.config.timeout);
                self.abort(&mut child).await;
                StartupFailure::TimedOut {
                    waited: self.config.timeout,
                }
            }
        };

        Err(self.startup_error(failure, &log_path).await)
    }

    /// Spawn `<executable> <config>` with both output streams in the log.
    async fn spawn(&self, config_path: &Path, log_path: &Path) -> Result<Child> {
        let mut log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)
            .map_err(|e| Error::filesystem(log_path, e))?;
        let stderr = log.try_clone().map_err(|e| Error::filesystem(log_path, e))?;

        let spawned = Command::new(&self.config.executable)
            .arg(config_path)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log.try_clone().map_err(|e| Error::filesystem(log_path, e))?))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true)
            .spawn();

        match spawned {
            Ok(child) => Ok(child),
            Err(e) => {
                // Keep the failure visible in the log like any other startup failure
                if let Err(write_err) = writeln!(log, "exec failed: {}", e) {
                    tracing::warn!(error = %write_err, "Failed to record spawn error in log");
                }
                let failure = StartupFailure::SpawnFailed {
                    errno: e.raw_os_error(),
                };
                Err(self.startup_error(failure, log_path).await)
            }
        }
    }

    /// Stop a child that never became ready; failures are only logged so
    /// the startup error reaches the caller.
    async fn abort(&self, child: &mut Child) {
        if let Err(e) = shutdown_child(child, self.config.timeout).await {
            tracing::error!(pid = child.id(), error = %e, "Failed to stop server that did not start");
        }
    }

    async fn startup_error(&self, failure: StartupFailure, log_path: &Path) -> Error {
        let log = read_log(log_path).await.unwrap_or_else(|e| e.to_string());
        Error::Startup {
            executable: self.config.executable.clone(),
            failure,
            log,
        }
    }

    /// Stop the server process.
    ///
    /// Sends `SIGTERM`, then `SIGINT`, then `SIGKILL`, waiting up to the
    /// timeout after each, and removes the scratch directory once the
    /// process has exited. Does nothing if the server is not running or if
    /// called from a process other than the one that created the handle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShutdownTimeout`] if the process survives `SIGKILL`,
    /// and [`Error::Filesystem`] if the scratch directory cannot be removed.
    #[tracing::instrument(skip(self), fields(server_id = %self.id))]
    pub async fn stop(&mut self) -> Result<()> {
        if !self.owner.is_current() {
            tracing::debug!(owner = self.owner.pid(), "Not stopping server owned by another process");
            return Ok(());
        }
        let Some(guard) = self.guard.take() else {
            return Ok(());
        };

        tracing::info!(pid = guard.pid(), "Stopping server");
        self.status = ServerStatus::Stopping;

        if let Err(e) = guard.shutdown().await {
            tracing::error!(error = %e, "Server did not stop");
            self.status = ServerStatus::Failed;
            return Err(e);
        }

        self.effective = None;
        self.status = ServerStatus::Idle;
        if let Some(mut scratch) = self.scratch.take() {
            scratch.delete()?;
        }

        tracing::info!("Server stopped");
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn set_owner(&mut self, owner: OwnerTag) {
        self.owner = owner;
        if let Some(guard) = self.guard.as_mut() {
            guard.set_owner(owner);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::shutdown::process_exists;
    use std::os::unix::fs::PermissionsExt;
    use std::time::Duration;

    const READY_SERVER: &str = "#!/bin/sh\necho \"1:M * Ready to accept connections\"\nexec sleep 30\n";

    fn write_script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("fake-server");
        std::fs::write(&path, body).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn fake_config(dir: &Path, body: &str) -> Config {
        Config::new()
            .with_executable(write_script(dir, body).display().to_string())
            .with_tmpdir(dir)
            .with_timeout(Duration::from_secs(2))
            .with_poll_interval(Duration::from_millis(20))
    }

    #[test]
    fn new_handle_is_idle() {
        let server = ServerProcess::new(Config::new());
        assert_eq!(server.status(), ServerStatus::Idle);
        assert!(server.pid().is_none());
        assert!(server.connect_info().is_none());
        assert!(server.scratch_dir().is_none());
    }

    #[tokio::test]
    async fn start_twice_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = ServerProcess::new(fake_config(dir.path(), READY_SERVER));

        let info = server.start().await.unwrap().unwrap();
        let pid = server.pid().unwrap();
        assert_eq!(server.status(), ServerStatus::Ready);
        assert_eq!(server.connect_info(), Some(info));

        assert!(server.start().await.unwrap().is_none());
        assert_eq!(server.pid(), Some(pid));

        server.stop().await.unwrap();
        assert_eq!(server.status(), ServerStatus::Idle);
        assert!(!process_exists(pid));
    }

    #[tokio::test]
    async fn restart_after_stop_uses_new_scratch_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = ServerProcess::new(fake_config(dir.path(), READY_SERVER));

        server.start().await.unwrap();
        let first = server.scratch_dir().unwrap().to_path_buf();
        server.stop().await.unwrap();
        assert!(!first.exists());

        server.start().await.unwrap();
        let second = server.scratch_dir().unwrap().to_path_buf();
        assert_ne!(first, second);
        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn foreign_owner_cannot_stop() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = ServerProcess::new(fake_config(dir.path(), READY_SERVER));
        server.start().await.unwrap();
        let pid = server.pid().unwrap();
        let scratch = server.scratch_dir().unwrap().to_path_buf();

        server.set_owner(OwnerTag::foreign());
        server.stop().await.unwrap();
        assert!(process_exists(pid));
        assert!(scratch.is_dir());
        assert_eq!(server.status(), ServerStatus::Ready);

        server.set_owner(OwnerTag::current());
        server.stop().await.unwrap();
        assert!(!process_exists(pid));
        assert!(!scratch.exists());
    }

    #[tokio::test]
    async fn failed_handle_refuses_restart() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = ServerProcess::new(fake_config(dir.path(), "#!/bin/sh\nexit 1\n"));

        let err = server.start().await.unwrap_err();
        assert!(err.process_exited());
        assert_eq!(server.status(), ServerStatus::Failed);
        assert!(server.pid().is_none());

        assert!(matches!(server.start().await, Err(Error::StartAfterFailure)));
    }

    #[tokio::test]
    async fn invalid_config_fails_before_spawn() {
        let dir = tempfile::tempdir().unwrap();
        let config = fake_config(dir.path(), READY_SERVER).with_option("port", 0);
        let mut server = ServerProcess::new(config);

        let err = server.start().await.unwrap_err();
        assert!(matches!(err, Error::ConfigInvalid(_)));
        assert_eq!(server.status(), ServerStatus::Idle);
        assert!(server.scratch_dir().is_none());
        assert!(matches!(server.start().await, Err(Error::ConfigInvalid(_))));
    }

    #[tokio::test]
    async fn empty_port_listens_on_socket() {
        let dir = tempfile::tempdir().unwrap();
        let config = fake_config(dir.path(), READY_SERVER).with_option("port", "");
        let mut server = ServerProcess::new(config);

        let info = server.start().await.unwrap().unwrap();
        let scratch = server.scratch_dir().unwrap().to_path_buf();
        assert_eq!(info, ConnectInfo::Path(scratch.join("redis.sock")));
        server.stop().await.unwrap();
    }
}
