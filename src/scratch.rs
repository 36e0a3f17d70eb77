//! Per-run scratch directory holding the config file, log file and unix
//! socket of one server instance.

use crate::error::{Error, Result};
use crate::owner::OwnerTag;
use std::io::ErrorKind;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// File name of the rendered server config.
pub const CONFIG_FILE: &str = "redis.conf";
/// File name of the server log.
pub const LOG_FILE: &str = "redis.log";
/// File name of the default unix socket.
pub const SOCKET_FILE: &str = "redis.sock";

const DIR_PREFIX: &str = "ephemeral-redis";

/// A uniquely named directory owned by one server run.
///
/// The directory is removed by [`ScratchDirectory::delete`] or, failing
/// that, when the value is dropped. Neither happens in a process other than
/// the one that created it.
#[derive(Debug)]
pub struct ScratchDirectory {
    path: PathBuf,
    owner: OwnerTag,
    deleted: bool,
}

impl ScratchDirectory {
    /// Create a fresh directory under `base_dir`, or under the system
    /// temporary directory when `None`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Filesystem`] if the base directory does not exist, is
    /// not writable, or the directory cannot be created.
    #[tracing::instrument(skip_all, fields(base_dir = ?base_dir))]
    pub fn create(base_dir: Option<&Path>) -> Result<Self> {
        let base = match base_dir {
            Some(dir) => std::path::absolute(dir).map_err(|e| Error::filesystem(dir, e))?,
            None => std::env::temp_dir(),
        };

        let path = base.join(format!("{}-{}", DIR_PREFIX, Uuid::new_v4().simple()));
        std::fs::DirBuilder::new()
            .mode(0o700)
            .create(&path)
            .map_err(|e| Error::filesystem(&path, e))?;

        tracing::debug!(path = %path.display(), "Created scratch directory");
        Ok(Self {
            path,
            owner: OwnerTag::current(),
            deleted: false,
        })
    }

    /// Directory path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the rendered server config.
    pub fn config_path(&self) -> PathBuf {
        self.path.join(CONFIG_FILE)
    }

    /// Path of the server log.
    pub fn log_path(&self) -> PathBuf {
        self.path.join(LOG_FILE)
    }

    /// Path of the default unix socket.
    pub fn socket_path(&self) -> PathBuf {
        self.path.join(SOCKET_FILE)
    }

    /// Process that created the directory.
    pub fn owner(&self) -> OwnerTag {
        self.owner
    }

    /// Remove the directory and everything in it.
    ///
    /// A directory that is already gone counts as removed. Calling this from
    /// a process other than the creator, or calling it twice, does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Filesystem`] for any removal failure other than the
    /// directory being missing.
    pub fn delete(&mut self) -> Result<()> {
        if self.deleted {
            return Ok(());
        }
        if !self.owner.is_current() {
            tracing::debug!(
                path = %self.path.display(),
                owner = self.owner.pid(),
                "Not removing scratch directory owned by another process"
            );
            return Ok(());
        }

        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "Removed scratch directory");
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(Error::filesystem(&self.path, e)),
        }

        self.deleted = true;
        Ok(())
    }
}

impl Drop for ScratchDirectory {
    fn drop(&mut self) {
        if let Err(e) = self.delete() {
            tracing::warn!(error = %e, "Failed to remove scratch directory on drop");
        }
    }
}
