#![allow(dead_code)]

use assert_fs::TempDir;
use assert_fs::prelude::*;
use ephemeral_redis::Config;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prints the readiness line and keeps running until signalled.
pub const READY_SERVER: &str = r#"#!/bin/sh
echo $$ > "$(dirname "$0")/server.pid"
echo "1:M * Server initialized"
echo "1:M * Ready to accept connections"
exec sleep 60
"#;

/// Starts but never reports readiness.
pub const HANGING_SERVER: &str = r#"#!/bin/sh
echo $$ > "$(dirname "$0")/server.pid"
echo "1:M * Server initialized"
exec sleep 60
"#;

/// Rejects any directive it does not know, like redis-server does.
pub const STRICT_SERVER: &str = r#"#!/bin/sh
echo $$ > "$(dirname "$0")/server.pid"
while read -r key value; do
  case "$key" in
    port|bind|unixsocket|dir|loglevel|save|appendonly) ;;
    *)
      echo "*** FATAL CONFIG FILE ERROR ***"
      echo ">>> '$key $value'"
      echo "Bad directive or wrong number of arguments"
      exit 1
      ;;
  esac
done < "$1"
echo "Ready to accept connections"
exec sleep 60
"#;

/// Ignores SIGTERM and SIGINT, so only SIGKILL stops it.
pub const STUBBORN_SERVER: &str = r#"#!/bin/sh
trap '' TERM INT
echo $$ > "$(dirname "$0")/server.pid"
echo "Ready to accept connections"
while :; do sleep 1; done
"#;

/// A shell script standing in for redis-server, plus a base directory for
/// the scratch directories it runs in.
pub struct FakeServer {
    dir: TempDir,
    script: PathBuf,
    scratch_base: PathBuf,
}

impl FakeServer {
    pub fn new(body: &str) -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let script = dir.child("fake-redis-server");
        script.write_str(body).expect("write fake server");
        std::fs::set_permissions(script.path(), std::fs::Permissions::from_mode(0o755))
            .expect("make fake server executable");

        let scratch = dir.child("scratch");
        scratch.create_dir_all().expect("create scratch base");

        Self {
            script: script.path().to_path_buf(),
            scratch_base: scratch.path().to_path_buf(),
            dir,
        }
    }

    /// Launcher config pointing at this fake server.
    pub fn config(&self) -> Config {
        Config::new()
            .with_executable(self.script.display().to_string())
            .with_tmpdir(&self.scratch_base)
            .with_timeout(Duration::from_secs(2))
            .with_poll_interval(Duration::from_millis(20))
    }

    /// Pid the script recorded, once it has started.
    pub fn recorded_pid(&self) -> Option<u32> {
        std::fs::read_to_string(self.dir.path().join("server.pid"))
            .ok()
            .and_then(|pid| pid.trim().parse().ok())
    }

    /// Base directory in which scratch directories are created.
    pub fn scratch_base(&self) -> &Path {
        &self.scratch_base
    }

    /// Number of scratch directories currently present.
    pub fn scratch_dirs(&self) -> usize {
        std::fs::read_dir(&self.scratch_base)
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}
