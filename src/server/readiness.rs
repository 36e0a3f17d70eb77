//! Log-based readiness detection.

use crate::error::{Error, Result};
use async_process::Child;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;
use tokio::time;

/// Outcome of waiting for a starting server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Readiness {
    /// The readiness marker showed up in the log.
    Ready,
    /// The process exited first, with this code (`None` if signalled).
    Exited(Option<i32>),
}

/// Read the whole log, tolerating a log that does not exist yet and
/// output that is not valid UTF-8.
pub(crate) async fn read_log(path: &Path) -> Result<String> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(Error::filesystem(path, e)),
    }
}

/// Case-insensitive substring match of the readiness marker.
pub(crate) fn contains_marker(log: &str, marker: &str) -> bool {
    log.to_lowercase().contains(&marker.to_lowercase())
}

/// Poll until the child exits or the log contains `marker`.
///
/// Runs until one of the two happens; callers bound it with a timeout.
pub(crate) async fn wait_until_ready(
    child: &mut Child,
    log_path: &Path,
    marker: &str,
    poll_interval: Duration,
) -> Result<Readiness> {
    loop {
        let exited = child
            .try_status()
            .map_err(|e| Error::Other(format!("Failed to check process {}: {}", child.id(), e)))?;
        if let Some(status) = exited {
            tracing::debug!(%status, "Process exited while starting");
            return Ok(Readiness::Exited(status.code()));
        }

        if contains_marker(&read_log(log_path).await?, marker) {
            return Ok(Readiness::Ready);
        }

        time::sleep(poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_process::{Command, Stdio};
    use std::fs::File;

    #[test]
    fn marker_match_ignores_case() {
        let log = "1:M 01 Jan 00:00:00.000 * The server is now ready to accept connections at /tmp/redis.sock";
        assert!(contains_marker(log, "Ready to accept connections"));
        assert!(contains_marker(log, "READY TO ACCEPT"));
        assert!(!contains_marker("Server initialized", "ready to accept connections"));
    }

    #[tokio::test]
    async fn missing_log_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read_log(&dir.path().join("nope.log")).await.unwrap(), "");
    }

    #[tokio::test]
    async fn detects_marker_in_child_output() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("server.log");
        let log = File::create(&log_path).unwrap();

        let mut child = Command::new("sh")
            .arg("-c")
            .arg("echo 'Ready to accept connections'; exec sleep 30")
            .stdout(Stdio::from(log))
            .spawn()
            .unwrap();

        let outcome = time::timeout(
            Duration::from_secs(5),
            wait_until_ready(&mut child, &log_path, "ready to accept connections", Duration::from_millis(10)),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(outcome, Readiness::Ready);
        child.kill().unwrap();
        child.status().await.unwrap();
    }

    #[tokio::test]
    async fn detects_early_exit() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("server.log");

        let mut child = Command::new("sh").arg("-c").arg("exit 3").spawn().unwrap();

        let outcome = time::timeout(
            Duration::from_secs(5),
            wait_until_ready(&mut child, &log_path, "ready", Duration::from_millis(10)),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(outcome, Readiness::Exited(Some(3)));
    }
}
