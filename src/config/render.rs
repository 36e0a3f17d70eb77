use crate::config::parser::{ConfigValue, ServerConfig};
use crate::scratch::SOCKET_FILE;
use std::path::Path;

/// Option naming the unix socket path.
pub const UNIXSOCKET_KEY: &str = "unixsocket";
/// Option naming the TCP port.
pub const PORT_KEY: &str = "port";
/// Option naming the bind address(es).
pub const BIND_KEY: &str = "bind";
/// Option naming the working directory.
pub const DIR_KEY: &str = "dir";
/// Option naming the log verbosity.
pub const LOGLEVEL_KEY: &str = "loglevel";

// "warning" hides the readiness line; "notice" is the closest level that prints it.
const UNSUPPORTED_LOGLEVEL: &str = "warning";
const FALLBACK_LOGLEVEL: &str = "notice";

/// Render options as `<key> <value>` lines in iteration order.
///
/// Options whose value renders to an empty string are left out; this is how
/// an option is unset without removing it from the map.
///
/// # Examples
///
/// ```
/// use ephemeral_redis::config::{render, ServerConfig};
///
/// let options = ServerConfig::new()
///     .with("port", 0)
///     .with("save", "")
///     .with("daemonize", false);
///
/// assert_eq!(render(&options), "port 0\ndaemonize no\n");
/// ```
pub fn render(config: &ServerConfig) -> String {
    config
        .iter()
        .filter_map(|(key, value)| {
            let value = value.to_string();
            (!value.is_empty()).then(|| format!("{} {}\n", key, value))
        })
        .collect()
}

/// Merge caller options with the defaults for a run in `scratch_dir`.
///
/// Caller values always win; defaults only fill gaps:
/// - without `port` and `unixsocket`, the server listens on
///   `<scratch_dir>/redis.sock` with TCP disabled (`port 0`)
/// - without `dir`, the working directory is the scratch directory
///
/// An option with an empty value counts as absent, so it never displaces a
/// default.
///
/// A `loglevel` of `warning` is replaced with `notice`, since the readiness
/// line is not printed at `warning`.
///
/// Defaults come first in the merged order, caller options follow.
pub fn merge_defaults(config: &ServerConfig, scratch_dir: &Path) -> ServerConfig {
    let mut merged = ServerConfig::new();

    if !config.is_set(PORT_KEY) && !config.is_set(UNIXSOCKET_KEY) {
        merged.set(UNIXSOCKET_KEY, scratch_dir.join(SOCKET_FILE).as_path());
        merged.set(PORT_KEY, 0);
    }
    if !config.is_set(DIR_KEY) {
        merged.set(DIR_KEY, format!("{}/", scratch_dir.display()));
    }

    for (key, value) in config.iter() {
        if value.is_empty() && merged.contains_key(key) {
            continue;
        }
        merged.set(key, value.clone());
    }

    if merged.get(LOGLEVEL_KEY).map(ConfigValue::to_string).as_deref() == Some(UNSUPPORTED_LOGLEVEL) {
        tracing::warn!(
            "loglevel \"{}\" is not supported, using \"{}\" instead",
            UNSUPPORTED_LOGLEVEL,
            FALLBACK_LOGLEVEL
        );
        merged.set(LOGLEVEL_KEY, FALLBACK_LOGLEVEL);
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scratch() -> PathBuf {
        PathBuf::from("/tmp/ephemeral-redis-test")
    }

    #[test]
    fn socket_defaults_when_no_endpoint() {
        let merged = merge_defaults(&ServerConfig::new(), &scratch());

        assert_eq!(
            render(&merged),
            "unixsocket /tmp/ephemeral-redis-test/redis.sock\nport 0\ndir /tmp/ephemeral-redis-test/\n"
        );
    }

    #[test]
    fn caller_port_suppresses_socket_default() {
        let config = ServerConfig::new().with("bind", "127.0.0.1").with("port", 6380);
        let merged = merge_defaults(&config, &scratch());

        assert!(!merged.contains_key(UNIXSOCKET_KEY));
        assert_eq!(merged.get(PORT_KEY), Some(&ConfigValue::Integer(6380)));
        assert!(merged.contains_key(DIR_KEY));
    }

    #[test]
    fn caller_socket_suppresses_port_default() {
        let config = ServerConfig::new().with("unixsocket", "/run/custom.sock");
        let merged = merge_defaults(&config, &scratch());

        assert!(!merged.contains_key(PORT_KEY));
        assert_eq!(
            merged.get(UNIXSOCKET_KEY),
            Some(&ConfigValue::from("/run/custom.sock"))
        );
    }

    #[test]
    fn caller_dir_wins() {
        let config = ServerConfig::new().with("dir", "/srv/data");
        let merged = merge_defaults(&config, &scratch());
        assert_eq!(merged.get(DIR_KEY), Some(&ConfigValue::from("/srv/data")));
    }

    #[test]
    fn warning_loglevel_is_replaced() {
        let config = ServerConfig::new().with("loglevel", "warning");
        let merged = merge_defaults(&config, &scratch());
        assert_eq!(merged.get(LOGLEVEL_KEY), Some(&ConfigValue::from("notice")));

        let config = ServerConfig::new().with("loglevel", "verbose");
        let merged = merge_defaults(&config, &scratch());
        assert_eq!(merged.get(LOGLEVEL_KEY), Some(&ConfigValue::from("verbose")));
    }

    #[test]
    fn empty_port_keeps_socket_default() {
        let config = ServerConfig::new().with("port", "").with("save", "");
        let merged = merge_defaults(&config, &scratch());

        assert_eq!(
            merged.get(UNIXSOCKET_KEY),
            Some(&ConfigValue::from("/tmp/ephemeral-redis-test/redis.sock"))
        );
        assert_eq!(merged.get(PORT_KEY), Some(&ConfigValue::Integer(0)));
        assert_eq!(
            render(&merged),
            "unixsocket /tmp/ephemeral-redis-test/redis.sock\nport 0\ndir /tmp/ephemeral-redis-test/\n"
        );
    }

    #[test]
    fn unset_values_do_not_replace_defaults() {
        let config = ServerConfig::new()
            .with("unixsocket", None::<&str>)
            .with("dir", "");
        let merged = merge_defaults(&config, &scratch());

        assert_eq!(
            merged.get(UNIXSOCKET_KEY),
            Some(&ConfigValue::from("/tmp/ephemeral-redis-test/redis.sock"))
        );
        assert_eq!(merged.get(DIR_KEY), Some(&ConfigValue::from("/tmp/ephemeral-redis-test/")));
    }

    #[test]
    fn empty_values_are_skipped() {
        let config = ServerConfig::new()
            .with("save", "")
            .with("appendonly", true)
            .with("dir", "");

        assert_eq!(render(&config), "appendonly yes\n");
    }
}
