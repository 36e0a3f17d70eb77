use crate::error::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Executable launched when none is configured.
pub const DEFAULT_EXECUTABLE: &str = "redis-server";
/// Log line (matched case-insensitively) that marks the server as ready.
pub const DEFAULT_READINESS_MARKER: &str = "ready to accept connections";
/// Scheme used for TCP connection URLs.
pub const DEFAULT_URL_SCHEME: &str = "redis";
/// Default startup and per-signal shutdown timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);
/// Default interval between readiness and exit checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A single server option value.
///
/// Values are rendered as plain text in the config file. Booleans become
/// `yes`/`no`, which is what `redis.conf` expects. An empty text value or a
/// JSON `null` leaves the option out of the rendered file entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    /// `null`: the option is not written
    Unset,
    /// `yes` / `no`
    Bool(bool),
    /// Integer option such as `port`
    Integer(i64),
    /// Fractional option such as `active-defrag-threshold-lower`
    Float(f64),
    /// Anything else, passed through verbatim
    Text(String),
}

impl ConfigValue {
    /// Numeric value, accepting integers given as text.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Unset | Self::Bool(_) | Self::Float(_) => None,
        }
    }

    /// Whether the value renders to nothing, which unsets the option.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Unset => true,
            Self::Text(s) => s.is_empty(),
            Self::Bool(_) | Self::Integer(_) | Self::Float(_) => false,
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(true) => f.write_str("yes"),
            Self::Bool(false) => f.write_str("no"),
            Self::Integer(n) => write!(f, "{}", n),
            Self::Float(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
            Self::Unset => Ok(()),
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&Path> for ConfigValue {
    fn from(value: &Path) -> Self {
        Self::Text(value.display().to_string())
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for ConfigValue {
    fn from(value: i32) -> Self {
        Self::Integer(value.into())
    }
}

impl From<u16> for ConfigValue {
    fn from(value: u16) -> Self {
        Self::Integer(value.into())
    }
}

impl From<u32> for ConfigValue {
    fn from(value: u32) -> Self {
        Self::Integer(value.into())
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl<T: Into<ConfigValue>> From<Option<T>> for ConfigValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Unset, Into::into)
    }
}

/// Options written to the server's config file, in insertion order.
///
/// Keys are the server's own directive names (`port`, `bind`, `save`, ...)
/// and are passed through uninterpreted; the server decides what it accepts.
///
/// # Examples
///
/// ```
/// use ephemeral_redis::config::ServerConfig;
///
/// let options = ServerConfig::new()
///     .with("bind", "127.0.0.1")
///     .with("port", 6380)
///     .with("appendonly", false);
///
/// assert_eq!(options.len(), 3);
/// assert_eq!(options.get("port").and_then(|v| v.as_integer()), Some(6380));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerConfig {
    options: IndexMap<String, ConfigValue>,
}

impl ServerConfig {
    /// Empty option map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`ServerConfig::set`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Set an option, replacing any previous value in place.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> &mut Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Value of an option.
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.options.get(key)
    }

    /// Whether an option is present (even with an empty value).
    pub fn contains_key(&self, key: &str) -> bool {
        self.options.contains_key(key)
    }

    /// Whether an option is present with a value that will be written.
    pub fn is_set(&self, key: &str) -> bool {
        self.options.get(key).is_some_and(|value| !value.is_empty())
    }

    /// Remove an option, keeping the order of the others.
    pub fn remove(&mut self, key: &str) -> Option<ConfigValue> {
        self.options.shift_remove(key)
    }

    /// Options in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.options.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of options.
    pub fn len(&self) -> usize {
        self.options.len()
    }

    /// Whether there are no options.
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}

impl<K: Into<String>, V: Into<ConfigValue>> FromIterator<(K, V)> for ServerConfig {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut config = Self::new();
        for (key, value) in iter {
            config.set(key, value);
        }
        config
    }
}

/// Launcher configuration: what to run, how long to wait, and which server
/// options to write.
///
/// # JSON Schema
///
/// Every field is optional:
///
/// ```json
/// {
///   "executable": "redis-server",
///   "timeoutMs": 3000,
///   "tmpdir": "/var/tmp",
///   "readinessMarker": "ready to accept connections",
///   "urlScheme": "redis",
///   "pollIntervalMs": 100,
///   "server": {
///     "bind": "127.0.0.1",
///     "port": 6380,
///     "appendonly": false
///   }
/// }
/// ```
///
/// # Examples
///
/// ```
/// use ephemeral_redis::config::Config;
/// use std::time::Duration;
///
/// let config = Config::new()
///     .with_option("save", "")
///     .with_timeout(Duration::from_secs(5));
///
/// assert_eq!(config.executable, "redis-server");
/// assert_eq!(config.timeout, Duration::from_secs(5));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Server executable, an absolute path or a command on `PATH`.
    #[serde(default = "default_executable")]
    pub executable: String,

    /// Startup timeout, also used for each wait of the shutdown escalation.
    #[serde(default = "default_timeout", rename = "timeoutMs", with = "millis")]
    pub timeout: Duration,

    /// Base directory for scratch directories; the system temp dir if unset.
    #[serde(default)]
    pub tmpdir: Option<PathBuf>,

    /// Case-insensitive log substring that marks the server as ready.
    #[serde(default = "default_readiness_marker")]
    pub readiness_marker: String,

    /// Scheme of the connection URL when the server listens on TCP.
    #[serde(default = "default_url_scheme")]
    pub url_scheme: String,

    /// Interval between readiness and exit checks.
    #[serde(
        default = "default_poll_interval",
        rename = "pollIntervalMs",
        with = "millis"
    )]
    pub poll_interval: Duration,

    /// Options written to the server's config file.
    #[serde(default)]
    pub server: ServerConfig,
}

fn default_executable() -> String {
    DEFAULT_EXECUTABLE.to_string()
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

fn default_readiness_marker() -> String {
    DEFAULT_READINESS_MARKER.to_string()
}

fn default_url_scheme() -> String {
    DEFAULT_URL_SCHEME.to_string()
}

fn default_poll_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}

impl Default for Config {
    fn default() -> Self {
        Self {
            executable: default_executable(),
            timeout: DEFAULT_TIMEOUT,
            tmpdir: None,
            readiness_marker: default_readiness_marker(),
            url_scheme: default_url_scheme(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    /// Default launcher settings with no server options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// * The file cannot be read
    /// * The file contents are not valid JSON
    /// * The JSON does not conform to the expected schema
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigParse(format!("Failed to read config file: {}", e)))?;

        Self::parse_from_str(&content)
    }

    /// Parses a configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not valid JSON or does not match
    /// the expected schema.
    pub fn parse_from_str(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| Error::ConfigParse(format!("Failed to parse JSON config: {}", e)))
    }

    /// Set a server option.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.server.set(key, value);
        self
    }

    /// Replace all server options.
    pub fn with_server_config(mut self, server: ServerConfig) -> Self {
        self.server = server;
        self
    }

    /// Set the startup / per-signal shutdown timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the base directory for scratch directories.
    pub fn with_tmpdir(mut self, tmpdir: impl Into<PathBuf>) -> Self {
        self.tmpdir = Some(tmpdir.into());
        self
    }

    /// Set the server executable.
    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.executable = executable.into();
        self
    }

    /// Set the readiness marker.
    pub fn with_readiness_marker(mut self, marker: impl Into<String>) -> Self {
        self.readiness_marker = marker.into();
        self
    }

    /// Set the readiness poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
