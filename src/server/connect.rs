use crate::config::{ServerConfig, BIND_KEY, PORT_KEY, UNIXSOCKET_KEY};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

const DEFAULT_BIND_HOST: &str = "0.0.0.0";

/// Where a client should connect to reach the server.
///
/// Serializes as either `{"url": "redis://host:port/"}` or
/// `{"path": "/tmp/.../redis.sock"}`, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectInfo {
    /// TCP endpoint as `<scheme>://<host>:<port>/`
    Url(String),
    /// Unix socket path
    Path(PathBuf),
}

impl ConnectInfo {
    /// Connection info for merged server options.
    ///
    /// A positive `port` yields a URL on the first `bind` address (or
    /// `0.0.0.0`); otherwise the `unixsocket` path is used. Returns `None`
    /// when neither is configured.
    ///
    /// # Examples
    ///
    /// ```
    /// use ephemeral_redis::config::ServerConfig;
    /// use ephemeral_redis::ConnectInfo;
    ///
    /// let options = ServerConfig::new().with("bind", "127.0.0.1").with("port", 6380);
    /// assert_eq!(
    ///     ConnectInfo::from_config(&options, "redis"),
    ///     Some(ConnectInfo::Url("redis://127.0.0.1:6380/".to_string()))
    /// );
    /// ```
    pub fn from_config(config: &ServerConfig, scheme: &str) -> Option<Self> {
        let port = config
            .get(PORT_KEY)
            .and_then(|v| v.as_integer())
            .filter(|port| *port > 0);

        if let Some(port) = port {
            let bind = config.get(BIND_KEY).map(|v| v.to_string());
            let host = bind
                .as_deref()
                .and_then(|b| b.split_whitespace().next())
                .unwrap_or(DEFAULT_BIND_HOST);
            return Some(Self::Url(format!("{}://{}:{}/", scheme, host, port)));
        }

        config
            .get(UNIXSOCKET_KEY)
            .map(|v| v.to_string())
            .filter(|path| !path.is_empty())
            .map(|path| Self::Path(PathBuf::from(path)))
    }

    /// URL, for TCP endpoints.
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Url(url) => Some(url),
            Self::Path(_) => None,
        }
    }

    /// Socket path, for unix socket endpoints.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Url(_) => None,
            Self::Path(path) => Some(path),
        }
    }
}

impl fmt::Display for ConnectInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => f.write_str(url),
            Self::Path(path) => write!(f, "{}", path.display()),
        }
    }
}
