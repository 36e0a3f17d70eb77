//! Configuration module for ephemeral-redis.
//!
//! This module holds the launcher settings ([`Config`]), the ordered server
//! option map ([`ServerConfig`]), the defaulting rules applied before each
//! start, and the renderer that turns options into `redis.conf` lines.
//! Launcher settings can be loaded from JSON files or strings.
//!
//! # Examples
//!
//! Loading a configuration from a file:
//!
//! ```no_run
//! use ephemeral_redis::config::Config;
//!
//! let config = Config::from_file("redis-test.json").unwrap();
//! println!("Will launch {} with {} options", config.executable, config.server.len());
//! ```
//!
//! Creating a configuration programmatically:
//!
//! ```
//! use ephemeral_redis::{ServerProcess, config::{Config, ServerConfig}};
//! use std::time::Duration;
//!
//! let options = ServerConfig::new()
//!     .with("bind", "127.0.0.1")
//!     .with("port", 6390);
//!
//! let config = Config::new()
//!     .with_server_config(options)
//!     .with_timeout(Duration::from_secs(10));
//! let server = ServerProcess::new(config);
//! ```
mod parser;
mod render;
pub mod validator;

pub use parser::{
    Config, ConfigValue, ServerConfig, DEFAULT_EXECUTABLE, DEFAULT_POLL_INTERVAL,
    DEFAULT_READINESS_MARKER, DEFAULT_TIMEOUT, DEFAULT_URL_SCHEME,
};
pub use render::{merge_defaults, render, BIND_KEY, DIR_KEY, LOGLEVEL_KEY, PORT_KEY, UNIXSOCKET_KEY};
pub use validator::validate_config;
