use ephemeral_redis::config::{merge_defaults, render, validate_config, Config, ConfigValue, ServerConfig};
use ephemeral_redis::error::{Error, Result};
use std::io::Write;
use std::path::Path;
use std::time::Duration;

#[test]
fn test_parse_config() -> Result<()> {
    let config_str = r#"{
        "executable": "/usr/local/bin/redis-server",
        "timeoutMs": 5000,
        "pollIntervalMs": 50,
        "readinessMarker": "Ready to accept connections tcp",
        "urlScheme": "rediss",
        "server": {
            "bind": "127.0.0.1 ::1",
            "port": 6390,
            "appendonly": true,
            "save": "",
            "maxmemory": "64mb"
        }
    }"#;

    let config = Config::parse_from_str(config_str)?;

    assert_eq!(config.executable, "/usr/local/bin/redis-server");
    assert_eq!(config.timeout, Duration::from_secs(5));
    assert_eq!(config.poll_interval, Duration::from_millis(50));
    assert_eq!(config.readiness_marker, "Ready to accept connections tcp");
    assert_eq!(config.url_scheme, "rediss");
    assert_eq!(config.tmpdir, None);

    assert_eq!(config.server.len(), 5);
    assert_eq!(config.server.get("port"), Some(&ConfigValue::Integer(6390)));
    assert_eq!(config.server.get("appendonly"), Some(&ConfigValue::Bool(true)));
    assert_eq!(
        config.server.get("maxmemory"),
        Some(&ConfigValue::Text("64mb".to_string()))
    );

    validate_config(&config)?;

    Ok(())
}

#[test]
fn test_parse_config_file() -> Result<()> {
    let mut file = tempfile::NamedTempFile::new().expect("create temp file");
    write!(file, r#"{{"timeoutMs": 250, "server": {{"port": 6391}}}}"#).expect("write config");

    let config = Config::from_file(file.path())?;
    assert_eq!(config.timeout, Duration::from_millis(250));
    assert_eq!(config.executable, "redis-server");
    assert_eq!(config.server.get("port").and_then(ConfigValue::as_integer), Some(6391));

    Ok(())
}

#[test]
fn test_parse_errors() {
    assert!(matches!(
        Config::parse_from_str("{ not json"),
        Err(Error::ConfigParse(_))
    ));
    assert!(matches!(
        Config::parse_from_str(r#"{"timeoutMs": "soon"}"#),
        Err(Error::ConfigParse(_))
    ));
    assert!(matches!(
        Config::from_file("/nonexistent/ephemeral-redis.json"),
        Err(Error::ConfigParse(_))
    ));
}

#[test]
fn test_validate_config() -> Result<()> {
    validate_config(&Config::new())?;
    validate_config(&Config::new().with_option("save", "").with_option("appendonly", false))?;

    let invalid = [
        Config::new().with_executable(""),
        Config::new().with_readiness_marker(""),
        Config::new().with_timeout(Duration::ZERO),
        Config::new().with_poll_interval(Duration::ZERO),
        Config::new().with_option("", "value"),
        Config::new().with_option("max memory", "64mb"),
        Config::new().with_option("requirepass", "secret\nport 1"),
    ];
    for config in &invalid {
        assert!(
            matches!(validate_config(config), Err(Error::ConfigInvalid(_))),
            "accepted {:?}",
            config
        );
    }

    Ok(())
}

#[test]
fn test_rendered_file_has_every_option() {
    let scratch = Path::new("/tmp/ephemeral-redis-test");
    let options = ServerConfig::new()
        .with("bind", "127.0.0.1")
        .with("port", 6392)
        .with("appendonly", true)
        .with("save", "")
        .with("databases", 4);

    let merged = merge_defaults(&options, scratch);
    let rendered = render(&merged);
    let lines: Vec<&str> = rendered.lines().collect();

    for (key, value) in merged.iter() {
        let value = value.to_string();
        if value.is_empty() {
            assert!(!lines.iter().any(|line| line.split(' ').next() == Some(key)));
        } else {
            assert!(lines.contains(&format!("{} {}", key, value).as_str()), "missing {}", key);
        }
    }

    assert_eq!(
        lines,
        vec![
            "dir /tmp/ephemeral-redis-test/",
            "bind 127.0.0.1",
            "port 6392",
            "appendonly yes",
            "databases 4",
        ]
    );
}

#[test]
fn test_caller_values_override_defaults() {
    let scratch = Path::new("/tmp/ephemeral-redis-test");
    let options = ServerConfig::new()
        .with("unixsocket", "/run/custom.sock")
        .with("dir", "/var/lib/redis")
        .with("loglevel", "warning");

    let merged = merge_defaults(&options, scratch);

    assert_eq!(merged.get("unixsocket").map(ToString::to_string).as_deref(), Some("/run/custom.sock"));
    assert_eq!(merged.get("dir").map(ToString::to_string).as_deref(), Some("/var/lib/redis"));
    assert_eq!(merged.get("loglevel").map(ToString::to_string).as_deref(), Some("notice"));
    assert!(!merged.contains_key("port"));
}

#[test]
fn test_float_and_null_options() -> Result<()> {
    let config = Config::parse_from_str(
        r#"{"server": {"active-defrag-threshold-lower": 1.5, "save": null, "port": ""}}"#,
    )?;
    validate_config(&config)?;

    let merged = merge_defaults(&config.server, Path::new("/tmp/ephemeral-redis-test"));
    assert_eq!(
        render(&merged).lines().collect::<Vec<_>>(),
        vec![
            "unixsocket /tmp/ephemeral-redis-test/redis.sock",
            "port 0",
            "dir /tmp/ephemeral-redis-test/",
            "active-defrag-threshold-lower 1.5",
        ]
    );

    Ok(())
}
