//! Configuration module for LinkPulse.
//!
//! Process settings come from environment variables with sensible
//! defaults. The two dashboard-editable settings (targets string and
//! probe interval) also live in a plain `KEY=value` file next to the
//! log, which overrides the environment when present.

use std::env;
use std::io;
use std::path::{Path, PathBuf};

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the web server (default: 8080)
    pub http_port: u16,
    /// Path of the probe log being tailed
    pub log_path: PathBuf,
    /// Path of the runtime config file
    pub config_path: PathBuf,
    /// How many recent records the raw-data endpoint returns
    pub max_records: usize,
    /// Default targets string shown when the config file has none
    pub targets: String,
    /// Fallback target host when no targets are configured at all
    pub target_host: String,
    /// Default probe interval, in seconds, as a display string
    pub interval_seconds: String,
    /// Relay poll interval in seconds
    pub relay_poll_seconds: u64,
    pub mqtt: MqttSettings,
}

/// MQTT relay settings loaded from environment variables.
#[derive(Debug, Clone)]
pub struct MqttSettings {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub tls: bool,
    pub topic_prefix: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            log_path: "/logs/connectivity.log".into(),
            config_path: "/logs/config.env".into(),
            max_records: 500,
            targets: String::new(),
            target_host: "8.8.8.8".to_string(),
            interval_seconds: "30".to_string(),
            relay_poll_seconds: 1,
            mqtt: MqttSettings::default(),
        }
    }
}

impl Default for MqttSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "localhost".to_string(),
            port: 1883,
            username: None,
            password: None,
            tls: false,
            topic_prefix: "connectivity".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `WEB_PORT`: HTTP port (default: 8080)
    /// - `LOG_FILE`: probe log path (default: `/logs/connectivity.log`)
    /// - `CONFIG_FILE`: runtime config path (default: `/logs/config.env`)
    /// - `MAX_RECORDS`: raw-data endpoint limit (default: 500)
    /// - `TARGETS`, `TARGET_HOST`, `INTERVAL_SECONDS`: prober defaults
    /// - `RELAY_POLL_SECONDS`: relay poll interval (default: 1)
    /// - `ENABLE_MQTT`, `MQTT_HOST`, `MQTT_PORT`, `MQTT_USERNAME`,
    ///   `MQTT_PASSWORD`, `MQTT_TLS`, `MQTT_TOPIC_PREFIX`
    pub fn load() -> Self {
        let mut cfg = Self::default();

        if let Ok(port_str) = env::var("WEB_PORT") {
            if let Ok(port) = port_str.parse() {
                cfg.http_port = port;
            }
        }
        if let Ok(path) = env::var("LOG_FILE") {
            cfg.log_path = path.into();
        }
        if let Ok(path) = env::var("CONFIG_FILE") {
            cfg.config_path = path.into();
        }
        if let Ok(max_str) = env::var("MAX_RECORDS") {
            if let Ok(max) = max_str.parse() {
                cfg.max_records = max;
            }
        }
        if let Ok(targets) = env::var("TARGETS") {
            cfg.targets = targets;
        }
        if let Ok(host) = env::var("TARGET_HOST") {
            cfg.target_host = host;
        }
        if let Ok(interval) = env::var("INTERVAL_SECONDS") {
            cfg.interval_seconds = interval;
        }
        if let Ok(poll_str) = env::var("RELAY_POLL_SECONDS") {
            if let Ok(poll) = poll_str.parse() {
                cfg.relay_poll_seconds = poll;
            }
        }

        cfg.mqtt = MqttSettings::load();
        cfg
    }
}

impl MqttSettings {
    fn load() -> Self {
        let mut mqtt = Self::default();

        mqtt.enabled = env::var("ENABLE_MQTT").as_deref() == Ok("1");
        if let Ok(host) = env::var("MQTT_HOST") {
            mqtt.host = host;
        }
        if let Ok(port_str) = env::var("MQTT_PORT") {
            if let Ok(port) = port_str.parse() {
                mqtt.port = port;
            }
        }
        mqtt.username = env::var("MQTT_USERNAME").ok();
        mqtt.password = env::var("MQTT_PASSWORD").ok();
        mqtt.tls = env::var("MQTT_TLS").as_deref() == Ok("1");
        if let Ok(prefix) = env::var("MQTT_TOPIC_PREFIX") {
            mqtt.topic_prefix = prefix;
        }

        mqtt
    }
}

/// The dashboard-editable settings, merged from `config.env` over the
/// environment defaults. File values win; blanks fall back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub targets: String,
    pub interval_seconds: String,
}

impl RuntimeConfig {
    pub fn load(cfg: &ServerConfig) -> Self {
        let mut targets = cfg.targets.clone();
        let mut interval = cfg.interval_seconds.clone();

        if let Ok(content) = std::fs::read_to_string(&cfg.config_path) {
            for line in content.lines() {
                let Some((key, value)) = line.split_once('=') else {
                    continue;
                };
                match key.trim() {
                    "TARGETS" => targets = value.trim().to_string(),
                    "INTERVAL_SECONDS" => interval = value.trim().to_string(),
                    _ => {}
                }
            }
        }

        if targets.is_empty() {
            targets = if cfg.targets.is_empty() {
                cfg.target_host.clone()
            } else {
                cfg.targets.clone()
            };
        }
        if interval.is_empty() {
            interval = if cfg.interval_seconds.is_empty() {
                "30".to_string()
            } else {
                cfg.interval_seconds.clone()
            };
        }

        Self {
            targets,
            interval_seconds: interval,
        }
    }

    /// Persist the given values as `KEY=value` lines. When both are
    /// blank the file is removed so the environment defaults apply
    /// again.
    pub fn save(path: &Path, targets: &str, interval_seconds: &str) -> io::Result<()> {
        let mut lines = String::new();
        if !targets.is_empty() {
            lines.push_str(&format!("TARGETS={targets}\n"));
        }
        if !interval_seconds.is_empty() {
            lines.push_str(&format!("INTERVAL_SECONDS={interval_seconds}\n"));
        }

        if lines.is_empty() {
            match std::fs::remove_file(path) {
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                other => other,
            }
        } else {
            std::fs::write(path, lines)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.http_port, 8080);
        assert_eq!(cfg.log_path, PathBuf::from("/logs/connectivity.log"));
        assert_eq!(cfg.max_records, 500);
        assert!(!cfg.mqtt.enabled);
        assert_eq!(cfg.mqtt.topic_prefix, "connectivity");
    }

    #[test]
    fn test_runtime_config_file_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.env");
        std::fs::write(&path, "TARGETS=Example=9.9.9.9\nINTERVAL_SECONDS=45\n").unwrap();

        let cfg = ServerConfig {
            config_path: path,
            targets: "GoogleDNS=8.8.8.8".to_string(),
            ..ServerConfig::default()
        };

        let runtime = RuntimeConfig::load(&cfg);
        assert_eq!(runtime.targets, "Example=9.9.9.9");
        assert_eq!(runtime.interval_seconds, "45");
    }

    #[test]
    fn test_runtime_config_falls_back_to_target_host() {
        let dir = TempDir::new().unwrap();
        let cfg = ServerConfig {
            config_path: dir.path().join("missing.env"),
            ..ServerConfig::default()
        };

        let runtime = RuntimeConfig::load(&cfg);
        assert_eq!(runtime.targets, "8.8.8.8");
        assert_eq!(runtime.interval_seconds, "30");
    }

    #[test]
    fn test_save_blank_removes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.env");

        RuntimeConfig::save(&path, "A=1.1.1.1", "60").unwrap();
        assert!(path.exists());

        RuntimeConfig::save(&path, "", "").unwrap();
        assert!(!path.exists());

        // Removing a file that never existed is not an error.
        RuntimeConfig::save(&path, "", "").unwrap();
    }
}
