//! Configuration loading and management.
//!
//! The config file is TOML with one table per concern:
//! `[server]` (address, port, TLS, password, capability requests),
//! `[identity]` (nick/ident/realname), `[[channels]]` (autojoin list),
//! `[on_connect]` (post-registration hooks), and `[timing]` (loop
//! latency knobs). The core only ever consumes the resolved, typed
//! values.

mod defaults;

use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub identity: IdentityConfig,
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
    #[serde(default)]
    pub on_connect: OnConnectConfig,
    #[serde(default)]
    pub timing: TimingConfig,
}

/// Uplink server settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    #[serde(default = "defaults::default_port")]
    pub port: u16,
    #[serde(default)]
    pub tls: bool,
    #[serde(default)]
    pub password: Option<String>,
    /// Capabilities to request during negotiation.
    #[serde(default)]
    pub caps: Vec<String>,
}

/// The identity registered with the server.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    pub nick: String,
    #[serde(default = "defaults::default_ident")]
    pub ident: String,
    #[serde(default = "defaults::default_realname")]
    pub realname: String,
}

/// A channel to join after registration.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelConfig {
    pub name: String,
    #[serde(default)]
    pub key: Option<String>,
}

/// Hooks run when the end-of-MOTD marker arrives.
#[derive(Debug, Clone, Deserialize)]
pub struct OnConnectConfig {
    #[serde(default = "defaults::default_true")]
    pub join: bool,
    #[serde(default = "defaults::default_true")]
    pub load_plugins: bool,
}

impl Default for OnConnectConfig {
    fn default() -> Self {
        Self {
            join: true,
            load_plugins: true,
        }
    }
}

/// Control-loop latency knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct TimingConfig {
    /// Read-readiness timeout per tick, in milliseconds.
    #[serde(default = "defaults::default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Fixed sleep between ticks, in milliseconds.
    #[serde(default = "defaults::default_tick_sleep_ms")]
    pub tick_sleep_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: defaults::default_read_timeout_ms(),
            tick_sleep_ms: defaults::default_tick_sleep_ms(),
        }
    }
}

impl TimingConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn tick_sleep(&self) -> Duration {
        Duration::from_millis(self.tick_sleep_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Config> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Config = toml::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
        [server]
        host = "irc.example.org"

        [identity]
        nick = "corvid"
    "#;

    const FULL: &str = r##"
        [server]
        host = "irc.example.org"
        port = 6697
        tls = true
        password = "hunter2"
        caps = ["multi-prefix", "account-notify"]

        [identity]
        nick = "corvid"
        ident = "crow"
        realname = "corvid bot"

        [[channels]]
        name = "#corvid"
        key = "sekrit"

        [[channels]]
        name = "#lounge"

        [on_connect]
        join = true
        load_plugins = false

        [timing]
        read_timeout_ms = 50
        tick_sleep_ms = 10
    "##;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.server.port, 6667);
        assert!(!config.server.tls);
        assert!(config.server.password.is_none());
        assert_eq!(config.identity.ident, "corvid");
        assert!(config.channels.is_empty());
        assert!(config.on_connect.join);
        assert!(config.on_connect.load_plugins);
        assert_eq!(config.timing.read_timeout_ms, 25);
    }

    #[test]
    fn test_full_config() {
        let config: Config = toml::from_str(FULL).unwrap();
        assert_eq!(config.server.port, 6697);
        assert!(config.server.tls);
        assert_eq!(config.server.password.as_deref(), Some("hunter2"));
        assert_eq!(config.server.caps.len(), 2);
        assert_eq!(config.channels.len(), 2);
        assert_eq!(config.channels[0].key.as_deref(), Some("sekrit"));
        assert!(config.channels[1].key.is_none());
        assert!(!config.on_connect.load_plugins);
        assert_eq!(config.timing.tick_sleep(), Duration::from_millis(10));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FULL.as_bytes()).unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.server.host, "irc.example.org");
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(Config::load("/nonexistent/corvid.toml").is_err());
    }
}
