//! Engine configuration
//!
//! Loaded from TOML; every field has a default so a missing file or an
//! empty section is valid. RPC credentials can also be lifted from the
//! daemon's own `*.conf` file.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub filter: FilterConfig,
}

impl SyncConfig {
    /// Load from a TOML file, falling back to defaults when it does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.rpc.validate()?;
        Ok(config)
    }
}

/// Daemon RPC endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// RPC endpoint URL
    #[serde(default = "default_rpc_url")]
    pub url: String,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// HTTP request timeout in seconds. Identity updates can block on
    /// wallet unlock, so this is generous.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Daemon conf file to read rpcuser/rpcpassword/rpcport from
    #[serde(default)]
    pub conf_file: Option<PathBuf>,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: default_rpc_url(),
            user: None,
            password: None,
            timeout_secs: default_timeout_secs(),
            conf_file: None,
        }
    }
}

impl RpcConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "rpc.url must be an http(s) URL, got '{}'",
                self.url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("rpc.timeout_secs must be positive".into()));
        }
        Ok(())
    }

    /// Fill unset credentials (and the port, if the URL is still the
    /// default) from a parsed daemon conf.
    pub fn apply_daemon_conf(&mut self, conf: &DaemonConf) {
        if self.user.is_none() {
            self.user = conf.get("rpcuser").map(str::to_string);
        }
        if self.password.is_none() {
            self.password = conf.get("rpcpassword").map(str::to_string);
        }
        if self.url == default_rpc_url() {
            if let Some(port) = conf.get("rpcport").and_then(|p| p.parse::<u16>().ok()) {
                self.url = format!("http://127.0.0.1:{}", port);
            }
        }
    }

    /// Read `conf_file`, if configured, and apply it.
    pub fn resolve_conf_file(&mut self) -> Result<(), ConfigError> {
        let Some(path) = self.conf_file.clone() else {
            return Ok(());
        };
        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        self.apply_daemon_conf(&DaemonConf::parse(&content));
        Ok(())
    }
}

/// Enumeration filter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Drop ticket/lottery identities from listings
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Parsed daemon `key=value` conf file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DaemonConf {
    values: HashMap<String, String>,
}

impl DaemonConf {
    /// Parse `key=value` lines; `#` starts a comment. Later keys win.
    pub fn parse(content: &str) -> Self {
        let values = content
            .lines()
            .map(|line| line.split('#').next().unwrap_or("").trim())
            .filter_map(|line| line.split_once('='))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .filter(|(k, _)| !k.is_empty())
            .collect();
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

// Defaults
fn default_rpc_url() -> String { "http://127.0.0.1:27486".to_string() }
fn default_timeout_secs() -> u64 { 120 }
fn default_true() -> bool { true }

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = SyncConfig::from_toml("").unwrap();
        assert_eq!(config.rpc.url, "http://127.0.0.1:27486");
        assert_eq!(config.rpc.timeout_secs, 120);
        assert!(config.filter.enabled);
    }

    #[test]
    fn test_full_toml() {
        let config = SyncConfig::from_toml(
            r#"
[rpc]
url = "http://10.0.0.5:8000"
user = "steward"
password = "hunter2"
timeout_secs = 30

[filter]
enabled = false
"#,
        )
        .unwrap();

        assert_eq!(config.rpc.url, "http://10.0.0.5:8000");
        assert_eq!(config.rpc.user.as_deref(), Some("steward"));
        assert_eq!(config.rpc.timeout_secs, 30);
        assert!(!config.filter.enabled);
    }

    #[test]
    fn test_invalid_url_rejected() {
        let err = SyncConfig::from_toml("[rpc]\nurl = \"localhost:27486\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_daemon_conf_fills_credentials() {
        let conf = DaemonConf::parse(
            "# generated\nrpcuser=user123\nrpcpassword = pass=with=equals \nrpcport=27486\nserver=1 # inline\n",
        );
        assert_eq!(conf.get("rpcpassword"), Some("pass=with=equals"));
        assert_eq!(conf.get("server"), Some("1"));

        let mut rpc = RpcConfig {
            user: Some("explicit".into()),
            ..Default::default()
        };
        rpc.apply_daemon_conf(&conf);
        assert_eq!(rpc.user.as_deref(), Some("explicit"));
        assert_eq!(rpc.password.as_deref(), Some("pass=with=equals"));
        assert_eq!(rpc.url, "http://127.0.0.1:27486");
    }

    #[test]
    fn test_daemon_conf_port_only_overrides_default_url() {
        let conf = DaemonConf::parse("rpcport=18843\n");

        let mut default_url = RpcConfig::default();
        default_url.apply_daemon_conf(&conf);
        assert_eq!(default_url.url, "http://127.0.0.1:18843");

        let mut custom_url = RpcConfig {
            url: "http://node:1234".into(),
            ..Default::default()
        };
        custom_url.apply_daemon_conf(&conf);
        assert_eq!(custom_url.url, "http://node:1234");
    }

    #[test]
    fn test_load_missing_and_present_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = SyncConfig::load(dir.path().join("nope.toml")).unwrap();
        assert!(missing.filter.enabled);

        let conf_path = dir.path().join("daemon.conf");
        std::fs::write(&conf_path, "rpcuser=u\nrpcpassword=p\n").unwrap();

        let path = dir.path().join("steward.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[rpc]\nconf_file = {:?}", conf_path.display().to_string()).unwrap();

        let mut config = SyncConfig::load(&path).unwrap();
        config.rpc.resolve_conf_file().unwrap();
        assert_eq!(config.rpc.user.as_deref(), Some("u"));
        assert_eq!(config.rpc.password.as_deref(), Some("p"));
    }
}
