//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use wls_http::{CLOCKIFY_BASE_URL, RetryPolicy};

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,

    /// IANA zone overriding the Clockify profile zone.
    #[serde(default)]
    pub timezone: Option<String>,

    #[serde(default)]
    pub clockify: ClockifyConfig,

    #[serde(default)]
    pub bamboohr: BambooConfig,

    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ClockifyConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    /// Defaults to the user's active workspace.
    #[serde(default)]
    pub workspace_id: Option<String>,
    pub base_url: String,
}

impl Default for ClockifyConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            workspace_id: None,
            base_url: CLOCKIFY_BASE_URL.to_string(),
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct BambooConfig {
    /// Company subdomain, e.g. `acme` for `acme.bamboohr.com`.
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Full API base including the domain; overrides `domain`.
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            delay_ms: u64::try_from(policy.delay.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl RetryConfig {
    pub fn policy(self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.delay_ms))
    }
}

fn redact(value: Option<&String>) -> Option<&'static str> {
    value.map(|_| "[REDACTED]")
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("timezone", &self.timezone)
            .field("clockify", &self.clockify)
            .field("bamboohr", &self.bamboohr)
            .field("retry", &self.retry)
            .finish()
    }
}

impl fmt::Debug for ClockifyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClockifyConfig")
            .field("api_key", &redact(self.api_key.as_ref()))
            .field("workspace_id", &self.workspace_id)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl fmt::Debug for BambooConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BambooConfig")
            .field("domain", &self.domain)
            .field("api_key", &redact(self.api_key.as_ref()))
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("wls.db"),
            timezone: None,
            clockify: ClockifyConfig::default(),
            bamboohr: BambooConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    ///
    /// Later sources win: defaults, `<config_dir>/wls/config.toml`, the
    /// given file, then `WLS_*` environment variables (`__` separates
    /// nested keys, e.g. `WLS_CLOCKIFY__API_KEY`).
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed("WLS_").split("__"));

        figment.extract()
    }
}

/// Returns the platform-specific config directory for wls.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("wls"))
}

/// Returns the platform-specific data directory for wls.
///
/// On Linux: `~/.local/share/wls`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("wls"))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    #[test]
    fn test_dirs_data_path_ends_with_wls() {
        let path = dirs_data_path().unwrap();
        assert_eq!(path.file_name().unwrap(), "wls");
    }

    #[test]
    fn test_default_config_uses_data_dir_for_db() {
        let config = Config::default();
        let data_dir = dirs_data_path().unwrap();
        assert_eq!(config.database_path, data_dir.join("wls.db"));
        assert_eq!(config.clockify.base_url, CLOCKIFY_BASE_URL);
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.retry.delay_ms, 2000);
    }

    #[test]
    fn test_config_file_sets_nested_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
database_path = "/tmp/wls-test.db"
timezone = "Europe/Prague"

[clockify]
api_key = "ck"
workspace_id = "ws1"

[bamboohr]
domain = "acme"
api_key = "bk"

[retry]
max_attempts = 3
delay_ms = 10
"#
        )
        .unwrap();

        let config = Config::load_from(Some(file.path())).unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/wls-test.db"));
        assert_eq!(config.timezone.as_deref(), Some("Europe/Prague"));
        assert_eq!(config.clockify.workspace_id.as_deref(), Some("ws1"));
        assert_eq!(config.clockify.base_url, CLOCKIFY_BASE_URL);
        assert_eq!(config.bamboohr.domain.as_deref(), Some("acme"));
        assert_eq!(
            config.retry.policy(),
            RetryPolicy::new(3, Duration::from_millis(10))
        );
    }

    #[test]
    fn test_debug_redacts_api_keys() {
        let mut config = Config::default();
        config.clockify.api_key = Some("clockify-secret".to_string());
        config.bamboohr.api_key = Some("bamboo-secret".to_string());

        let debug = format!("{config:?}");
        assert!(!debug.contains("clockify-secret"));
        assert!(!debug.contains("bamboo-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
