use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::client::{API_KEY_ENV, DEFAULT_ENDPOINT_URL};
use crate::api::retry::{DEFAULT_RETRIES, TOO_MANY_REQUESTS};
use crate::api::{Api, RetryStrategy};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub retry: RetryConfig,
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Personal access token; the environment and `--api-key` take precedence
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    pub endpoint_url: String,

    /// Per-request timeout in seconds, 0 disables it
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Number of retries after the first attempt
    pub total: u32,
    pub backoff_factor_ms: u64,
    pub backoff_max_secs: u64,
    pub status_forcelist: Vec<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Longer cell values are truncated in table output
    pub max_column_width: usize,

    /// Show the record id as the first column
    pub show_record_id: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint_url: DEFAULT_ENDPOINT_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            total: DEFAULT_RETRIES,
            backoff_factor_ms: 100,
            backoff_max_secs: 120,
            status_forcelist: vec![TOO_MANY_REQUESTS],
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            max_column_width: 40,
            show_record_id: true,
        }
    }
}

impl RetryConfig {
    pub fn to_strategy(&self) -> RetryStrategy {
        RetryStrategy::new(self.total)
            .with_backoff_factor(Duration::from_millis(self.backoff_factor_ms))
            .with_backoff_max(Duration::from_secs(self.backoff_max_secs))
            .with_status_forcelist(self.status_forcelist.clone())
    }
}

impl Config {
    /// Load config from the default location, falling back to defaults when
    /// no file exists yet
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        if !config_path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;

        Ok(())
    }

    /// Get the default config file path
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("airtable-rs").join("config.toml"))
    }

    /// The API key to use: an explicit one, then `AIRTABLE_API_KEY`, then
    /// the config file
    pub fn resolve_api_key(&self, explicit: Option<&str>) -> Option<String> {
        let env_key = std::env::var(API_KEY_ENV).ok();
        self.resolve_api_key_with(explicit, env_key.as_deref())
    }

    fn resolve_api_key_with(
        &self,
        explicit: Option<&str>,
        env_key: Option<&str>,
    ) -> Option<String> {
        [explicit, env_key, self.api.api_key.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|key| !key.is_empty())
            .map(str::to_string)
    }

    /// Build a client from this config
    pub fn build_api(&self, explicit_key: Option<&str>) -> Result<Api> {
        let api_key = self.resolve_api_key(explicit_key).ok_or_else(|| {
            anyhow::anyhow!(
                "No API key found. Pass --api-key, set {} or add api_key to {}",
                API_KEY_ENV,
                Self::get_config_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|_| "the config file".to_string())
            )
        })?;
        self.build_api_with_key(api_key)
    }

    fn build_api_with_key(&self, api_key: String) -> Result<Api> {
        let mut builder = Api::builder(api_key)
            .endpoint_url(self.api.endpoint_url.clone())
            .retry_strategy(self.retry.to_strategy());
        if self.api.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(self.api.timeout_secs));
        }
        Ok(builder.build()?)
    }

    /// Create a default config file with comments
    pub fn create_default_with_comments() -> String {
        r#"# airtable-rs Configuration File
# Location: ~/.config/airtable-rs/config.toml (Linux)
#           ~/Library/Application Support/airtable-rs/config.toml (macOS)
#           %APPDATA%\airtable-rs\config.toml (Windows)

[api]
# Personal access token. --api-key and AIRTABLE_API_KEY take precedence.
# api_key = "patXXXXXXXXXXXXXX.XXXXXXXX"

# Root of the REST API
endpoint_url = "https://api.airtable.com"

# Per-request timeout in seconds (0 = no timeout)
timeout_secs = 30

[retry]
# Retries after the first attempt when a request is rate limited
total = 5

# Delay before the second retry; it doubles on each retry after that
backoff_factor_ms = 100

# Upper bound for a single delay, including Retry-After
backoff_max_secs = 120

# HTTP statuses that trigger a retry
status_forcelist = [429]

[display]
# Longer cell values are truncated in table output
max_column_width = 40

# Show the record id as the first column
show_record_id = true
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api.endpoint_url, "https://api.airtable.com");
        assert_eq!(config.retry.total, 5);
        assert_eq!(config.retry.status_forcelist, vec![429]);
        assert!(config.display.show_record_id);
    }

    #[test]
    fn test_commented_default_matches_defaults() {
        let parsed: Config = toml::from_str(&Config::create_default_with_comments()).unwrap();
        let defaults = Config::default();
        assert_eq!(parsed.api.endpoint_url, defaults.api.endpoint_url);
        assert_eq!(parsed.api.timeout_secs, defaults.api.timeout_secs);
        assert_eq!(parsed.retry.backoff_factor_ms, defaults.retry.backoff_factor_ms);
        assert_eq!(parsed.display.max_column_width, defaults.display.max_column_width);
        assert!(parsed.api.api_key.is_none());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str("[retry]\ntotal = 2\n").unwrap();
        assert_eq!(config.retry.total, 2);
        assert_eq!(config.retry.backoff_max_secs, 120);
        assert_eq!(config.display.max_column_width, 40);
    }

    #[test]
    fn test_save_and_load_roundtrip_on_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.api.api_key = Some("patFromFile".to_string());
        config.display.max_column_width = 12;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.api.api_key.as_deref(), Some("patFromFile"));
        assert_eq!(loaded.display.max_column_width, 12);
    }

    #[test]
    fn test_invalid_file_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[retry]\ntotal = \"lots\"\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn test_api_key_precedence() {
        let mut config = Config::default();
        config.api.api_key = Some("patConfig".to_string());

        assert_eq!(
            config.resolve_api_key_with(Some("patFlag"), Some("patEnv")).as_deref(),
            Some("patFlag")
        );
        assert_eq!(config.resolve_api_key_with(None, Some("patEnv")).as_deref(), Some("patEnv"));
        assert_eq!(config.resolve_api_key_with(None, Some("  ")).as_deref(), Some("patConfig"));

        config.api.api_key = None;
        assert_eq!(config.resolve_api_key_with(None, None), None);
    }

    #[test]
    fn test_build_api_from_config() {
        let mut config = Config::default();
        config.api.endpoint_url = "http://localhost:8080/".to_string();
        config.api.timeout_secs = 0;
        config.retry.total = 1;

        let api = config.build_api_with_key("patKey".to_string()).unwrap();
        assert_eq!(api.api_key(), "patKey");
        assert_eq!(api.timeout(), None);
        assert_eq!(api.retry_strategy().total, 1);
        assert_eq!(
            api.build_url(&["appX", "My Table"]).unwrap().as_str(),
            "http://localhost:8080/v0/appX/My%20Table"
        );
    }
}
