use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

const APP_NAME: &str = "agent-console";
const CONFIG_FILE: &str = "config.json";
/// Floor for the popup poll period; a zero-length interval cannot tick.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Base URL of the AI Agent backend
    pub api_url: String,
    /// The only origin cross-window messages are accepted from. The callback
    /// page is served on this origin's host and port.
    pub trusted_origin: String,
    pub popup_width: u32,
    pub popup_height: u32,
    /// How long a login popup may stay open before the flow gives up.
    pub auth_timeout_secs: u64,
    /// How often the flow checks whether the popup was closed by hand.
    pub poll_interval_ms: u64,
    /// Delay before the callback page closes its own window.
    pub callback_close_delay_ms: u64,
    /// Page size sent verbatim with every feed request.
    pub feed_page_size: u32,
    /// Treat an expired bearer token as logged out in the route guard.
    pub check_token_expiry: bool,
    /// Overrides the platform data directory for local storage.
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:3000".to_string(),
            trusted_origin: "http://localhost:5173".to_string(),
            popup_width: 500,
            popup_height: 600,
            auth_timeout_secs: 5 * 60,
            poll_interval_ms: 1000,
            callback_close_delay_ms: 2000,
            feed_page_size: 50,
            check_token_expiry: false,
            data_dir: None,
        }
    }
}

impl Config {
    /// Load configuration from the user's config directory, then apply
    /// environment overrides.
    /// Falls back to defaults if the file doesn't exist or fails to parse.
    pub fn load() -> Self {
        let config = match Self::try_load() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config, using defaults: {:#}", e);
                Self::default()
            }
        };
        config.with_env_overrides(|key| std::env::var(key).ok())
    }

    fn try_load() -> Result<Self> {
        let config_path = get_config_path()?;
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path).context("Failed to read config file")?;

        let config = serde_json::from_str(&content).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Apply `AGENT_*` overrides. The lookup is injected so tests don't have
    /// to touch the process environment.
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup("AGENT_API_URL") {
            self.api_url = url;
        }
        if let Some(origin) = lookup("AGENT_TRUSTED_ORIGIN") {
            self.trusted_origin = origin;
        }
        if let Some(dir) = lookup("AGENT_DATA_DIR") {
            self.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(flag) = lookup("AGENT_CHECK_TOKEN_EXPIRY") {
            self.check_token_expiry = matches!(flag.trim(), "1" | "true" | "yes");
        }
        self
    }

    /// Save the current configuration to disk.
    pub fn save(&self) -> Result<()> {
        let config_path = get_config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    pub fn auth_timeout(&self) -> Duration {
        Duration::from_secs(self.auth_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms).max(MIN_POLL_INTERVAL)
    }

    pub fn callback_close_delay(&self) -> Duration {
        Duration::from_millis(self.callback_close_delay_ms)
    }
}

pub fn get_config_path() -> Result<PathBuf> {
    let mut path =
        config_dir().ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    path.push(APP_NAME);
    path.push(CONFIG_FILE);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::FlowSettings;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_login_flow_constants() {
        let config = Config::default();
        assert_eq!(config.auth_timeout(), Duration::from_secs(300));
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.callback_close_delay(), Duration::from_secs(2));
        assert_eq!((config.popup_width, config.popup_height), (500, 600));
        assert_eq!(config.feed_page_size, 50);
        assert!(!config.check_token_expiry);
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let env: HashMap<&str, &str> = [
            ("AGENT_API_URL", "https://agent.example.com"),
            ("AGENT_TRUSTED_ORIGIN", "http://127.0.0.1:8080"),
            ("AGENT_CHECK_TOKEN_EXPIRY", "true"),
        ]
        .into_iter()
        .collect();

        let config =
            Config::default().with_env_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.api_url, "https://agent.example.com");
        assert_eq!(config.trusted_origin, "http://127.0.0.1:8080");
        assert!(config.check_token_expiry);
        assert!(config.data_dir.is_none());
    }

    #[test]
    fn partial_config_file_keeps_defaults() {
        let config: Config = serde_json::from_str(r#"{"feed_page_size": 10}"#).unwrap();
        assert_eq!(config.feed_page_size, 10);
        assert_eq!(config.trusted_origin, "http://localhost:5173");
    }

    #[test]
    fn zero_poll_interval_is_clamped() {
        let config: Config = serde_json::from_str(r#"{"poll_interval_ms": 0}"#).unwrap();
        assert_eq!(config.poll_interval(), MIN_POLL_INTERVAL);
        assert_eq!(
            FlowSettings::from_config(&config).poll_interval,
            MIN_POLL_INTERVAL
        );
    }
}
