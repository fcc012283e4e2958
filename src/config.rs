use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const DEFAULT_ENV_PREFIX: &str = "REEL_FEED";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_prefetch_threshold")]
    pub prefetch_threshold: usize,
    #[serde(default = "default_visibility_threshold")]
    pub visibility_threshold: f32,
    #[serde(default = "default_dwell_time", with = "humantime_serde")]
    pub dwell_time: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            prefetch_threshold: default_prefetch_threshold(),
            visibility_threshold: default_visibility_threshold(),
            dwell_time: default_dwell_time(),
        }
    }
}

fn default_page_size() -> usize {
    5
}

fn default_prefetch_threshold() -> usize {
    3
}

fn default_visibility_threshold() -> f32 {
    0.8
}

fn default_dwell_time() -> Duration {
    Duration::from_millis(100)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            user_agent: default_user_agent(),
            timeout: default_request_timeout(),
        }
    }
}

fn default_user_agent() -> String {
    format!("reel-feed/{}", crate::VERSION)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(20)
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.feed.page_size > 0, "config: feed.page_size must be positive");
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.feed.visibility_threshold),
            "config: feed.visibility_threshold must be within 0..=1, got {}",
            self.feed.visibility_threshold
        );
        Ok(())
    }

    pub fn has_remote_credentials(&self) -> bool {
        !self.remote.base_url.trim().is_empty() && !self.remote.api_key.trim().is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

/// Defaults, then the YAML file (explicit path or the per-user default), then
/// environment overrides. A missing file is not an error.
pub fn load(options: LoadOptions) -> Result<Config> {
    let path = options.config_file.or_else(default_config_path);
    let mut cfg = match path.filter(|path| path.exists()) {
        Some(path) => merge_config(Config::default(), read_config_file(&path)?),
        None => Config::default(),
    };

    apply_env(
        &mut cfg,
        options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX),
    );
    cfg.validate()?;
    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("config: read {}", path.display()))?;
    serde_yaml::from_str(&raw).with_context(|| format!("config: parse {}", path.display()))
}

fn merge_config(mut base: Config, other: Config) -> Config {
    base.feed = other.feed;

    if !other.remote.base_url.is_empty() {
        base.remote.base_url = other.remote.base_url;
    }
    if !other.remote.api_key.is_empty() {
        base.remote.api_key = other.remote.api_key;
    }
    if !other.remote.user_agent.is_empty() {
        base.remote.user_agent = other.remote.user_agent;
    }
    if !other.remote.timeout.is_zero() {
        base.remote.timeout = other.remote.timeout;
    }

    base
}

fn apply_env(cfg: &mut Config, prefix: &str) {
    let mut map: HashMap<String, String> = HashMap::new();
    let upper_prefix = format!("{}_", prefix.to_uppercase());

    for (key, value) in env::vars() {
        if let Some(stripped) = key.strip_prefix(&upper_prefix) {
            let normalized = stripped.to_ascii_lowercase().replace("__", ".");
            map.insert(normalized, value);
        }
    }

    for (key, value) in map {
        apply_env_value(cfg, &key, value);
    }
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "feed.page_size" => {
            if let Ok(parsed) = value.parse::<usize>() {
                cfg.feed.page_size = parsed;
            }
        }
        "feed.prefetch_threshold" => {
            if let Ok(parsed) = value.parse::<usize>() {
                cfg.feed.prefetch_threshold = parsed;
            }
        }
        "feed.visibility_threshold" => {
            if let Ok(parsed) = value.parse::<f32>() {
                cfg.feed.visibility_threshold = parsed;
            }
        }
        "feed.dwell_time" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.feed.dwell_time = duration;
            }
        }
        "remote.base_url" => cfg.remote.base_url = value,
        "remote.api_key" => cfg.remote.api_key = value,
        "remote.user_agent" => cfg.remote.user_agent = value,
        "remote.timeout" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.remote.timeout = duration;
            }
        }
        _ => {}
    }
}

pub fn default_path() -> Option<PathBuf> {
    default_config_path()
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("reel-feed").join("config.yaml"))
}
