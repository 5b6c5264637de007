use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const DEFAULT_ENV_PREFIX: &str = "TWEETCLIP";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaptureConfig {
    #[serde(default = "default_api_markers")]
    pub api_markers: Vec<String>,
    #[serde(default = "default_media_host")]
    pub media_host: String,
    #[serde(default = "default_media_extensions")]
    pub media_extensions: Vec<String>,
    #[serde(default = "default_proximity_window")]
    pub proximity_window: usize,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            api_markers: default_api_markers(),
            media_host: default_media_host(),
            media_extensions: default_media_extensions(),
            proximity_window: default_proximity_window(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl CaptureConfig {
    pub fn is_api_request(&self, url: &str) -> bool {
        self.api_markers
            .iter()
            .any(|marker| !marker.is_empty() && url.contains(marker.as_str()))
    }
}

fn default_api_markers() -> Vec<String> {
    vec!["api.".into(), "graphql".into()]
}

fn default_media_host() -> String {
    "video.twimg.com".into()
}

fn default_media_extensions() -> Vec<String> {
    vec![".mp4".into()]
}

fn default_proximity_window() -> usize {
    5000
}

fn default_max_body_bytes() -> usize {
    32 * 1024 * 1024
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DisplayConfig {
    #[serde(default = "default_playable_host")]
    pub playable_host: Option<String>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            playable_host: default_playable_host(),
        }
    }
}

fn default_playable_host() -> Option<String> {
    Some("pbs.twimg.com".into())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default)]
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(path) = options.config_file.as_ref() {
        if path.exists() {
            let from_file = read_config_file(path)?;
            cfg = merge_config(cfg, from_file);
        }
    } else if let Some(default_path) = default_config_path() {
        if default_path.exists() {
            let from_file = read_config_file(&default_path)?;
            cfg = merge_config(cfg, from_file);
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    apply_env(&mut cfg, prefix);

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("config: failed to read {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("config: failed to parse {}", path.display()))?;
    Ok(config)
}

fn merge_config(mut base: Config, other: Config) -> Config {
    if !other.capture.api_markers.is_empty() {
        base.capture.api_markers = other.capture.api_markers;
    }
    if !other.capture.media_host.is_empty() {
        base.capture.media_host = other.capture.media_host;
    }
    if !other.capture.media_extensions.is_empty() {
        base.capture.media_extensions = other.capture.media_extensions;
    }
    if other.capture.proximity_window != 0 {
        base.capture.proximity_window = other.capture.proximity_window;
    }
    if other.capture.max_body_bytes != 0 {
        base.capture.max_body_bytes = other.capture.max_body_bytes;
    }

    base.display.playable_host = other.display.playable_host;

    base.logging.debug = other.logging.debug;
    if other.logging.file.is_some() {
        base.logging.file = other.logging.file;
    }
    if other.logging.filter.is_some() {
        base.logging.filter = other.logging.filter;
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
        "capture.api_markers" => {
            let markers = split_list(&value);
            if !markers.is_empty() {
                cfg.capture.api_markers = markers;
            }
        }
        "capture.media_host" => {
            if !value.trim().is_empty() {
                cfg.capture.media_host = value.trim().to_string();
            }
        }
        "capture.media_extensions" => {
            let extensions = split_list(&value);
            if !extensions.is_empty() {
                cfg.capture.media_extensions = extensions;
            }
        }
        "capture.proximity_window" => {
            if let Ok(parsed) = value.trim().parse::<usize>() {
                cfg.capture.proximity_window = parsed;
            }
        }
        "capture.max_body_bytes" => {
            if let Ok(parsed) = value.trim().parse::<usize>() {
                cfg.capture.max_body_bytes = parsed;
            }
        }
        "display.playable_host" => {
            let trimmed = value.trim();
            cfg.display.playable_host = if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
                None
            } else {
                Some(trimmed.to_string())
            };
        }
        "logging.debug" => cfg.logging.debug = is_truthy(&value),
        "logging.file" => cfg.logging.file = Some(PathBuf::from(value)),
        "logging.filter" => cfg.logging.filter = Some(value),
        _ => {}
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

pub(crate) fn is_truthy(value: &str) -> bool {
    let trimmed = value.trim();
    !(trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("0")
        || trimmed.eq_ignore_ascii_case("false")
        || trimmed.eq_ignore_ascii_case("no")
        || trimmed.eq_ignore_ascii_case("off"))
}

pub fn default_path() -> Option<PathBuf> {
    default_config_path()
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tweetclip").join("config.yaml"))
}
