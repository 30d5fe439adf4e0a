//! Configuration for smartfolders

use crate::SmartFoldersError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default configuration as TOML
pub const DEFAULT_CONFIG: &str = r#"# Smartfolders Configuration

[cache]
# Staleness window for the cached folder list (e.g., "30s", "5m")
folder_list_ttl = "30s"
# Staleness window for cached folder contents
# Contents churn faster and are cheaper to refresh
contents_ttl = "10s"

[results]
# Maximum result entries returned to the host
max_results = 50
# Minimum fuzzy score for folder-name matches
# Folder names are few and curated, so match strictly
folder_min_score = 0.45
# Minimum fuzzy score for file-name matches
# File names are many and noisy, so match loosely
file_min_score = 0.2

[navigation]
# Reserved character separating a folder selector from the residual query
delimiter = "⟩"
# How soon the host should re-invoke while a refresh is in flight
rerun_delay_ms = 500
"#;

/// Smartfolders configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub results: ResultsConfig,
    #[serde(default)]
    pub navigation: NavigationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_folder_list_ttl")]
    pub folder_list_ttl: String,
    #[serde(default = "default_contents_ttl")]
    pub contents_ttl: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsConfig {
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_folder_min_score")]
    pub folder_min_score: f64,
    #[serde(default = "default_file_min_score")]
    pub file_min_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationConfig {
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    #[serde(default = "default_rerun_delay_ms")]
    pub rerun_delay_ms: u64,
}

// Default value functions
fn default_folder_list_ttl() -> String {
    "30s".to_string()
}
fn default_contents_ttl() -> String {
    "10s".to_string()
}
fn default_max_results() -> usize {
    50
}
fn default_folder_min_score() -> f64 {
    0.45
}
fn default_file_min_score() -> f64 {
    0.2
}
fn default_delimiter() -> String {
    "⟩".to_string()
}
fn default_rerun_delay_ms() -> u64 {
    500
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            folder_list_ttl: default_folder_list_ttl(),
            contents_ttl: default_contents_ttl(),
        }
    }
}

impl Default for ResultsConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            folder_min_score: default_folder_min_score(),
            file_min_score: default_file_min_score(),
        }
    }
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            rerun_delay_ms: default_rerun_delay_ms(),
        }
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse config from TOML string
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| SmartFoldersError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// The delimiter is a single reserved character; rejecting anything
    /// else here beats silently truncating a multi-character setting.
    fn validate(&self) -> crate::Result<()> {
        let mut chars = self.navigation.delimiter.chars();
        if chars.next().is_none() || chars.next().is_some() {
            return Err(SmartFoldersError::ConfigParse(format!(
                "navigation.delimiter must be exactly one character, got {:?}",
                self.navigation.delimiter
            )));
        }
        Ok(())
    }

    /// Staleness window for the cached folder list
    pub fn folder_list_ttl(&self) -> Duration {
        parse_duration(&self.cache.folder_list_ttl).unwrap_or(Duration::from_secs(30))
    }

    /// Staleness window for cached folder contents
    pub fn contents_ttl(&self) -> Duration {
        parse_duration(&self.cache.contents_ttl).unwrap_or(Duration::from_secs(10))
    }

    /// The navigation delimiter character
    pub fn delimiter(&self) -> char {
        self.navigation.delimiter.chars().next().unwrap_or('⟩')
    }

    /// Re-poll delay signalled to the host while a refresh is in flight
    pub fn rerun_delay(&self) -> Duration {
        Duration::from_millis(self.navigation.rerun_delay_ms)
    }
}

/// Parse duration string (e.g., "30s", "5m", "1h")
fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let (num_str, unit) = s.split_at(s.len() - 1);
    let num: u64 = num_str.parse().ok()?;

    match unit {
        "s" => Some(Duration::from_secs(num)),
        "m" => Some(Duration::from_secs(num * 60)),
        "h" => Some(Duration::from_secs(num * 3600)),
        "d" => Some(Duration::from_secs(num * 86400)),
        _ => None,
    }
}
